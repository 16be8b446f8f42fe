//! Chunk Definition
//!
//! A chunk is one square cell of the world: an optional terrain patch, static
//! and instanced models, and point lights. Content is authored while the chunk
//! is `Loading`; once attached it is `Resident` and frozen.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use void_math::AABB;

use crate::camera::{BoundingVolume, Camera};
use crate::coord::{ChunkCoordinate, ChunkIndex};
use crate::error::{Result, WorldError};
use crate::model::{Model, ModelCategory, PointLight, TerrainPatch};

/// Lifecycle state of a chunk
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChunkState {
    /// Not registered with the scene
    #[default]
    Unloaded,
    /// Registered, content being authored
    Loading,
    /// Attached to the draw order and the static index
    Resident,
    /// Marked for eviction
    Unloading,
}

impl ChunkState {
    /// Check if chunk is in a transient state (loading/unloading)
    pub fn is_transient(&self) -> bool {
        matches!(self, ChunkState::Loading | ChunkState::Unloading)
    }
}

/// Position of a model inside its chunk
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ModelSlot {
    pub category: ModelCategory,
    pub slot: usize,
}

/// One streamed cell of world space
#[derive(Debug)]
pub struct Chunk {
    coordinate: ChunkCoordinate,
    index: ChunkIndex,
    size: f32,
    state: ChunkState,
    terrain: Option<TerrainPatch>,
    static_models: Vec<Model>,
    instanced_models: Vec<Model>,
    point_lights: Vec<PointLight>,
    /// Whole-chunk culling volume, fixed on attach
    culling_bounds: AABB,
    /// Models nearest-first, refreshed every frame
    draw_order: Vec<ModelSlot>,
    loaded_at: Option<f32>,
}

impl Chunk {
    /// A new empty chunk in the `Loading` state
    pub fn new(coordinate: ChunkCoordinate, size: f32) -> Self {
        Self {
            coordinate,
            index: ChunkIndex::from(coordinate),
            size,
            state: ChunkState::Loading,
            terrain: None,
            static_models: Vec::new(),
            instanced_models: Vec::new(),
            point_lights: Vec::new(),
            culling_bounds: AABB::EMPTY,
            draw_order: Vec::new(),
            loaded_at: None,
        }
    }

    pub fn coordinate(&self) -> ChunkCoordinate {
        self.coordinate
    }

    pub fn index(&self) -> ChunkIndex {
        self.index
    }

    pub fn state(&self) -> ChunkState {
        self.state
    }

    #[inline]
    pub fn is_resident(&self) -> bool {
        self.state == ChunkState::Resident
    }

    pub fn size(&self) -> f32 {
        self.size
    }

    /// Ground-level center, the key for draw-order sorting
    pub fn center(&self) -> Vec3 {
        self.coordinate.world_center(self.size)
    }

    pub fn footprint(&self) -> AABB {
        self.coordinate.footprint(self.size)
    }

    /// Terrain bounds grown to cover every model; empty for empty chunks
    pub fn culling_bounds(&self) -> &AABB {
        &self.culling_bounds
    }

    /// Clock time at which the chunk became resident
    pub fn loaded_at(&self) -> Option<f32> {
        self.loaded_at
    }

    pub fn terrain(&self) -> Option<&TerrainPatch> {
        self.terrain.as_ref()
    }

    pub fn static_models(&self) -> &[Model] {
        &self.static_models
    }

    pub fn instanced_models(&self) -> &[Model] {
        &self.instanced_models
    }

    pub fn point_lights(&self) -> &[PointLight] {
        &self.point_lights
    }

    pub fn model(&self, slot: ModelSlot) -> Option<&Model> {
        match slot.category {
            ModelCategory::Static => self.static_models.get(slot.slot),
            ModelCategory::Instanced => self.instanced_models.get(slot.slot),
        }
    }

    pub fn model_count(&self) -> usize {
        self.static_models.len() + self.instanced_models.len()
    }

    /// Models in the current per-frame order, nearest first
    pub fn draw_order(&self) -> &[ModelSlot] {
        &self.draw_order
    }

    // Authoring. Only allowed while loading.

    pub fn set_terrain(&mut self, terrain: TerrainPatch) -> Result<()> {
        self.expect_state(ChunkState::Loading, "set_terrain")?;
        self.terrain = Some(terrain);
        Ok(())
    }

    /// Add a model to the list matching its kind; returns its slot
    pub fn add_model(&mut self, model: Model) -> Result<ModelSlot> {
        self.expect_state(ChunkState::Loading, "add_model")?;
        let category = model.category();
        let list = match category {
            ModelCategory::Static => &mut self.static_models,
            ModelCategory::Instanced => &mut self.instanced_models,
        };
        list.push(model);
        Ok(ModelSlot {
            category,
            slot: list.len() - 1,
        })
    }

    pub fn add_point_light(&mut self, light: PointLight) -> Result<()> {
        self.expect_state(ChunkState::Loading, "add_point_light")?;
        self.point_lights.push(light);
        Ok(())
    }

    // Lifecycle

    /// `Loading -> Resident`
    pub(crate) fn attach(&mut self, current_time: f32) -> Result<()> {
        self.expect_state(ChunkState::Loading, "attach")?;

        let model_bounds = self
            .static_models
            .iter()
            .chain(self.instanced_models.iter())
            .fold(AABB::EMPTY, |acc, model| acc.union(&model.world_aabb()));
        self.culling_bounds = match &self.terrain {
            Some(terrain) => terrain.bounds().union(&model_bounds),
            None => model_bounds,
        };

        self.draw_order = self.model_slots().collect();
        self.state = ChunkState::Resident;
        self.loaded_at = Some(current_time);
        Ok(())
    }

    /// `Resident -> Unloading`
    pub(crate) fn start_unloading(&mut self) -> Result<()> {
        self.expect_state(ChunkState::Resident, "start_unloading")?;
        self.state = ChunkState::Unloading;
        Ok(())
    }

    /// Any state -> `Unloaded`. Cached visibility is cleared.
    pub(crate) fn finish_unloading(&mut self) {
        self.state = ChunkState::Unloaded;
        self.loaded_at = None;
        self.draw_order.clear();
        if let Some(terrain) = &mut self.terrain {
            terrain.set_visible(false);
        }
        for model in self.static_models.iter_mut().chain(self.instanced_models.iter_mut()) {
            model.set_visible(false);
        }
    }

    // Per-frame

    /// Re-sort models by squared distance from the viewer
    pub(crate) fn update(&mut self, viewer: Vec3) {
        let static_models = &self.static_models;
        let instanced_models = &self.instanced_models;
        let distance = |slot: &ModelSlot| {
            let model = match slot.category {
                ModelCategory::Static => &static_models[slot.slot],
                ModelCategory::Instanced => &instanced_models[slot.slot],
            };
            model.world_center().distance_squared(viewer)
        };
        self.draw_order
            .sort_by(|a, b| distance(a).total_cmp(&distance(b)));
    }

    /// Cache the frustum test for terrain and every model
    pub(crate) fn update_visibility(&mut self, camera: &Camera) {
        if let Some(terrain) = &mut self.terrain {
            let visible = camera.frustum_collides(&BoundingVolume::Aabb(*terrain.bounds()));
            terrain.set_visible(visible);
        }
        for model in self.static_models.iter_mut().chain(self.instanced_models.iter_mut()) {
            update_model_visibility(model, camera);
        }
    }

    fn model_slots(&self) -> impl Iterator<Item = ModelSlot> + '_ {
        let statics = (0..self.static_models.len()).map(|slot| ModelSlot {
            category: ModelCategory::Static,
            slot,
        });
        let instanced = (0..self.instanced_models.len()).map(|slot| ModelSlot {
            category: ModelCategory::Instanced,
            slot,
        });
        statics.chain(instanced)
    }

    fn expect_state(&self, expected: ChunkState, operation: &'static str) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(WorldError::InvalidState {
                chunk: self.index,
                state: self.state,
                operation,
            })
        }
    }
}

pub(crate) fn update_model_visibility(model: &mut Model, camera: &Camera) {
    let visible = !model.cullable
        || camera.frustum_collides(&BoundingVolume::Obb(*model.oriented_bounds()));
    model.set_visible(visible);
}
