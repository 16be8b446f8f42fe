//! Chunk loading
//!
//! `SceneLoader` is the seam between streaming policy and content. The chunk
//! manager asks it for a coordinate; the loader registers the chunk with the
//! scene, authors its content in stages and attaches it.
//!
//! `LevelLoader` is the in-memory implementation over a `LevelDescription`.
//! Authoring runs terrain, static models, instanced models, then lights. An
//! object that fails to build is logged and left out; the rest of the chunk
//! still loads.

use std::collections::{HashMap, HashSet};

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};
use void_math::AABB;

use crate::chunk::Chunk;
use crate::clock::FrameClock;
use crate::coord::{ChunkCoordinate, ChunkIndex};
use crate::error::{AuthoringError, Result};
use crate::model::{Model, PointLight, TerrainPatch};
use crate::scene::Scene;

/// Outcome of a load request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The chunk is now resident
    Loaded(ChunkIndex),
    /// Already registered; nothing changed
    AlreadyResident(ChunkIndex),
    /// Nothing is authored at this coordinate
    NoContent,
    /// The scene refused the chunk
    Rejected,
}

impl LoadOutcome {
    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadOutcome::Loaded(_))
    }
}

/// Produces chunk content on demand
pub trait SceneLoader {
    /// Edge length of a chunk in world units
    fn chunk_size_meters(&self) -> f32;

    /// Load the chunk at `coordinate` into the scene.
    ///
    /// Loading an already registered coordinate must leave the scene untouched.
    fn load_chunk(
        &mut self,
        scene: &mut Scene,
        coordinate: ChunkCoordinate,
        clock: &FrameClock,
    ) -> LoadOutcome;
}

// ============================================================================
// Level description
// ============================================================================

/// Terrain patch covering the whole chunk
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainDescription {
    pub material: String,
    pub resolution: u32,
    pub min_height: f32,
    pub max_height: f32,
}

impl Default for TerrainDescription {
    fn default() -> Self {
        Self {
            material: String::new(),
            resolution: 33,
            min_height: 0.0,
            max_height: 1.0,
        }
    }
}

impl TerrainDescription {
    pub fn new(material: impl Into<String>, min_height: f32, max_height: f32) -> Self {
        Self {
            material: material.into(),
            min_height,
            max_height,
            ..Default::default()
        }
    }
}

fn unit_bounds() -> AABB {
    AABB::from_center_half_extents(Vec3::ZERO, Vec3::splat(0.5))
}

/// One static model. `position` is relative to the chunk's origin corner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelDescription {
    pub name: String,
    pub material: String,
    pub position: Vec3,
    /// Rotation about +Y
    pub yaw_degrees: f32,
    pub scale: Vec3,
    /// Mesh bounds in model space
    pub bounds: AABB,
    pub cullable: bool,
    pub transparent: bool,
}

impl Default for ModelDescription {
    fn default() -> Self {
        Self {
            name: String::new(),
            material: String::new(),
            position: Vec3::ZERO,
            yaw_degrees: 0.0,
            scale: Vec3::ONE,
            bounds: unit_bounds(),
            cullable: true,
            transparent: false,
        }
    }
}

impl ModelDescription {
    pub fn new(name: impl Into<String>, material: impl Into<String>, position: Vec3) -> Self {
        Self {
            name: name.into(),
            material: material.into(),
            position,
            ..Default::default()
        }
    }

    pub fn with_bounds(mut self, min: Vec3, max: Vec3) -> Self {
        self.bounds = AABB::new(min, max);
        self
    }

    pub fn with_yaw(mut self, degrees: f32) -> Self {
        self.yaw_degrees = degrees;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_cullable(mut self, cullable: bool) -> Self {
        self.cullable = cullable;
        self
    }

    pub fn with_transparent(mut self, transparent: bool) -> Self {
        self.transparent = transparent;
        self
    }
}

/// A mesh drawn at several chunk-relative positions
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstancedDescription {
    pub name: String,
    pub material: String,
    pub bounds: AABB,
    pub positions: Vec<Vec3>,
    pub transparent: bool,
}

impl Default for InstancedDescription {
    fn default() -> Self {
        Self {
            name: String::new(),
            material: String::new(),
            bounds: unit_bounds(),
            positions: Vec::new(),
            transparent: false,
        }
    }
}

impl InstancedDescription {
    pub fn new(name: impl Into<String>, material: impl Into<String>, positions: Vec<Vec3>) -> Self {
        Self {
            name: name.into(),
            material: material.into(),
            positions,
            ..Default::default()
        }
    }

    pub fn with_transparent(mut self, transparent: bool) -> Self {
        self.transparent = transparent;
        self
    }
}

/// Point light; `position` is relative to the chunk's origin corner
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightDescription {
    pub position: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    pub radius: f32,
}

impl Default for LightDescription {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            color: Vec3::ONE,
            intensity: 1.0,
            radius: 8.0,
        }
    }
}

impl LightDescription {
    pub fn new(position: Vec3, radius: f32) -> Self {
        Self {
            position,
            radius,
            ..Default::default()
        }
    }
}

/// Everything authored in one chunk
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkDescription {
    pub coordinate: ChunkCoordinate,
    pub terrain: Option<TerrainDescription>,
    pub models: Vec<ModelDescription>,
    pub instanced: Vec<InstancedDescription>,
    pub lights: Vec<LightDescription>,
}

impl ChunkDescription {
    pub fn new(coordinate: ChunkCoordinate) -> Self {
        Self {
            coordinate,
            ..Default::default()
        }
    }

    pub fn with_terrain(mut self, terrain: TerrainDescription) -> Self {
        self.terrain = Some(terrain);
        self
    }

    pub fn with_model(mut self, model: ModelDescription) -> Self {
        self.models.push(model);
        self
    }

    pub fn with_instanced(mut self, instanced: InstancedDescription) -> Self {
        self.instanced.push(instanced);
        self
    }

    pub fn with_light(mut self, light: LightDescription) -> Self {
        self.lights.push(light);
        self
    }
}

/// A whole level: chunk size, material library and authored chunks
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelDescription {
    pub chunk_size: f32,
    /// Known materials. An empty library accepts every material.
    pub materials: Vec<String>,
    pub chunks: Vec<ChunkDescription>,
}

impl Default for LevelDescription {
    fn default() -> Self {
        Self {
            chunk_size: 16.0,
            materials: Vec::new(),
            chunks: Vec::new(),
        }
    }
}

impl LevelDescription {
    pub fn new(chunk_size: f32) -> Self {
        Self {
            chunk_size,
            ..Default::default()
        }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn with_material(mut self, material: impl Into<String>) -> Self {
        self.materials.push(material.into());
        self
    }

    pub fn with_chunk(mut self, chunk: ChunkDescription) -> Self {
        self.chunks.push(chunk);
        self
    }
}

// ============================================================================
// Level loader
// ============================================================================

/// `SceneLoader` over an in-memory level
#[derive(Clone, Debug)]
pub struct LevelLoader {
    chunk_size: f32,
    materials: HashSet<String>,
    chunks: HashMap<ChunkCoordinate, ChunkDescription>,
    load_count: usize,
}

impl LevelLoader {
    pub fn new(level: LevelDescription) -> Self {
        let mut chunks = HashMap::with_capacity(level.chunks.len());
        for chunk in level.chunks {
            if chunks.insert(chunk.coordinate, chunk).is_some() {
                log::warn!("Level authors a chunk twice; keeping the last one");
            }
        }

        Self {
            chunk_size: level.chunk_size,
            materials: level.materials.into_iter().collect(),
            chunks,
            load_count: 0,
        }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(Self::new(LevelDescription::from_json(text)?))
    }

    pub fn has_content(&self, coordinate: ChunkCoordinate) -> bool {
        self.chunks.contains_key(&coordinate)
    }

    /// Authored coordinates in ascending order
    pub fn authored_coordinates(&self) -> Vec<ChunkCoordinate> {
        let mut coordinates: Vec<_> = self.chunks.keys().copied().collect();
        coordinates.sort();
        coordinates
    }

    /// Number of chunks this loader made resident
    pub fn load_count(&self) -> usize {
        self.load_count
    }

    /// Run every authoring stage; returns how many objects were left out
    fn author(&self, chunk: &mut Chunk, description: &ChunkDescription) -> usize {
        let origin = chunk.coordinate().world_origin(self.chunk_size);
        let coordinate = chunk.coordinate();
        let mut omitted = 0;

        let mut report = |result: std::result::Result<(), AuthoringError>| {
            if let Err(err) = result {
                log::warn!("Chunk {}: {}; object omitted", coordinate, err);
                omitted += 1;
            }
        };

        if let Some(terrain) = &description.terrain {
            report(self.build_terrain(origin, terrain).map(|patch| {
                if let Err(err) = chunk.set_terrain(patch) {
                    log::error!("Chunk {}: {}", coordinate, err);
                }
            }));
        }

        let models = description
            .models
            .iter()
            .map(|model| self.build_model(origin, model))
            .chain(
                description
                    .instanced
                    .iter()
                    .map(|instanced| self.build_instanced(origin, instanced)),
            );
        for model in models {
            report(model.map(|model| {
                if let Err(err) = chunk.add_model(model) {
                    log::error!("Chunk {}: {}", coordinate, err);
                }
            }));
        }

        for (index, light) in description.lights.iter().enumerate() {
            report(build_light(origin, index, light).map(|light| {
                if let Err(err) = chunk.add_point_light(light) {
                    log::error!("Chunk {}: {}", coordinate, err);
                }
            }));
        }

        omitted
    }

    fn check_material(&self, object: &str, material: &str) -> std::result::Result<(), AuthoringError> {
        if self.materials.is_empty() || self.materials.contains(material) {
            Ok(())
        } else {
            Err(AuthoringError::MissingMaterial {
                object: object.to_string(),
                material: material.to_string(),
            })
        }
    }

    fn build_terrain(
        &self,
        origin: Vec3,
        terrain: &TerrainDescription,
    ) -> std::result::Result<TerrainPatch, AuthoringError> {
        self.check_material("terrain", &terrain.material)?;
        let bounds = AABB::new(
            origin + Vec3::Y * terrain.min_height,
            origin + Vec3::new(self.chunk_size, terrain.max_height, self.chunk_size),
        );
        if bounds.is_empty() {
            return Err(AuthoringError::DegenerateBounds("terrain".to_string()));
        }
        Ok(TerrainPatch::new(terrain.material.clone(), terrain.resolution, bounds))
    }

    fn build_model(
        &self,
        origin: Vec3,
        model: &ModelDescription,
    ) -> std::result::Result<Model, AuthoringError> {
        self.check_material(&model.name, &model.material)?;
        let local_bounds = model.bounds;
        if local_bounds.is_empty() {
            return Err(AuthoringError::DegenerateBounds(model.name.clone()));
        }

        let transform = Mat4::from_scale_rotation_translation(
            model.scale,
            Quat::from_rotation_y(model.yaw_degrees.to_radians()),
            origin + model.position,
        );
        Ok(
            Model::new_static(model.name.clone(), model.material.clone(), transform, local_bounds)
                .with_cullable(model.cullable)
                .with_transparent(model.transparent),
        )
    }

    fn build_instanced(
        &self,
        origin: Vec3,
        instanced: &InstancedDescription,
    ) -> std::result::Result<Model, AuthoringError> {
        self.check_material(&instanced.name, &instanced.material)?;
        if instanced.positions.is_empty() {
            return Err(AuthoringError::NoInstances(instanced.name.clone()));
        }
        let local_bounds = instanced.bounds;
        if local_bounds.is_empty() {
            return Err(AuthoringError::DegenerateBounds(instanced.name.clone()));
        }

        let instances = instanced
            .positions
            .iter()
            .map(|position| Mat4::from_translation(origin + *position))
            .collect();
        Ok(Model::new_instanced(
            instanced.name.clone(),
            instanced.material.clone(),
            local_bounds,
            instances,
        )
        .with_transparent(instanced.transparent))
    }
}

fn build_light(
    origin: Vec3,
    index: usize,
    light: &LightDescription,
) -> std::result::Result<PointLight, AuthoringError> {
    if light.radius.is_nan() || light.radius <= 0.0 {
        return Err(AuthoringError::InvalidLight {
            index,
            radius: light.radius,
        });
    }
    Ok(PointLight::new(
        origin + light.position,
        light.color,
        light.intensity,
        light.radius,
    ))
}

impl SceneLoader for LevelLoader {
    fn chunk_size_meters(&self) -> f32 {
        self.chunk_size
    }

    fn load_chunk(
        &mut self,
        scene: &mut Scene,
        coordinate: ChunkCoordinate,
        clock: &FrameClock,
    ) -> LoadOutcome {
        let index = ChunkIndex::from(coordinate);
        if scene.contains_chunk(coordinate) {
            log::warn!("Chunk {} is already resident", coordinate);
            return LoadOutcome::AlreadyResident(index);
        }

        let Some(description) = self.chunks.get(&coordinate) else {
            log::debug!("No content authored at {}", coordinate);
            return LoadOutcome::NoContent;
        };

        let chunk = match scene.add_chunk(coordinate) {
            Ok(chunk) => chunk,
            Err(err) => {
                log::warn!("Chunk {} not loaded: {}", coordinate, err);
                return LoadOutcome::Rejected;
            }
        };

        let omitted = self.author(chunk, description);
        if omitted > 0 {
            log::warn!("Chunk {} loaded with {} objects omitted", coordinate, omitted);
        }

        if let Err(err) = scene.attach_chunk(index, clock) {
            log::error!("Chunk {} failed to attach: {}", coordinate, err);
            if let Err(err) = scene.remove_chunk(index) {
                log::error!("Chunk {} could not be discarded: {}", coordinate, err);
            }
            return LoadOutcome::Rejected;
        }

        self.load_count += 1;
        LoadOutcome::Loaded(index)
    }
}
