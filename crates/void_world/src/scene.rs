//! Scene
//!
//! Owns the resident chunks, the camera, the static spatial index and the
//! per-frame chunk draw order. The renderer reads from it through ordered,
//! visibility-filtered traversals.

use std::collections::HashMap;

use glam::Vec3;
use void_math::{Sphere, AABB};

use crate::camera::{BoundingVolume, Camera};
use crate::chunk::{update_model_visibility, Chunk, ModelSlot};
use crate::clock::FrameClock;
use crate::coord::{ChunkCoordinate, ChunkIndex};
use crate::error::{Result, WorldError};
use crate::model::{Model, ModelCategory, PointLight, TerrainPatch};
use crate::spatial::StaticSpatialIndex;

/// Direction of a draw traversal
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DrawOrder {
    /// Opaque pass: nearest chunk first, nearest model first
    FrontToBack,
    /// Transparent pass: exact reverse of the opaque order
    BackToFront,
}

/// Back-reference from the static index to a static model
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ModelRef {
    pub chunk: ChunkIndex,
    pub slot: usize,
}

/// Handle of a model in the dynamic set
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DynamicModelId(pub usize);

/// Resident world state
pub struct Scene {
    chunk_size: f32,
    chunks: HashMap<ChunkIndex, Chunk>,
    /// Resident chunks, nearest first
    chunk_draw_order: Vec<ChunkIndex>,
    current_chunk: ChunkCoordinate,
    current_index: ChunkIndex,
    camera: Camera,
    static_index: StaticSpatialIndex<ModelRef, ChunkIndex>,
    dynamic_models: Vec<Option<Model>>,
    last_frame: u64,
}

impl Scene {
    pub fn new(chunk_size: f32, camera: Camera) -> Self {
        let current_chunk = ChunkCoordinate::from_world_position(camera.position(), chunk_size);
        Self {
            chunk_size,
            chunks: HashMap::new(),
            chunk_draw_order: Vec::new(),
            current_chunk,
            current_index: ChunkIndex::from(current_chunk),
            camera,
            static_index: StaticSpatialIndex::new(),
            dynamic_models: Vec::new(),
            last_frame: 0,
        }
    }

    pub fn chunk_size(&self) -> f32 {
        self.chunk_size
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    /// Chunk the camera is in right now
    pub fn camera_coordinate(&self) -> ChunkCoordinate {
        ChunkCoordinate::from_world_position(self.camera.position(), self.chunk_size)
    }

    /// Chunk the camera was in at the last `update`
    pub fn current_chunk(&self) -> ChunkCoordinate {
        self.current_chunk
    }

    pub fn current_index(&self) -> ChunkIndex {
        self.current_index
    }

    /// Frame counter of the last `update`
    pub fn last_frame(&self) -> u64 {
        self.last_frame
    }

    // ------------------------------------------------------------------
    // Chunk map
    // ------------------------------------------------------------------

    /// Register an empty chunk in the `Loading` state
    pub fn add_chunk(&mut self, coordinate: ChunkCoordinate) -> Result<&mut Chunk> {
        self.insert_chunk(ChunkIndex::from(coordinate), coordinate)
    }

    pub(crate) fn insert_chunk(
        &mut self,
        index: ChunkIndex,
        coordinate: ChunkCoordinate,
    ) -> Result<&mut Chunk> {
        if let Some(existing) = self.chunks.get(&index) {
            let existing = existing.coordinate();
            if existing == coordinate {
                return Err(WorldError::AlreadyRegistered(coordinate));
            }
            log::error!(
                "Chunk index {} of {} collides with resident chunk {}; keeping the resident one",
                index,
                coordinate,
                existing
            );
            return Err(WorldError::IndexCollision {
                index,
                existing,
                incoming: coordinate,
            });
        }

        if !self.static_index.is_seeded() {
            self.static_index.seed_root(coordinate.footprint(self.chunk_size));
        }

        let chunk_size = self.chunk_size;
        Ok(self
            .chunks
            .entry(index)
            .or_insert_with(|| Chunk::new(coordinate, chunk_size)))
    }

    pub fn chunk(&self, index: ChunkIndex) -> Option<&Chunk> {
        self.chunks.get(&index)
    }

    pub fn chunk_mut(&mut self, index: ChunkIndex) -> Option<&mut Chunk> {
        self.chunks.get_mut(&index)
    }

    pub fn chunk_at(&self, coordinate: ChunkCoordinate) -> Option<&Chunk> {
        self.chunks.get(&ChunkIndex::from(coordinate))
    }

    pub fn contains_chunk(&self, coordinate: ChunkCoordinate) -> bool {
        self.chunks.contains_key(&ChunkIndex::from(coordinate))
    }

    pub fn is_resident(&self, coordinate: ChunkCoordinate) -> bool {
        self.chunk_at(coordinate).map_or(false, Chunk::is_resident)
    }

    /// Number of resident chunks
    pub fn num_loaded_chunks(&self) -> usize {
        self.chunks.values().filter(|chunk| chunk.is_resident()).count()
    }

    /// Finish loading a chunk: it becomes resident and its static models are indexed
    pub fn attach_chunk(&mut self, index: ChunkIndex, clock: &FrameClock) -> Result<()> {
        let chunk = self
            .chunks
            .get_mut(&index)
            .ok_or(WorldError::ChunkNotFound(index))?;
        chunk.attach(clock.elapsed)?;
        let coordinate = chunk.coordinate();
        let models = chunk.model_count();

        let indexed = self.populate_static_index(index)?;
        log::info!(
            "Chunk {} resident: {} models, {} indexed",
            coordinate,
            models,
            indexed
        );
        Ok(())
    }

    /// Insert one index entry per static model of the chunk, then refit once
    pub fn populate_static_index(&mut self, index: ChunkIndex) -> Result<usize> {
        let chunk = self.chunks.get(&index).ok_or(WorldError::ChunkNotFound(index))?;
        if !chunk.is_resident() {
            return Err(WorldError::InvalidState {
                chunk: index,
                state: chunk.state(),
                operation: "populate_static_index",
            });
        }

        let static_index = &mut self.static_index;
        if static_index.group_len(index) > 0 {
            log::warn!("Chunk {} is already indexed", chunk.coordinate());
            return Ok(0);
        }
        let mut inserted = 0;
        for (slot, model) in chunk.static_models().iter().enumerate() {
            static_index.insert(model.world_aabb(), ModelRef { chunk: index, slot }, index);
            inserted += 1;
        }
        if inserted > 0 {
            static_index.propagate();
        }
        Ok(inserted)
    }

    /// `Resident -> Unloading`
    pub fn mark_unloading(&mut self, index: ChunkIndex) -> Result<()> {
        self.chunks
            .get_mut(&index)
            .ok_or(WorldError::ChunkNotFound(index))?
            .start_unloading()
    }

    /// Destroy a chunk and evict its static-index group
    pub fn remove_chunk(&mut self, index: ChunkIndex) -> Result<Chunk> {
        let mut chunk = self
            .chunks
            .remove(&index)
            .ok_or(WorldError::ChunkNotFound(index))?;
        chunk.finish_unloading();

        let evicted = self.static_index.remove_group(index);
        self.chunk_draw_order.retain(|&resident| resident != index);
        log::info!(
            "Chunk {} unloaded, {} index entries evicted",
            chunk.coordinate(),
            evicted
        );
        Ok(chunk)
    }

    /// Resident coordinates in ascending order
    pub fn resident_coordinates(&self) -> Vec<ChunkCoordinate> {
        let mut coordinates: Vec<_> = self
            .chunks
            .values()
            .filter(|chunk| chunk.is_resident())
            .map(Chunk::coordinate)
            .collect();
        coordinates.sort();
        coordinates
    }

    /// Registered chunks in any state farther than `max_distance` (Chebyshev) from `center`
    pub fn coordinates_beyond(&self, center: ChunkCoordinate, max_distance: u32) -> Vec<ChunkIndex> {
        let mut beyond: Vec<_> = self
            .chunks
            .values()
            .filter(|chunk| chunk.coordinate().chebyshev_distance(center) > max_distance)
            .map(Chunk::index)
            .collect();
        beyond.sort();
        beyond
    }

    // ------------------------------------------------------------------
    // Per-frame
    // ------------------------------------------------------------------

    /// Refresh current chunk, per-chunk model order, chunk order and visibility
    pub fn update(&mut self, clock: &FrameClock) {
        self.current_chunk = self.camera_coordinate();
        self.current_index = ChunkIndex::from(self.current_chunk);
        self.last_frame = clock.frame;

        let viewer = self.camera.position();
        for chunk in self.chunks.values_mut().filter(|chunk| chunk.is_resident()) {
            chunk.update(viewer);
        }
        self.sort_chunks();
        self.visibility_pass();
    }

    /// Order resident chunks by squared distance from the camera to their center
    pub fn sort_chunks(&mut self) {
        let viewer = self.camera.position();
        let mut keyed: Vec<(f32, ChunkIndex)> = self
            .chunks
            .values()
            .filter(|chunk| chunk.is_resident())
            .map(|chunk| (chunk.center().distance_squared(viewer), chunk.index()))
            .collect();
        keyed.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        self.chunk_draw_order = keyed.into_iter().map(|(_, index)| index).collect();
    }

    /// Opaque chunk order
    pub fn chunk_draw_order(&self) -> &[ChunkIndex] {
        &self.chunk_draw_order
    }

    /// Transparent chunk order, the opaque order reversed
    pub fn transparent_draw_order(&self) -> Vec<ChunkIndex> {
        self.chunk_draw_order.iter().rev().copied().collect()
    }

    /// Cache the frustum test on every resident and dynamic model
    pub fn visibility_pass(&mut self) {
        let camera = &self.camera;
        for chunk in self.chunks.values_mut().filter(|chunk| chunk.is_resident()) {
            chunk.update_visibility(camera);
        }
        for model in self.dynamic_models.iter_mut().flatten() {
            update_model_visibility(model, camera);
        }
    }

    // ------------------------------------------------------------------
    // Traversal
    // ------------------------------------------------------------------

    /// Visit visible chunk models in draw order; returns how many were visited.
    ///
    /// Front-to-back skips whole chunks whose culling bounds miss the frustum,
    /// except the chunk the camera is in. Back-to-front tests every chunk.
    pub fn traverse_models<V, F>(
        &self,
        mut visitor: V,
        predicate: F,
        order: DrawOrder,
        category: Option<ModelCategory>,
    ) -> usize
    where
        V: FnMut(&Model),
        F: Fn(&Model) -> bool,
    {
        let mut visited = 0;
        let mut visit = |chunk: &Chunk, slot: ModelSlot| {
            if category.map_or(false, |wanted| wanted != slot.category) {
                return;
            }
            if let Some(model) = chunk.model(slot) {
                if model.is_visible() && predicate(model) {
                    visitor(model);
                    visited += 1;
                }
            }
        };

        match order {
            DrawOrder::FrontToBack => {
                for chunk in self.ordered_chunks() {
                    if chunk.index() != self.current_index && !self.chunk_in_frustum(chunk) {
                        continue;
                    }
                    for slot in chunk.draw_order() {
                        visit(chunk, *slot);
                    }
                }
            }
            DrawOrder::BackToFront => {
                for chunk in self.ordered_chunks().rev() {
                    if !self.chunk_in_frustum(chunk) {
                        continue;
                    }
                    for slot in chunk.draw_order().iter().rev() {
                        visit(chunk, *slot);
                    }
                }
            }
        }
        visited
    }

    /// Hand every visible terrain patch to `prepare`, nearest first
    pub fn draw_terrains<V, F>(&self, mut prepare: V, predicate: F) -> usize
    where
        V: FnMut(&TerrainPatch, ChunkCoordinate),
        F: Fn(&TerrainPatch) -> bool,
    {
        let mut prepared = 0;
        for chunk in self.ordered_chunks() {
            if let Some(terrain) = chunk.terrain() {
                if terrain.is_visible() && predicate(terrain) {
                    prepare(terrain, chunk.coordinate());
                    prepared += 1;
                }
            }
        }
        prepared
    }

    /// Point lights whose influence reaches into the frustum, nearest chunk first
    pub fn visible_point_lights(&self) -> Vec<PointLight> {
        self.ordered_chunks()
            .flat_map(|chunk| chunk.point_lights().iter())
            .filter(|light| {
                self.camera
                    .frustum_collides(&BoundingVolume::Sphere(light.influence()))
            })
            .copied()
            .collect()
    }

    fn ordered_chunks(&self) -> impl DoubleEndedIterator<Item = &Chunk> + '_ {
        self.chunk_draw_order
            .iter()
            .filter_map(move |index| self.chunks.get(index))
    }

    fn chunk_in_frustum(&self, chunk: &Chunk) -> bool {
        self.camera
            .frustum_collides(&BoundingVolume::Aabb(*chunk.culling_bounds()))
    }

    // ------------------------------------------------------------------
    // Static index queries
    // ------------------------------------------------------------------

    pub fn static_index(&self) -> &StaticSpatialIndex<ModelRef, ChunkIndex> {
        &self.static_index
    }

    /// Static models whose bounds overlap the window
    pub fn query_static(&self, window: &AABB) -> Vec<ModelRef> {
        self.static_index.query_aabb(window)
    }

    pub fn query_static_sphere(&self, sphere: &Sphere) -> Vec<ModelRef> {
        self.static_index.query_sphere(sphere)
    }

    /// Resolve an index back-reference
    pub fn model(&self, model: ModelRef) -> Option<&Model> {
        self.chunks
            .get(&model.chunk)
            .and_then(|chunk| chunk.static_models().get(model.slot))
    }

    // ------------------------------------------------------------------
    // Dynamic models
    // ------------------------------------------------------------------

    pub fn add_dynamic_model(&mut self, model: Model) -> DynamicModelId {
        match self.dynamic_models.iter().position(Option::is_none) {
            Some(slot) => {
                self.dynamic_models[slot] = Some(model);
                DynamicModelId(slot)
            }
            None => {
                self.dynamic_models.push(Some(model));
                DynamicModelId(self.dynamic_models.len() - 1)
            }
        }
    }

    pub fn remove_dynamic_model(&mut self, id: DynamicModelId) -> Option<Model> {
        self.dynamic_models.get_mut(id.0).and_then(Option::take)
    }

    pub fn dynamic_model(&self, id: DynamicModelId) -> Option<&Model> {
        self.dynamic_models.get(id.0).and_then(Option::as_ref)
    }

    pub fn dynamic_model_mut(&mut self, id: DynamicModelId) -> Option<&mut Model> {
        self.dynamic_models.get_mut(id.0).and_then(Option::as_mut)
    }

    pub fn dynamic_models(&self) -> impl Iterator<Item = (DynamicModelId, &Model)> + '_ {
        self.dynamic_models
            .iter()
            .enumerate()
            .filter_map(|(slot, model)| model.as_ref().map(|model| (DynamicModelId(slot), model)))
    }

    /// Visit visible dynamic models sorted by distance from the camera
    pub fn traverse_dynamic_models<V, F>(&self, mut visitor: V, predicate: F, order: DrawOrder) -> usize
    where
        V: FnMut(DynamicModelId, &Model),
        F: Fn(&Model) -> bool,
    {
        let viewer = self.camera.position();
        let mut candidates: Vec<(f32, DynamicModelId, &Model)> = self
            .dynamic_models()
            .filter(|(_, model)| model.is_visible() && predicate(model))
            .map(|(id, model)| (model.world_center().distance_squared(viewer), id, model))
            .collect();
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        if order == DrawOrder::BackToFront {
            candidates.reverse();
        }

        for (_, id, model) in &candidates {
            visitor(*id, *model);
        }
        candidates.len()
    }
}

impl core::fmt::Debug for Scene {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Scene")
            .field("chunk_size", &self.chunk_size)
            .field("resident", &self.num_loaded_chunks())
            .field("current_chunk", &self.current_chunk)
            .field("indexed", &self.static_index.len())
            .finish()
    }
}

/// Camera position placed at the center of a chunk, at `height`
pub fn chunk_eye(coordinate: ChunkCoordinate, chunk_size: f32, height: f32) -> Vec3 {
    coordinate.world_center(chunk_size) + Vec3::Y * height
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Mat4;

    const SIZE: f32 = 16.0;

    fn unit_box() -> AABB {
        AABB::new(Vec3::splat(-0.5), Vec3::splat(0.5))
    }

    fn model_in(coordinate: ChunkCoordinate, name: &str) -> Model {
        let center = coordinate.world_center(SIZE) + Vec3::Y;
        Model::new_static(name, "stone", Mat4::from_translation(center), unit_box())
    }

    fn load(scene: &mut Scene, coordinate: ChunkCoordinate, clock: &FrameClock) {
        let chunk = scene.add_chunk(coordinate).unwrap();
        chunk.add_model(model_in(coordinate, "a")).unwrap();
        chunk.add_model(model_in(coordinate, "b")).unwrap();
        scene.attach_chunk(ChunkIndex::from(coordinate), clock).unwrap();
    }

    fn scene_looking_along_x() -> Scene {
        let camera = Camera::perspective(90.0, 1.0, 0.1, 500.0)
            .with_position(chunk_eye(ChunkCoordinate::ORIGIN, SIZE, 1.0))
            .with_forward(Vec3::X);
        Scene::new(SIZE, camera)
    }

    #[test]
    fn test_first_chunk_seeds_index() {
        let mut scene = scene_looking_along_x();
        assert!(!scene.static_index().is_seeded());
        scene.add_chunk(ChunkCoordinate::new(3, 4)).unwrap();
        let root = scene.static_index().root_bounds().unwrap();
        assert_eq!(root, ChunkCoordinate::new(3, 4).footprint(SIZE));
    }

    #[test]
    fn test_add_chunk_twice_is_rejected() {
        let mut scene = scene_looking_along_x();
        scene.add_chunk(ChunkCoordinate::new(1, 1)).unwrap();
        assert!(matches!(
            scene.add_chunk(ChunkCoordinate::new(1, 1)),
            Err(WorldError::AlreadyRegistered(_))
        ));
    }

    #[test]
    fn test_index_collision_keeps_existing_chunk() {
        let mut scene = scene_looking_along_x();
        let clock = FrameClock::new();
        let existing = ChunkCoordinate::new(2, 0);
        load(&mut scene, existing, &clock);

        let forced = ChunkIndex::from(existing);
        let result = scene.insert_chunk(forced, ChunkCoordinate::new(9, 9));
        assert!(matches!(
            result,
            Err(WorldError::IndexCollision { incoming, .. }) if incoming == ChunkCoordinate::new(9, 9)
        ));
        assert_eq!(scene.chunk(forced).map(Chunk::coordinate), Some(existing));
        assert!(scene.is_resident(existing));
    }

    #[test]
    fn test_remove_chunk_evicts_group() {
        let mut scene = scene_looking_along_x();
        let clock = FrameClock::new();
        let a = ChunkCoordinate::new(0, 0);
        let b = ChunkCoordinate::new(1, 0);
        load(&mut scene, a, &clock);
        load(&mut scene, b, &clock);
        scene.sort_chunks();
        assert_eq!(scene.static_index().len(), 4);

        scene.mark_unloading(ChunkIndex::from(a)).unwrap();
        let removed = scene.remove_chunk(ChunkIndex::from(a)).unwrap();
        assert_eq!(removed.state(), crate::chunk::ChunkState::Unloaded);
        assert_eq!(scene.static_index().group_len(ChunkIndex::from(a)), 0);
        assert_eq!(scene.static_index().len(), 2);
        assert_eq!(scene.chunk_draw_order(), &[ChunkIndex::from(b)]);
        assert!(scene.query_static(&a.footprint(SIZE)).is_empty());
        assert!(matches!(
            scene.remove_chunk(ChunkIndex::from(a)),
            Err(WorldError::ChunkNotFound(_))
        ));
    }

    #[test]
    fn test_query_static_resolves_models() {
        let mut scene = scene_looking_along_x();
        let clock = FrameClock::new();
        let coordinate = ChunkCoordinate::new(2, 3);
        load(&mut scene, coordinate, &clock);

        let hits = scene.query_static(&coordinate.footprint(SIZE));
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|hit| scene.model(*hit).is_some()));

        let sphere = Sphere::new(coordinate.world_center(SIZE) + Vec3::Y, 0.1);
        assert_eq!(scene.query_static_sphere(&sphere).len(), 2);
    }

    #[test]
    fn test_sort_chunks_nearest_first() {
        let mut scene = scene_looking_along_x();
        let clock = FrameClock::new();
        for x in [3, 0, 1, 2] {
            load(&mut scene, ChunkCoordinate::new(x, 0), &clock);
        }
        scene.update(&clock);

        let order: Vec<i32> = scene
            .chunk_draw_order()
            .iter()
            .map(|index| index.coordinate().x)
            .collect();
        assert_eq!(order, [0, 1, 2, 3]);

        let mut reversed = scene.chunk_draw_order().to_vec();
        reversed.reverse();
        assert_eq!(scene.transparent_draw_order(), reversed);
    }

    #[test]
    fn test_dynamic_models_visibility() {
        let mut scene = scene_looking_along_x();
        let ahead = scene.add_dynamic_model(Model::new_static(
            "ahead",
            "metal",
            Mat4::from_translation(Vec3::new(40.0, 1.0, 8.0)),
            unit_box(),
        ));
        let behind = scene.add_dynamic_model(Model::new_static(
            "behind",
            "metal",
            Mat4::from_translation(Vec3::new(-40.0, 1.0, 8.0)),
            unit_box(),
        ));
        scene.visibility_pass();

        assert!(scene.dynamic_model(ahead).unwrap().is_visible());
        assert!(!scene.dynamic_model(behind).unwrap().is_visible());

        let mut seen = Vec::new();
        scene.traverse_dynamic_models(|id, _| seen.push(id), |_| true, DrawOrder::FrontToBack);
        assert_eq!(seen, vec![ahead]);

        assert!(scene.remove_dynamic_model(behind).is_some());
        assert!(scene.dynamic_model(behind).is_none());
        assert_eq!(scene.add_dynamic_model(model_in(ChunkCoordinate::ORIGIN, "reuse")), behind);
    }

    #[test]
    fn test_point_lights_and_terrain() {
        let mut scene = scene_looking_along_x();
        let clock = FrameClock::new();
        let coordinate = ChunkCoordinate::new(1, 0);
        {
            let chunk = scene.add_chunk(coordinate).unwrap();
            chunk
                .set_terrain(TerrainPatch::new("grass", 17, coordinate.footprint(SIZE)))
                .unwrap();
            chunk
                .add_point_light(PointLight::new(Vec3::new(24.0, 2.0, 8.0), Vec3::ONE, 1.0, 4.0))
                .unwrap();
            chunk
                .add_point_light(PointLight::new(Vec3::new(-60.0, 2.0, 8.0), Vec3::ONE, 1.0, 4.0))
                .unwrap();
        }
        scene.attach_chunk(ChunkIndex::from(coordinate), &clock).unwrap();
        scene.update(&clock);

        assert_eq!(scene.visible_point_lights().len(), 1);
        let mut terrains = Vec::new();
        assert_eq!(scene.draw_terrains(|_, at| terrains.push(at), |_| true), 1);
        assert_eq!(terrains, vec![coordinate]);
    }
}
