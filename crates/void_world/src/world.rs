//! World context
//!
//! Owns the scene, the chunk manager and the loader, and runs one frame of
//! streaming and visibility per `update` call.

use crate::camera::Camera;
use crate::clock::FrameClock;
use crate::config::WorldConfig;
use crate::loader::{LevelLoader, LoadOutcome, SceneLoader};
use crate::manager::{ChunkManager, StreamingUpdate};
use crate::scene::Scene;

/// Streamed world: scene, residency policy and content source
#[derive(Debug)]
pub struct World<L: SceneLoader = LevelLoader> {
    scene: Scene,
    manager: ChunkManager,
    loader: L,
}

impl<L: SceneLoader> World<L> {
    /// The scene takes its chunk size from the loader
    pub fn new(config: WorldConfig, camera: Camera, loader: L) -> Self {
        let scene = Scene::new(loader.chunk_size_meters(), camera);
        Self {
            scene,
            manager: ChunkManager::new(config),
            loader,
        }
    }

    /// Load the chunk under the camera and prepare the first frame
    pub fn init(&mut self, clock: &FrameClock) -> LoadOutcome {
        let outcome = self.manager.init(&mut self.scene, &mut self.loader, clock);
        self.scene.update(clock);
        outcome
    }

    /// Streaming first, then per-chunk state, draw order and visibility
    pub fn update(&mut self, clock: &FrameClock) -> Option<StreamingUpdate> {
        let streaming = self.manager.update(&mut self.scene, &mut self.loader, clock);
        self.scene.update(clock);
        streaming
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn camera(&self) -> &Camera {
        self.scene.camera()
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        self.scene.camera_mut()
    }

    pub fn manager(&self) -> &ChunkManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut ChunkManager {
        &mut self.manager
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn loader_mut(&mut self) -> &mut L {
        &mut self.loader
    }
}
