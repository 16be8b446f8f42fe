//! Void World - Chunk-Streamed Scene
//!
//! Streams a persistent world into memory as square chunks around a moving
//! viewer, keeps a bounding-volume index over static geometry, and works out
//! every frame what is visible and in which order it must be drawn.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────── World ────────────────────────────┐
//! │  ChunkManager ──load/unload──▶ SceneLoader ──author──▶ Scene  │
//! │       │                                                │      │
//! │       └────────────── sort_chunks ────────────────────▶│      │
//! │                                   ┌────────────────────┤      │
//! │                                   │ chunks   camera    │      │
//! │                                   │ static index       │      │
//! │                                   │ chunk draw order   │      │
//! │                                   └────────────────────┘      │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! All work happens synchronously inside `World::update`: residency changes,
//! then per-chunk frame state, draw-order sort and the visibility pass. The
//! renderer then pulls ordered, visibility-filtered lists from the `Scene`.
//!
//! # Example
//!
//! ```ignore
//! use void_world::prelude::*;
//!
//! let loader = LevelLoader::new(level_description);
//! let camera = Camera::perspective(60.0, 16.0 / 9.0, 0.1, 500.0);
//! let mut world = World::new(WorldConfig::default(), camera, loader);
//!
//! let mut clock = FrameClock::new();
//! world.init(&clock);
//! loop {
//!     clock.tick(1.0 / 60.0);
//!     world.update(&clock);
//!     world.scene().traverse_models(
//!         |model| draw(model),
//!         |model| !model.transparent,
//!         DrawOrder::FrontToBack,
//!         None,
//!     );
//! }
//! ```

pub mod camera;
pub mod chunk;
pub mod clock;
pub mod config;
pub mod coord;
pub mod error;
pub mod loader;
pub mod manager;
pub mod model;
pub mod scene;
pub mod spatial;
pub mod world;

pub mod prelude {
    //! Common imports for world streaming
    pub use crate::camera::{BoundingVolume, Camera, Projection};
    pub use crate::chunk::{Chunk, ChunkState, ModelSlot};
    pub use crate::clock::FrameClock;
    pub use crate::config::{ChunkScanStrategy, WorldConfig};
    pub use crate::coord::{ChunkCoordinate, ChunkIndex};
    pub use crate::error::{AuthoringError, Result, WorldError};
    pub use crate::loader::{
        ChunkDescription, InstancedDescription, LevelDescription, LevelLoader, LightDescription,
        LoadOutcome, ModelDescription, SceneLoader, TerrainDescription,
    };
    pub use crate::manager::{ChunkManager, StreamingStats, StreamingUpdate};
    pub use crate::model::{Model, ModelCategory, ModelKind, PointLight, TerrainPatch};
    pub use crate::scene::{DrawOrder, DynamicModelId, ModelRef, Scene};
    pub use crate::spatial::StaticSpatialIndex;
    pub use crate::world::World;
}
