//! Chunk Manager
//!
//! Decides which chunk coordinates must be resident around the viewer and
//! drives loading and unloading through a `SceneLoader`.
//!
//! Residency rules for view radius `R`:
//! - every authored coordinate with `dx² + dz² <= R²` around the viewer's
//!   chunk is loaded
//! - resident chunks farther than `R + 1` (Chebyshev) are unloaded
//!
//! The one-chunk band between the two keeps chunks from thrashing when the
//! viewer walks back and forth across a chunk border.

use serde::{Deserialize, Serialize};

use crate::clock::FrameClock;
use crate::config::{ChunkScanStrategy, WorldConfig, MAX_VIEW_RADIUS};
use crate::coord::{ChunkCoordinate, ChunkIndex};
use crate::loader::{LoadOutcome, SceneLoader};
use crate::scene::Scene;

/// Offsets of the view disk, row-major: `dz` outer, `dx` inner, ascending
pub fn disk_offsets(radius: u32) -> Vec<(i32, i32)> {
    let r = radius as i32;
    let r2 = r * r;
    let mut offsets = Vec::new();
    for dz in -r..=r {
        for dx in -r..=r {
            if dx * dx + dz * dz <= r2 {
                offsets.push((dx, dz));
            }
        }
    }
    offsets
}

/// Result of a streaming update
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StreamingUpdate {
    /// Viewer chunk the update was centered on
    pub center: ChunkCoordinate,
    /// Center of the previous update
    pub previous: Option<ChunkCoordinate>,
    /// Chunks made resident, in load order
    pub loaded: Vec<ChunkCoordinate>,
    /// Chunks evicted
    pub unloaded: Vec<ChunkCoordinate>,
    /// Load requests with nothing authored
    pub skipped: usize,
    /// Whether the whole disk was scanned
    pub full_scan: bool,
}

impl StreamingUpdate {
    /// Check if there are any residency changes
    pub fn has_updates(&self) -> bool {
        !self.loaded.is_empty() || !self.unloaded.is_empty()
    }
}

/// Running streaming counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamingStats {
    /// Updates that re-centered
    pub updates: u64,
    pub loads_requested: u64,
    pub chunks_loaded: u64,
    pub no_content: u64,
    pub already_resident: u64,
    pub rejected: u64,
    pub chunks_unloaded: u64,
    pub full_scans: u64,
    pub hinted_scans: u64,
}

/// Residency policy around the viewer
#[derive(Clone, Debug)]
pub struct ChunkManager {
    config: WorldConfig,
    /// Center of the last completed update
    current_center: Option<ChunkCoordinate>,
    rescan_required: bool,
    stats: StreamingStats,
}

impl ChunkManager {
    pub fn new(config: WorldConfig) -> Self {
        Self {
            config,
            current_center: None,
            rescan_required: true,
            stats: StreamingStats::default(),
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn current_center(&self) -> Option<ChunkCoordinate> {
        self.current_center
    }

    pub fn stats(&self) -> StreamingStats {
        self.stats
    }

    /// Change the view radius; the next update rescans the whole disk
    pub fn set_view_radius(&mut self, radius: u32) {
        let radius = radius.min(MAX_VIEW_RADIUS);
        if radius != self.config.view_radius() {
            log::info!("View radius {} -> {}", self.config.view_radius(), radius);
        }
        self.config.view_radius = radius;
        self.rescan_required = true;
    }

    pub fn set_scan_strategy(&mut self, strategy: ChunkScanStrategy) {
        self.config.scan_strategy = strategy;
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled && !self.config.enabled {
            self.rescan_required = true;
        }
        self.config.enabled = enabled;
    }

    /// Force a full scan on the next update
    pub fn request_rescan(&mut self) {
        self.rescan_required = true;
    }

    /// Load the chunk under the camera.
    ///
    /// Does not record a center, so the first `update` always scans the full disk.
    pub fn init<L: SceneLoader + ?Sized>(
        &mut self,
        scene: &mut Scene,
        loader: &mut L,
        clock: &FrameClock,
    ) -> LoadOutcome {
        let coordinate = scene.camera_coordinate();
        if !coordinate.is_in_world() {
            log::debug!("Camera chunk {} is outside the world", coordinate);
            return LoadOutcome::NoContent;
        }

        let outcome = self.request_load(scene, loader, coordinate, clock);
        scene.sort_chunks();
        outcome
    }

    /// Re-center residency on the camera's chunk.
    ///
    /// Returns `None` when streaming is disabled or the camera is still in the
    /// chunk of the previous update.
    pub fn update<L: SceneLoader + ?Sized>(
        &mut self,
        scene: &mut Scene,
        loader: &mut L,
        clock: &FrameClock,
    ) -> Option<StreamingUpdate> {
        if !self.config.enabled {
            return None;
        }

        let center = scene.camera_coordinate();
        if !self.rescan_required && self.current_center == Some(center) {
            return None;
        }

        let (offsets, full_scan) = self.scan_offsets(center);
        if full_scan {
            self.stats.full_scans += 1;
        } else {
            self.stats.hinted_scans += 1;
        }

        let mut update = StreamingUpdate {
            center,
            previous: self.current_center,
            full_scan,
            ..Default::default()
        };

        // Load the disk
        for (dx, dz) in offsets {
            let coordinate = center.offset(dx, dz);
            if !coordinate.is_in_world() || scene.is_resident(coordinate) {
                continue;
            }
            match self.request_load(scene, loader, coordinate, clock) {
                LoadOutcome::Loaded(_) => update.loaded.push(coordinate),
                LoadOutcome::NoContent => update.skipped += 1,
                LoadOutcome::AlreadyResident(_) | LoadOutcome::Rejected => {}
            }
        }

        // Evict beyond the retain radius
        for index in scene.coordinates_beyond(center, self.config.retain_radius()) {
            let coordinate = index.coordinate();
            let removed = if scene.is_resident(coordinate) {
                scene
                    .mark_unloading(index)
                    .and_then(|_| scene.remove_chunk(index))
            } else {
                log::warn!("Evicting chunk {} that never became resident", coordinate);
                scene.remove_chunk(index)
            };
            match removed {
                Ok(_) => {
                    self.stats.chunks_unloaded += 1;
                    update.unloaded.push(coordinate);
                }
                Err(err) => log::error!("Failed to unload chunk {}: {}", coordinate, err),
            }
        }

        scene.sort_chunks();

        self.current_center = Some(center);
        self.rescan_required = false;
        self.stats.updates += 1;

        log::debug!(
            "Streaming centered on {}: {} loaded, {} unloaded, {} empty, {} resident ({} scan)",
            center,
            update.loaded.len(),
            update.unloaded.len(),
            update.skipped,
            scene.num_loaded_chunks(),
            if full_scan { "full" } else { "hinted" }
        );
        Some(update)
    }

    /// Offsets to scan around `center`, and whether they cover the whole disk.
    ///
    /// After a one-chunk step every offset `o` with `o·d < 0` lies inside the
    /// previous disk, which is already resident, so only `o·d >= 0` is scanned.
    fn scan_offsets(&self, center: ChunkCoordinate) -> (Vec<(i32, i32)>, bool) {
        let offsets = disk_offsets(self.config.view_radius());

        let previous = match (self.config.scan_strategy, self.current_center) {
            (ChunkScanStrategy::DirectionHint, Some(previous)) if !self.rescan_required => previous,
            _ => return (offsets, true),
        };
        if previous.chebyshev_distance(center) != 1 {
            return (offsets, true);
        }

        let (mx, mz) = (center.x - previous.x, center.z - previous.z);
        let hinted = offsets
            .into_iter()
            .filter(|(dx, dz)| dx * mx + dz * mz >= 0)
            .collect();
        (hinted, false)
    }

    fn request_load<L: SceneLoader + ?Sized>(
        &mut self,
        scene: &mut Scene,
        loader: &mut L,
        coordinate: ChunkCoordinate,
        clock: &FrameClock,
    ) -> LoadOutcome {
        self.stats.loads_requested += 1;
        Self::discard_incomplete(scene, coordinate);
        let outcome = loader.load_chunk(scene, coordinate, clock);
        match outcome {
            LoadOutcome::Loaded(_) => self.stats.chunks_loaded += 1,
            LoadOutcome::NoContent => self.stats.no_content += 1,
            LoadOutcome::AlreadyResident(_) => self.stats.already_resident += 1,
            LoadOutcome::Rejected => self.stats.rejected += 1,
        }
        if !outcome.is_loaded() {
            Self::discard_incomplete(scene, coordinate);
        }
        outcome
    }

    /// Drop a chunk at `coordinate` that is registered but not resident.
    ///
    /// A load either completes or leaves nothing behind, so a chunk stuck in
    /// `Loading` never blocks its coordinate.
    fn discard_incomplete(scene: &mut Scene, coordinate: ChunkCoordinate) {
        let index = ChunkIndex::from(coordinate);
        let stale = scene
            .chunk(index)
            .map_or(false, |chunk| chunk.coordinate() == coordinate && !chunk.is_resident());
        if !stale {
            return;
        }
        log::warn!("Discarding incomplete chunk {}", coordinate);
        if let Err(err) = scene.remove_chunk(index) {
            log::error!("Failed to discard chunk {}: {}", coordinate, err);
        }
    }
}

impl Default for ChunkManager {
    fn default() -> Self {
        Self::new(WorldConfig::default())
    }
}
