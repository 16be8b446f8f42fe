//! World streaming configuration

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Largest supported view radius, in chunks
pub const MAX_VIEW_RADIUS: u32 = 5;

/// Default view radius, in chunks
pub const DEFAULT_VIEW_RADIUS: u32 = 2;

/// How the chunk manager looks for missing chunks after the viewer moves
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkScanStrategy {
    /// Scan every offset of the view disk
    #[default]
    FullDisk,
    /// After a one-chunk step, scan only the half of the disk the viewer is
    /// heading into. Falls back to a full scan after larger jumps.
    DirectionHint,
}

/// Configuration for world streaming
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Chunks around the viewer that must stay resident (clamped to 0..=5)
    pub view_radius: u32,

    /// Scan policy for missing chunks
    pub scan_strategy: ChunkScanStrategy,

    /// Streaming on/off switch
    pub enabled: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            view_radius: DEFAULT_VIEW_RADIUS,
            scan_strategy: ChunkScanStrategy::FullDisk,
            enabled: true,
        }
    }
}

impl WorldConfig {
    /// Parse from JSON; missing fields take their defaults
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// The effective view radius, always within `0..=MAX_VIEW_RADIUS`
    pub fn view_radius(&self) -> u32 {
        self.view_radius.min(MAX_VIEW_RADIUS)
    }

    /// Chebyshev distance beyond which resident chunks are evicted
    pub fn retain_radius(&self) -> u32 {
        self.view_radius() + 1
    }

    pub fn with_view_radius(mut self, radius: u32) -> Self {
        self.view_radius = radius.min(MAX_VIEW_RADIUS);
        self
    }

    pub fn with_scan_strategy(mut self, strategy: ChunkScanStrategy) -> Self {
        self.scan_strategy = strategy;
        self
    }
}
