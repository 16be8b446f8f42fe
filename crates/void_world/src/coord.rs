//! Chunk coordinates and identities
//!
//! The world is partitioned into square chunks on the XZ plane. A chunk is
//! addressed by a signed grid coordinate and keyed by a `ChunkIndex` derived
//! from it.

use core::fmt;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use void_math::AABB;

/// Signed 2D grid coordinate in chunk units
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkCoordinate {
    pub x: i32,
    pub z: i32,
}

impl ChunkCoordinate {
    pub const ORIGIN: Self = Self::new(0, 0);

    #[inline]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Chunk containing a world-space position
    pub fn from_world_position(position: Vec3, chunk_size: f32) -> Self {
        Self {
            x: (position.x / chunk_size).floor() as i32,
            z: (position.z / chunk_size).floor() as i32,
        }
    }

    #[inline]
    pub fn offset(self, dx: i32, dz: i32) -> Self {
        Self::new(self.x.saturating_add(dx), self.z.saturating_add(dz))
    }

    /// `max(|dx|, |dz|)`
    pub fn chebyshev_distance(self, other: Self) -> u32 {
        let dx = (i64::from(self.x) - i64::from(other.x)).unsigned_abs();
        let dz = (i64::from(self.z) - i64::from(other.z)).unsigned_abs();
        dx.max(dz).min(u64::from(u32::MAX)) as u32
    }

    /// `dx² + dz²`
    pub fn distance_squared(self, other: Self) -> i64 {
        let dx = i64::from(self.x) - i64::from(other.x);
        let dz = i64::from(self.z) - i64::from(other.z);
        dx * dx + dz * dz
    }

    /// The world is only defined over the non-negative quadrant
    #[inline]
    pub fn is_in_world(self) -> bool {
        self.x >= 0 && self.z >= 0
    }

    /// World-space corner with the smallest x and z
    pub fn world_origin(self, chunk_size: f32) -> Vec3 {
        Vec3::new(self.x as f32 * chunk_size, 0.0, self.z as f32 * chunk_size)
    }

    pub fn world_center(self, chunk_size: f32) -> Vec3 {
        self.world_origin(chunk_size) + Vec3::new(chunk_size * 0.5, 0.0, chunk_size * 0.5)
    }

    /// Chunk-sized cube centered on the chunk at ground level
    pub fn footprint(self, chunk_size: f32) -> AABB {
        AABB::from_center_half_extents(self.world_center(chunk_size), Vec3::splat(chunk_size * 0.5))
    }
}

impl fmt::Display for ChunkCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

impl From<(i32, i32)> for ChunkCoordinate {
    fn from((x, z): (i32, i32)) -> Self {
        Self::new(x, z)
    }
}

/// Map key and static-index group for a chunk.
///
/// Packs both coordinate halves into one `u64`, so distinct coordinates always
/// produce distinct indices and the coordinate can be recovered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkIndex(pub u64);

impl ChunkIndex {
    #[inline]
    pub const fn raw(&self) -> u64 {
        self.0
    }

    /// Inverse of `From<ChunkCoordinate>`
    pub const fn coordinate(&self) -> ChunkCoordinate {
        ChunkCoordinate::new((self.0 >> 32) as u32 as i32, self.0 as u32 as i32)
    }
}

impl From<ChunkCoordinate> for ChunkIndex {
    #[inline]
    fn from(coordinate: ChunkCoordinate) -> Self {
        Self(((coordinate.x as u32 as u64) << 32) | coordinate.z as u32 as u64)
    }
}

impl fmt::Display for ChunkIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:016x}", self.0)
    }
}
