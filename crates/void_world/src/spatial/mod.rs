//! Spatial Acceleration Structures
//!
//! A bounding volume hierarchy over the static geometry of every resident
//! chunk, built incrementally as chunks load and evicted per chunk.
//!
//! # Example
//!
//! ```ignore
//! use void_world::spatial::StaticSpatialIndex;
//! use void_math::{AABB, Vec3};
//!
//! let mut index: StaticSpatialIndex<u32, u64> = StaticSpatialIndex::new();
//! index.insert(AABB::new(Vec3::ZERO, Vec3::ONE), 1, 42);
//! index.insert(AABB::new(Vec3::splat(5.0), Vec3::splat(6.0)), 2, 42);
//! index.propagate();
//!
//! let hits = index.query_aabb(&AABB::new(Vec3::ZERO, Vec3::splat(2.0)));
//! index.remove_group(42);
//! ```

mod bvh;

pub use bvh::*;
