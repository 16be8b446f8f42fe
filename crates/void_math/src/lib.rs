//! # void_math - Bounding Volumes and Culling
//!
//! Vector and matrix types come from `glam`; this crate adds the bounding
//! volumes and frustum tests used by world streaming and visibility.

pub mod bounds;
pub mod frustum;

pub use bounds::*;
pub use frustum::*;

pub use glam::{Mat4, Quat, Vec3, Vec4};

/// Common math constants
pub mod consts {
    pub const EPSILON: f32 = 1e-6;
}

pub mod prelude {
    pub use crate::bounds::{Sphere, AABB, OBB};
    pub use crate::frustum::{FrustumPlanes, FrustumTestResult, Plane};
    pub use glam::{Mat4, Quat, Vec3, Vec4};
}
