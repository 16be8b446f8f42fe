//! Frustum culling types
//!
//! Provides structured frustum and plane types for view-frustum culling.

use glam::{Mat4, Vec3, Vec4};

use crate::bounds::{Sphere, AABB, OBB};

/// Plane in 3D space (n·p + d = 0)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
    /// Plane normal (unit vector)
    pub normal: Vec3,
    /// Distance from origin along normal
    pub distance: f32,
}

impl Plane {
    /// Create a new plane from normal and distance
    ///
    /// The normal will be normalized automatically.
    #[inline]
    pub fn new(normal: Vec3, distance: f32) -> Self {
        let len = normal.length();
        if len > 1e-10 {
            Self {
                normal: normal / len,
                distance: distance / len,
            }
        } else {
            Self::default()
        }
    }

    fn from_vec4(v: Vec4) -> Self {
        Self::new(v.truncate(), v.w)
    }

    /// Create a plane from a point on the plane and its normal
    pub fn from_point_normal(point: Vec3, normal: Vec3) -> Self {
        let normal = normal.normalize();
        Self {
            normal,
            distance: -normal.dot(point),
        }
    }

    /// Signed distance; positive is on the normal's side
    #[inline]
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.distance
    }
}

impl Default for Plane {
    fn default() -> Self {
        Self {
            normal: Vec3::Y,
            distance: 0.0,
        }
    }
}

/// Result of frustum containment test
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FrustumTestResult {
    /// Object is completely inside the frustum
    Inside,
    /// Object is completely outside the frustum
    Outside,
    /// Object intersects the frustum boundary
    Intersecting,
}

impl FrustumTestResult {
    /// Check if the object is at least partially visible
    #[inline]
    pub fn is_visible(&self) -> bool {
        *self != FrustumTestResult::Outside
    }

    #[inline]
    pub fn is_inside(&self) -> bool {
        *self == FrustumTestResult::Inside
    }
}

/// View frustum as six inward-facing planes: left, right, bottom, top, near, far
#[derive(Clone, Debug, PartialEq)]
pub struct FrustumPlanes {
    pub planes: [Plane; 6],
}

impl FrustumPlanes {
    pub const LEFT: usize = 0;
    pub const RIGHT: usize = 1;
    pub const BOTTOM: usize = 2;
    pub const TOP: usize = 3;
    pub const NEAR: usize = 4;
    pub const FAR: usize = 5;

    /// Extract frustum planes from a view-projection matrix
    ///
    /// Gribb/Hartmann extraction. Expects OpenGL-style clip space
    /// (`-w <= z <= w`), as produced by glam's `*_gl` projections.
    pub fn from_view_projection(vp: &Mat4) -> Self {
        let row0 = vp.row(0);
        let row1 = vp.row(1);
        let row2 = vp.row(2);
        let row3 = vp.row(3);

        Self {
            planes: [
                Plane::from_vec4(row3 + row0),
                Plane::from_vec4(row3 - row0),
                Plane::from_vec4(row3 + row1),
                Plane::from_vec4(row3 - row1),
                Plane::from_vec4(row3 + row2),
                Plane::from_vec4(row3 - row2),
            ],
        }
    }

    /// Test if an AABB is inside, outside, or intersecting the frustum
    pub fn contains_aabb(&self, aabb: &AABB) -> FrustumTestResult {
        if aabb.is_empty() {
            return FrustumTestResult::Outside;
        }

        let mut result = FrustumTestResult::Inside;
        for plane in &self.planes {
            // p-vertex: corner furthest along the normal
            let p = Vec3::new(
                if plane.normal.x >= 0.0 { aabb.max.x } else { aabb.min.x },
                if plane.normal.y >= 0.0 { aabb.max.y } else { aabb.min.y },
                if plane.normal.z >= 0.0 { aabb.max.z } else { aabb.min.z },
            );
            let n = Vec3::new(
                if plane.normal.x >= 0.0 { aabb.min.x } else { aabb.max.x },
                if plane.normal.y >= 0.0 { aabb.min.y } else { aabb.max.y },
                if plane.normal.z >= 0.0 { aabb.min.z } else { aabb.max.z },
            );

            if plane.distance_to_point(p) < 0.0 {
                return FrustumTestResult::Outside;
            }
            if plane.distance_to_point(n) < 0.0 {
                result = FrustumTestResult::Intersecting;
            }
        }

        result
    }

    /// Test an oriented box using its projected radius against each plane
    pub fn contains_obb(&self, obb: &OBB) -> FrustumTestResult {
        let mut result = FrustumTestResult::Inside;
        for plane in &self.planes {
            let dist = plane.distance_to_point(obb.center);
            let radius = obb.projected_radius(plane.normal);

            if dist < -radius {
                return FrustumTestResult::Outside;
            }
            if dist < radius {
                result = FrustumTestResult::Intersecting;
            }
        }
        result
    }

    /// Test if a sphere is inside, outside, or intersecting the frustum
    pub fn contains_sphere(&self, sphere: &Sphere) -> FrustumTestResult {
        let mut result = FrustumTestResult::Inside;
        for plane in &self.planes {
            let dist = plane.distance_to_point(sphere.center);

            if dist < -sphere.radius {
                return FrustumTestResult::Outside;
            }
            if dist < sphere.radius {
                result = FrustumTestResult::Intersecting;
            }
        }
        result
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.distance_to_point(point) >= 0.0)
    }

    #[inline]
    pub fn is_aabb_visible(&self, aabb: &AABB) -> bool {
        self.contains_aabb(aabb).is_visible()
    }

    #[inline]
    pub fn is_obb_visible(&self, obb: &OBB) -> bool {
        self.contains_obb(obb).is_visible()
    }

    #[inline]
    pub fn is_sphere_visible(&self, sphere: &Sphere) -> bool {
        self.contains_sphere(sphere).is_visible()
    }
}

impl Default for FrustumPlanes {
    fn default() -> Self {
        Self {
            planes: [Plane::default(); 6],
        }
    }
}
