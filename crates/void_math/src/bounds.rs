//! Bounding volumes for spatial queries and culling

use glam::{Mat4, Vec3};

use crate::consts::EPSILON;

/// Axis-Aligned Bounding Box
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AABB {
    pub min: Vec3,
    pub max: Vec3,
}

impl AABB {
    /// Empty (inverted) box; the identity for `union`
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::MAX),
        max: Vec3::splat(f32::MIN),
    };

    #[inline]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create from center and half-extents
    #[inline]
    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    #[inline]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Surface area, zero for empty boxes
    pub fn surface_area(&self) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        let size = self.size();
        2.0 * (size.x * size.y + size.y * size.z + size.z * size.x)
    }

    /// Check if the AABB is empty (inverted)
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn expand_to_include(self, point: Vec3) -> Self {
        Self {
            min: self.min.min(point),
            max: self.max.max(point),
        }
    }

    #[inline]
    pub fn union(&self, other: &AABB) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    #[inline]
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    /// Check if another AABB is fully contained
    #[inline]
    pub fn contains_aabb(&self, other: &AABB) -> bool {
        self.contains_point(other.min) && self.contains_point(other.max)
    }

    /// Check if two AABBs overlap. Empty boxes never intersect anything.
    #[inline]
    pub fn intersects(&self, other: &AABB) -> bool {
        self.min.x <= other.max.x && self.max.x >= other.min.x &&
        self.min.y <= other.max.y && self.max.y >= other.min.y &&
        self.min.z <= other.max.z && self.max.z >= other.min.z
    }

    pub fn closest_point(&self, point: Vec3) -> Vec3 {
        point.max(self.min).min(self.max)
    }

    pub fn distance_squared_to_point(&self, point: Vec3) -> f32 {
        (point - self.closest_point(point)).length_squared()
    }

    /// Get the 8 corners of the AABB
    pub fn corners(&self) -> [Vec3; 8] {
        [
            Vec3::new(self.min.x, self.min.y, self.min.z),
            Vec3::new(self.max.x, self.min.y, self.min.z),
            Vec3::new(self.min.x, self.max.y, self.min.z),
            Vec3::new(self.max.x, self.max.y, self.min.z),
            Vec3::new(self.min.x, self.min.y, self.max.z),
            Vec3::new(self.max.x, self.min.y, self.max.z),
            Vec3::new(self.min.x, self.max.y, self.max.z),
            Vec3::new(self.max.x, self.max.y, self.max.z),
        ]
    }

    /// Transform the AABB by a matrix (result is still axis-aligned)
    pub fn transform(&self, matrix: &Mat4) -> Self {
        if self.is_empty() {
            return Self::EMPTY;
        }
        self.corners()
            .iter()
            .fold(Self::EMPTY, |acc, &corner| {
                acc.expand_to_include(matrix.transform_point3(corner))
            })
    }
}

impl Default for AABB {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Bounding Sphere
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
}

impl Sphere {
    #[inline]
    pub const fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Bounding sphere of an AABB
    pub fn from_aabb(aabb: &AABB) -> Self {
        Self {
            center: aabb.center(),
            radius: aabb.half_extents().length(),
        }
    }

    #[inline]
    pub fn contains_point(&self, point: Vec3) -> bool {
        (point - self.center).length_squared() <= self.radius * self.radius
    }

    pub fn intersects_aabb(&self, aabb: &AABB) -> bool {
        !aabb.is_empty() && aabb.distance_squared_to_point(self.center) <= self.radius * self.radius
    }

    pub fn to_aabb(&self) -> AABB {
        AABB::from_center_half_extents(self.center, Vec3::splat(self.radius))
    }
}

impl Default for Sphere {
    fn default() -> Self {
        Self::new(Vec3::ZERO, 0.0)
    }
}

/// Oriented Bounding Box
///
/// `axes` are unit vectors; scale lives in `half_extents`.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OBB {
    pub center: Vec3,
    pub axes: [Vec3; 3],
    pub half_extents: Vec3,
}

impl OBB {
    /// An axis-aligned OBB covering `aabb`
    pub fn from_aabb(aabb: &AABB) -> Self {
        Self {
            center: aabb.center(),
            axes: [Vec3::X, Vec3::Y, Vec3::Z],
            half_extents: aabb.half_extents(),
        }
    }

    /// Place a local-space box into world space.
    ///
    /// Rotation and translation are kept exactly; non-uniform scale is folded
    /// into the half extents. Shear is not representable and is ignored.
    pub fn from_transformed_aabb(local: &AABB, transform: &Mat4) -> Self {
        let local_half = local.half_extents();
        let columns = [
            transform.x_axis.truncate(),
            transform.y_axis.truncate(),
            transform.z_axis.truncate(),
        ];
        let fallback = [Vec3::X, Vec3::Y, Vec3::Z];

        let mut axes = fallback;
        let mut half_extents = Vec3::ZERO;
        for i in 0..3 {
            let scale = columns[i].length();
            if scale > EPSILON {
                axes[i] = columns[i] / scale;
                half_extents[i] = local_half[i] * scale;
            }
        }

        Self {
            center: transform.transform_point3(local.center()),
            axes,
            half_extents,
        }
    }

    /// Half-length of the box's projection onto `direction`
    #[inline]
    pub fn projected_radius(&self, direction: Vec3) -> f32 {
        self.half_extents.x * direction.dot(self.axes[0]).abs()
            + self.half_extents.y * direction.dot(self.axes[1]).abs()
            + self.half_extents.z * direction.dot(self.axes[2]).abs()
    }

    pub fn corners(&self) -> [Vec3; 8] {
        let x = self.axes[0] * self.half_extents.x;
        let y = self.axes[1] * self.half_extents.y;
        let z = self.axes[2] * self.half_extents.z;
        let c = self.center;
        [
            c - x - y - z,
            c + x - y - z,
            c - x + y - z,
            c + x + y - z,
            c - x - y + z,
            c + x - y + z,
            c - x + y + z,
            c + x + y + z,
        ]
    }

    /// Tight axis-aligned box around this OBB
    pub fn to_aabb(&self) -> AABB {
        let extent = self.axes[0].abs() * self.half_extents.x
            + self.axes[1].abs() * self.half_extents.y
            + self.axes[2].abs() * self.half_extents.z;
        AABB::from_center_half_extents(self.center, extent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_aabb_contains_point() {
        let aabb = AABB::new(Vec3::ZERO, Vec3::ONE);
        assert!(aabb.contains_point(Vec3::new(0.5, 0.5, 0.5)));
        assert!(!aabb.contains_point(Vec3::new(1.5, 0.5, 0.5)));
    }

    #[test]
    fn test_aabb_intersects() {
        let a = AABB::new(Vec3::ZERO, Vec3::ONE);
        let b = AABB::new(Vec3::splat(0.5), Vec3::splat(1.5));
        let c = AABB::new(Vec3::splat(2.0), Vec3::splat(3.0));

        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert!(!a.intersects(&AABB::EMPTY));
    }

    #[test]
    fn test_empty_is_union_identity() {
        let a = AABB::new(Vec3::new(-1.0, 2.0, 3.0), Vec3::new(4.0, 5.0, 6.0));
        assert_eq!(AABB::EMPTY.union(&a), a);
        assert!(AABB::EMPTY.is_empty());
        assert_eq!(AABB::EMPTY.surface_area(), 0.0);
    }

    #[test]
    fn test_sphere_intersects_aabb() {
        let sphere = Sphere::new(Vec3::ZERO, 1.0);
        assert!(sphere.intersects_aabb(&AABB::new(Vec3::splat(0.5), Vec3::splat(2.0))));
        assert!(!sphere.intersects_aabb(&AABB::new(Vec3::splat(2.0), Vec3::splat(3.0))));
    }

    #[test]
    fn test_obb_from_rotated_box() {
        let local = AABB::new(Vec3::new(-2.0, -1.0, -1.0), Vec3::new(2.0, 1.0, 1.0));
        let transform = Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0))
            * Mat4::from_rotation_y(core::f32::consts::FRAC_PI_2);
        let obb = OBB::from_transformed_aabb(&local, &transform);

        assert_relative_eq!(obb.center.x, 10.0, epsilon = 1e-5);
        // Long axis now lies along Z
        let aabb = obb.to_aabb();
        assert_relative_eq!(aabb.size().z, 4.0, epsilon = 1e-5);
        assert_relative_eq!(aabb.size().x, 2.0, epsilon = 1e-5);
    }

    #[test]
    fn test_obb_scale_folds_into_extents() {
        let local = AABB::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let transform = Mat4::from_scale(Vec3::new(3.0, 1.0, 2.0));
        let obb = OBB::from_transformed_aabb(&local, &transform);

        assert_relative_eq!(obb.half_extents.x, 3.0);
        assert_relative_eq!(obb.half_extents.z, 2.0);
        assert_relative_eq!(obb.projected_radius(Vec3::X), 3.0);
    }
}
