//! Viewer camera
//!
//! The camera decides which chunk is current and which bounding volumes are
//! visible. Its frustum planes are recomputed whenever the camera moves or
//! its projection changes, so visibility queries never see a stale frustum.
//!
//! # Example
//!
//! ```ignore
//! use void_world::camera::Camera;
//!
//! let mut camera = Camera::perspective(60.0, 16.0 / 9.0, 0.1, 500.0);
//! camera.set_position(Vec3::new(8.0, 2.0, 8.0));
//! camera.look_at(Vec3::new(40.0, 0.0, 8.0));
//! ```

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};
use void_math::{FrustumPlanes, Sphere, AABB, OBB};

/// Camera projection mode
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Projection {
    /// Perspective projection with field of view
    Perspective {
        /// Vertical field of view in radians
        fov_y: f32,
    },
    /// Orthographic projection
    Orthographic {
        /// Orthographic height (width derived from aspect ratio)
        height: f32,
    },
}

impl Default for Projection {
    fn default() -> Self {
        // 60 degrees vertical FOV
        Projection::Perspective {
            fov_y: core::f32::consts::FRAC_PI_3,
        }
    }
}

/// A volume the camera can test against its frustum
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BoundingVolume {
    Aabb(AABB),
    Obb(OBB),
    Sphere(Sphere),
}

/// Viewer with a cached frustum
#[derive(Clone, Debug)]
pub struct Camera {
    projection: Projection,
    aspect_ratio: f32,
    near: f32,
    far: f32,
    position: Vec3,
    /// Unit look direction
    forward: Vec3,
    frustum: FrustumPlanes,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Projection::default(), 16.0 / 9.0, 0.1, 1000.0)
    }
}

impl Camera {
    /// Camera at the origin looking down -Z
    pub fn new(projection: Projection, aspect_ratio: f32, near: f32, far: f32) -> Self {
        let mut camera = Self {
            projection,
            aspect_ratio,
            near,
            far,
            position: Vec3::ZERO,
            forward: Vec3::NEG_Z,
            frustum: FrustumPlanes::default(),
        };
        camera.refresh_frustum();
        camera
    }

    /// Create a perspective camera (FOV in degrees)
    pub fn perspective(fov_degrees: f32, aspect_ratio: f32, near: f32, far: f32) -> Self {
        Self::new(
            Projection::Perspective {
                fov_y: fov_degrees.to_radians(),
            },
            aspect_ratio,
            near,
            far,
        )
    }

    /// Create an orthographic camera
    pub fn orthographic(height: f32, aspect_ratio: f32, near: f32, far: f32) -> Self {
        Self::new(Projection::Orthographic { height }, aspect_ratio, near, far)
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.set_position(position);
        self
    }

    pub fn with_forward(mut self, forward: Vec3) -> Self {
        self.set_forward(forward);
        self
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn forward(&self) -> Vec3 {
        self.forward
    }

    pub fn projection(&self) -> Projection {
        self.projection
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.refresh_frustum();
    }

    /// Set the look direction; zero-length directions are ignored
    pub fn set_forward(&mut self, forward: Vec3) {
        if let Some(forward) = forward.try_normalize() {
            self.forward = forward;
            self.refresh_frustum();
        }
    }

    pub fn look_at(&mut self, target: Vec3) {
        self.set_forward(target - self.position);
    }

    pub fn set_projection(&mut self, projection: Projection) {
        self.projection = projection;
        self.refresh_frustum();
    }

    pub fn set_aspect_ratio(&mut self, aspect_ratio: f32) {
        self.aspect_ratio = aspect_ratio;
        self.refresh_frustum();
    }

    pub fn view_matrix(&self) -> Mat4 {
        // Looking straight up or down needs another up vector
        let up = if self.forward.cross(Vec3::Y).length_squared() < 1e-8 {
            Vec3::Z
        } else {
            Vec3::Y
        };
        Mat4::look_at_rh(self.position, self.position + self.forward, up)
    }

    /// Compute the projection matrix (OpenGL clip space)
    pub fn projection_matrix(&self) -> Mat4 {
        match self.projection {
            Projection::Perspective { fov_y } => {
                Mat4::perspective_rh_gl(fov_y, self.aspect_ratio, self.near, self.far)
            }
            Projection::Orthographic { height } => {
                let half_height = height / 2.0;
                let half_width = half_height * self.aspect_ratio;
                Mat4::orthographic_rh_gl(
                    -half_width,
                    half_width,
                    -half_height,
                    half_height,
                    self.near,
                    self.far,
                )
            }
        }
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    pub fn frustum(&self) -> &FrustumPlanes {
        &self.frustum
    }

    /// True unless the volume is entirely outside the frustum
    pub fn frustum_collides(&self, volume: &BoundingVolume) -> bool {
        match volume {
            BoundingVolume::Aabb(aabb) => self.frustum.is_aabb_visible(aabb),
            BoundingVolume::Obb(obb) => self.frustum.is_obb_visible(obb),
            BoundingVolume::Sphere(sphere) => self.frustum.is_sphere_visible(sphere),
        }
    }

    fn refresh_frustum(&mut self) {
        self.frustum = FrustumPlanes::from_view_projection(&self.view_projection());
    }
}
