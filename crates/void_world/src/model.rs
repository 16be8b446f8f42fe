//! Drawable content held by chunks
//!
//! Meshes, materials and GPU buffers live with the renderer; these types carry
//! what streaming and culling need: placement, bounds, draw category and the
//! cached visibility flag.

use glam::{Mat4, Vec3};
use void_math::{AABB, OBB};

/// Which list of a chunk a model lives in
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ModelCategory {
    Static,
    Instanced,
}

/// How a model is placed in the world
#[derive(Clone, Debug, PartialEq)]
pub enum ModelKind {
    /// Single placement given by the model transform
    Static,
    /// Drawn once per instance transform
    Instanced { instances: Vec<Mat4> },
}

/// A drawable model with a frame-scoped visibility flag
#[derive(Clone, Debug)]
pub struct Model {
    pub name: String,
    pub material: String,
    pub kind: ModelKind,
    /// Tested against the frustum; non-cullable models are always visible
    pub cullable: bool,
    /// Drawn in the back-to-front pass
    pub transparent: bool,
    transform: Mat4,
    local_bounds: AABB,
    world_bounds: OBB,
    visible: bool,
}

impl Model {
    /// A single static placement
    pub fn new_static(
        name: impl Into<String>,
        material: impl Into<String>,
        transform: Mat4,
        local_bounds: AABB,
    ) -> Self {
        Self {
            name: name.into(),
            material: material.into(),
            kind: ModelKind::Static,
            cullable: true,
            transparent: false,
            transform,
            local_bounds,
            world_bounds: OBB::from_transformed_aabb(&local_bounds, &transform),
            visible: false,
        }
    }

    /// A batch of instances sharing one mesh; bounds cover every instance
    pub fn new_instanced(
        name: impl Into<String>,
        material: impl Into<String>,
        local_bounds: AABB,
        instances: Vec<Mat4>,
    ) -> Self {
        let world_aabb = instances
            .iter()
            .fold(AABB::EMPTY, |acc, instance| acc.union(&local_bounds.transform(instance)));

        Self {
            name: name.into(),
            material: material.into(),
            kind: ModelKind::Instanced { instances },
            cullable: true,
            transparent: false,
            transform: Mat4::IDENTITY,
            local_bounds,
            world_bounds: OBB::from_aabb(&world_aabb),
            visible: false,
        }
    }

    pub fn with_cullable(mut self, cullable: bool) -> Self {
        self.cullable = cullable;
        self
    }

    pub fn with_transparent(mut self, transparent: bool) -> Self {
        self.transparent = transparent;
        self
    }

    pub fn category(&self) -> ModelCategory {
        match self.kind {
            ModelKind::Static => ModelCategory::Static,
            ModelKind::Instanced { .. } => ModelCategory::Instanced,
        }
    }

    pub fn transform(&self) -> &Mat4 {
        &self.transform
    }

    /// Move a static model. Only meaningful for dynamic models; chunk
    /// geometry is indexed once and never moves.
    pub fn set_transform(&mut self, transform: Mat4) {
        if let ModelKind::Static = self.kind {
            self.transform = transform;
            self.world_bounds = OBB::from_transformed_aabb(&self.local_bounds, &transform);
        }
    }

    pub fn local_bounds(&self) -> &AABB {
        &self.local_bounds
    }

    /// World-space oriented bounds used by the visibility pass
    pub fn oriented_bounds(&self) -> &OBB {
        &self.world_bounds
    }

    pub fn world_aabb(&self) -> AABB {
        self.world_bounds.to_aabb()
    }

    pub fn world_center(&self) -> Vec3 {
        self.world_bounds.center
    }

    pub fn instance_count(&self) -> usize {
        match &self.kind {
            ModelKind::Static => 1,
            ModelKind::Instanced { instances } => instances.len(),
        }
    }

    /// Result of the most recent visibility pass
    #[inline]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub(crate) fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }
}

/// Terrain covering one chunk; the heightmap itself belongs to the renderer
#[derive(Clone, Debug)]
pub struct TerrainPatch {
    pub material: String,
    /// Heightmap samples per side
    pub resolution: u32,
    bounds: AABB,
    visible: bool,
}

impl TerrainPatch {
    pub fn new(material: impl Into<String>, resolution: u32, bounds: AABB) -> Self {
        Self {
            material: material.into(),
            resolution,
            bounds,
            visible: false,
        }
    }

    pub fn bounds(&self) -> &AABB {
        &self.bounds
    }

    #[inline]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub(crate) fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }
}

/// Omnidirectional light with a finite influence radius
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    pub radius: f32,
}

impl PointLight {
    pub fn new(position: Vec3, color: Vec3, intensity: f32, radius: f32) -> Self {
        Self {
            position,
            color,
            intensity,
            radius,
        }
    }

    pub fn influence(&self) -> void_math::Sphere {
        void_math::Sphere::new(self.position, self.radius)
    }
}
