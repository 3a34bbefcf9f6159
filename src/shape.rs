//! Shape templates, per-entity instances and the mesh-keyed registry.
//!
//! Shape construction from on-disk assets happens outside this crate, behind
//! the [`ShapeFactory`] trait. The factory hands back a [`ShapeTemplate`]
//! (shared between every entity using the same mesh); the registry caches
//! templates by mesh name and stamps out a mutable [`ShapeInstance`] per
//! entity. Instances keep the unscaled source geometry so a scale change can
//! rebuild the collision shape — the collision library's shapes themselves
//! are immutable.

use std::collections::HashMap;
use std::sync::Arc;

use glam::{Quat, Vec3};

use parry3d::shape::SharedShape;

use crate::collision::world::{CompoundChild, WorldShape};
use crate::math;

/// Unscaled source geometry for one collider, rebuilt into a library shape
/// at a given scale.
#[derive(Debug, Clone)]
pub enum ShapeData {
    /// A box, by half-extents.
    Cuboid { half_extents: Vec3 },
    /// A convex hull over a point cloud.
    ConvexHull { points: Vec<Vec3> },
    /// A triangle mesh.
    TriMesh {
        vertices: Vec<Vec3>,
        indices: Vec<[u32; 3]>,
    },
}

impl ShapeData {
    /// Build the library shape at the given (possibly non-uniform) scale.
    /// Returns `None` for degenerate geometry.
    pub fn build(&self, scale: Vec3) -> Option<SharedShape> {
        if scale.min_element() <= 0.0 {
            log::debug!("refusing to build shape at non-positive scale {scale:?}");
            return None;
        }
        match self {
            ShapeData::Cuboid { half_extents } => {
                let he = *half_extents * scale;
                Some(SharedShape::cuboid(he.x, he.y, he.z))
            }
            ShapeData::ConvexHull { points } => {
                let scaled: Vec<_> = points.iter().map(|p| math::to_point(*p * scale)).collect();
                SharedShape::convex_hull(&scaled)
            }
            ShapeData::TriMesh { vertices, indices } => {
                let scaled: Vec<_> = vertices.iter().map(|v| math::to_point(*v * scale)).collect();
                Some(SharedShape::trimesh(scaled, indices.clone()))
            }
        }
    }
}

/// One child of a compound template, in the compound's local space.
#[derive(Debug, Clone)]
pub struct ChildTemplate {
    pub data: ShapeData,
    pub translation: Vec3,
    pub rotation: Quat,
}

/// Collision geometry carried by a template.
#[derive(Debug, Clone)]
pub enum TemplateCollision {
    Single(ShapeData),
    Compound(Vec<ChildTemplate>),
}

/// Shared, immutable description of one mesh's collision data.
#[derive(Debug, Clone)]
pub struct ShapeTemplate {
    /// Collision geometry; `None` when the mesh has no collidable parts.
    pub collision: Option<TemplateCollision>,

    /// Capsule half-extents for actors using this mesh.
    pub half_extents: Vec3,

    /// Scene node name → compound child index, for colliders driven by
    /// animation.
    pub animated_children: HashMap<String, usize>,
}

/// Builds shape templates from mesh assets. Implemented by the asset layer.
pub trait ShapeFactory {
    /// Load (or fetch) the template for a mesh. `None` when the mesh cannot
    /// be loaded.
    fn load(&mut self, mesh: &str) -> Option<Arc<ShapeTemplate>>;
}

/// Per-child mutable state of a compound instance.
#[derive(Debug, Clone)]
struct ChildState {
    translation: Vec3,
    rotation: Quat,
    /// Scale driven by the animated node, identity until first animated.
    node_scale: Vec3,
    /// Total scale baked into the currently built child shape.
    applied_scale: Vec3,
}

/// Per-entity instance of a shape template: current scale plus per-child
/// transforms for animated compounds.
#[derive(Debug, Clone)]
pub struct ShapeInstance {
    template: Arc<ShapeTemplate>,
    scale: f32,
    children: Vec<ChildState>,
}

impl ShapeInstance {
    fn new(template: Arc<ShapeTemplate>) -> Self {
        let children = match &template.collision {
            Some(TemplateCollision::Compound(children)) => children
                .iter()
                .map(|child| ChildState {
                    translation: child.translation,
                    rotation: child.rotation,
                    node_scale: Vec3::ONE,
                    applied_scale: Vec3::ONE,
                })
                .collect(),
            _ => Vec::new(),
        };
        Self {
            template,
            scale: 1.0,
            children,
        }
    }

    pub fn template(&self) -> &ShapeTemplate {
        &self.template
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn set_scale(&mut self, scale: f32) {
        debug_assert!(scale.is_finite() && scale > 0.0);
        self.scale = scale;
    }

    /// Capsule half-extents at the current scale.
    pub fn half_extents(&self) -> Vec3 {
        self.template.half_extents * self.scale
    }

    pub fn has_collision(&self) -> bool {
        self.template.collision.is_some()
    }

    pub fn animated_children(&self) -> &HashMap<String, usize> {
        &self.template.animated_children
    }

    /// Build the placed geometry at the current scale and child transforms.
    /// Returns `None` when the template has no collision or the geometry is
    /// degenerate at this scale.
    pub fn build_world_shape(&mut self) -> Option<WorldShape> {
        let template = self.template.clone();
        let uniform = Vec3::splat(self.scale);
        match template.collision.as_ref()? {
            TemplateCollision::Single(data) => data.build(uniform).map(WorldShape::Solid),
            TemplateCollision::Compound(children) => {
                let mut built = Vec::with_capacity(children.len());
                for (index, child) in children.iter().enumerate() {
                    let state = &mut self.children[index];
                    let total = state.node_scale * uniform;
                    let shape = child.data.build(total)?;
                    state.applied_scale = total;
                    built.push(CompoundChild {
                        transform: math::to_isometry(
                            state.translation * self.scale,
                            state.rotation,
                        ),
                        shape,
                    });
                }
                Some(WorldShape::Compound(built))
            }
        }
    }

    /// World-space transform for one compound child at the current scale.
    pub fn child_transform(&self, index: usize) -> parry3d::math::Isometry<parry3d::math::Real> {
        let state = &self.children[index];
        math::to_isometry(state.translation * self.scale, state.rotation)
    }

    /// Update a compound child from its animated scene node. Returns a
    /// rebuilt child shape when the total scaling changed, `None` when the
    /// existing shape can be kept.
    pub fn update_child(
        &mut self,
        index: usize,
        translation: Vec3,
        rotation: Quat,
        node_scale: Vec3,
    ) -> Option<SharedShape> {
        let uniform = Vec3::splat(self.scale);
        let total = node_scale * uniform;
        let template = self.template.clone();
        let state = &mut self.children[index];
        state.translation = translation;
        state.rotation = rotation;
        state.node_scale = node_scale;
        if (total - state.applied_scale).length_squared() < 1.0e-10 {
            return None;
        }
        let Some(TemplateCollision::Compound(children)) = template.collision.as_ref() else {
            debug_assert!(false, "update_child on a non-compound instance");
            return None;
        };
        let shape = children[index].data.build(total)?;
        state.applied_scale = total;
        Some(shape)
    }
}

/// Cache of shape templates keyed by mesh name.
pub struct ShapeRegistry {
    factory: Box<dyn ShapeFactory>,
    cache: HashMap<String, Arc<ShapeTemplate>>,
}

impl ShapeRegistry {
    pub fn new(factory: Box<dyn ShapeFactory>) -> Self {
        Self {
            factory,
            cache: HashMap::new(),
        }
    }

    /// Create a fresh instance of a mesh's shape, loading the template on
    /// first use. `None` when the factory cannot provide the mesh.
    pub fn create_instance(&mut self, mesh: &str) -> Option<ShapeInstance> {
        if let Some(template) = self.cache.get(mesh) {
            return Some(ShapeInstance::new(template.clone()));
        }
        let template = self.factory.load(mesh)?;
        self.cache.insert(mesh.to_owned(), template.clone());
        Some(ShapeInstance::new(template))
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::TestFactory;
    use super::*;
    use crate::collision::world::WorldShape;
    use parry3d::shape::Shape;

    #[test]
    fn registry_caches_templates() {
        let mut registry = ShapeRegistry::new(Box::new(TestFactory::new()));
        assert!(registry.create_instance("meshes/box.nif").is_some());
        assert!(registry.create_instance("meshes/box.nif").is_some());
        assert!(registry.create_instance("meshes/missing.nif").is_none());
        // Second box instance must come from the cache.
        assert_eq!(registry.cache.len(), 1);
    }

    #[test]
    fn scale_rebuilds_geometry() {
        let mut registry = ShapeRegistry::new(Box::new(TestFactory::new()));
        let mut instance = registry.create_instance("meshes/box.nif").unwrap();

        instance.set_scale(2.0);
        let shape = instance.build_world_shape().unwrap();
        let WorldShape::Solid(shape) = shape else {
            panic!("expected a solid shape");
        };
        let aabb = shape.compute_local_aabb();
        assert!((aabb.half_extents().x - 100.0).abs() < 1.0e-3);
        assert!((instance.half_extents().z - 128.0).abs() < 1.0e-3);
    }

    #[test]
    fn update_child_rebuilds_only_on_scale_change() {
        let mut registry = ShapeRegistry::new(Box::new(TestFactory::new()));
        let mut instance = registry.create_instance("meshes/door.nif").unwrap();
        instance.build_world_shape().unwrap();

        // Pure motion: shape kept.
        let rebuilt = instance.update_child(0, Vec3::new(0.0, 5.0, 0.0), Quat::IDENTITY, Vec3::ONE);
        assert!(rebuilt.is_none());

        // Scaling change: shape rebuilt.
        let rebuilt = instance.update_child(
            0,
            Vec3::new(0.0, 5.0, 0.0),
            Quat::IDENTITY,
            Vec3::splat(2.0),
        );
        assert!(rebuilt.is_some());
    }

    #[test]
    fn template_without_collision_builds_nothing() {
        let mut registry = ShapeRegistry::new(Box::new(TestFactory::new()));
        let mut instance = registry.create_instance("meshes/empty.nif").unwrap();
        assert!(!instance.has_collision());
        assert!(instance.build_world_shape().is_none());
    }
}
