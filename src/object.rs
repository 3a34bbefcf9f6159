//! Static world colliders and the animated-compound updater.

use glam::{Quat, Vec3};

use crate::collision::{CollisionGroup, CollisionWorld, ObjectHandle, Owner};
use crate::math;
use crate::shape::ShapeInstance;
use crate::world_query::NodeTransformProvider;
use crate::EntityId;

/// A placed static collider wrapping one shape instance.
pub struct Object {
    entity: EntityId,
    instance: ShapeInstance,
    handle: ObjectHandle,
    position: Vec3,
    rotation: Quat,
}

impl Object {
    /// Build the instance's geometry and place it in the world. Returns
    /// `None` when the instance carries no collision (the entity is then
    /// not tracked at all).
    pub fn new(
        world: &mut CollisionWorld,
        entity: EntityId,
        mut instance: ShapeInstance,
        position: Vec3,
        rotation: Quat,
        scale: f32,
    ) -> Option<Self> {
        instance.set_scale(scale);
        let shape = instance.build_world_shape()?;
        let handle = world.add(
            shape,
            math::to_isometry(position, rotation),
            CollisionGroup::WORLD,
            CollisionGroup::ACTOR | CollisionGroup::HEIGHT_MAP | CollisionGroup::PROJECTILE,
            Owner::Object(entity),
        );
        Some(Self {
            entity,
            instance,
            handle,
            position,
            rotation,
        })
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub(crate) fn set_entity(&mut self, entity: EntityId, world: &mut CollisionWorld) {
        self.entity = entity;
        world.set_owner(self.handle, Owner::Object(entity));
    }

    pub fn handle(&self) -> ObjectHandle {
        self.handle
    }

    /// Rescale the instance and swap in the rebuilt geometry. The caller
    /// refreshes the AABB.
    pub fn set_scale(&mut self, scale: f32, world: &mut CollisionWorld) {
        self.instance.set_scale(scale);
        if let Some(shape) = self.instance.build_world_shape() {
            world.set_shape(self.handle, shape);
        }
    }

    /// Rewrite the world transform's rotation. The caller refreshes the
    /// AABB.
    pub fn set_rotation(&mut self, rotation: Quat, world: &mut CollisionWorld) {
        self.rotation = rotation;
        world.set_transform(self.handle, math::to_isometry(self.position, self.rotation));
    }

    /// Rewrite the world transform's translation. The caller refreshes the
    /// AABB.
    pub fn set_origin(&mut self, position: Vec3, world: &mut CollisionWorld) {
        self.position = position;
        world.set_transform(self.handle, math::to_isometry(self.position, self.rotation));
    }

    /// Resynchronize animated compound children from the scene graph, then
    /// refresh this object's AABB. A missing node logs and leaves the
    /// compound at its last transforms.
    pub fn animate(&mut self, scene: &dyn NodeTransformProvider, world: &mut CollisionWorld) {
        if self.instance.animated_children().is_empty() {
            return;
        }

        let animated: Vec<(String, usize)> = self
            .instance
            .animated_children()
            .iter()
            .map(|(name, index)| (name.clone(), *index))
            .collect();

        for (name, child_index) in animated {
            let Some(matrix) = scene.node_transform(self.entity, &name) else {
                log::warn!("animate: can't find node {name}");
                return;
            };
            let (node_scale, rotation, translation) = matrix.to_scale_rotation_translation();

            let rebuilt = self
                .instance
                .update_child(child_index, translation, rotation, node_scale);
            let transform =
                math::to_isometry(translation * self.instance.scale(), rotation);
            world.set_compound_child(self.handle, child_index, transform, rebuilt);
        }

        world.update_single_aabb(self.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::WorldShape;
    use crate::shape::test_support::TestFactory;
    use crate::shape::ShapeRegistry;
    use glam::Mat4;
    use std::collections::HashMap;

    struct TestScene {
        nodes: HashMap<String, Mat4>,
    }

    impl NodeTransformProvider for TestScene {
        fn node_transform(&self, _entity: EntityId, node: &str) -> Option<Mat4> {
            self.nodes.get(node).copied()
        }
    }

    fn door_object(world: &mut CollisionWorld) -> Object {
        let mut registry = ShapeRegistry::new(Box::new(TestFactory::new()));
        let instance = registry.create_instance("meshes/door.nif").unwrap();
        Object::new(world, EntityId(5), instance, Vec3::ZERO, Quat::IDENTITY, 1.0).unwrap()
    }

    #[test]
    fn entity_without_collision_is_not_placed() {
        let mut world = CollisionWorld::new();
        let mut registry = ShapeRegistry::new(Box::new(TestFactory::new()));
        let instance = registry.create_instance("meshes/empty.nif").unwrap();
        assert!(Object::new(
            &mut world,
            EntityId(1),
            instance,
            Vec3::ZERO,
            Quat::IDENTITY,
            1.0
        )
        .is_none());
        assert_eq!(world.len(), 0);
    }

    #[test]
    fn animate_moves_compound_child() {
        let mut world = CollisionWorld::new();
        let mut object = door_object(&mut world);

        let mut nodes = HashMap::new();
        nodes.insert(
            "Door".to_owned(),
            Mat4::from_translation(Vec3::new(0.0, 25.0, 0.0)),
        );
        let scene = TestScene { nodes };

        object.animate(&scene, &mut world);

        let placed = world.get(object.handle()).unwrap();
        let WorldShape::Compound(children) = placed.shape() else {
            panic!("door must be a compound");
        };
        assert!((children[0].transform.translation.vector.y - 25.0).abs() < 1.0e-3);
        // The AABB refresh must have followed the child.
        assert!(placed.fresh_aabb().center().y > 10.0);
    }

    #[test]
    fn animate_with_missing_node_keeps_transforms() {
        let mut world = CollisionWorld::new();
        let mut object = door_object(&mut world);

        let scene = TestScene {
            nodes: HashMap::new(),
        };
        object.animate(&scene, &mut world);

        let placed = world.get(object.handle()).unwrap();
        let WorldShape::Compound(children) = placed.shape() else {
            panic!("door must be a compound");
        };
        assert!(children[0].transform.translation.vector.y.abs() < 1.0e-3);
    }
}
