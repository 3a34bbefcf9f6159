//! Per-actor physics state.
//!
//! An actor is an upright capsule. The game stores its position at the feet;
//! the capsule's collision transform sits half an extent higher. Orientation
//! only affects how movement input is rotated — the capsule itself never
//! tilts, so transform writes never require an AABB refresh here (the world
//! refreshes actor AABBs in bulk each tick).

use glam::Vec3;

use parry3d::shape::SharedShape;

use crate::collision::{CollisionGroup, CollisionWorld, ObjectHandle, Owner, WorldShape};
use crate::math;
use crate::EntityId;

/// Upright capsule for the given half-extents: radius from the narrower
/// horizontal extent, the rest of the height as cylinder.
fn capsule_shape(half_extents: Vec3) -> SharedShape {
    let radius = half_extents.x.min(half_extents.y);
    let half_height = (half_extents.z - radius).max(0.0);
    SharedShape::capsule_z(half_height, radius)
}

/// A character's collision capsule and movement state.
pub struct Actor {
    entity: EntityId,
    position: Vec3,
    rotation: Vec3,
    base_half_extents: Vec3,
    half_extents: Vec3,
    scale: f32,
    on_ground: bool,
    inertial_force: Vec3,
    collision_mode: bool,
    can_water_walk: bool,
    walking_on_water: bool,
    handle: ObjectHandle,
}

impl Actor {
    /// Register a capsule for the actor and place it at `position` (feet
    /// reference). `rotation` is the stored Euler orientation
    /// (x pitch, y roll, z yaw).
    pub fn new(
        world: &mut CollisionWorld,
        entity: EntityId,
        half_extents: Vec3,
        position: Vec3,
        rotation: Vec3,
    ) -> Self {
        debug_assert!(
            half_extents.is_finite() && half_extents.min_element() > 0.0,
            "actor half-extents must be positive"
        );
        let handle = world.add(
            WorldShape::Solid(capsule_shape(half_extents)),
            math::translation_isometry(position + Vec3::new(0.0, 0.0, half_extents.z)),
            CollisionGroup::ACTOR,
            CollisionGroup::MASK_ACTOR_DEFAULT,
            Owner::Actor(entity),
        );
        Self {
            entity,
            position,
            rotation,
            base_half_extents: half_extents,
            half_extents,
            scale: 1.0,
            on_ground: false,
            inertial_force: Vec3::ZERO,
            collision_mode: true,
            can_water_walk: false,
            walking_on_water: false,
            handle,
        }
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub(crate) fn set_entity(&mut self, entity: EntityId, world: &mut CollisionWorld) {
        self.entity = entity;
        world.set_owner(self.handle, Owner::Actor(entity));
    }

    pub fn collision_handle(&self) -> ObjectHandle {
        self.handle
    }

    /// Feet-reference world position.
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Euler orientation (x pitch, y roll, z yaw).
    pub fn rotation(&self) -> Vec3 {
        self.rotation
    }

    /// Half-extents at the current scale.
    pub fn half_extents(&self) -> Vec3 {
        self.half_extents
    }

    pub fn on_ground(&self) -> bool {
        self.on_ground
    }

    pub fn set_on_ground(&mut self, on_ground: bool) {
        self.on_ground = on_ground;
    }

    pub fn inertial_force(&self) -> Vec3 {
        self.inertial_force
    }

    pub fn set_inertial_force(&mut self, force: Vec3) {
        self.inertial_force = force;
    }

    pub fn collision_mode(&self) -> bool {
        self.collision_mode
    }

    pub fn set_collision_mode(&mut self, enabled: bool) {
        self.collision_mode = enabled;
    }

    pub fn can_water_walk(&self) -> bool {
        self.can_water_walk
    }

    /// Toggle the water-walking effect. While active, the capsule's mask
    /// gains the water group so sweeps and the ground probe collide with
    /// the water plane.
    pub fn set_can_water_walk(&mut self, enabled: bool, world: &mut CollisionWorld) {
        if self.can_water_walk == enabled {
            return;
        }
        self.can_water_walk = enabled;
        world.set_filter(self.handle, CollisionGroup::ACTOR, self.collision_mask());
    }

    pub fn walking_on_water(&self) -> bool {
        self.walking_on_water
    }

    pub fn set_walking_on_water(&mut self, walking: bool) {
        self.walking_on_water = walking;
    }

    /// Move the capsule to a new feet position. The cached AABB is left to
    /// the world's per-tick refresh.
    pub fn set_position(&mut self, position: Vec3, world: &mut CollisionWorld) {
        self.position = position;
        world.set_transform(
            self.handle,
            math::translation_isometry(position + Vec3::new(0.0, 0.0, self.half_extents.z)),
        );
    }

    /// Update the stored orientation. The capsule stays upright.
    pub fn set_rotation(&mut self, rotation: Vec3) {
        self.rotation = rotation;
    }

    /// Rescale the capsule, rebuilding its shape and re-centering it over
    /// the feet.
    pub fn set_scale(&mut self, scale: f32, world: &mut CollisionWorld) {
        debug_assert!(scale.is_finite() && scale > 0.0);
        self.scale = scale;
        self.half_extents = self.base_half_extents * scale;
        world.set_shape(self.handle, WorldShape::Solid(capsule_shape(self.half_extents)));
        world.set_transform(
            self.handle,
            math::translation_isometry(self.position + Vec3::new(0.0, 0.0, self.half_extents.z)),
        );
    }

    fn collision_mask(&self) -> CollisionGroup {
        if self.can_water_walk {
            CollisionGroup::MASK_ACTOR_DEFAULT | CollisionGroup::WATER
        } else {
            CollisionGroup::MASK_ACTOR_DEFAULT
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capsule_matches_half_extents() {
        let mut world = CollisionWorld::new();
        let actor = Actor::new(
            &mut world,
            EntityId(1),
            Vec3::new(20.0, 20.0, 64.0),
            Vec3::new(0.0, 0.0, 10.0),
            Vec3::ZERO,
        );
        let object = world.get(actor.collision_handle()).unwrap();
        let aabb = object.fresh_aabb();
        assert!((aabb.half_extents().x - 20.0).abs() < 1.0e-3);
        assert!((aabb.half_extents().z - 64.0).abs() < 1.0e-3);
        // Capsule center sits half an extent above the feet.
        assert!((aabb.center().z - 74.0).abs() < 1.0e-3);
    }

    #[test]
    fn water_walk_toggles_mask() {
        let mut world = CollisionWorld::new();
        let mut actor = Actor::new(
            &mut world,
            EntityId(1),
            Vec3::new(20.0, 20.0, 64.0),
            Vec3::ZERO,
            Vec3::ZERO,
        );

        let mask = world.get(actor.collision_handle()).unwrap().mask();
        assert!(!mask.intersects(CollisionGroup::WATER));

        actor.set_can_water_walk(true, &mut world);
        let mask = world.get(actor.collision_handle()).unwrap().mask();
        assert!(mask.intersects(CollisionGroup::WATER));

        actor.set_can_water_walk(false, &mut world);
        let mask = world.get(actor.collision_handle()).unwrap().mask();
        assert!(!mask.intersects(CollisionGroup::WATER));
    }

    #[test]
    fn scale_rebuilds_capsule() {
        let mut world = CollisionWorld::new();
        let mut actor = Actor::new(
            &mut world,
            EntityId(1),
            Vec3::new(20.0, 20.0, 64.0),
            Vec3::ZERO,
            Vec3::ZERO,
        );
        actor.set_scale(0.5, &mut world);
        assert!((actor.half_extents().z - 32.0).abs() < 1.0e-3);
        let object = world.get(actor.collision_handle()).unwrap();
        assert!((object.fresh_aabb().half_extents().z - 32.0).abs() < 1.0e-3);
    }
}
