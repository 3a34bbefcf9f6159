//! The collision world: a flat set of placed shapes with filter groups.
//!
//! The world owns one [`CollisionObject`] per collider. AABBs are cached and
//! refreshed explicitly: most objects never move, so nothing is refreshed
//! automatically when a transform is written. Callers that move a static
//! object must follow up with [`CollisionWorld::update_single_aabb`]; actor
//! capsules are refreshed in bulk by [`CollisionWorld::step`] once per tick.
//! An object whose cached AABB is stale may be skipped by the swept-AABB cull
//! in [`super::trace`], exactly like a stale broadphase entry would be.

use glam::Vec3;
use parry3d::bounding_volume::{Aabb, BoundingVolume};
use parry3d::math::{Isometry, Point, Real};
use parry3d::shape::SharedShape;
use serde::{Deserialize, Serialize};

use crate::EntityId;

use super::groups::CollisionGroup;

/// Handle to an object placed in the collision world.
///
/// Handles are stable until the object is removed; a removed slot may be
/// reused by a later insertion, so holders must drop their handles before
/// (or when) removing the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectHandle(usize);

/// Back-reference from a collision object to the record that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    /// A placed static object.
    Object(EntityId),
    /// A character capsule.
    Actor(EntityId),
    /// A terrain tile, keyed by tile coordinates.
    Terrain { x: i32, y: i32 },
    /// The water surface.
    Water,
}

/// One child of a compound collider, in the parent's local space.
#[derive(Clone)]
pub struct CompoundChild {
    pub transform: Isometry<Real>,
    pub shape: SharedShape,
}

/// Geometry of a placed collider.
#[derive(Clone)]
pub enum WorldShape {
    /// A single convex hull, triangle mesh or primitive.
    Solid(SharedShape),
    /// A compound of child shapes whose transforms can be rewritten in
    /// place (animated colliders).
    Compound(Vec<CompoundChild>),
    /// An infinite horizontal plane facing up; its height is the world
    /// transform's z translation. Used for the water surface.
    Plane,
}

impl WorldShape {
    fn compute_aabb(&self, transform: &Isometry<Real>) -> Aabb {
        match self {
            WorldShape::Solid(shape) => shape.compute_aabb(transform),
            WorldShape::Compound(children) => {
                let mut aabb: Option<Aabb> = None;
                for child in children {
                    let child_aabb = child.shape.compute_aabb(&(transform * child.transform));
                    aabb = Some(match aabb {
                        Some(acc) => acc.merged(&child_aabb),
                        None => child_aabb,
                    });
                }
                aabb.unwrap_or_else(|| Aabb::new(transform.translation.vector.into(), transform.translation.vector.into()))
            }
            // Infinite in every direction so the sweep cull never rejects it.
            WorldShape::Plane => Aabb::new(
                Point::new(-1.0e30, -1.0e30, -1.0e30),
                Point::new(1.0e30, 1.0e30, 1.0e30),
            ),
        }
    }
}

/// A placed shape: geometry, world transform, filter bits, owner and the
/// cached AABB used by the sweep cull.
pub struct CollisionObject {
    pub(crate) shape: WorldShape,
    pub(crate) transform: Isometry<Real>,
    pub(crate) group: CollisionGroup,
    pub(crate) mask: CollisionGroup,
    pub(crate) owner: Owner,
    pub(crate) aabb: Aabb,
}

impl CollisionObject {
    pub fn shape(&self) -> &WorldShape {
        &self.shape
    }

    pub fn transform(&self) -> &Isometry<Real> {
        &self.transform
    }

    pub fn group(&self) -> CollisionGroup {
        self.group
    }

    pub fn mask(&self) -> CollisionGroup {
        self.mask
    }

    pub fn owner(&self) -> Owner {
        self.owner
    }

    /// Recompute the world-space AABB from the current shape and transform.
    pub fn fresh_aabb(&self) -> Aabb {
        self.shape.compute_aabb(&self.transform)
    }
}

/// The collision world.
pub struct CollisionWorld {
    objects: Vec<Option<CollisionObject>>,
    free: Vec<usize>,
    gravity: Vec3,
}

impl Default for CollisionWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl CollisionWorld {
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
            free: Vec::new(),
            // Set on the world like any dynamics setup, but nothing in this
            // crate integrates it; actor gravity is the solver's own.
            gravity: Vec3::new(0.0, 0.0, -10.0),
        }
    }

    pub fn gravity(&self) -> Vec3 {
        self.gravity
    }

    /// Place a shape in the world. The AABB is computed on insertion.
    pub fn add(
        &mut self,
        shape: WorldShape,
        transform: Isometry<Real>,
        group: CollisionGroup,
        mask: CollisionGroup,
        owner: Owner,
    ) -> ObjectHandle {
        let aabb = shape.compute_aabb(&transform);
        let object = CollisionObject {
            shape,
            transform,
            group,
            mask,
            owner,
            aabb,
        };
        match self.free.pop() {
            Some(index) => {
                self.objects[index] = Some(object);
                ObjectHandle(index)
            }
            None => {
                self.objects.push(Some(object));
                ObjectHandle(self.objects.len() - 1)
            }
        }
    }

    /// Detach and destroy an object.
    pub fn remove(&mut self, handle: ObjectHandle) -> Option<CollisionObject> {
        let slot = self.objects.get_mut(handle.0)?;
        let object = slot.take();
        if object.is_some() {
            self.free.push(handle.0);
        }
        object
    }

    pub fn get(&self, handle: ObjectHandle) -> Option<&CollisionObject> {
        self.objects.get(handle.0).and_then(|slot| slot.as_ref())
    }

    /// Rewrite an object's world transform. Does not refresh the AABB.
    pub fn set_transform(&mut self, handle: ObjectHandle, transform: Isometry<Real>) {
        if let Some(object) = self.get_mut(handle) {
            object.transform = transform;
        }
    }

    /// Replace an object's geometry (rescaled shape). Does not refresh the
    /// AABB.
    pub fn set_shape(&mut self, handle: ObjectHandle, shape: WorldShape) {
        if let Some(object) = self.get_mut(handle) {
            object.shape = shape;
        }
    }

    /// Rewrite an object's filter group and mask.
    pub fn set_filter(&mut self, handle: ObjectHandle, group: CollisionGroup, mask: CollisionGroup) {
        if let Some(object) = self.get_mut(handle) {
            object.group = group;
            object.mask = mask;
        }
    }

    /// Re-key an object's owner back-reference.
    pub fn set_owner(&mut self, handle: ObjectHandle, owner: Owner) {
        if let Some(object) = self.get_mut(handle) {
            object.owner = owner;
        }
    }

    /// Rewrite one child transform of a compound collider, optionally
    /// replacing the child shape (when its scaling changed).
    pub fn set_compound_child(
        &mut self,
        handle: ObjectHandle,
        child: usize,
        transform: Isometry<Real>,
        shape: Option<SharedShape>,
    ) {
        if let Some(object) = self.get_mut(handle) {
            match &mut object.shape {
                WorldShape::Compound(children) => {
                    if let Some(entry) = children.get_mut(child) {
                        entry.transform = transform;
                        if let Some(shape) = shape {
                            entry.shape = shape;
                        }
                    } else {
                        debug_assert!(false, "compound child index out of range");
                    }
                }
                _ => debug_assert!(false, "set_compound_child on a non-compound shape"),
            }
        }
    }

    /// Refresh one object's cached AABB after a transform or shape write.
    pub fn update_single_aabb(&mut self, handle: ObjectHandle) {
        if let Some(object) = self.get_mut(handle) {
            object.aabb = object.shape.compute_aabb(&object.transform);
        }
    }

    /// Per-tick housekeeping: refresh the AABBs of actor capsules, which
    /// move every tick but are never refreshed individually.
    pub fn step(&mut self, _dt: f32) {
        for slot in &mut self.objects {
            if let Some(object) = slot {
                if object.group.intersects(CollisionGroup::ACTOR) {
                    object.aabb = object.shape.compute_aabb(&object.transform);
                }
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjectHandle, &CollisionObject)> {
        self.objects
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|object| (ObjectHandle(index), object)))
    }

    pub fn len(&self) -> usize {
        self.objects.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get_mut(&mut self, handle: ObjectHandle) -> Option<&mut CollisionObject> {
        self.objects.get_mut(handle.0).and_then(|slot| slot.as_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math;

    fn cuboid(half: Vec3) -> WorldShape {
        WorldShape::Solid(SharedShape::cuboid(half.x, half.y, half.z))
    }

    #[test]
    fn add_remove_reuses_slots() {
        let mut world = CollisionWorld::new();
        let a = world.add(
            cuboid(Vec3::ONE),
            math::translation_isometry(Vec3::ZERO),
            CollisionGroup::WORLD,
            CollisionGroup::ACTOR,
            Owner::Object(EntityId(1)),
        );
        assert_eq!(world.len(), 1);
        assert!(world.remove(a).is_some());
        assert!(world.get(a).is_none());
        assert_eq!(world.len(), 0);

        let b = world.add(
            cuboid(Vec3::ONE),
            math::translation_isometry(Vec3::ZERO),
            CollisionGroup::WORLD,
            CollisionGroup::ACTOR,
            Owner::Object(EntityId(2)),
        );
        assert_eq!(a, b, "freed slot should be reused");
        assert_eq!(world.len(), 1);
    }

    #[test]
    fn transform_write_leaves_aabb_stale() {
        let mut world = CollisionWorld::new();
        let handle = world.add(
            cuboid(Vec3::ONE),
            math::translation_isometry(Vec3::ZERO),
            CollisionGroup::WORLD,
            CollisionGroup::ACTOR,
            Owner::Object(EntityId(1)),
        );

        world.set_transform(handle, math::translation_isometry(Vec3::new(100.0, 0.0, 0.0)));
        let object = world.get(handle).unwrap();
        assert!(object.aabb.maxs.x < 50.0, "AABB must stay stale until refreshed");

        world.update_single_aabb(handle);
        let object = world.get(handle).unwrap();
        assert!((object.aabb.maxs.x - 101.0).abs() < 1.0e-3);
    }

    #[test]
    fn step_refreshes_actor_aabbs_only() {
        let mut world = CollisionWorld::new();
        let actor = world.add(
            cuboid(Vec3::ONE),
            math::translation_isometry(Vec3::ZERO),
            CollisionGroup::ACTOR,
            CollisionGroup::MASK_ACTOR_DEFAULT,
            Owner::Actor(EntityId(1)),
        );
        let object = world.add(
            cuboid(Vec3::ONE),
            math::translation_isometry(Vec3::ZERO),
            CollisionGroup::WORLD,
            CollisionGroup::ACTOR,
            Owner::Object(EntityId(2)),
        );

        world.set_transform(actor, math::translation_isometry(Vec3::new(10.0, 0.0, 0.0)));
        world.set_transform(object, math::translation_isometry(Vec3::new(10.0, 0.0, 0.0)));
        world.step(1.0 / 60.0);

        assert!((world.get(actor).unwrap().aabb.maxs.x - 11.0).abs() < 1.0e-3);
        assert!(world.get(object).unwrap().aabb.maxs.x < 5.0);
    }

    #[test]
    fn compound_aabb_covers_children() {
        let children = vec![
            CompoundChild {
                transform: math::translation_isometry(Vec3::new(-5.0, 0.0, 0.0)),
                shape: SharedShape::cuboid(1.0, 1.0, 1.0),
            },
            CompoundChild {
                transform: math::translation_isometry(Vec3::new(5.0, 0.0, 0.0)),
                shape: SharedShape::cuboid(1.0, 1.0, 1.0),
            },
        ];
        let mut world = CollisionWorld::new();
        let handle = world.add(
            WorldShape::Compound(children),
            math::translation_isometry(Vec3::ZERO),
            CollisionGroup::WORLD,
            CollisionGroup::ACTOR,
            Owner::Object(EntityId(1)),
        );
        let aabb = world.get(handle).unwrap().aabb;
        assert!(aabb.mins.x < -5.5 && aabb.maxs.x > 5.5);
    }
}
