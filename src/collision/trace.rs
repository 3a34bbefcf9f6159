//! Sweep and ray queries against the collision world.
//!
//! A trace sweeps a convex shape from a start to an end position and reports
//! how far it got before hitting something, where it ended up, and what it
//! hit. The end position is backed off slightly along the travel direction
//! so the next sweep does not start embedded in the surface it just hit.

use glam::Vec3;
use parry3d::bounding_volume::BoundingVolume;
use parry3d::math::{Isometry, Real, Vector};
use parry3d::query::{self, Ray, ShapeCastOptions};
use parry3d::shape::SharedShape;
use serde::{Deserialize, Serialize};

use crate::math;

use super::groups::CollisionGroup;
use super::world::{CollisionObject, CollisionWorld, ObjectHandle, WorldShape};

/// Distance backed off from an impact along the travel direction.
const SAFETY_MARGIN: f32 = 0.01;

/// Result of sweeping a shape through the world.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceResult {
    /// Fraction of the requested distance traveled before the hit;
    /// `1.0` means no hit.
    pub fraction: f32,

    /// Position reached, backed off from the impact by a safety margin.
    pub end_pos: Vec3,

    /// Surface normal at the impact, pointing away from the hit surface.
    /// `None` when nothing was hit.
    pub normal: Option<Vec3>,

    /// The object that was hit, if any.
    pub hit_object: Option<ObjectHandle>,

    /// Filter group of the hit object; `NONE` when nothing was hit.
    pub hit_group: CollisionGroup,
}

impl TraceResult {
    /// A trace that traveled the full distance without hitting anything.
    pub fn no_hit(end_pos: Vec3) -> Self {
        Self {
            fraction: 1.0,
            end_pos,
            normal: None,
            hit_object: None,
            hit_group: CollisionGroup::NONE,
        }
    }

    #[inline]
    pub fn hit_something(&self) -> bool {
        self.fraction < 1.0
    }
}

/// Result of a ray query.
#[derive(Debug, Clone, Copy)]
pub struct RayHit {
    pub point: Vec3,
    pub normal: Vec3,
}

/// Sweep a placed capsule from `from` to `to` (capsule reference points).
///
/// The moving object's own group and mask decide what it can hit; the object
/// itself is excluded from the query.
pub fn trace(world: &CollisionWorld, me: ObjectHandle, from: Vec3, to: Vec3) -> TraceResult {
    let Some(me_object) = world.get(me) else {
        debug_assert!(false, "trace with a removed collision object");
        return TraceResult::no_hit(to);
    };
    let shape = match me_object.shape() {
        WorldShape::Solid(shape) => shape.clone(),
        _ => {
            debug_assert!(false, "trace requires a convex moving shape");
            return TraceResult::no_hit(to);
        }
    };
    let group = me_object.group();
    let mask = me_object.mask();
    sweep(world, Some(me), &shape, from, to, |object| {
        object.group().intersects(mask) && object.mask().intersects(group)
    })
}

/// Sweep a placed capsule down onto ground colliders only (world geometry
/// and terrain), ignoring everything else. Positions are feet reference;
/// `half_extent_z` lifts the sweep to the capsule reference internally.
pub fn find_ground(
    world: &CollisionWorld,
    me: ObjectHandle,
    half_extent_z: f32,
    from: Vec3,
    to: Vec3,
) -> TraceResult {
    let Some(me_object) = world.get(me) else {
        debug_assert!(false, "find_ground with a removed collision object");
        return TraceResult::no_hit(to);
    };
    let shape = match me_object.shape() {
        WorldShape::Solid(shape) => shape.clone(),
        _ => {
            debug_assert!(false, "find_ground requires a convex moving shape");
            return TraceResult::no_hit(to);
        }
    };
    let offset = Vec3::new(0.0, 0.0, half_extent_z);
    let mut result = sweep(world, Some(me), &shape, from + offset, to + offset, |object| {
        object.group().intersects(CollisionGroup::MASK_GROUND)
    });
    result.end_pos -= offset;
    result
}

/// Cast an infinitely thin ray against ground colliders, returning the
/// closest hit.
pub fn ray_ground(world: &CollisionWorld, from: Vec3, to: Vec3) -> Option<RayHit> {
    let delta = to - from;
    let distance = delta.length();
    if distance < 1.0e-6 {
        return None;
    }
    let direction = delta / distance;
    let ray = Ray::new(math::to_point(from), math::to_vector(direction));

    let mut closest: Option<(f32, Vec3)> = None;
    for (_, object) in world.iter() {
        if !object.group().intersects(CollisionGroup::MASK_GROUND) {
            continue;
        }
        let hit = match object.shape() {
            WorldShape::Solid(shape) => cast_ray(shape, object.transform(), &ray, distance),
            WorldShape::Compound(children) => children
                .iter()
                .filter_map(|child| {
                    cast_ray(
                        &child.shape,
                        &(object.transform() * child.transform),
                        &ray,
                        distance,
                    )
                })
                .fold(None, |closest, hit| nearer(closest, Some(hit))),
            WorldShape::Plane => None, // never in a ground group
        };
        closest = nearer(closest, hit);
    }

    closest.map(|(toi, normal)| RayHit {
        point: from + direction * toi,
        normal,
    })
}

fn cast_ray(
    shape: &SharedShape,
    transform: &Isometry<Real>,
    ray: &Ray,
    max_toi: f32,
) -> Option<(f32, Vec3)> {
    shape
        .cast_ray_and_get_normal(transform, ray, max_toi, true)
        .map(|hit| (hit.time_of_impact, math::from_vector(hit.normal)))
}

fn nearer(a: Option<(f32, Vec3)>, b: Option<(f32, Vec3)>) -> Option<(f32, Vec3)> {
    match (a, b) {
        (Some(x), Some(y)) => Some(if x.0 <= y.0 { x } else { y }),
        (Some(x), None) => Some(x),
        (None, y) => y,
    }
}

/// Shared sweep core: cull by swept AABB, cast against every accepted
/// object, keep the closest hit.
fn sweep(
    world: &CollisionWorld,
    me: Option<ObjectHandle>,
    shape: &SharedShape,
    from: Vec3,
    to: Vec3,
    accept: impl Fn(&CollisionObject) -> bool,
) -> TraceResult {
    let delta = to - from;
    let distance = delta.length();
    if distance < 1.0e-6 {
        return TraceResult::no_hit(from);
    }
    let direction = delta / distance;

    let from_iso = math::translation_isometry(from);
    let to_iso = math::translation_isometry(to);
    let swept_aabb = shape
        .compute_aabb(&from_iso)
        .merged(&shape.compute_aabb(&to_iso))
        .loosened(SAFETY_MARGIN);
    let velocity = math::to_vector(delta);

    let mut best = TraceResult::no_hit(to);
    for (handle, object) in world.iter() {
        if Some(handle) == me {
            continue;
        }
        if !accept(object) {
            continue;
        }
        if !swept_aabb.intersects(&object.aabb) {
            continue;
        }

        let hit = match object.shape() {
            WorldShape::Solid(target) => {
                cast_shape(&from_iso, &velocity, shape, object.transform(), target)
            }
            WorldShape::Compound(children) => children
                .iter()
                .filter_map(|child| {
                    cast_shape(
                        &from_iso,
                        &velocity,
                        shape,
                        &(object.transform() * child.transform),
                        &child.shape,
                    )
                })
                .fold(None, |closest, hit| nearer(closest, Some(hit))),
            WorldShape::Plane => {
                cast_plane(shape, from, to, object.transform().translation.vector.z)
            }
        };

        if let Some((fraction, normal)) = hit {
            if fraction < best.fraction {
                best = TraceResult {
                    fraction,
                    end_pos: to,
                    normal: Some(normal),
                    hit_object: Some(handle),
                    hit_group: object.group(),
                };
            }
        }
    }

    if best.fraction < 1.0 {
        let travel = (distance * best.fraction - SAFETY_MARGIN).max(0.0);
        best.end_pos = from + direction * travel;
    }
    best
}

fn cast_shape(
    from: &Isometry<Real>,
    velocity: &Vector<Real>,
    moving: &SharedShape,
    target_transform: &Isometry<Real>,
    target: &SharedShape,
) -> Option<(f32, Vec3)> {
    let options = ShapeCastOptions {
        max_time_of_impact: 1.0,
        target_distance: 0.0,
        stop_at_penetration: true,
        compute_impact_geometry_on_penetration: true,
    };
    match query::cast_shapes(
        from,
        velocity,
        &**moving,
        target_transform,
        &Vector::zeros(),
        &**target,
        options,
    ) {
        Ok(Some(hit)) => Some((
            hit.time_of_impact,
            math::from_vector(hit.normal2.into_inner()),
        )),
        Ok(None) => None,
        // Unsupported shape pairing; nothing in this crate produces one.
        Err(_) => None,
    }
}

/// Analytic cast of a convex shape against an infinite horizontal plane
/// facing up. Only the shape's vertical extent matters.
fn cast_plane(moving: &SharedShape, from: Vec3, to: Vec3, plane_z: f32) -> Option<(f32, Vec3)> {
    let half_z = moving.compute_local_aabb().half_extents().z;
    let start_bottom = from.z - half_z;
    let end_bottom = to.z - half_z;
    if start_bottom < plane_z {
        // Already below the surface: immediate contact.
        return Some((0.0, Vec3::Z));
    }
    if end_bottom >= plane_z {
        return None;
    }
    let fraction = (start_bottom - plane_z) / (start_bottom - end_bottom);
    Some((fraction, Vec3::Z))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::world::Owner;
    use crate::EntityId;

    fn actor_capsule() -> SharedShape {
        // Half-extents (20, 20, 64): radius 20, cylinder half-height 44.
        SharedShape::capsule_z(44.0, 20.0)
    }

    fn add_actor(world: &mut CollisionWorld, at: Vec3, mask: CollisionGroup) -> ObjectHandle {
        world.add(
            WorldShape::Solid(actor_capsule()),
            math::translation_isometry(at),
            CollisionGroup::ACTOR,
            mask,
            Owner::Actor(EntityId(1)),
        )
    }

    fn add_floor(world: &mut CollisionWorld) -> ObjectHandle {
        // Top face at z = 0.
        world.add(
            WorldShape::Solid(SharedShape::cuboid(500.0, 500.0, 50.0)),
            math::translation_isometry(Vec3::new(0.0, 0.0, -50.0)),
            CollisionGroup::WORLD,
            CollisionGroup::ACTOR | CollisionGroup::PROJECTILE,
            Owner::Object(EntityId(100)),
        )
    }

    #[test]
    fn sweep_down_hits_floor() {
        let mut world = CollisionWorld::new();
        add_floor(&mut world);
        let me = add_actor(
            &mut world,
            Vec3::new(0.0, 0.0, 100.0),
            CollisionGroup::MASK_ACTOR_DEFAULT,
        );

        let result = trace(&world, me, Vec3::new(0.0, 0.0, 100.0), Vec3::new(0.0, 0.0, 0.0));
        assert!(result.hit_something());
        // Capsule bottom reaches the floor when its center is at z = 64.
        assert!((result.fraction - 0.36).abs() < 0.01, "fraction {}", result.fraction);
        assert!((result.end_pos.z - 64.0).abs() < 0.1, "end z {}", result.end_pos.z);
        let normal = result.normal.unwrap();
        assert!(normal.z > 0.99);
        assert_eq!(result.hit_group, CollisionGroup::WORLD);
    }

    #[test]
    fn sweep_full_distance_reports_no_hit() {
        let mut world = CollisionWorld::new();
        add_floor(&mut world);
        let me = add_actor(
            &mut world,
            Vec3::new(0.0, 0.0, 500.0),
            CollisionGroup::MASK_ACTOR_DEFAULT,
        );

        let result = trace(
            &world,
            me,
            Vec3::new(0.0, 0.0, 500.0),
            Vec3::new(0.0, 0.0, 400.0),
        );
        assert!(!result.hit_something());
        assert_eq!(result.fraction, 1.0);
        assert!((result.end_pos.z - 400.0).abs() < 1.0e-3);
    }

    #[test]
    fn sweep_respects_filter_masks() {
        let mut world = CollisionWorld::new();
        // Water plane at z = 0; only collides with actors that carry the
        // water bit in their mask.
        world.add(
            WorldShape::Plane,
            math::translation_isometry(Vec3::ZERO),
            CollisionGroup::WATER,
            CollisionGroup::ACTOR,
            Owner::Water,
        );

        let swimmer = add_actor(
            &mut world,
            Vec3::new(0.0, 0.0, 200.0),
            CollisionGroup::MASK_ACTOR_DEFAULT,
        );
        let result = trace(
            &world,
            swimmer,
            Vec3::new(0.0, 0.0, 200.0),
            Vec3::new(0.0, 0.0, 0.0),
        );
        assert!(!result.hit_something(), "water must not block a plain actor");

        let walker = add_actor(
            &mut world,
            Vec3::new(50.0, 0.0, 200.0),
            CollisionGroup::MASK_ACTOR_DEFAULT | CollisionGroup::WATER,
        );
        let result = trace(
            &world,
            walker,
            Vec3::new(50.0, 0.0, 200.0),
            Vec3::new(50.0, 0.0, 0.0),
        );
        assert!(result.hit_something(), "water-walker must land on the plane");
        assert_eq!(result.hit_group, CollisionGroup::WATER);
        // Capsule bottom rests on the plane when its center is at z = 64.
        assert!((result.end_pos.z - 64.0).abs() < 0.1);
    }

    #[test]
    fn stale_aabb_skips_moved_object() {
        let mut world = CollisionWorld::new();
        let wall = world.add(
            WorldShape::Solid(SharedShape::cuboid(1.0, 100.0, 100.0)),
            math::translation_isometry(Vec3::new(1000.0, 0.0, 0.0)),
            CollisionGroup::WORLD,
            CollisionGroup::ACTOR,
            Owner::Object(EntityId(7)),
        );
        let me = add_actor(&mut world, Vec3::ZERO, CollisionGroup::MASK_ACTOR_DEFAULT);

        // Move the wall into the sweep path without refreshing its AABB:
        // the cull still sees it far away.
        world.set_transform(wall, math::translation_isometry(Vec3::new(50.0, 0.0, 0.0)));
        let result = trace(&world, me, Vec3::ZERO, Vec3::new(100.0, 0.0, 0.0));
        assert!(!result.hit_something(), "stale AABB should hide the wall");

        world.update_single_aabb(wall);
        let result = trace(&world, me, Vec3::ZERO, Vec3::new(100.0, 0.0, 0.0));
        assert!(result.hit_something());
        // Stops with the capsule surface at the wall face (x = 49).
        assert!(result.end_pos.x < 30.0, "end x {}", result.end_pos.x);
    }

    #[test]
    fn find_ground_ignores_other_actors() {
        let mut world = CollisionWorld::new();
        add_floor(&mut world);
        // Another actor directly below.
        add_actor(
            &mut world,
            Vec3::new(0.0, 0.0, 64.0),
            CollisionGroup::MASK_ACTOR_DEFAULT,
        );
        let me = add_actor(
            &mut world,
            Vec3::new(0.0, 0.0, 300.0),
            CollisionGroup::MASK_ACTOR_DEFAULT,
        );

        // Feet-space query from z = 236 straight down.
        let result = find_ground(&world, me, 64.0, Vec3::new(0.0, 0.0, 236.0), Vec3::new(0.0, 0.0, -100.0));
        assert!(result.hit_something());
        // Lands on the floor (feet near z = 0), not on the other actor.
        assert!(result.end_pos.z < 5.0, "end z {}", result.end_pos.z);
    }

    #[test]
    fn ray_ground_reports_point_and_normal() {
        let mut world = CollisionWorld::new();
        add_floor(&mut world);

        let hit = ray_ground(
            &world,
            Vec3::new(3.0, 4.0, 100.0),
            Vec3::new(3.0, 4.0, -100.0),
        )
        .expect("ray should hit the floor");
        assert!((hit.point.z - 0.0).abs() < 1.0e-2);
        assert!(hit.normal.z > 0.99);
    }
}
