//! The iterative character movement solver.
//!
//! `move_actor` converts a requested movement vector into a
//! collision-resolved displacement for one fixed tick: build a velocity from
//! the input and the actor's stored inertia, then repeatedly sweep the
//! capsule, stepping over obstacles where possible and sliding along them
//! where not, clamp swimming actors to the water surface, probe for ground,
//! and integrate gravity into the inertia for the next tick.
//!
//! Positions handed in and out are feet reference; internally the solver
//! works at the capsule reference (feet + half-extent).

use glam::Vec3;

use crate::actor::Actor;
use crate::collision::trace;
use crate::collision::{CollisionGroup, CollisionWorld, ObjectHandle, Owner};
use crate::math;

use super::ContactTracker;

/// Steepest surface (degrees from horizontal) an actor can stand on.
pub const MAX_SLOPE_DEGREES: f32 = 49.0;

/// Tallest obstacle the step-up subroutine will climb.
pub const STEP_SIZE_UP: f32 = 34.0;

/// Furthest the step-up subroutine will drop back down.
pub const STEP_SIZE_DOWN: f32 = 62.0;

/// Iteration bound for the slide loop. Keeps degenerate corner cases from
/// looping forever.
pub const MAX_ITERATIONS: usize = 8;

/// Remaining tick time below which the slide loop stops.
pub const MIN_STEP_TIME: f32 = 0.01;

/// Downward acceleration applied to airborne actors, in units/s².
pub const GRAVITY: f32 = 627.2;

/// Speed of the push-off applied to an actor resting on another actor.
const PUSH_OFF_SPEED: f32 = 100.0;

/// How far a trace-down sweep may land from a straight ray before the ray's
/// hit is trusted instead.
const TRACE_DOWN_DIVERGENCE: f32 = 30.0;

/// Storm wind acting on actor movement this tick.
#[derive(Debug, Clone, Copy)]
pub struct StormWind {
    /// Unit direction the storm blows toward.
    pub direction: Vec3,
    /// Game setting scaling how strongly walking against the storm slows
    /// the actor.
    pub walk_mult: f32,
}

/// Per-actor, per-tick inputs gathered by the facade.
#[derive(Debug, Clone, Copy)]
pub struct MoveEnvironment {
    /// Whether the actor's class can move at all.
    pub is_mobile: bool,
    /// Whether the actor flies (no gravity, full 3D input).
    pub flying: bool,
    /// Water surface height of the actor's cell; `f32::MIN` when the cell
    /// has no water.
    pub water_level: f32,
    /// Downward-inertia damping from the slow-fall effect, in [0, 1]
    /// (1 = no damping).
    pub slow_fall: f32,
    /// The `fSwimHeightScale` game setting.
    pub swim_height_scale: f32,
    /// Storm wind, when one is blowing.
    pub storm: Option<StormWind>,
    /// Water creatures may not step out of the water.
    pub is_pure_water_creature: bool,
}

impl Default for MoveEnvironment {
    fn default() -> Self {
        Self {
            is_mobile: true,
            flying: false,
            water_level: f32::MIN,
            slow_fall: 1.0,
            swim_height_scale: 0.9,
            storm: None,
            is_pure_water_creature: false,
        }
    }
}

/// Resolve one tick of movement for an actor. Returns the new feet
/// position; the actor's on-ground flag, inertial force and walking-on-water
/// flag are updated in place. The caller remains responsible for writing the
/// position back to the game world (and to the actor via
/// [`Actor::set_position`]).
pub fn move_actor(
    actor: &mut Actor,
    movement: Vec3,
    time: f32,
    env: &MoveEnvironment,
    world: &CollisionWorld,
    tracker: &mut ContactTracker,
) -> Vec3 {
    debug_assert!(movement.is_finite());

    let mut position = actor.position();
    if !env.is_mobile {
        return position;
    }

    actor.set_walking_on_water(false);

    let pitch = actor.rotation().x;
    let yaw = actor.rotation().z;
    if !actor.collision_mode() {
        return position + math::movement_rotation(pitch, yaw) * movement * time;
    }

    let half_extents = actor.half_extents();
    position.z += half_extents.z;
    let swim_level =
        env.water_level + half_extents.z - half_extents.z * 2.0 * env.swim_height_scale;

    let me = actor.collision_handle();
    let mut inertia = actor.inertial_force();
    let mut velocity;

    if position.z < swim_level || env.flying {
        velocity = math::movement_rotation(pitch, yaw) * movement;
    } else {
        velocity = math::yaw_rotation(yaw) * movement;

        // An upward input is a jump: it replaces the stored inertia rather
        // than competing with it.
        if velocity.z > 0.0 {
            inertia = velocity;
        }
        if !actor.on_ground() {
            velocity += actor.inertial_force();
        }
    }

    if let Some(storm) = &env.storm {
        let heading = velocity.normalize_or_zero();
        if heading != Vec3::ZERO {
            let angle_degrees = storm
                .direction
                .dot(heading)
                .clamp(-1.0, 1.0)
                .acos()
                .to_degrees();
            velocity *= 1.0 - storm.walk_mult * (angle_degrees / 180.0);
        }
    }

    let orig_velocity = velocity;
    let mut new_position = position;
    let mut remaining_time = time;

    let mut iterations = 0;
    while iterations < MAX_ITERATIONS && remaining_time > MIN_STEP_TIME {
        iterations += 1;
        let next_pos = new_position + velocity * remaining_time;

        // A swimmer about to break the surface is redirected to glide
        // along it instead; only flight gets an actor out of the water
        // from below. Time is not consumed here.
        if !env.flying && new_position.z <= swim_level && next_pos.z > swim_level {
            let down = Vec3::NEG_Z;
            let move_len = velocity.length();
            let reflect_dir = math::reflect(velocity, down).normalize_or_zero();
            velocity = math::slide(reflect_dir, down) * move_len;
            continue;
        }

        // Sweeping a near-zero displacement yields nothing but collision
        // library noise; stop instead of creeping into an obstacle.
        if (new_position - next_pos).length_squared() <= 1.0e-4 {
            break;
        }

        let hit = trace::trace(world, me, new_position, next_pos);
        if hit.fraction >= 1.0 {
            new_position = hit.end_pos;
            break;
        }

        if let Some(Owner::Object(object)) = hit.hit_object.and_then(|h| world.get(h)).map(|o| o.owner()) {
            tracker.record_hit(actor.entity(), object);
        }

        // Blocked: first try to step up onto the obstacle. A second attempt
        // with a fixed 10-unit stride keeps the maximum step distance from
        // depending on frame rate or movement speed.
        let old_position = new_position;
        let mut stepped = step_move(
            world,
            me,
            &mut new_position,
            velocity * remaining_time,
            &mut remaining_time,
        );
        if !stepped {
            let heading = velocity.normalize_or_zero();
            stepped = step_move(
                world,
                me,
                &mut new_position,
                heading * 10.0,
                &mut remaining_time,
            );
        }

        if stepped {
            // Water creatures may not climb out of the water.
            if env.is_pure_water_creature && new_position.z + half_extents.z > env.water_level {
                new_position = old_position;
            }
        } else {
            // Could not step; slide along the obstacle instead.
            let move_len = velocity.length();
            let normal = hit.normal.unwrap_or(Vec3::Z);
            let reflect_dir = math::reflect(velocity, normal).normalize_or_zero();
            let new_velocity = math::slide(reflect_dir, normal) * move_len;

            if (new_velocity - velocity).length_squared() < 0.01 {
                break;
            }
            if new_velocity.dot(orig_velocity) <= 0.0 {
                break; // the obstacle has turned us around
            }
            velocity = new_velocity;

            // Under gravity the slide may not carry the actor upward;
            // stepping has already covered legitimate climbs.
            if !(new_position.z < swim_level || env.flying) {
                velocity.z = velocity.z.min(0.0);
            }
        }
    }

    let mut is_on_ground = false;
    if inertia.z <= 0.0 && new_position.z >= swim_level {
        let probe_depth = if actor.on_ground() {
            STEP_SIZE_DOWN + 2.0
        } else {
            2.0
        };
        let probe = trace::trace(
            world,
            me,
            new_position,
            new_position - Vec3::new(0.0, 0.0, probe_depth),
        );
        let slope = math::slope_degrees(probe.normal.unwrap_or(Vec3::Z));
        if probe.fraction < 1.0
            && slope <= MAX_SLOPE_DEGREES
            && !probe.hit_group.intersects(CollisionGroup::ACTOR)
        {
            if let Some(handle) = probe.hit_object {
                if let Some(object) = world.get(handle) {
                    match object.owner() {
                        Owner::Object(object_entity) => {
                            tracker.record_standing(actor.entity(), object_entity)
                        }
                        Owner::Water => actor.set_walking_on_water(true),
                        _ => {}
                    }
                }
            }
            if !env.flying {
                new_position.z = probe.end_pos.z + 1.0;
            }
            is_on_ground = true;
        } else if probe.fraction < 1.0 && probe.hit_group.intersects(CollisionGroup::ACTOR) {
            // Standing on another actor is not allowed; push away from its
            // center so the actor does not hang in the air indefinitely.
            if velocity.truncate().length_squared() < PUSH_OFF_SPEED * PUSH_OFF_SPEED {
                if let Some(center) = probe
                    .hit_object
                    .and_then(|h| world.get(h))
                    .map(|o| math::from_point(o.fresh_aabb().center()))
                {
                    let away = Vec3::new(position.x - center.x, position.y - center.y, 0.0)
                        .normalize_or_zero();
                    inertia = away * PUSH_OFF_SPEED;
                }
            }
        }
    }

    if is_on_ground || new_position.z < swim_level || env.flying {
        actor.set_inertial_force(Vec3::ZERO);
    } else {
        inertia.z += time * -GRAVITY;
        if inertia.z < 0.0 {
            inertia.z *= env.slow_fall;
        }
        actor.set_inertial_force(inertia);
    }

    actor.set_on_ground(is_on_ground);
    new_position.z -= half_extents.z;
    new_position
}

/// Try to traverse an obstacle of up to [`STEP_SIZE_UP`] height: sweep up,
/// then forward by `to_move`, then back down by [`STEP_SIZE_DOWN`]. On
/// success `position` moves to the landing point and `remaining_time` is
/// scaled by the unused share of the forward sweep.
///
/// Fails when the actor cannot rise at all, cannot advance from the raised
/// position, lands on a too-steep surface or on another actor, or completes
/// the full step down without touching anything.
fn step_move(
    world: &CollisionWorld,
    me: ObjectHandle,
    position: &mut Vec3,
    to_move: Vec3,
    remaining_time: &mut f32,
) -> bool {
    let up = trace::trace(
        world,
        me,
        *position,
        *position + Vec3::new(0.0, 0.0, STEP_SIZE_UP),
    );
    // "Moved" means more than the sweep safety margin; anything less is a
    // sweep that ended where it started.
    if (up.end_pos - *position).length_squared() < 1.0e-4 {
        return false; // could not rise even the smallest amount
    }

    let forward = trace::trace(world, me, up.end_pos, up.end_pos + to_move);
    if (forward.end_pos - up.end_pos).length_squared() < 1.0e-4 {
        return false;
    }

    let down = trace::trace(
        world,
        me,
        forward.end_pos,
        forward.end_pos - Vec3::new(0.0, 0.0, STEP_SIZE_DOWN),
    );
    if down.fraction < 1.0
        && math::slope_degrees(down.normal.unwrap_or(Vec3::Z)) <= MAX_SLOPE_DEGREES
    {
        // Stepping up onto other actors is not allowed.
        if down.hit_group.intersects(CollisionGroup::ACTOR) {
            return false;
        }
        // TODO: a corner contact can report a plane normal steeper than the
        // surface actually walked on, rejecting valid stairs.
        *position = down.end_pos;
        *remaining_time *= 1.0 - forward.fraction;
        return true;
    }

    false
}

/// Snap an actor down onto ground within `max_height`, for placement after
/// teleports and cell transitions. Returns the landing position (feet) and
/// updates the actor's on-ground flag.
///
/// Legacy door markers sometimes sit inside foreign geometry that a capsule
/// sweep clips; when an infinitely thin ray disagrees with the sweep by more
/// than [`TRACE_DOWN_DIVERGENCE`] units, or the swept surface is too steep,
/// the ray's hit is trusted instead.
pub fn trace_down(
    actor: &mut Actor,
    world: &CollisionWorld,
    max_height: f32,
) -> Vec3 {
    let position = actor.position();
    let drop = Vec3::new(0.0, 0.0, max_height);

    let swept = trace::find_ground(
        world,
        actor.collision_handle(),
        actor.half_extents().z,
        position,
        position - drop,
    );
    if swept.fraction >= 1.0 {
        actor.set_on_ground(false);
        return position;
    }

    let swept_slope = math::slope_degrees(swept.normal.unwrap_or(Vec3::Z));
    if let Some(ray) = trace::ray_ground(world, position, position - drop) {
        if (ray.point - swept.end_pos).length() > TRACE_DOWN_DIVERGENCE
            || swept_slope > MAX_SLOPE_DEGREES
        {
            actor.set_on_ground(math::slope_degrees(ray.normal) <= MAX_SLOPE_DEGREES);
            return ray.point + Vec3::Z;
        }
    }

    actor.set_on_ground(swept_slope <= MAX_SLOPE_DEGREES);
    swept.end_pos
}
