//! The physics facade: entity registration, the movement queue and the
//! fixed-tick drain.
//!
//! Game logic queues one movement vector per actor at whatever cadence it
//! likes; physics consumes them on a 60 Hz tick driven by the accumulator in
//! [`PhysicsSystem::apply`]. The accumulator is single-step: below one tick
//! of elapsed time nothing happens, and a drain consumes everything that has
//! accumulated at once, so slow frames stutter instead of spiraling.

use glam::Vec3;

use crate::actor::Actor;
use crate::collision::{CollisionGroup, CollisionWorld, Owner, WorldShape};
use crate::heightfield::HeightField;
use crate::math;
use crate::movement::solver::{self, MoveEnvironment, StormWind};
use crate::movement::ContactTracker;
use crate::object::Object;
use crate::shape::{ShapeFactory, ShapeRegistry};
use crate::world_query::{NodeTransformProvider, WorldQuery};
use crate::EntityId;

use std::collections::HashMap;

/// Length of one physics tick in seconds.
pub const FIXED_TICK: f32 = 1.0 / 60.0;

/// The character physics system.
///
/// Owns the collision world, the shape registry and the three disjoint
/// entity maps (static objects, actors, heightfield tiles). All methods run
/// to completion on the calling thread.
pub struct PhysicsSystem {
    // Declaration order is teardown order: water, terrain, objects and
    // actors release before the world they are placed in.
    water_enabled: bool,
    water_height: f32,
    water_object: Option<crate::collision::ObjectHandle>,
    heightfields: HashMap<(i32, i32), HeightField>,
    objects: HashMap<EntityId, Object>,
    actors: HashMap<EntityId, Actor>,
    shapes: ShapeRegistry,
    movement_queue: Vec<(EntityId, Vec3)>,
    movement_results: Vec<(EntityId, Vec3)>,
    tracker: ContactTracker,
    time_accum: f32,
    collision_world: CollisionWorld,
}

impl PhysicsSystem {
    pub fn new(factory: Box<dyn ShapeFactory>) -> Self {
        Self {
            water_enabled: false,
            water_height: 0.0,
            water_object: None,
            heightfields: HashMap::new(),
            objects: HashMap::new(),
            actors: HashMap::new(),
            shapes: ShapeRegistry::new(factory),
            movement_queue: Vec::new(),
            movement_results: Vec::new(),
            tracker: ContactTracker::new(),
            time_accum: 0.0,
            collision_world: CollisionWorld::new(),
        }
    }

    pub fn collision_world(&self) -> &CollisionWorld {
        &self.collision_world
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Register a static collider for an entity. A mesh without collision
    /// data leaves the entity untracked.
    pub fn add_object(
        &mut self,
        entity: EntityId,
        mesh: &str,
        position: Vec3,
        rotation: Vec3,
        scale: f32,
    ) {
        debug_assert!(
            !self.objects.contains_key(&entity) && !self.actors.contains_key(&entity),
            "entity registered twice"
        );
        let Some(instance) = self.shapes.create_instance(mesh) else {
            log::debug!("no collision shape for mesh {mesh}");
            return;
        };
        let placed = Object::new(
            &mut self.collision_world,
            entity,
            instance,
            position,
            math::rotation_from_euler(rotation),
            scale,
        );
        match placed {
            Some(object) => {
                self.objects.insert(entity, object);
            }
            None => log::debug!("mesh {mesh} has no collidable parts"),
        }
    }

    /// Register an actor capsule for an entity.
    pub fn add_actor(&mut self, entity: EntityId, mesh: &str, position: Vec3, rotation: Vec3) {
        debug_assert!(
            !self.objects.contains_key(&entity) && !self.actors.contains_key(&entity),
            "entity registered twice"
        );
        let Some(instance) = self.shapes.create_instance(mesh) else {
            log::debug!("no shape template for actor mesh {mesh}");
            return;
        };
        let actor = Actor::new(
            &mut self.collision_world,
            entity,
            instance.half_extents(),
            position,
            rotation,
        );
        self.actors.insert(entity, actor);
    }

    /// Register a terrain tile.
    pub fn add_heightfield(
        &mut self,
        heights: &[f32],
        x: i32,
        y: i32,
        tri_size: f32,
        sqrt_verts: usize,
    ) {
        let tile = HeightField::new(&mut self.collision_world, heights, x, y, tri_size, sqrt_verts);
        self.heightfields.insert((x, y), tile);
    }

    pub fn remove_heightfield(&mut self, x: i32, y: i32) {
        if let Some(tile) = self.heightfields.remove(&(x, y)) {
            self.collision_world.remove(tile.handle());
        }
    }

    /// Remove whatever record the entity has, detaching it from the world
    /// first.
    pub fn remove(&mut self, entity: EntityId) {
        if let Some(object) = self.objects.remove(&entity) {
            self.collision_world.remove(object.handle());
        }
        if let Some(actor) = self.actors.remove(&entity) {
            self.collision_world.remove(actor.collision_handle());
        }
    }

    /// Re-key an entity under a new handle without touching its state.
    pub fn update_ptr(&mut self, old: EntityId, new: EntityId) {
        if let Some(mut object) = self.objects.remove(&old) {
            object.set_entity(new, &mut self.collision_world);
            self.objects.insert(new, object);
        }
        if let Some(mut actor) = self.actors.remove(&old) {
            actor.set_entity(new, &mut self.collision_world);
            self.actors.insert(new, actor);
        }
    }

    pub fn get_actor(&self, entity: EntityId) -> Option<&Actor> {
        self.actors.get(&entity)
    }

    pub fn get_actor_mut(&mut self, entity: EntityId) -> Option<&mut Actor> {
        self.actors.get_mut(&entity)
    }

    // ========================================================================
    // Transform updates
    // ========================================================================

    /// Move an entity's collider. Static objects get their AABB refreshed;
    /// actor capsules are refreshed in bulk by the world step.
    pub fn update_position(&mut self, entity: EntityId, position: Vec3) {
        if let Some(object) = self.objects.get_mut(&entity) {
            object.set_origin(position, &mut self.collision_world);
            self.collision_world.update_single_aabb(object.handle());
            return;
        }
        if let Some(actor) = self.actors.get_mut(&entity) {
            actor.set_position(position, &mut self.collision_world);
        }
    }

    /// Rotate an entity. `rotation` is the stored Euler orientation; an
    /// actor's capsule stays upright and only remembers the angles.
    pub fn update_rotation(&mut self, entity: EntityId, rotation: Vec3) {
        if let Some(object) = self.objects.get_mut(&entity) {
            object.set_rotation(math::rotation_from_euler(rotation), &mut self.collision_world);
            self.collision_world.update_single_aabb(object.handle());
            return;
        }
        if let Some(actor) = self.actors.get_mut(&entity) {
            actor.set_rotation(rotation);
        }
    }

    /// Rescale an entity's collider.
    pub fn update_scale(&mut self, entity: EntityId, scale: f32) {
        if let Some(object) = self.objects.get_mut(&entity) {
            object.set_scale(scale, &mut self.collision_world);
            self.collision_world.update_single_aabb(object.handle());
            return;
        }
        if let Some(actor) = self.actors.get_mut(&entity) {
            actor.set_scale(scale, &mut self.collision_world);
        }
    }

    /// Flip the player's collision mode (no-clip toggle). Returns the new
    /// mode, or false when no player actor is registered.
    pub fn toggle_collision_mode(&mut self, world: &dyn WorldQuery) -> bool {
        let player = world.player_entity();
        match self.actors.get_mut(&player) {
            Some(actor) => {
                let mode = !actor.collision_mode();
                actor.set_collision_mode(mode);
                mode
            }
            None => false,
        }
    }

    // ========================================================================
    // Water
    // ========================================================================

    pub fn enable_water(&mut self, height: f32) {
        if !self.water_enabled || self.water_height != height {
            self.water_enabled = true;
            self.water_height = height;
            self.update_water();
        }
    }

    pub fn disable_water(&mut self) {
        if self.water_enabled {
            self.water_enabled = false;
            self.update_water();
        }
    }

    pub fn set_water_height(&mut self, height: f32) {
        if self.water_height != height {
            self.water_height = height;
            self.update_water();
        }
    }

    fn update_water(&mut self) {
        if let Some(handle) = self.water_object.take() {
            self.collision_world.remove(handle);
        }
        if !self.water_enabled {
            return;
        }
        let handle = self.collision_world.add(
            WorldShape::Plane,
            math::translation_isometry(Vec3::new(0.0, 0.0, self.water_height)),
            CollisionGroup::WATER,
            CollisionGroup::ACTOR,
            Owner::Water,
        );
        self.water_object = Some(handle);
    }

    // ========================================================================
    // Movement pipeline
    // ========================================================================

    /// Queue a movement request for an actor, replacing any pending request
    /// for the same actor while keeping its place in line.
    pub fn queue_movement(&mut self, entity: EntityId, movement: Vec3) {
        for entry in &mut self.movement_queue {
            if entry.0 == entity {
                entry.1 = movement;
                return;
            }
        }
        self.movement_queue.push((entity, movement));
    }

    /// Drop all pending movement and contact records.
    pub fn clear_queued_movement(&mut self) {
        self.movement_queue.clear();
        self.tracker.clear();
    }

    /// Advance the accumulator and, once a full tick has elapsed, resolve
    /// every queued movement. Returns the drained tick's results — one
    /// (entity, new feet position) per surviving queue entry, in queue
    /// order — or an empty slice below the threshold. The caller writes the
    /// positions back to the game world.
    pub fn apply(&mut self, dt: f32, world: &dyn WorldQuery) -> &[(EntityId, Vec3)] {
        self.movement_results.clear();

        self.time_accum += dt;
        if self.time_accum >= FIXED_TICK {
            self.tracker.clear();

            let swim_height_scale = world.get_float_setting("fSwimHeightScale");
            let storm = if world.is_in_storm() {
                Some(StormWind {
                    direction: world.storm_direction(),
                    walk_mult: world.get_float_setting("fStromWalkMult"),
                })
            } else {
                None
            };

            for (entity, movement) in &self.movement_queue {
                // Removal races with queued movement; a missing actor is
                // simply skipped.
                let Some(actor) = self.actors.get_mut(entity) else {
                    log::trace!("movement queued for unregistered entity {entity:?}");
                    continue;
                };

                let water_level = world.water_level(*entity);
                let water_walking = world.water_walking_magnitude(*entity) > 0.0
                    && water_level.is_some()
                    && !world.is_underwater(*entity, actor.position());
                actor.set_can_water_walk(water_walking, &mut self.collision_world);

                // Slow fall scales fall speed by 1 − magnitude/200.
                let slow_fall = 1.0
                    - (world.slow_fall_magnitude(*entity) * 0.005).clamp(0.0, 1.0);

                let env = MoveEnvironment {
                    is_mobile: world.is_mobile(*entity),
                    flying: world.is_flying(*entity),
                    water_level: water_level.unwrap_or(f32::MIN),
                    slow_fall,
                    swim_height_scale,
                    storm,
                    is_pure_water_creature: world.is_pure_water_creature(*entity),
                };

                let new_position = solver::move_actor(
                    actor,
                    *movement,
                    self.time_accum,
                    &env,
                    &self.collision_world,
                    &mut self.tracker,
                );
                world.consume_jump(*entity);

                self.movement_results.push((*entity, new_position));
            }

            self.time_accum = 0.0;
        }
        self.movement_queue.clear();

        &self.movement_results
    }

    /// Resynchronize animated compound colliders from the scene graph and
    /// run the collision world's per-tick housekeeping. Positions are not
    /// affected.
    pub fn step_simulation(&mut self, dt: f32, scene: &dyn NodeTransformProvider) {
        for object in self.objects.values_mut() {
            object.animate(scene, &mut self.collision_world);
        }
        self.collision_world.step(dt);
    }

    /// Snap an actor down onto ground within `max_height`; used after
    /// teleports and cell transitions. `None` when the entity has no actor.
    pub fn trace_down(&mut self, entity: EntityId, max_height: f32) -> Option<Vec3> {
        let actor = self.actors.get_mut(&entity)?;
        Some(solver::trace_down(actor, &self.collision_world, max_height))
    }

    // ========================================================================
    // Contact queries (disabled)
    // ========================================================================
    //
    // The solver keeps the per-tick contact tracker current, but these
    // queries deliberately do not read it yet and keep their empty-result
    // contract.

    pub fn is_actor_standing_on(&self, _actor: EntityId, _object: EntityId) -> bool {
        false
    }

    pub fn get_actors_standing_on(&self, _object: EntityId) -> Vec<EntityId> {
        Vec::new()
    }

    pub fn is_actor_colliding_with(&self, _actor: EntityId, _object: EntityId) -> bool {
        false
    }

    pub fn get_actors_colliding_with(&self, _object: EntityId) -> Vec<EntityId> {
        Vec::new()
    }
}
