//! Ashfall character physics.
//!
//! The physics layer of the Ashfall RPG engine. Its single job is moving
//! characters through the world: given a requested per-frame movement vector
//! for an actor, resolve collisions against static meshes, terrain
//! heightfields, the water plane and other actors, and maintain the state the
//! rest of the engine reads back (on-ground flag, inertial force, swimming,
//! walking on water).
//!
//! # Architecture
//!
//! - **Collision**: a flat world of placed shapes with bitfield filter
//!   groups, queried through capsule sweeps and ray casts
//!   ([`collision::CollisionWorld`], [`collision::trace`]).
//! - **Movement**: the iterative slide/step/gravity solver
//!   ([`movement::solver`]).
//! - **Facade**: [`PhysicsSystem`] owns the world and the entity records,
//!   queues per-actor movement requests and drains them on a fixed 60 Hz
//!   tick.
//!
//! The whole crate is single-threaded and runs to completion inside each
//! facade call; game logic talks to it from one thread only.

use serde::{Deserialize, Serialize};

pub mod actor;
pub mod collision;
pub mod heightfield;
pub mod math;
pub mod movement;
pub mod object;
pub mod shape;
pub mod system;
pub mod world_query;

pub use actor::Actor;
pub use collision::{CollisionGroup, CollisionWorld, ObjectHandle, Owner, TraceResult};
pub use movement::ContactTracker;
pub use shape::{ShapeFactory, ShapeInstance, ShapeRegistry, ShapeTemplate};
pub use system::PhysicsSystem;
pub use world_query::{NodeTransformProvider, WorldQuery};

/// Stable handle for a game entity (reference in the game world).
///
/// The physics layer never interprets the value; it only keys the entity
/// maps and the back-references stored on collision objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);
