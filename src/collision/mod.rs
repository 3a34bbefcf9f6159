//! Collision world and queries for character movement.
//!
//! Everything collidable lives in one [`CollisionWorld`]: static meshes,
//! terrain heightfield tiles, the water plane and actor capsules, each tagged
//! with a filter group and mask. Movement queries go through the tracer
//! functions in [`trace`], which sweep a capsule (or cast a ray) against
//! every object whose filter bits and cached AABB admit it.

pub mod groups;
pub mod trace;
pub mod world;

pub use groups::CollisionGroup;
pub use trace::{RayHit, TraceResult};
pub use world::{CollisionObject, CollisionWorld, CompoundChild, ObjectHandle, Owner, WorldShape};
