//! Interfaces consumed from the rest of the engine.
//!
//! The physics layer never reaches into game state directly; everything it
//! needs from the world — weather, magic effects, game settings, scene-graph
//! transforms — comes through these traits, implemented by the engine.

use glam::{Mat4, Vec3};

use crate::EntityId;

/// Read access to game-world state the solver depends on.
///
/// All methods are logically read-only; [`WorldQuery::consume_jump`] is the
/// single documented exception, clearing the game-side vertical input
/// channel after the solver has consumed it (implementations use interior
/// mutability).
pub trait WorldQuery {
    /// Whether the actor is currently flying (levitation or innate flight).
    fn is_flying(&self, actor: EntityId) -> bool;

    /// Whether a storm is blowing in the active cell.
    fn is_in_storm(&self) -> bool;

    /// Unit direction the storm blows toward. Only meaningful while
    /// [`WorldQuery::is_in_storm`] returns true.
    fn storm_direction(&self) -> Vec3;

    /// Whether the given position inside the actor's cell is under water.
    fn is_underwater(&self, actor: EntityId, position: Vec3) -> bool;

    /// Look up a float game setting by its data-file key.
    fn get_float_setting(&self, name: &str) -> f32;

    /// The player's entity handle.
    fn player_entity(&self) -> EntityId;

    /// Water level of the actor's cell, `None` when the cell has no water.
    fn water_level(&self, actor: EntityId) -> Option<f32>;

    /// Whether the actor's class can move at all.
    fn is_mobile(&self, actor: EntityId) -> bool;

    /// Whether the actor is a water creature that may not leave the water.
    fn is_pure_water_creature(&self, actor: EntityId) -> bool;

    /// Magnitude of the actor's water-walking effect (0 when inactive).
    fn water_walking_magnitude(&self, actor: EntityId) -> f32;

    /// Magnitude of the actor's slow-fall effect (0 when inactive).
    fn slow_fall_magnitude(&self, actor: EntityId) -> f32;

    /// One-shot: clear the actor's vertical movement-input channel after
    /// the solver consumed it as a jump.
    fn consume_jump(&self, actor: EntityId);
}

/// Scene-graph access for animated compound colliders: the named node's
/// local-to-world matrix with the entity's root transform removed.
pub trait NodeTransformProvider {
    fn node_transform(&self, entity: EntityId, node: &str) -> Option<Mat4>;
}
