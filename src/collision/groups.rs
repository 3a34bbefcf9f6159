//! Collision filter groups.
//!
//! Every collision object carries a group (what it is) and a mask (what it
//! collides with). Two objects interact iff each one's group intersects the
//! other's mask.

use serde::{Deserialize, Serialize};

/// Bitfield of collision filter groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CollisionGroup(pub u32);

impl CollisionGroup {
    /// No groups.
    pub const NONE: Self = Self(0);

    /// Static world geometry (placed object meshes).
    pub const WORLD: Self = Self(1 << 0);

    /// Character capsules.
    pub const ACTOR: Self = Self(1 << 1);

    /// Terrain heightfield tiles.
    pub const HEIGHT_MAP: Self = Self(1 << 2);

    /// Projectiles.
    pub const PROJECTILE: Self = Self(1 << 3);

    /// The water surface plane.
    pub const WATER: Self = Self(1 << 4);

    /// Groups an actor capsule collides with by default. Water is added on
    /// top of this while the water-walking effect is active.
    pub const MASK_ACTOR_DEFAULT: Self =
        Self(Self::WORLD.0 | Self::ACTOR.0 | Self::HEIGHT_MAP.0);

    /// Groups that count as ground for trace-down queries.
    pub const MASK_GROUND: Self = Self(Self::WORLD.0 | Self::HEIGHT_MAP.0);

    /// Check if all of the given bits are set.
    #[inline]
    pub fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Check if any of the given bits are set.
    #[inline]
    pub fn intersects(self, other: Self) -> bool {
        (self.0 & other.0) != 0
    }

    /// Combine two group sets.
    #[inline]
    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Remove bits from this set.
    #[inline]
    pub fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }
}

impl std::ops::BitOr for CollisionGroup {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitAnd for CollisionGroup {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_operations() {
        let combined = CollisionGroup::WORLD | CollisionGroup::WATER;
        assert!(combined.contains(CollisionGroup::WORLD));
        assert!(combined.contains(CollisionGroup::WATER));
        assert!(!combined.contains(CollisionGroup::ACTOR));
        assert!(combined.intersects(CollisionGroup::WATER));
        assert!(!combined.intersects(CollisionGroup::HEIGHT_MAP));
    }

    #[test]
    fn actor_default_mask() {
        let mask = CollisionGroup::MASK_ACTOR_DEFAULT;
        assert!(mask.contains(CollisionGroup::WORLD));
        assert!(mask.contains(CollisionGroup::ACTOR));
        assert!(mask.contains(CollisionGroup::HEIGHT_MAP));
        assert!(!mask.contains(CollisionGroup::WATER));
        assert!(!mask.contains(CollisionGroup::PROJECTILE));
    }

    #[test]
    fn difference_removes_bits() {
        let mask = CollisionGroup::MASK_ACTOR_DEFAULT
            .union(CollisionGroup::WATER)
            .difference(CollisionGroup::WATER);
        assert_eq!(mask, CollisionGroup::MASK_ACTOR_DEFAULT);
    }
}
