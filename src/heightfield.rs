//! Terrain heightfield tiles.
//!
//! Each tile covers one terrain square of N×N height samples spaced
//! `tri_size` apart. The collider is a triangle mesh built directly in
//! world orientation (Z-up), centered on the tile so the placement
//! transform is the tile's midpoint at the mean of its height range.
//! Cells alternate their split diagonal by parity, matching the terrain
//! renderer's diamond tessellation.

use parry3d::shape::SharedShape;

use crate::collision::{CollisionGroup, CollisionWorld, ObjectHandle, Owner, WorldShape};
use crate::math;
use glam::Vec3;

/// One terrain tile's collider.
pub struct HeightField {
    handle: ObjectHandle,
}

impl HeightField {
    /// Build and place the collider for tile (`x`, `y`).
    ///
    /// `heights` holds `sqrt_verts * sqrt_verts` samples, row-major with
    /// rows along Y.
    pub fn new(
        world: &mut CollisionWorld,
        heights: &[f32],
        x: i32,
        y: i32,
        tri_size: f32,
        sqrt_verts: usize,
    ) -> Self {
        let n = sqrt_verts;
        debug_assert!(n >= 2, "a heightfield tile needs at least a 2x2 grid");
        debug_assert_eq!(heights.len(), n * n);

        let mut min_height = heights[0];
        let mut max_height = heights[0];
        for &h in &heights[1..] {
            min_height = min_height.min(h);
            max_height = max_height.max(h);
        }
        let mid_height = (min_height + max_height) * 0.5;

        let half_span = (n - 1) as f32 * 0.5;
        let mut vertices = Vec::with_capacity(n * n);
        for row in 0..n {
            for col in 0..n {
                vertices.push(math::to_point(Vec3::new(
                    (col as f32 - half_span) * tri_size,
                    (row as f32 - half_span) * tri_size,
                    heights[row * n + col] - mid_height,
                )));
            }
        }

        let mut indices = Vec::with_capacity((n - 1) * (n - 1) * 2);
        for row in 0..n - 1 {
            for col in 0..n - 1 {
                let i00 = (row * n + col) as u32;
                let i10 = i00 + 1;
                let i01 = i00 + n as u32;
                let i11 = i01 + 1;
                if (row + col) % 2 == 0 {
                    indices.push([i00, i10, i11]);
                    indices.push([i00, i11, i01]);
                } else {
                    indices.push([i00, i10, i01]);
                    indices.push([i10, i11, i01]);
                }
            }
        }

        let shape = SharedShape::trimesh(vertices, indices);

        let center = Vec3::new(
            (x as f32 + 0.5) * tri_size * (n - 1) as f32,
            (y as f32 + 0.5) * tri_size * (n - 1) as f32,
            mid_height,
        );
        let handle = world.add(
            WorldShape::Solid(shape),
            math::translation_isometry(center),
            CollisionGroup::HEIGHT_MAP,
            CollisionGroup::ACTOR | CollisionGroup::PROJECTILE,
            Owner::Terrain { x, y },
        );

        Self { handle }
    }

    pub fn handle(&self) -> ObjectHandle {
        self.handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::trace;

    #[test]
    fn flat_tile_sits_at_its_heights() {
        let mut world = CollisionWorld::new();
        let heights = vec![10.0; 5 * 5];
        HeightField::new(&mut world, &heights, 0, 0, 10.0, 5);

        // Tile (0,0) with 5 verts at spacing 10 spans [0, 40]².
        let hit = trace::ray_ground(
            &world,
            Vec3::new(20.0, 20.0, 100.0),
            Vec3::new(20.0, 20.0, -100.0),
        )
        .expect("ray should hit the tile");
        assert!((hit.point.z - 10.0).abs() < 1.0e-2, "hit z {}", hit.point.z);
        assert!(hit.normal.z > 0.99);
    }

    #[test]
    fn tile_offset_follows_tile_coordinates() {
        let mut world = CollisionWorld::new();
        let heights = vec![0.0; 5 * 5];
        HeightField::new(&mut world, &heights, 1, -1, 10.0, 5);

        // Tile (1,-1) spans x ∈ [40, 80], y ∈ [-40, 0].
        assert!(trace::ray_ground(
            &world,
            Vec3::new(60.0, -20.0, 50.0),
            Vec3::new(60.0, -20.0, -50.0),
        )
        .is_some());
        assert!(trace::ray_ground(
            &world,
            Vec3::new(20.0, 20.0, 50.0),
            Vec3::new(20.0, 20.0, -50.0),
        )
        .is_none());
    }

    #[test]
    fn sloped_tile_reports_tilted_normal() {
        let mut world = CollisionWorld::new();
        let n = 5;
        let tri = 10.0;
        // Rise of one unit per unit of y: a 45 degree ramp.
        let mut heights = Vec::with_capacity(n * n);
        for row in 0..n {
            for _col in 0..n {
                heights.push(row as f32 * tri);
            }
        }
        HeightField::new(&mut world, &heights, 0, 0, tri, n);

        let hit = trace::ray_ground(
            &world,
            Vec3::new(20.0, 20.0, 100.0),
            Vec3::new(20.0, 20.0, -100.0),
        )
        .expect("ray should hit the ramp");
        let slope = crate::math::slope_degrees(hit.normal);
        assert!((slope - 45.0).abs() < 1.0, "slope {slope}");
    }
}
