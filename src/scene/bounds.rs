// src/scene/bounds.rs
//! Axis-aligned bounds and world-space bounding volumes.

use glam::{Mat4, Vec3};

/// Local-space axis-aligned bounding box.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Unit cube centered at the origin, used for entities without a mesh.
    pub const UNIT: Aabb = Aabb {
        min: Vec3::new(-0.5, -0.5, -0.5),
        max: Vec3::new(0.5, 0.5, 0.5),
    };

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn corners(&self) -> [Vec3; 8] {
        let (mn, mx) = (self.min, self.max);
        [
            Vec3::new(mn.x, mn.y, mn.z),
            Vec3::new(mx.x, mn.y, mn.z),
            Vec3::new(mn.x, mx.y, mn.z),
            Vec3::new(mx.x, mx.y, mn.z),
            Vec3::new(mn.x, mn.y, mx.z),
            Vec3::new(mx.x, mn.y, mx.z),
            Vec3::new(mn.x, mx.y, mx.z),
            Vec3::new(mx.x, mx.y, mx.z),
        ]
    }
}

/// World-space bounding volume: sphere (center, radius) plus box (min, max).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct WorldBounds {
    pub center: Vec3,
    pub radius: f32,
    pub min: Vec3,
    pub max: Vec3,
}

impl WorldBounds {
    /// Transform a local AABB by a world matrix. The transformed corners are
    /// symmetric around the transformed center for any affine matrix, so the
    /// resulting box midpoint equals `world * local_center`.
    pub fn from_local(local: &Aabb, world: &Mat4) -> Self {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for corner in local.corners() {
            let p = world.transform_point3(corner);
            min = min.min(p);
            max = max.max(p);
        }
        let center = (min + max) * 0.5;
        let radius = (max - center).length();
        Self {
            center,
            radius,
            min,
            max,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    #[test]
    fn test_translated_bounds() {
        let world = Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0));
        let b = WorldBounds::from_local(&Aabb::UNIT, &world);
        assert_eq!(b.center, Vec3::new(10.0, 0.0, 0.0));
        assert!((b.radius - Aabb::UNIT.max.length()).abs() < 1e-5);
    }

    #[test]
    fn test_rotated_center_is_transformed_center() {
        let local = Aabb::new(Vec3::new(1.0, 2.0, 3.0), Vec3::new(3.0, 4.0, 5.0));
        let world = Mat4::from_rotation_translation(
            Quat::from_rotation_y(0.7),
            Vec3::new(-4.0, 2.0, 9.0),
        );
        let b = WorldBounds::from_local(&local, &world);
        let expected = world.transform_point3(local.center());
        assert!((b.center - expected).length() < 1e-4);
    }
}
