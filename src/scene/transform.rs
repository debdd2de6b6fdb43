// src/scene/transform.rs

use glam::{Mat4, Quat, Vec3};

/// Local-to-parent transform: position, rotation, scale.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Local matrix in scale-rotation-translation order.
    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_local_matrix() {
        assert_eq!(Transform::default().local_matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn test_srt_order() {
        let t = Transform {
            position: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::IDENTITY,
            scale: Vec3::splat(2.0),
        };
        let p = t.local_matrix().transform_point3(Vec3::ONE);
        // Scale applies before translation.
        assert_eq!(p, Vec3::new(3.0, 4.0, 5.0));
    }
}
