// src/camera.rs
//! View/projection state and frustum culling.

use glam::{Mat4, Vec3, Vec4, Vec4Swizzles};

/// One plane of the view frustum, `normal . p + d >= 0` on the inside.
#[derive(Copy, Clone, Debug)]
struct Plane {
    normal: Vec3,
    d: f32,
}

impl Plane {
    fn from_row(row: Vec4) -> Self {
        let len = row.xyz().length();
        Self {
            normal: row.xyz() / len,
            d: row.w / len,
        }
    }

    fn distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.d
    }
}

/// The six planes of a view-projection matrix, extracted per Gribb-Hartmann.
#[derive(Copy, Clone, Debug)]
pub struct Frustum {
    planes: [Plane; 6],
}

impl Frustum {
    pub fn from_view_projection(view_proj: &Mat4) -> Self {
        let r = view_proj.transpose();
        let (r0, r1, r2, r3) = (r.x_axis, r.y_axis, r.z_axis, r.w_axis);
        Self {
            planes: [
                Plane::from_row(r3 + r0), // left
                Plane::from_row(r3 - r0), // right
                Plane::from_row(r3 + r1), // bottom
                Plane::from_row(r3 - r1), // top
                Plane::from_row(r3 + r2), // near
                Plane::from_row(r3 - r2), // far
            ],
        }
    }

    /// Conservative sphere test: true unless the sphere is fully outside
    /// some plane.
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.planes.iter().all(|p| p.distance(center) >= -radius)
    }
}

/// Camera state for one frame. The pipeline snapshots it in `set_camera`.
#[derive(Copy, Clone, Debug)]
pub struct Camera {
    pub view: Mat4,
    pub projection: Mat4,
    pub position: Vec3,
}

impl Camera {
    pub fn new(view: Mat4, projection: Mat4) -> Self {
        let position = view.inverse().w_axis.xyz();
        Self {
            view,
            projection,
            position,
        }
    }

    pub fn look_at(eye: Vec3, target: Vec3, up: Vec3, projection: Mat4) -> Self {
        Self {
            view: Mat4::look_at_rh(eye, target, up),
            projection,
            position: eye,
        }
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    pub fn frustum(&self) -> Frustum {
        Frustum::from_view_projection(&self.view_projection())
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            projection: Mat4::perspective_rh(std::f32::consts::FRAC_PI_3, 16.0 / 9.0, 0.1, 1000.0),
            position: Vec3::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_camera() -> Camera {
        Camera::look_at(
            Vec3::new(0.0, 0.0, 10.0),
            Vec3::ZERO,
            Vec3::Y,
            Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 100.0),
        )
    }

    #[test]
    fn test_sphere_in_front_is_visible() {
        let frustum = test_camera().frustum();
        assert!(frustum.intersects_sphere(Vec3::ZERO, 1.0));
    }

    #[test]
    fn test_sphere_behind_camera_is_culled() {
        let frustum = test_camera().frustum();
        assert!(!frustum.intersects_sphere(Vec3::new(0.0, 0.0, 50.0), 1.0));
    }

    #[test]
    fn test_sphere_straddling_plane_is_kept() {
        let frustum = test_camera().frustum();
        // Center beyond the far plane, radius reaching back inside.
        assert!(frustum.intersects_sphere(Vec3::new(0.0, 0.0, -101.0), 5.0));
    }

    #[test]
    fn test_position_recovered_from_view() {
        let eye = Vec3::new(3.0, 4.0, 5.0);
        let view = Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y);
        let camera = Camera::new(view, Mat4::IDENTITY);
        assert!((camera.position - eye).length() < 1e-4);
    }
}
