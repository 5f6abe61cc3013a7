use glam::{Mat4, Quat, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::input::{InputState, KeyCode, MouseButton, NamedKey};

const PITCH_LIMIT: f32 = std::f32::consts::FRAC_PI_2 - 0.01;

/// Perspective parameters shared by the camera and renderer settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    /// Vertical field of view in radians.
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Projection {
    fn default() -> Self {
        Self {
            fov_y: std::f32::consts::FRAC_PI_4,
            near: 0.1,
            far: 100.0,
        }
    }
}

/// Left-handed fly camera: +Z is forward at zero yaw, +Y is up.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    position: Vec3,
    yaw: f32,
    pitch: f32,
    projection_params: Projection,
    aspect: f32,
    view: Mat4,
    projection: Mat4,
}

impl Camera {
    pub fn new(position: Vec3, projection: Projection, aspect: f32) -> Self {
        let mut camera = Self {
            position,
            yaw: 0.0,
            pitch: 0.0,
            projection_params: projection,
            aspect: 1.0,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
        };
        camera.update_view_matrix();
        camera.update_projection(aspect);
        camera
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn set_orientation(&mut self, yaw: f32, pitch: f32) {
        self.yaw = yaw;
        self.pitch = pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    /// Adds to the current orientation; pitch stays just inside ±90°.
    pub fn rotate(&mut self, pitch_delta: f32, yaw_delta: f32) {
        self.set_orientation(self.yaw + yaw_delta, self.pitch + pitch_delta);
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    fn orientation(&self) -> Quat {
        Quat::from_rotation_y(self.yaw) * Quat::from_rotation_x(self.pitch)
    }

    pub fn forward(&self) -> Vec3 {
        self.orientation() * Vec3::Z
    }

    pub fn right(&self) -> Vec3 {
        self.orientation() * Vec3::X
    }

    /// Rebuilds the look-to view matrix from position and orientation.
    pub fn update_view_matrix(&mut self) -> Mat4 {
        self.view = Mat4::look_to_lh(self.position, self.forward(), Vec3::Y);
        self.view
    }

    /// Rebuilds the projection for a new output aspect ratio.
    pub fn update_projection(&mut self, aspect: f32) -> Mat4 {
        self.aspect = aspect.max(f32::EPSILON);
        let Projection { fov_y, near, far } = self.projection_params;
        self.projection = Mat4::perspective_lh(fov_y, self.aspect, near, far);
        self.projection
    }

    pub fn view(&self) -> Mat4 {
        self.view
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    /// Distance from the eye to the farthest corner of the near plane.
    ///
    /// A light volume closer than its radius plus this margin may be clipped
    /// by the near plane.
    pub fn near_plane_reach(&self) -> f32 {
        let Projection { fov_y, near, .. } = self.projection_params;
        let half_height = near * (fov_y * 0.5).tan();
        let half_width = half_height * self.aspect;
        (near * near + half_height * half_height + half_width * half_width).sqrt()
    }
}

/// Drives a [`Camera`] from keyboard and mouse state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraController {
    pub move_speed: f32,
    pub fast_multiplier: f32,
    pub mouse_sensitivity: f32,
}

impl Default for CameraController {
    fn default() -> Self {
        Self {
            move_speed: 3.0,
            fast_multiplier: 4.0,
            mouse_sensitivity: 0.005,
        }
    }
}

impl CameraController {
    pub fn update(&self, camera: &mut Camera, input: &InputState, delta_time: f32) {
        let drag = input.take_mouse_delta();
        if input.is_mouse_button_down(MouseButton::LEFT) {
            self.apply_drag(camera, drag);
        }

        let mut speed = self.move_speed * delta_time;
        if input.is_key_down(KeyCode::Named(NamedKey::LeftShift))
            || input.is_key_down(KeyCode::Named(NamedKey::RightShift))
        {
            speed *= self.fast_multiplier;
        }

        let mut offset = Vec3::ZERO;
        if input.is_key_down(KeyCode::Character('W')) {
            offset += camera.forward();
        }
        if input.is_key_down(KeyCode::Character('S')) {
            offset -= camera.forward();
        }
        if input.is_key_down(KeyCode::Character('D')) {
            offset += camera.right();
        }
        if input.is_key_down(KeyCode::Character('A')) {
            offset -= camera.right();
        }
        if input.is_key_down(KeyCode::Named(NamedKey::Space)) {
            offset += Vec3::Y;
        }
        if input.is_key_down(KeyCode::Character('X')) {
            offset -= Vec3::Y;
        }
        if offset != Vec3::ZERO {
            camera.set_position(camera.position() + offset * speed);
        }
    }

    fn apply_drag(&self, camera: &mut Camera, drag: Vec2) {
        if drag == Vec2::ZERO {
            return;
        }
        camera.rotate(
            drag.y * self.mouse_sensitivity,
            drag.x * self.mouse_sensitivity,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> Camera {
        Camera::new(Vec3::new(0.0, 1.0, -6.0), Projection::default(), 16.0 / 9.0)
    }

    #[test]
    fn default_orientation_looks_down_positive_z() {
        let camera = camera();
        assert!((camera.forward() - Vec3::Z).length() < 1e-6);
        let ahead = camera
            .view()
            .transform_point3(camera.position() + Vec3::Z * 2.0);
        assert!((ahead - Vec3::new(0.0, 0.0, 2.0)).length() < 1e-5);
    }

    #[test]
    fn projection_matches_aspect_ratio() {
        let mut camera = camera();
        for aspect in [1.0_f32, 4.0 / 3.0, 16.0 / 9.0, 0.5] {
            let projection = camera.update_projection(aspect);
            let ratio = projection.y_axis.y / projection.x_axis.x;
            assert!((ratio - aspect).abs() < 1e-5, "aspect {aspect} gave {ratio}");
        }
    }

    #[test]
    fn projection_round_trip_is_bit_exact() {
        let mut camera = camera();
        let original = camera.update_projection(1280.0 / 720.0);
        camera.update_projection(800.0 / 600.0);
        let restored = camera.update_projection(1280.0 / 720.0);
        assert_eq!(original.to_cols_array(), restored.to_cols_array());
    }

    #[test]
    fn pitch_is_clamped() {
        let mut camera = camera();
        camera.rotate(10.0, 0.0);
        assert!(camera.pitch() < std::f32::consts::FRAC_PI_2);
        camera.rotate(-20.0, 0.0);
        assert!(camera.pitch() > -std::f32::consts::FRAC_PI_2);
    }

    #[test]
    fn controller_moves_forward_and_rotates_on_drag() {
        let mut camera = camera();
        let input = InputState::new();
        let controller = CameraController::default();

        input.set_key_down(KeyCode::Character('W'));
        controller.update(&mut camera, &input, 1.0);
        assert!((camera.position() - Vec3::new(0.0, 1.0, -3.0)).length() < 1e-5);
        input.set_key_up(KeyCode::Character('W'));

        input.set_mouse_button_down(MouseButton::LEFT);
        input.add_mouse_delta(Vec2::new(100.0, 0.0));
        controller.update(&mut camera, &input, 0.0);
        assert!((camera.yaw() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn drag_without_button_is_discarded() {
        let mut camera = camera();
        let input = InputState::new();
        input.add_mouse_delta(Vec2::new(50.0, 50.0));
        CameraController::default().update(&mut camera, &input, 0.0);
        assert_eq!(camera.yaw(), 0.0);
        assert_eq!(input.take_mouse_delta(), Vec2::ZERO);
    }
}
