use glam::{EulerRot, Mat3, Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Position, Euler rotation and scale of a flat scene entity.
///
/// Rotation is in radians and applied roll (Z), then pitch (X), then yaw
/// (Y). The cached world matrix is only refreshed by
/// [`Transform::update_world_matrix`]; the scene update calls it for every
/// entity once per frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
    #[serde(skip, default = "identity")]
    world: Mat4,
}

fn identity() -> Mat4 {
    Mat4::IDENTITY
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
            world: Mat4::IDENTITY,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        let mut transform = Self {
            position,
            ..Self::default()
        };
        transform.update_world_matrix();
        transform
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn set_rotation(&mut self, rotation: Vec3) {
        self.rotation = rotation;
    }

    pub fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
    }

    /// Recomputes the world matrix as scale, then rotation, then translation.
    pub fn update_world_matrix(&mut self) -> Mat4 {
        self.world = compose(self.position, self.rotation, self.scale);
        self.world
    }

    /// World matrix as of the last [`Transform::update_world_matrix`] call.
    pub fn world_matrix(&self) -> Mat4 {
        self.world
    }

    /// Inverse-transpose of the world matrix for transforming normals.
    pub fn normal_matrix(&self) -> Mat4 {
        let linear = Mat3::from_mat4(self.world);
        if linear.determinant().abs() <= f32::EPSILON {
            return Mat4::IDENTITY;
        }
        Mat4::from_mat3(linear.inverse().transpose())
    }
}

fn compose(position: Vec3, rotation: Vec3, scale: Vec3) -> Mat4 {
    let rotation = Quat::from_euler(EulerRot::YXZ, rotation.y, rotation.x, rotation.z);
    Mat4::from_scale_rotation_translation(scale, rotation, position)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_transform_maps_origin_to_position() {
        for position in [
            Vec3::ZERO,
            Vec3::new(1.0, -2.0, 3.5),
            Vec3::new(-4.5, 0.0, 1e3),
        ] {
            let transform = Transform::from_position(position);
            let origin = transform.world_matrix().transform_point3(Vec3::ZERO);
            assert_eq!(origin, position);
        }
    }

    #[test]
    fn world_matrix_is_stale_until_updated() {
        let mut transform = Transform::default();
        transform.update_world_matrix();
        transform.set_position(Vec3::new(0.0, 5.0, 0.0));
        assert_eq!(transform.world_matrix(), Mat4::IDENTITY);
        transform.update_world_matrix();
        assert_eq!(
            transform.world_matrix().transform_point3(Vec3::ZERO),
            Vec3::new(0.0, 5.0, 0.0)
        );
    }

    #[test]
    fn scale_applies_before_translation() {
        let mut transform = Transform::default();
        transform.set_scale(Vec3::splat(2.0));
        transform.set_position(Vec3::new(1.0, 0.0, 0.0));
        transform.update_world_matrix();
        let point = transform.world_matrix().transform_point3(Vec3::X);
        assert!((point - Vec3::new(3.0, 0.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn roll_rotates_up_towards_negative_x() {
        let mut transform = Transform::default();
        transform.set_rotation(Vec3::new(0.0, 0.0, std::f32::consts::FRAC_PI_2));
        transform.update_world_matrix();
        let up = transform.world_matrix().transform_vector3(Vec3::Y);
        assert!((up - Vec3::new(-1.0, 0.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn normal_matrix_keeps_normals_perpendicular_under_non_uniform_scale() {
        let mut transform = Transform::default();
        transform.set_scale(Vec3::new(5.0, 0.01, 5.0));
        transform.update_world_matrix();
        let normal = transform
            .normal_matrix()
            .transform_vector3(Vec3::Y)
            .normalize();
        assert!((normal - Vec3::Y).length() < 1e-5);
    }
}
