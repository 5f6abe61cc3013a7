use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// Clamps every channel into `[0, 1]` so additive accumulation stays stable.
pub fn clamp_color(color: Vec4) -> Vec4 {
    color.clamp(Vec4::ZERO, Vec4::ONE)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DirectionalLight {
    pub diffuse_color: Vec4,
    pub direction: Vec3,
}

impl DirectionalLight {
    pub fn new(diffuse_color: Vec4, direction: Vec3) -> Self {
        Self {
            diffuse_color: clamp_color(diffuse_color),
            direction,
        }
    }

    /// A light that contributes nothing; the directional draw still runs.
    pub fn off() -> Self {
        Self::new(Vec4::ZERO, Vec3::NEG_Y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmbientLight {
    pub ambient_color: Vec4,
}

impl AmbientLight {
    pub fn new(ambient_color: Vec4) -> Self {
        Self {
            ambient_color: clamp_color(ambient_color),
        }
    }
}

impl Default for AmbientLight {
    fn default() -> Self {
        Self::new(Vec4::new(0.1, 0.1, 0.1, 1.0))
    }
}

/// Omni light whose contribution reaches zero at `range`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointLight {
    pub diffuse_color: Vec4,
    pub position: Vec3,
    pub range: f32,
    /// Unused by the shading model; kept for layout parity with spot lights.
    pub direction: Vec3,
    pub padding: f32,
}

impl PointLight {
    pub fn new(diffuse_color: Vec4, position: Vec3, range: f32) -> Self {
        Self {
            diffuse_color: clamp_color(diffuse_color),
            position,
            range: range.max(0.0),
            direction: Vec3::Y,
            padding: 0.0,
        }
    }
}

/// Point light restricted to a cone around `cone_direction`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpotLight {
    pub point: PointLight,
    pub cone_direction: Vec3,
    /// Half angle of the cone in radians.
    pub cone_angle: f32,
}

impl SpotLight {
    pub fn new(point: PointLight, cone_direction: Vec3, cone_angle: f32) -> Self {
        Self {
            point,
            cone_direction: cone_direction.normalize_or_zero(),
            cone_angle: cone_angle.clamp(0.0, std::f32::consts::PI),
        }
    }
}

/// Any light rendered through a light volume.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum VolumeLight {
    Point(PointLight),
    Spot(SpotLight),
}

impl VolumeLight {
    pub fn point_light(&self) -> &PointLight {
        match self {
            Self::Point(light) => light,
            Self::Spot(spot) => &spot.point,
        }
    }

    pub fn point_light_mut(&mut self) -> &mut PointLight {
        match self {
            Self::Point(light) => light,
            Self::Spot(spot) => &mut spot.point,
        }
    }

    pub fn is_spot(&self) -> bool {
        matches!(self, Self::Spot(_))
    }

    /// Pulls color and range back into range after direct field edits.
    pub fn sanitized(mut self) -> Self {
        let point = self.point_light_mut();
        point.diffuse_color = clamp_color(point.diffuse_color);
        point.range = point.range.max(0.0);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_clamp_colors() {
        let light = PointLight::new(Vec4::new(2.0, -1.0, 0.5, 1.0), Vec3::ZERO, 5.0);
        assert_eq!(light.diffuse_color, Vec4::new(1.0, 0.0, 0.5, 1.0));
        let ambient = AmbientLight::new(Vec4::splat(3.0));
        assert_eq!(ambient.ambient_color, Vec4::ONE);
    }

    #[test]
    fn negative_range_becomes_zero() {
        let light = PointLight::new(Vec4::ONE, Vec3::ZERO, -2.0);
        assert_eq!(light.range, 0.0);
    }

    #[test]
    fn spot_light_exposes_its_point_parameters() {
        let point = PointLight::new(Vec4::ONE, Vec3::new(0.0, 2.0, 0.0), 10.0);
        let mut light = VolumeLight::Spot(SpotLight::new(point, Vec3::new(0.0, -2.0, 0.0), 0.5));
        assert!(light.is_spot());
        light.point_light_mut().range = 4.0;
        assert_eq!(light.point_light().range, 4.0);
        if let VolumeLight::Spot(spot) = light {
            assert_eq!(spot.cone_direction, Vec3::NEG_Y);
        }
    }
}
