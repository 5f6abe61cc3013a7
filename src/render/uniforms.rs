use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use super::gbuffer::GBufferTarget;
use super::plan::{FramePlan, GeometryDraw, LightDraw};
use crate::light::{AmbientLight, DirectionalLight, VolumeLight};

/// Camera data shared by every pass.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FrameUniform {
    pub view_proj: [[f32; 4]; 4],
    /// `x` selects the G-buffer target shown by the display program.
    pub display: [u32; 4],
}

impl FrameUniform {
    pub fn new(plan: &FramePlan, display: Option<GBufferTarget>) -> Self {
        Self {
            view_proj: plan.view_projection.to_cols_array_2d(),
            display: [display.map_or(0, |target| target.slot() as u32), 0, 0, 0],
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ObjectUniform {
    pub world: [[f32; 4]; 4],
    pub normal: [[f32; 4]; 4],
}

impl From<&GeometryDraw> for ObjectUniform {
    fn from(draw: &GeometryDraw) -> Self {
        Self {
            world: draw.world.to_cols_array_2d(),
            normal: draw.normal.to_cols_array_2d(),
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LightUniform {
    pub world: [[f32; 4]; 4],
    pub color: [f32; 4],
    /// Position in `xyz`, range in `w`.
    pub position_range: [f32; 4],
    /// Cone axis in `xyz`, cosine of the half angle in `w`.
    pub cone: [f32; 4],
    /// `x`: cosine of the full-intensity angle, `y`: 1 for spot lights.
    pub spot: [f32; 4],
}

impl LightUniform {
    pub fn directional_placeholder() -> Self {
        Self {
            world: Mat4::IDENTITY.to_cols_array_2d(),
            ..Self::zeroed()
        }
    }
}

impl From<&LightDraw> for LightUniform {
    fn from(draw: &LightDraw) -> Self {
        let point = draw.light.point_light();
        let (cone, spot) = match &draw.light {
            VolumeLight::Point(_) => ([0.0, -1.0, 0.0, -1.0], [1.0, 0.0, 0.0, 0.0]),
            VolumeLight::Spot(spot) => (
                spot.cone_direction.extend(spot.cone_angle.cos()).into(),
                [(spot.cone_angle * 0.8).cos(), 1.0, 0.0, 0.0],
            ),
        };
        Self {
            world: draw.world.to_cols_array_2d(),
            color: point.diffuse_color.into(),
            position_range: point.position.extend(point.range).into(),
            cone,
            spot,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct DirectionalUniform {
    pub diffuse: [f32; 4],
    pub direction: [f32; 4],
    pub ambient: [f32; 4],
}

impl DirectionalUniform {
    pub fn new(light: &DirectionalLight, ambient: &AmbientLight) -> Self {
        Self {
            diffuse: light.diffuse_color.into(),
            direction: light.direction.extend(0.0).into(),
            ambient: ambient.ambient_color.into(),
        }
    }
}

/// Rounds `value` up to the next multiple of `align` (a power of two).
pub fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_sizes_match_wgsl_layouts() {
        assert_eq!(std::mem::size_of::<FrameUniform>(), 80);
        assert_eq!(std::mem::size_of::<ObjectUniform>(), 128);
        assert_eq!(std::mem::size_of::<LightUniform>(), 128);
        assert_eq!(std::mem::size_of::<DirectionalUniform>(), 48);
    }

    #[test]
    fn align_up_rounds_to_offset_alignment() {
        assert_eq!(align_up(128, 256), 256);
        assert_eq!(align_up(256, 256), 256);
        assert_eq!(align_up(257, 256), 512);
    }
}
