use std::fmt;
use std::str::FromStr;

use glam::Vec4;
use serde::{Deserialize, Serialize};

use crate::camera::Projection;

/// Vertical field of view limits, one degree short of each end of (0, pi).
pub const MIN_FOV_Y: f32 = std::f32::consts::PI / 180.0;
pub const MAX_FOV_Y: f32 = std::f32::consts::PI * 179.0 / 180.0;

/// How light volumes interact with the geometry depth buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LightDepthPolicy {
    /// Front faces tested `LessEqual` without writes; back faces with
    /// `Always` while the camera sits inside a volume.
    #[default]
    Test,
    /// Back faces with `Always` for every light.
    Disabled,
}

impl FromStr for LightDepthPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "test" | "on" => Ok(Self::Test),
            "off" | "disabled" => Ok(Self::Disabled),
            other => Err(format!("unknown light depth policy `{other}`, expected test or off")),
        }
    }
}

impl fmt::Display for LightDepthPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Test => "test",
            Self::Disabled => "off",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    pub background: Vec4,
    pub projection: Projection,
    /// Light volume radius as a multiple of the light's range.
    pub light_volume_scale: f32,
    pub light_depth: LightDepthPolicy,
    pub window_width: u32,
    pub window_height: u32,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            background: Vec4::new(0.6, 0.6, 0.6, 0.0),
            projection: Projection::default(),
            light_volume_scale: 1.15,
            light_depth: LightDepthPolicy::Test,
            window_width: 1280,
            window_height: 720,
        }
    }
}

impl RendererSettings {
    /// Returns a copy with out-of-range values pulled back into range.
    pub fn sanitized(mut self) -> Self {
        self.background = crate::light::clamp_color(self.background);
        self.light_volume_scale = self.light_volume_scale.max(1.0);
        self.projection.fov_y = if self.projection.fov_y.is_finite() {
            self.projection.fov_y.clamp(MIN_FOV_Y, MAX_FOV_Y)
        } else {
            Projection::default().fov_y
        };
        self.projection.near = self.projection.near.max(1e-4);
        self.projection.far = self.projection.far.max(self.projection.near * 2.0);
        self.window_width = self.window_width.max(1);
        self.window_height = self.window_height.max(1);
        self
    }

    pub fn aspect(&self) -> f32 {
        self.window_width as f32 / self.window_height.max(1) as f32
    }
}
