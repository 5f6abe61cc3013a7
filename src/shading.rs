//! CPU mirror of the per-pixel math in the WGSL modules.
//!
//! Every function here has a counterpart of the same name in
//! `render::shaders`; keep the two in step.

use glam::{Vec2, Vec3, Vec4, Vec4Swizzles};

use crate::assets::DecodedTexture;
use crate::light::{AmbientLight, DirectionalLight, PointLight, SpotLight, VolumeLight};
use crate::material::{AddressMode, FilterMode, SamplerDesc};

/// Floor for the light-to-pixel distance before it divides the offset.
pub const MIN_LIGHT_DISTANCE: f32 = 1e-6;

/// One G-buffer pixel as the lighting pass reads it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GBufferSample {
    pub position: Vec3,
    pub normal: Vec3,
    pub albedo: Vec4,
}

/// `saturate(1 - d / range)^2`, exactly zero at and beyond `range`.
pub fn attenuation(distance: f32, range: f32) -> f32 {
    if range <= 0.0 {
        return 0.0;
    }
    let falloff = (1.0 - distance / range).clamp(0.0, 1.0);
    falloff * falloff
}

/// Ambient plus Lambert for the single directional light.
pub fn directional_term(
    sample: &GBufferSample,
    light: &DirectionalLight,
    ambient: &AmbientLight,
) -> Vec4 {
    let albedo = sample.albedo.xyz();
    let to_light = -light.direction.normalize_or_zero();
    let lambert = sample.normal.dot(to_light).max(0.0);
    let color = ambient.ambient_color.xyz() * albedo + lambert * light.diffuse_color.xyz() * albedo;
    color.extend(1.0)
}

pub fn point_term(sample: &GBufferSample, light: &PointLight) -> Vec4 {
    let offset = light.position - sample.position;
    let distance = offset.length();
    let atten = attenuation(distance, light.range);
    if atten == 0.0 {
        return Vec4::ZERO;
    }
    let lambert = sample.normal.dot(offset / distance.max(MIN_LIGHT_DISTANCE)).max(0.0);
    (lambert * atten * light.diffuse_color.xyz() * sample.albedo.xyz()).extend(0.0)
}

/// Smooth fade from full intensity inside 80% of the half angle to zero at
/// the cone edge.
pub fn spot_factor(light: &SpotLight, position: Vec3) -> f32 {
    let Some(to_pixel) = (position - light.point.position).try_normalize() else {
        return 0.0;
    };
    let cos_theta = to_pixel.dot(light.cone_direction);
    let outer = light.cone_angle.cos();
    let inner = (light.cone_angle * 0.8).cos();
    let t = ((cos_theta - outer) / (inner - outer).max(1e-4)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

pub fn volume_term(sample: &GBufferSample, light: &VolumeLight) -> Vec4 {
    match light {
        VolumeLight::Point(point) => point_term(sample, point),
        VolumeLight::Spot(spot) => point_term(sample, &spot.point) * spot_factor(spot, sample.position),
    }
}

/// Final backbuffer value for one pixel.
///
/// `sample` is `None` where no geometry was drawn; those pixels keep the
/// background. Covered pixels are overwritten by the directional term and
/// then accumulate every volume light. Additive blending into an 8-bit
/// target saturates each step, which for non-negative terms equals clamping
/// the total once.
pub fn shade_pixel(
    sample: Option<&GBufferSample>,
    background: Vec4,
    directional: &DirectionalLight,
    ambient: &AmbientLight,
    lights: &[VolumeLight],
) -> Vec4 {
    let Some(sample) = sample else {
        return background;
    };
    let total = lights
        .iter()
        .map(|light| volume_term(sample, light))
        .fold(directional_term(sample, directional, ambient), |acc, term| acc + term);
    total.clamp(Vec4::ZERO, Vec4::ONE)
}

pub fn srgb_to_linear(channel: f32) -> f32 {
    if channel <= 0.04045 {
        channel / 12.92
    } else {
        ((channel + 0.055) / 1.055).powf(2.4)
    }
}

fn texel(texture: &DecodedTexture, x: i64, y: i64, address: AddressMode) -> Vec4 {
    let (x, y) = match address {
        AddressMode::Wrap => (x, y),
        AddressMode::Clamp => (
            x.clamp(0, texture.width as i64 - 1),
            y.clamp(0, texture.height as i64 - 1),
        ),
    };
    let [r, g, b, a] = texture.texel(x, y);
    Vec4::new(
        srgb_to_linear(r as f32 / 255.0),
        srgb_to_linear(g as f32 / 255.0),
        srgb_to_linear(b as f32 / 255.0),
        a as f32 / 255.0,
    )
}

/// Diffuse value the geometry pass writes for a pixel whose interpolated
/// texture coordinate is `uv`. Depends on the covering entity's texture and
/// sampler only.
pub fn gbuffer_texel(texture: &DecodedTexture, sampler: &SamplerDesc, uv: Vec2) -> Vec4 {
    let size = Vec2::new(texture.width as f32, texture.height as f32);
    let coord = uv * size;
    match sampler.filter {
        FilterMode::Nearest => {
            let cell = coord.floor();
            texel(texture, cell.x as i64, cell.y as i64, sampler.address)
        }
        FilterMode::Linear => {
            let centred = coord - 0.5;
            let base = centred.floor();
            let frac = centred - base;
            let (x, y) = (base.x as i64, base.y as i64);
            let top = texel(texture, x, y, sampler.address)
                .lerp(texel(texture, x + 1, y, sampler.address), frac.x);
            let bottom = texel(texture, x, y + 1, sampler.address)
                .lerp(texel(texture, x + 1, y + 1, sampler.address), frac.x);
            top.lerp(bottom, frac.y)
        }
    }
}

/// Applies a tangent-space normal map sample (in `[0, 1]`) to a surface.
/// Without a usable tangent the surface normal is kept as is.
pub fn perturb_normal(normal: Vec3, tangent: Vec3, map: Vec3) -> Vec3 {
    let n = normal.normalize_or_zero();
    let projected = tangent - n * n.dot(tangent);
    if projected.length() < 1e-6 {
        return n;
    }
    let t = projected.normalize();
    let b = n.cross(t);
    let unpacked = map * 2.0 - Vec3::ONE;
    (t * unpacked.x + b * unpacked.y + n * unpacked.z).normalize_or_zero()
}
