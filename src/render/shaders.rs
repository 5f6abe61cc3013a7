//! WGSL sources for both passes.
//!
//! Bind groups are shared between the modules:
//! * group 0: [`FrameUniform`](super::uniforms::FrameUniform)
//! * geometry group 1: per-object matrices (dynamic offset)
//! * geometry group 2: material textures and sampler
//! * lighting group 1: G-buffer targets, read with `textureLoad`
//! * lighting group 2: per-light data (dynamic offset) and the directional light

pub(crate) const GEOMETRY: &str = r#"
struct Frame {
    view_proj: mat4x4<f32>,
    display: vec4<u32>,
}

struct Object {
    world: mat4x4<f32>,
    normal: mat4x4<f32>,
}

@group(0) @binding(0)
var<uniform> frame: Frame;

@group(1) @binding(0)
var<uniform> object: Object;

@group(2) @binding(0)
var diffuse_map: texture_2d<f32>;
@group(2) @binding(1)
var normal_map: texture_2d<f32>;
@group(2) @binding(2)
var material_sampler: sampler;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
    @location(3) tangent: vec3<f32>,
}

struct VertexOutput {
    @builtin(position) clip: vec4<f32>,
    @location(0) world_position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
    @location(3) tangent: vec3<f32>,
}

struct GBufferOutput {
    @location(0) position: vec4<f32>,
    @location(1) normal: vec4<f32>,
    @location(2) diffuse: vec4<f32>,
}

fn perturb_normal(normal: vec3<f32>, tangent: vec3<f32>, map: vec3<f32>) -> vec3<f32> {
    let n = normalize(normal);
    let projected = tangent - n * dot(n, tangent);
    if length(projected) < 1e-6 {
        return n;
    }
    let t = normalize(projected);
    let b = cross(n, t);
    let unpacked = map * 2.0 - vec3<f32>(1.0);
    return normalize(t * unpacked.x + b * unpacked.y + n * unpacked.z);
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let world_position = object.world * vec4<f32>(input.position, 1.0);
    out.clip = frame.view_proj * world_position;
    out.world_position = world_position.xyz;
    out.normal = (object.normal * vec4<f32>(input.normal, 0.0)).xyz;
    out.tangent = (object.world * vec4<f32>(input.tangent, 0.0)).xyz;
    out.uv = input.uv;
    return out;
}

@fragment
fn fs_main(input: VertexOutput) -> GBufferOutput {
    var out: GBufferOutput;
    let map = textureSample(normal_map, material_sampler, input.uv).xyz;
    out.position = vec4<f32>(input.world_position, 1.0);
    out.normal = vec4<f32>(perturb_normal(input.normal, input.tangent, map), 1.0);
    out.diffuse = textureSample(diffuse_map, material_sampler, input.uv);
    return out;
}
"#;

pub(crate) const LIGHTING: &str = r#"
struct Frame {
    view_proj: mat4x4<f32>,
    display: vec4<u32>,
}

struct Light {
    world: mat4x4<f32>,
    color: vec4<f32>,
    position_range: vec4<f32>,
    cone: vec4<f32>,
    spot: vec4<f32>,
}

struct Directional {
    diffuse: vec4<f32>,
    direction: vec4<f32>,
    ambient: vec4<f32>,
}

@group(0) @binding(0)
var<uniform> frame: Frame;

@group(1) @binding(0)
var gbuffer_position: texture_2d<f32>;
@group(1) @binding(1)
var gbuffer_normal: texture_2d<f32>;
@group(1) @binding(2)
var gbuffer_diffuse: texture_2d<f32>;

@group(2) @binding(0)
var<uniform> light: Light;
@group(2) @binding(1)
var<uniform> directional: Directional;

fn attenuation(dist: f32, range: f32) -> f32 {
    if range <= 0.0 {
        return 0.0;
    }
    let falloff = saturate(1.0 - dist / range);
    return falloff * falloff;
}

fn spot_factor(position: vec3<f32>) -> f32 {
    let offset = position - light.position_range.xyz;
    if length(offset) < 1e-6 {
        return 0.0;
    }
    let cos_theta = dot(normalize(offset), light.cone.xyz);
    let outer = light.cone.w;
    let inner = light.spot.x;
    let t = saturate((cos_theta - outer) / max(inner - outer, 1e-4));
    return t * t * (3.0 - 2.0 * t);
}

// Full-screen triangle on the far plane.
@vertex
fn vs_fullscreen(@builtin(vertex_index) index: u32) -> @builtin(position) vec4<f32> {
    let corner = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    return vec4<f32>(corner * 2.0 - 1.0, 1.0, 1.0);
}

@vertex
fn vs_volume(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return frame.view_proj * light.world * vec4<f32>(position, 1.0);
}

@fragment
fn fs_directional(@builtin(position) coord: vec4<f32>) -> @location(0) vec4<f32> {
    let pixel = vec2<i32>(coord.xy);
    let position = textureLoad(gbuffer_position, pixel, 0);
    if position.w == 0.0 {
        discard;
    }
    let normal = normalize(textureLoad(gbuffer_normal, pixel, 0).xyz);
    let albedo = textureLoad(gbuffer_diffuse, pixel, 0).xyz;
    let to_light = -normalize(directional.direction.xyz);
    let lambert = max(dot(normal, to_light), 0.0);
    let color = directional.ambient.xyz * albedo + lambert * directional.diffuse.xyz * albedo;
    return vec4<f32>(color, 1.0);
}

@fragment
fn fs_light(@builtin(position) coord: vec4<f32>) -> @location(0) vec4<f32> {
    let pixel = vec2<i32>(coord.xy);
    let position = textureLoad(gbuffer_position, pixel, 0);
    if position.w == 0.0 {
        return vec4<f32>(0.0);
    }
    let offset = light.position_range.xyz - position.xyz;
    let dist = length(offset);
    let atten = attenuation(dist, light.position_range.w);
    if atten == 0.0 {
        return vec4<f32>(0.0);
    }
    let normal = normalize(textureLoad(gbuffer_normal, pixel, 0).xyz);
    let albedo = textureLoad(gbuffer_diffuse, pixel, 0).xyz;
    var factor = max(dot(normal, offset / max(dist, 1e-6)), 0.0) * atten;
    if light.spot.y > 0.5 {
        factor = factor * spot_factor(position.xyz);
    }
    return vec4<f32>(factor * light.color.xyz * albedo, 0.0);
}

@fragment
fn fs_display(@builtin(position) coord: vec4<f32>) -> @location(0) vec4<f32> {
    let pixel = vec2<i32>(coord.xy);
    let position = textureLoad(gbuffer_position, pixel, 0);
    if position.w == 0.0 {
        discard;
    }
    var color = textureLoad(gbuffer_diffuse, pixel, 0).xyz;
    if frame.display.x == 0u {
        color = saturate(position.xyz);
    } else if frame.display.x == 1u {
        color = textureLoad(gbuffer_normal, pixel, 0).xyz * 0.5 + vec3<f32>(0.5);
    }
    return vec4<f32>(color, 1.0);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(source: &str) -> naga::Module {
        let module = naga::front::wgsl::parse_str(source).expect("shader parses");
        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::empty(),
        )
        .validate(&module)
        .expect("shader validates");
        module
    }

    fn entry_points(module: &naga::Module) -> Vec<&str> {
        module.entry_points.iter().map(|ep| ep.name.as_str()).collect()
    }

    #[test]
    fn geometry_module_exposes_material_shader_pair() {
        let module = validate(GEOMETRY);
        let names = entry_points(&module);
        let pair = crate::material::ShaderPair::GBUFFER;
        assert!(names.contains(&pair.vertex));
        assert!(names.contains(&pair.fragment));
    }

    #[test]
    fn lighting_module_exposes_every_program() {
        let module = validate(LIGHTING);
        let names = entry_points(&module);
        for name in [
            "vs_fullscreen",
            "vs_volume",
            "fs_directional",
            "fs_light",
            "fs_display",
        ] {
            assert!(names.contains(&name), "missing {name}");
        }
    }
}
