use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroU64;

use log::debug;

use super::gbuffer::{GBufferLayout, GBufferTarget};
use super::shaders;
use super::state::{BlendMode, CullMode, DepthCompare, DepthState, PassState};
use super::uniforms::{DirectionalUniform, FrameUniform, LightUniform, ObjectUniform};
use crate::error::{RenderError, Result};
use crate::mesh::Vertex;

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
    0 => Float32x3,
    1 => Float32x3,
    2 => Float32x2,
    3 => Float32x3,
];

const VOLUME_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];

/// Shader entry points a pipeline is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Program {
    Geometry,
    Directional,
    LightVolume,
    Display,
}

impl Program {
    pub const ALL: [Self; 4] = [
        Self::Geometry,
        Self::Directional,
        Self::LightVolume,
        Self::Display,
    ];

    fn entry_points(self) -> (&'static str, &'static str) {
        match self {
            Self::Geometry => {
                let pair = crate::material::ShaderPair::GBUFFER;
                (pair.vertex, pair.fragment)
            }
            Self::Directional => ("vs_fullscreen", "fs_directional"),
            Self::LightVolume => ("vs_volume", "fs_light"),
            Self::Display => ("vs_fullscreen", "fs_display"),
        }
    }

    /// States a frame may request for this program.
    pub fn states(self) -> &'static [PassState] {
        match self {
            Self::Geometry => &[PassState::GEOMETRY],
            Self::Directional => &[PassState::DIRECTIONAL],
            Self::LightVolume => &[PassState::VOLUME_OUTSIDE, PassState::VOLUME_INSIDE],
            Self::Display => &[PassState::DISPLAY],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub program: Program,
    pub state: PassState,
}

impl fmt::Display for PipelineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} with {:?}", self.program, self.state)
    }
}

pub fn cull_face(mode: CullMode) -> Option<wgpu::Face> {
    match mode {
        CullMode::None => None,
        CullMode::Front => Some(wgpu::Face::Front),
        CullMode::Back => Some(wgpu::Face::Back),
    }
}

pub fn blend_state(mode: BlendMode) -> Option<wgpu::BlendState> {
    match mode {
        BlendMode::Replace => None,
        BlendMode::Additive => {
            let add = wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            };
            Some(wgpu::BlendState {
                color: add,
                alpha: add,
            })
        }
    }
}

pub fn compare_function(compare: DepthCompare) -> wgpu::CompareFunction {
    match compare {
        DepthCompare::Less => wgpu::CompareFunction::Less,
        DepthCompare::LessEqual => wgpu::CompareFunction::LessEqual,
        DepthCompare::Greater => wgpu::CompareFunction::Greater,
        DepthCompare::Always => wgpu::CompareFunction::Always,
    }
}

fn depth_stencil(format: wgpu::TextureFormat, depth: DepthState) -> wgpu::DepthStencilState {
    wgpu::DepthStencilState {
        format,
        depth_write_enabled: depth.write,
        depth_compare: compare_function(depth.compare),
        stencil: Default::default(),
        bias: Default::default(),
    }
}

fn uniform_entry<T>(binding: u32, dynamic: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: dynamic,
            min_binding_size: NonZeroU64::new(std::mem::size_of::<T>() as u64),
        },
        count: None,
    }
}

fn texture_entry(binding: u32, filterable: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

/// Bind group layouts shared by the pipelines and the resources bound to them.
pub struct BindLayouts {
    pub frame: wgpu::BindGroupLayout,
    pub object: wgpu::BindGroupLayout,
    pub material: wgpu::BindGroupLayout,
    pub gbuffer: wgpu::BindGroupLayout,
    pub light: wgpu::BindGroupLayout,
}

impl BindLayouts {
    pub fn new(device: &wgpu::Device, gbuffer: &GBufferLayout) -> Self {
        let frame = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("frame-bind-layout"),
            entries: &[uniform_entry::<FrameUniform>(0, false)],
        });
        let object = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("object-bind-layout"),
            entries: &[uniform_entry::<ObjectUniform>(0, true)],
        });
        let material = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("material-bind-layout"),
            entries: &[
                texture_entry(0, true),
                texture_entry(1, true),
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let gbuffer_entries = GBufferTarget::ALL
            .map(|target| texture_entry(target.slot() as u32, !gbuffer.requires_unfilterable(target)));
        let gbuffer = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("gbuffer-bind-layout"),
            entries: &gbuffer_entries,
        });
        let light = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("light-bind-layout"),
            entries: &[
                uniform_entry::<LightUniform>(0, true),
                uniform_entry::<DirectionalUniform>(1, false),
            ],
        });
        Self {
            frame,
            object,
            material,
            gbuffer,
            light,
        }
    }
}

/// Every pipeline a frame can ask for, built once up front.
pub struct PipelineCache {
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

impl PipelineCache {
    pub fn new(
        device: &wgpu::Device,
        layouts: &BindLayouts,
        gbuffer: &GBufferLayout,
        output_format: wgpu::TextureFormat,
    ) -> Self {
        let geometry_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("geometry-shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::GEOMETRY.into()),
        });
        let lighting_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("lighting-shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::LIGHTING.into()),
        });
        let geometry_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("geometry-pipeline-layout"),
            bind_group_layouts: &[&layouts.frame, &layouts.object, &layouts.material],
            push_constant_ranges: &[],
        });
        let lighting_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("lighting-pipeline-layout"),
            bind_group_layouts: &[&layouts.frame, &layouts.gbuffer, &layouts.light],
            push_constant_ranges: &[],
        });

        let gbuffer_targets: Vec<_> = gbuffer
            .color_formats()
            .iter()
            .map(|format| {
                Some(wgpu::ColorTargetState {
                    format: *format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })
            })
            .collect();

        let mut pipelines = HashMap::new();
        for program in Program::ALL {
            let (vertex_entry, fragment_entry) = program.entry_points();
            let (module, layout) = match program {
                Program::Geometry => (&geometry_module, &geometry_layout),
                _ => (&lighting_module, &lighting_layout),
            };
            let buffers: Vec<wgpu::VertexBufferLayout<'_>> = match program {
                Program::Geometry => vec![vertex_layout(&VERTEX_ATTRIBUTES)],
                Program::LightVolume => vec![vertex_layout(&VOLUME_ATTRIBUTES)],
                Program::Directional | Program::Display => Vec::new(),
            };
            for &state in program.states() {
                let surface_target = [Some(wgpu::ColorTargetState {
                    format: output_format,
                    blend: blend_state(state.blend),
                    write_mask: wgpu::ColorWrites::ALL,
                })];
                let targets: &[Option<wgpu::ColorTargetState>] = match program {
                    Program::Geometry => &gbuffer_targets,
                    _ => &surface_target,
                };
                let key = PipelineKey { program, state };
                let label = format!("{key}");
                let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some(&label),
                    layout: Some(layout),
                    vertex: wgpu::VertexState {
                        module,
                        entry_point: Some(vertex_entry),
                        compilation_options: Default::default(),
                        buffers: &buffers,
                    },
                    primitive: wgpu::PrimitiveState {
                        topology: wgpu::PrimitiveTopology::TriangleList,
                        front_face: wgpu::FrontFace::Cw,
                        cull_mode: cull_face(state.raster),
                        polygon_mode: wgpu::PolygonMode::Fill,
                        ..Default::default()
                    },
                    depth_stencil: Some(depth_stencil(gbuffer.depth, state.depth)),
                    multisample: wgpu::MultisampleState::default(),
                    fragment: Some(wgpu::FragmentState {
                        module,
                        entry_point: Some(fragment_entry),
                        compilation_options: Default::default(),
                        targets,
                    }),
                    multiview: None,
                    cache: None,
                });
                debug!("built pipeline {label}");
                pipelines.insert(key, pipeline);
            }
        }
        Self { pipelines }
    }

    pub fn get(&self, program: Program, state: PassState) -> Result<&wgpu::RenderPipeline> {
        let key = PipelineKey { program, state };
        self.pipelines
            .get(&key)
            .ok_or_else(|| RenderError::MissingPipeline(key.to_string()))
    }
}

fn vertex_layout(attributes: &[wgpu::VertexAttribute]) -> wgpu::VertexBufferLayout<'_> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_attributes_cover_the_whole_vertex() {
        let last = VERTEX_ATTRIBUTES[3];
        assert_eq!(
            last.offset + last.format.size(),
            std::mem::size_of::<Vertex>() as u64
        );
    }

    #[test]
    fn every_frame_state_has_a_program() {
        for state in PassState::ALL {
            assert!(
                Program::ALL.iter().any(|program| program.states().contains(&state)),
                "{state:?}"
            );
        }
    }

    #[test]
    fn volume_states_map_to_wgpu() {
        let outside = PassState::VOLUME_OUTSIDE;
        assert_eq!(cull_face(outside.raster), Some(wgpu::Face::Back));
        assert_eq!(compare_function(outside.depth.compare), wgpu::CompareFunction::LessEqual);

        let inside = PassState::VOLUME_INSIDE;
        assert_eq!(cull_face(inside.raster), Some(wgpu::Face::Front));
        assert_eq!(compare_function(inside.depth.compare), wgpu::CompareFunction::Always);

        let blend = blend_state(BlendMode::Additive).unwrap();
        assert_eq!(blend.color.src_factor, wgpu::BlendFactor::One);
        assert_eq!(blend.color.dst_factor, wgpu::BlendFactor::One);
        assert_eq!(blend.alpha.operation, wgpu::BlendOperation::Add);
        assert!(blend_state(BlendMode::Replace).is_none());
    }

    #[test]
    fn missing_key_names_program_and_state() {
        let key = PipelineKey {
            program: Program::Display,
            state: PassState::VOLUME_INSIDE,
        };
        assert!(key.to_string().starts_with("Display with"));
    }
}
