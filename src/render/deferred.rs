use std::marker::PhantomData;
use std::num::NonZeroU64;
use std::sync::Arc;

use bytemuck::Pod;
use glam::Vec4;
use log::{debug, trace};
use winit::window::Window;

use super::gbuffer::{GBuffer, GBufferLayout, GBufferTarget};
use super::gpu::{GpuContext, GpuResources};
use super::pipelines::{BindLayouts, PipelineCache, Program};
use super::plan::{FramePlan, LightingPlan};
use super::state::{PassContext, PassState, StateTracker, Viewport};
use super::uniforms::{align_up, DirectionalUniform, FrameUniform, LightUniform, ObjectUniform};
use crate::app::FrameRenderer;
use crate::assets::AssetProvider;
use crate::error::Result;
use crate::light::{AmbientLight, DirectionalLight};

fn wgpu_color(color: Vec4) -> wgpu::Color {
    wgpu::Color {
        r: color.x as f64,
        g: color.y as f64,
        b: color.z as f64,
        a: color.w as f64,
    }
}

fn load_op(clear: Option<Vec4>) -> wgpu::LoadOp<wgpu::Color> {
    clear.map_or(wgpu::LoadOp::Load, |color| wgpu::LoadOp::Clear(wgpu_color(color)))
}

fn set_viewport(pass: &mut wgpu::RenderPass<'_>, viewport: &Viewport) {
    pass.set_viewport(
        viewport.x,
        viewport.y,
        viewport.width,
        viewport.height,
        viewport.min_depth,
        viewport.max_depth,
    );
}

/// Array of `T` addressed with dynamic offsets, one slot per draw.
struct DynamicUniform<T> {
    label: &'static str,
    buffer: wgpu::Buffer,
    stride: u64,
    capacity: usize,
    staging: Vec<u8>,
    _marker: PhantomData<T>,
}

impl<T: Pod> DynamicUniform<T> {
    fn new(device: &wgpu::Device, label: &'static str, capacity: usize) -> Self {
        let alignment = device.limits().min_uniform_buffer_offset_alignment as usize;
        let stride = align_up(std::mem::size_of::<T>(), alignment) as u64;
        let capacity = capacity.max(1);
        Self {
            label,
            buffer: Self::allocate(device, label, stride, capacity),
            stride,
            capacity,
            staging: Vec::new(),
            _marker: PhantomData,
        }
    }

    fn allocate(device: &wgpu::Device, label: &str, stride: u64, capacity: usize) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: stride * capacity as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Grows the buffer to hold `count` slots. Returns true when the buffer
    /// was replaced and bind groups referencing it must be rebuilt.
    fn reserve(&mut self, device: &wgpu::Device, count: usize) -> bool {
        if count <= self.capacity {
            return false;
        }
        self.capacity = count.next_power_of_two();
        self.buffer = Self::allocate(device, self.label, self.stride, self.capacity);
        debug!("grew {} to {} slots", self.label, self.capacity);
        true
    }

    fn write(&mut self, queue: &wgpu::Queue, items: impl IntoIterator<Item = T>) {
        self.staging.clear();
        for item in items {
            let start = self.staging.len();
            self.staging.extend_from_slice(bytemuck::bytes_of(&item));
            self.staging.resize(start + self.stride as usize, 0);
        }
        if !self.staging.is_empty() {
            queue.write_buffer(&self.buffer, 0, &self.staging);
        }
    }

    fn offset(&self, index: usize) -> u32 {
        (index as u64 * self.stride) as u32
    }

    fn binding(&self) -> wgpu::BindingResource<'_> {
        wgpu::BindingResource::Buffer(wgpu::BufferBinding {
            buffer: &self.buffer,
            offset: 0,
            size: NonZeroU64::new(std::mem::size_of::<T>() as u64),
        })
    }
}

/// Two-pass renderer: geometry into the G-buffer, then lighting into the
/// swap chain image.
pub struct DeferredRenderer {
    gpu: GpuContext,
    resources: GpuResources,
    layouts: BindLayouts,
    pipelines: PipelineCache,
    gbuffer: GBuffer,
    gbuffer_bind_group: wgpu::BindGroup,
    frame_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    objects: DynamicUniform<ObjectUniform>,
    object_bind_group: wgpu::BindGroup,
    lights: DynamicUniform<LightUniform>,
    directional_buffer: wgpu::Buffer,
    light_bind_group: wgpu::BindGroup,
    tracker: StateTracker,
}

impl DeferredRenderer {
    /// Renders into `window`'s surface.
    pub async fn new(window: Arc<Window>) -> Result<Self> {
        let layout = GBufferLayout::default();
        let gpu = GpuContext::new(window, &layout).await?;
        Ok(Self::with_context(gpu, layout))
    }

    /// Renders into an offscreen texture read with [`GpuContext::read_pixels`].
    pub async fn headless(width: u32, height: u32) -> Result<Self> {
        let layout = GBufferLayout::default();
        let gpu = GpuContext::headless(&layout, width, height).await?;
        Ok(Self::with_context(gpu, layout))
    }

    fn with_context(gpu: GpuContext, layout: GBufferLayout) -> Self {
        let device = &gpu.device;

        let layouts = BindLayouts::new(device, &layout);
        let pipelines = PipelineCache::new(device, &layouts, &layout, gpu.output_format());
        let resources = GpuResources::new(&gpu, layouts.material.clone());

        let size = gpu.size();
        let gbuffer = GBuffer::new(device, layout, size.width, size.height);
        let gbuffer_bind_group = gbuffer_bind_group(device, &layouts, &gbuffer);

        let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frame-uniform"),
            size: std::mem::size_of::<FrameUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("frame-bind-group"),
            layout: &layouts.frame,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_buffer.as_entire_binding(),
            }],
        });

        let objects = DynamicUniform::new(device, "object-uniforms", 64);
        let object_bind_group = object_bind_group(device, &layouts, &objects);

        let lights = DynamicUniform::new(device, "light-uniforms", 16);
        let directional_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("directional-uniform"),
            size: std::mem::size_of::<DirectionalUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let light_bind_group = light_bind_group(device, &layouts, &lights, &directional_buffer);

        Self {
            gpu,
            resources,
            layouts,
            pipelines,
            gbuffer,
            gbuffer_bind_group,
            frame_buffer,
            frame_bind_group,
            objects,
            object_bind_group,
            lights,
            directional_buffer,
            light_bind_group,
            tracker: StateTracker::new(),
        }
    }

    pub fn gpu(&self) -> &GpuContext {
        &self.gpu
    }

    fn upload(&mut self, plan: &FramePlan) {
        let display = match &plan.lighting {
            LightingPlan::Display(target) => Some(*target),
            LightingPlan::Lit { .. } => None,
        };
        self.gpu.queue.write_buffer(
            &self.frame_buffer,
            0,
            bytemuck::bytes_of(&FrameUniform::new(plan, display)),
        );

        if self.objects.reserve(&self.gpu.device, plan.geometry.len()) {
            self.object_bind_group = object_bind_group(&self.gpu.device, &self.layouts, &self.objects);
        }
        self.objects
            .write(&self.gpu.queue, plan.geometry.iter().map(ObjectUniform::from));

        let (directional, ambient) = match &plan.lighting {
            LightingPlan::Lit {
                directional,
                ambient,
                volumes,
            } => {
                if self.lights.reserve(&self.gpu.device, volumes.len()) {
                    self.light_bind_group = light_bind_group(
                        &self.gpu.device,
                        &self.layouts,
                        &self.lights,
                        &self.directional_buffer,
                    );
                }
                let uniforms: Vec<LightUniform> = if volumes.is_empty() {
                    vec![LightUniform::directional_placeholder()]
                } else {
                    volumes.iter().map(LightUniform::from).collect()
                };
                self.lights.write(&self.gpu.queue, uniforms);
                (*directional, *ambient)
            }
            LightingPlan::Display(_) => (DirectionalLight::off(), AmbientLight::default()),
        };
        self.gpu.queue.write_buffer(
            &self.directional_buffer,
            0,
            bytemuck::bytes_of(&DirectionalUniform::new(&directional, &ambient)),
        );
    }

    fn encode_geometry(&mut self, encoder: &mut wgpu::CommandEncoder, plan: &FramePlan) -> Result<()> {
        let scope = self.tracker.acquire(PassContext {
            label: "geometry",
            viewport: self.gbuffer.viewport(),
            clear: Some(plan.background),
            state: PassState::GEOMETRY,
        });
        let clear = scope.context().clear;
        // w = 0 marks pixels no geometry covered.
        let marker = clear.map(|color| color.truncate().extend(0.0));
        let attachments: Vec<_> = GBufferTarget::ALL
            .iter()
            .map(|target| {
                let load = match target {
                    GBufferTarget::Diffuse => load_op(clear),
                    GBufferTarget::Position | GBufferTarget::Normal => load_op(marker),
                };
                Some(wgpu::RenderPassColorAttachment {
                    view: self.gbuffer.view(*target),
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                })
            })
            .collect();

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(scope.context().label),
            color_attachments: &attachments,
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: self.gbuffer.depth_view(),
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        set_viewport(&mut pass, &scope.context().viewport);
        pass.set_pipeline(self.pipelines.get(Program::Geometry, scope.state())?);
        pass.set_bind_group(0, &self.frame_bind_group, &[]);

        for (index, draw) in plan.geometry.iter().enumerate() {
            let mesh = self.resources.mesh(draw.mesh.handle)?;
            pass.set_bind_group(1, &self.object_bind_group, &[self.objects.offset(index)]);
            pass.set_bind_group(2, self.resources.material(draw.material)?, &[]);
            pass.set_vertex_buffer(0, mesh.vertex.slice(..));
            pass.set_index_buffer(mesh.index.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..mesh.index_count, 0, 0..1);
        }
        Ok(())
    }

    fn encode_lighting(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        plan: &FramePlan,
    ) -> Result<()> {
        let (label, initial) = match &plan.lighting {
            LightingPlan::Lit { .. } => ("lighting", PassState::DIRECTIONAL),
            LightingPlan::Display(_) => ("display", PassState::DISPLAY),
        };
        let mut scope = self.tracker.acquire(PassContext {
            label,
            viewport: self.gbuffer.viewport(),
            clear: Some(plan.background),
            state: initial,
        });
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: load_op(scope.context().clear),
                    store: wgpu::StoreOp::Store,
                },
            })],
            // Read-only: tested against, never written.
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: self.gbuffer.depth_view(),
                depth_ops: None,
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        set_viewport(&mut pass, &scope.context().viewport);
        pass.set_bind_group(0, &self.frame_bind_group, &[]);
        pass.set_bind_group(1, &self.gbuffer_bind_group, &[]);
        pass.set_bind_group(2, &self.light_bind_group, &[self.lights.offset(0)]);

        match &plan.lighting {
            LightingPlan::Display(_) => {
                pass.set_pipeline(self.pipelines.get(Program::Display, scope.state())?);
                pass.draw(0..3, 0..1);
            }
            LightingPlan::Lit { volumes, .. } => {
                pass.set_pipeline(self.pipelines.get(Program::Directional, scope.state())?);
                pass.draw(0..3, 0..1);

                for (index, volume) in volumes.iter().enumerate() {
                    let state = scope.transition(volume.state);
                    let mesh = self.resources.mesh(volume.mesh.handle)?;
                    pass.set_pipeline(self.pipelines.get(Program::LightVolume, state)?);
                    pass.set_bind_group(2, &self.light_bind_group, &[self.lights.offset(index)]);
                    pass.set_vertex_buffer(0, mesh.vertex.slice(..));
                    pass.set_index_buffer(mesh.index.slice(..), wgpu::IndexFormat::Uint32);
                    pass.draw_indexed(0..mesh.index_count, 0, 0..1);
                }
            }
        }
        Ok(())
    }
}

impl FrameRenderer for DeferredRenderer {
    fn assets(&mut self) -> &mut dyn AssetProvider {
        &mut self.resources
    }

    fn resize(&mut self, width: u32, height: u32) {
        if !self.gpu.resize(width, height) || self.gbuffer.size() == (width, height) {
            return;
        }
        let layout = *self.gbuffer.layout();
        self.gbuffer = GBuffer::new(&self.gpu.device, layout, width, height);
        self.gbuffer_bind_group = gbuffer_bind_group(&self.gpu.device, &self.layouts, &self.gbuffer);
        debug!("G-buffer resized to {width}x{height}");
    }

    fn draw(&mut self, plan: &FramePlan) -> Result<()> {
        let output = match self.gpu.current_frame() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.gpu.reconfigure();
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };
        let view = output.view();

        self.upload(plan);
        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame-encoder"),
            });
        self.encode_geometry(&mut encoder, plan)?;
        self.encode_lighting(&mut encoder, &view, plan)?;
        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        trace!(
            "frame: {} geometry draws, {} light volumes, {} state changes",
            plan.geometry.len(),
            plan.volume_count(),
            self.tracker.transitions()
        );
        Ok(())
    }
}

fn gbuffer_bind_group(device: &wgpu::Device, layouts: &BindLayouts, gbuffer: &GBuffer) -> wgpu::BindGroup {
    let entries = GBufferTarget::ALL.map(|target| wgpu::BindGroupEntry {
        binding: target.slot() as u32,
        resource: wgpu::BindingResource::TextureView(gbuffer.view(target)),
    });
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("gbuffer-bind-group"),
        layout: &layouts.gbuffer,
        entries: &entries,
    })
}

fn object_bind_group(
    device: &wgpu::Device,
    layouts: &BindLayouts,
    objects: &DynamicUniform<ObjectUniform>,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("object-bind-group"),
        layout: &layouts.object,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: objects.binding(),
        }],
    })
}

fn light_bind_group(
    device: &wgpu::Device,
    layouts: &BindLayouts,
    lights: &DynamicUniform<LightUniform>,
    directional: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("light-bind-group"),
        layout: &layouts.light,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: lights.binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: directional.as_entire_binding(),
            },
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_without_a_clear_color_keep_their_targets() {
        assert_eq!(load_op(None), wgpu::LoadOp::Load);
        assert_eq!(
            load_op(Some(Vec4::new(0.25, 0.5, 1.0, 0.0))),
            wgpu::LoadOp::Clear(wgpu::Color {
                r: 0.25,
                g: 0.5,
                b: 1.0,
                a: 0.0,
            })
        );
    }
}
