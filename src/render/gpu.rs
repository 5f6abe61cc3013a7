use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info};
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::{Window, WindowId};

use super::gbuffer::GBufferLayout;
use super::uniforms::align_up;
use crate::assets::{AssetProvider, MeshSource, TextureSource, TextureUsage};
use crate::error::{RenderError, Result};
use crate::material::{
    AddressMode, FilterMode, Material, MaterialHandle, MeshHandle, SamplerDesc, SamplerHandle,
    TextureHandle,
};
use crate::mesh::{MeshData, MeshRef};

/// Where the lighting pass writes its final image.
enum OutputTarget {
    Window {
        window: Arc<Window>,
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
    },
    Offscreen {
        texture: wgpu::Texture,
        format: wgpu::TextureFormat,
    },
}

/// Image the lighting pass renders into for one frame.
pub(crate) enum OutputFrame {
    Surface(wgpu::SurfaceTexture),
    Offscreen(wgpu::Texture),
}

impl OutputFrame {
    pub fn view(&self) -> wgpu::TextureView {
        let texture = match self {
            Self::Surface(frame) => &frame.texture,
            Self::Offscreen(texture) => texture,
        };
        texture.create_view(&wgpu::TextureViewDescriptor::default())
    }

    pub fn present(self) {
        if let Self::Surface(frame) = self {
            frame.present();
        }
    }
}

/// Device and queue plus the output they render to: a window surface or
/// an offscreen texture that can be read back.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    target: OutputTarget,
    size: PhysicalSize<u32>,
}

impl GpuContext {
    /// Creates the surface and a device whose limits fit `gbuffer`.
    pub async fn new(window: Arc<Window>, gbuffer: &GBufferLayout) -> Result<Self> {
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Err(RenderError::ZeroSizedWindow);
        }

        let instance = create_instance();
        let surface = instance.create_surface(Arc::clone(&window))?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;
        let (device, queue) = request_device(&adapter, gbuffer).await?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .find(|format| format.is_srgb())
            .or_else(|| caps.formats.first())
            .copied()
            .ok_or(RenderError::NoSurfaceFormat)?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width,
            height: size.height,
            present_mode: wgpu::PresentMode::Fifo,
            desired_maximum_frame_latency: 2,
            alpha_mode,
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        Ok(Self {
            device,
            queue,
            target: OutputTarget::Window {
                window,
                surface,
                config,
            },
            size,
        })
    }

    /// Device without a window. The output is a linear `Rgba8Unorm`
    /// texture, so read-back bytes are the shader results quantized once.
    pub async fn headless(gbuffer: &GBufferLayout, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(RenderError::ZeroSizedWindow);
        }
        let instance = create_instance();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await?;
        let (device, queue) = request_device(&adapter, gbuffer).await?;
        let format = wgpu::TextureFormat::Rgba8Unorm;
        let texture = offscreen_texture(&device, format, width, height);
        Ok(Self {
            device,
            queue,
            target: OutputTarget::Offscreen { texture, format },
            size: PhysicalSize::new(width, height),
        })
    }

    pub fn window(&self) -> Option<&Window> {
        match &self.target {
            OutputTarget::Window { window, .. } => Some(window),
            OutputTarget::Offscreen { .. } => None,
        }
    }

    pub fn window_id(&self) -> Option<WindowId> {
        self.window().map(Window::id)
    }

    pub fn output_format(&self) -> wgpu::TextureFormat {
        match &self.target {
            OutputTarget::Window { config, .. } => config.format,
            OutputTarget::Offscreen { format, .. } => *format,
        }
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    /// Resizes the output. Zero-sized requests are ignored.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 {
            return false;
        }
        self.size = PhysicalSize::new(width, height);
        match &mut self.target {
            OutputTarget::Window {
                surface, config, ..
            } => {
                config.width = width;
                config.height = height;
                surface.configure(&self.device, config);
            }
            OutputTarget::Offscreen { texture, format } => {
                *texture = offscreen_texture(&self.device, *format, width, height);
            }
        }
        true
    }

    pub fn reconfigure(&self) {
        if let OutputTarget::Window {
            surface, config, ..
        } = &self.target
        {
            surface.configure(&self.device, config);
        }
    }

    pub(crate) fn current_frame(&self) -> Result<OutputFrame, wgpu::SurfaceError> {
        match &self.target {
            OutputTarget::Window { surface, .. } => surface.get_current_texture().map(OutputFrame::Surface),
            OutputTarget::Offscreen { texture, .. } => Ok(OutputFrame::Offscreen(texture.clone())),
        }
    }

    /// Copies the offscreen output back as tightly packed RGBA8 rows, top
    /// row first. Window outputs cannot be read.
    pub fn read_pixels(&self) -> Result<Vec<u8>> {
        let OutputTarget::Offscreen { texture, .. } = &self.target else {
            return Err(RenderError::Readback("window surfaces cannot be read back".into()));
        };
        let PhysicalSize { width, height } = self.size;
        let row = width as usize * 4;
        let padded_row = align_up(row, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as usize);
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("output-readback"),
            size: (padded_row * height as usize) as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("readback-encoder"),
            });
        encoder.copy_texture_to_buffer(
            texture.as_image_copy(),
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row as u32),
                    rows_per_image: Some(height),
                },
            },
            texture.size(),
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|err| RenderError::Readback(err.to_string()))?;
        rx.recv()
            .map_err(|err| RenderError::Readback(err.to_string()))?
            .map_err(|err| RenderError::Readback(err.to_string()))?;

        let mut pixels = Vec::with_capacity(row * height as usize);
        {
            let data = slice.get_mapped_range();
            for padded in data.chunks(padded_row) {
                pixels.extend_from_slice(&padded[..row]);
            }
        }
        buffer.unmap();
        Ok(pixels)
    }
}

fn create_instance() -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::PRIMARY,
        flags: wgpu::InstanceFlags::default(),
        memory_budget_thresholds: Default::default(),
        backend_options: Default::default(),
    })
}

async fn request_device(
    adapter: &wgpu::Adapter,
    gbuffer: &GBufferLayout,
) -> Result<(wgpu::Device, wgpu::Queue)> {
    info!("using adapter {}", adapter.get_info().name);
    let adapter_limits = adapter.limits();
    let required = gbuffer.color_attachment_bytes_per_sample();
    if adapter_limits.max_color_attachment_bytes_per_sample < required {
        return Err(RenderError::UnsupportedGBuffer {
            required,
            available: adapter_limits.max_color_attachment_bytes_per_sample,
        });
    }
    let defaults = wgpu::Limits::default().using_resolution(adapter_limits);
    let required_limits = wgpu::Limits {
        max_color_attachment_bytes_per_sample: required
            .max(defaults.max_color_attachment_bytes_per_sample),
        ..defaults
    };

    let device = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("deferred-device"),
            required_features: wgpu::Features::empty(),
            required_limits,
            experimental_features: Default::default(),
            memory_hints: Default::default(),
            trace: Default::default(),
        })
        .await?;
    Ok(device)
}

fn offscreen_texture(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("offscreen-output"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    })
}

pub(crate) struct MeshBuffers {
    pub vertex: wgpu::Buffer,
    pub index: wgpu::Buffer,
    pub index_count: u32,
}

impl MeshBuffers {
    fn from_mesh(device: &wgpu::Device, mesh: &MeshData, label: &str) -> Self {
        let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-vertices")),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-indices")),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex,
            index,
            index_count: mesh.index_count(),
        }
    }
}

pub(crate) fn texture_format(usage: TextureUsage) -> wgpu::TextureFormat {
    match usage {
        TextureUsage::Color => wgpu::TextureFormat::Rgba8UnormSrgb,
        TextureUsage::Data => wgpu::TextureFormat::Rgba8Unorm,
    }
}

pub(crate) fn sampler_descriptor(desc: &SamplerDesc) -> wgpu::SamplerDescriptor<'static> {
    let address = match desc.address {
        AddressMode::Wrap => wgpu::AddressMode::Repeat,
        AddressMode::Clamp => wgpu::AddressMode::ClampToEdge,
    };
    let (filter, mipmap, anisotropy) = match desc.filter {
        FilterMode::Nearest => (wgpu::FilterMode::Nearest, wgpu::FilterMode::Nearest, 1),
        // Anisotropy is only valid with linear filtering everywhere.
        FilterMode::Linear => (
            wgpu::FilterMode::Linear,
            wgpu::FilterMode::Linear,
            desc.max_anisotropy.clamp(1, 16),
        ),
    };
    wgpu::SamplerDescriptor {
        label: Some("material-sampler"),
        address_mode_u: address,
        address_mode_v: address,
        address_mode_w: address,
        mag_filter: filter,
        min_filter: filter,
        mipmap_filter: mipmap,
        anisotropy_clamp: anisotropy,
        ..Default::default()
    }
}

/// Uploads scene assets and keeps them alive for the renderer.
pub struct GpuResources {
    device: wgpu::Device,
    queue: wgpu::Queue,
    material_layout: wgpu::BindGroupLayout,
    meshes: Vec<MeshBuffers>,
    textures: Vec<wgpu::TextureView>,
    samplers: Vec<wgpu::Sampler>,
    sampler_cache: HashMap<SamplerDesc, SamplerHandle>,
    materials: Vec<wgpu::BindGroup>,
}

impl GpuResources {
    pub fn new(gpu: &GpuContext, material_layout: wgpu::BindGroupLayout) -> Self {
        Self {
            device: gpu.device.clone(),
            queue: gpu.queue.clone(),
            material_layout,
            meshes: Vec::new(),
            textures: Vec::new(),
            samplers: Vec::new(),
            sampler_cache: HashMap::new(),
            materials: Vec::new(),
        }
    }

    pub(crate) fn mesh(&self, handle: MeshHandle) -> Result<&MeshBuffers> {
        self.meshes.get(handle.index()).ok_or(RenderError::UnknownHandle {
            kind: "mesh",
            index: handle.index(),
        })
    }

    pub(crate) fn material(&self, handle: MaterialHandle) -> Result<&wgpu::BindGroup> {
        self.materials.get(handle.index()).ok_or(RenderError::UnknownHandle {
            kind: "material",
            index: handle.index(),
        })
    }
}

impl AssetProvider for GpuResources {
    fn load_mesh(&mut self, source: &MeshSource) -> Result<MeshRef> {
        let data = source.load()?;
        let handle = MeshHandle(self.meshes.len());
        self.meshes
            .push(MeshBuffers::from_mesh(&self.device, &data, &source.label()));
        debug!("uploaded mesh {} ({} indices)", source.label(), data.index_count());
        Ok(data.to_ref(handle))
    }

    fn load_texture(&mut self, source: &TextureSource, usage: TextureUsage) -> Result<TextureHandle> {
        let decoded = source.decode()?;
        let label = source.label();
        let max = self.device.limits().max_texture_dimension_2d;
        if decoded.width > max || decoded.height > max {
            return Err(RenderError::asset(
                "texture",
                label,
                format!("{}x{} exceeds the device limit of {max}", decoded.width, decoded.height),
            ));
        }
        let texture = self.device.create_texture_with_data(
            &self.queue,
            &wgpu::TextureDescriptor {
                label: Some(&label),
                size: wgpu::Extent3d {
                    width: decoded.width,
                    height: decoded.height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: texture_format(usage),
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            &decoded.rgba,
        );
        let handle = TextureHandle(self.textures.len());
        self.textures
            .push(texture.create_view(&wgpu::TextureViewDescriptor::default()));
        debug!("uploaded texture {label} {}x{}", decoded.width, decoded.height);
        Ok(handle)
    }

    fn create_sampler(&mut self, desc: &SamplerDesc) -> Result<SamplerHandle> {
        if let Some(handle) = self.sampler_cache.get(desc) {
            return Ok(*handle);
        }
        let handle = SamplerHandle(self.samplers.len());
        self.samplers
            .push(self.device.create_sampler(&sampler_descriptor(desc)));
        self.sampler_cache.insert(*desc, handle);
        Ok(handle)
    }

    fn register_material(&mut self, material: &Material) -> Result<MaterialHandle> {
        let texture = |handle: TextureHandle| {
            self.textures.get(handle.index()).ok_or(RenderError::UnknownHandle {
                kind: "texture",
                index: handle.index(),
            })
        };
        let diffuse = texture(material.diffuse)?;
        let normal = texture(material.normal)?;
        let sampler = self
            .samplers
            .get(material.sampler.index())
            .ok_or(RenderError::UnknownHandle {
                kind: "sampler",
                index: material.sampler.index(),
            })?;

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("material-bind-group"),
            layout: &self.material_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(diffuse),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(normal),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        });
        self.materials.push(bind_group);
        Ok(MaterialHandle(self.materials.len() - 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_textures_decode_srgb_and_normal_maps_do_not() {
        assert!(texture_format(TextureUsage::Color).is_srgb());
        assert!(!texture_format(TextureUsage::Data).is_srgb());
    }

    #[test]
    fn anisotropy_only_applies_to_linear_sampling() {
        let linear = sampler_descriptor(&SamplerDesc::default());
        assert_eq!(linear.anisotropy_clamp, 16);
        assert_eq!(linear.address_mode_u, wgpu::AddressMode::Repeat);

        let nearest = sampler_descriptor(&SamplerDesc {
            address: AddressMode::Clamp,
            filter: FilterMode::Nearest,
            max_anisotropy: 16,
        });
        assert_eq!(nearest.anisotropy_clamp, 1);
        assert_eq!(nearest.mag_filter, wgpu::FilterMode::Nearest);
        assert_eq!(nearest.address_mode_v, wgpu::AddressMode::ClampToEdge);
    }
}
