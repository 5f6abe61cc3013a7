use super::state::Viewport;

/// One of the three color targets written by the geometry pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GBufferTarget {
    Position,
    Normal,
    Diffuse,
}

impl GBufferTarget {
    pub const ALL: [Self; 3] = [Self::Position, Self::Normal, Self::Diffuse];

    /// Color attachment slot and shader location.
    pub fn slot(self) -> usize {
        match self {
            Self::Position => 0,
            Self::Normal => 1,
            Self::Diffuse => 2,
        }
    }
}

/// Formats of the G-buffer attachments, independent of any device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GBufferLayout {
    pub position: wgpu::TextureFormat,
    pub normal: wgpu::TextureFormat,
    pub diffuse: wgpu::TextureFormat,
    pub depth: wgpu::TextureFormat,
}

impl Default for GBufferLayout {
    fn default() -> Self {
        Self {
            position: wgpu::TextureFormat::Rgba32Float,
            normal: wgpu::TextureFormat::Rgba32Float,
            diffuse: wgpu::TextureFormat::Rgba8Unorm,
            depth: wgpu::TextureFormat::Depth32Float,
        }
    }
}

impl GBufferLayout {
    pub fn format(&self, target: GBufferTarget) -> wgpu::TextureFormat {
        match target {
            GBufferTarget::Position => self.position,
            GBufferTarget::Normal => self.normal,
            GBufferTarget::Diffuse => self.diffuse,
        }
    }

    pub fn color_formats(&self) -> [wgpu::TextureFormat; 3] {
        GBufferTarget::ALL.map(|target| self.format(target))
    }

    /// Bytes per sample the geometry pass occupies across all color
    /// attachments, using the same packing rule the device validates.
    pub fn color_attachment_bytes_per_sample(&self) -> u32 {
        self.color_formats().iter().fold(0, |total, format| {
            let cost = format.target_pixel_byte_cost().unwrap_or(0);
            let align = format.target_component_alignment().unwrap_or(1).max(1);
            total.next_multiple_of(align) + cost
        })
    }

    /// Whether a float target can be read with `textureLoad` only.
    pub fn requires_unfilterable(&self, target: GBufferTarget) -> bool {
        !self
            .format(target)
            .guaranteed_format_features(wgpu::Features::empty())
            .flags
            .contains(wgpu::TextureFormatFeatureFlags::FILTERABLE)
    }
}

struct Target {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl Target {
    fn create(
        device: &wgpu::Device,
        label: &str,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}

/// Screen-sized targets written by the geometry pass and read by lighting.
pub struct GBuffer {
    layout: GBufferLayout,
    width: u32,
    height: u32,
    colors: [Target; 3],
    depth: Target,
}

impl GBuffer {
    pub fn new(device: &wgpu::Device, layout: GBufferLayout, width: u32, height: u32) -> Self {
        let colors = GBufferTarget::ALL.map(|target| {
            let label = match target {
                GBufferTarget::Position => "gbuffer-position",
                GBufferTarget::Normal => "gbuffer-normal",
                GBufferTarget::Diffuse => "gbuffer-diffuse",
            };
            Target::create(device, label, layout.format(target), width, height)
        });
        let depth = Target::create(device, "gbuffer-depth", layout.depth, width, height);
        Self {
            layout,
            width,
            height,
            colors,
            depth,
        }
    }

    pub fn layout(&self) -> &GBufferLayout {
        &self.layout
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn viewport(&self) -> Viewport {
        Viewport::full(self.width, self.height)
    }

    pub fn view(&self, target: GBufferTarget) -> &wgpu::TextureView {
        &self.colors[target.slot()].view
    }

    pub fn depth_view(&self) -> &wgpu::TextureView {
        &self.depth.view
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_exceeds_the_baseline_attachment_budget() {
        let layout = GBufferLayout::default();
        assert!(
            layout.color_attachment_bytes_per_sample()
                > wgpu::Limits::default().max_color_attachment_bytes_per_sample
        );
    }

    #[test]
    fn float_targets_are_read_unfiltered() {
        let layout = GBufferLayout::default();
        assert!(layout.requires_unfilterable(GBufferTarget::Position));
        assert!(layout.requires_unfilterable(GBufferTarget::Normal));
        assert!(!layout.requires_unfilterable(GBufferTarget::Diffuse));
    }

    #[test]
    fn slots_follow_attachment_order() {
        let slots: Vec<_> = GBufferTarget::ALL.iter().map(|t| t.slot()).collect();
        assert_eq!(slots, vec![0, 1, 2]);
    }
}
