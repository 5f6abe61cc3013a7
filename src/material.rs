use serde::{Deserialize, Serialize};

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub(crate) usize);

        impl $name {
            pub fn index(self) -> usize {
                self.0
            }
        }
    };
}

handle!(
    /// Opaque reference to a mesh owned by the asset provider.
    MeshHandle
);
handle!(
    /// Opaque reference to a sampled texture view.
    TextureHandle
);
handle!(
    /// Opaque reference to a sampler object.
    SamplerHandle
);
handle!(
    /// Index of a [`Material`] in the scene's material table.
    MaterialHandle
);

/// Vertex and fragment entry points of the geometry-pass shader module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderPair {
    pub vertex: &'static str,
    pub fragment: &'static str,
}

impl ShaderPair {
    /// Writes position, normal (with normal mapping) and diffuse targets.
    pub const GBUFFER: Self = Self {
        vertex: "vs_main",
        fragment: "fs_main",
    };
}

impl Default for ShaderPair {
    fn default() -> Self {
        Self::GBUFFER
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressMode {
    Wrap,
    Clamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterMode {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SamplerDesc {
    pub address: AddressMode,
    pub filter: FilterMode,
    pub max_anisotropy: u16,
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self {
            address: AddressMode::Wrap,
            filter: FilterMode::Linear,
            max_anisotropy: 16,
        }
    }
}

/// Shader pair plus the textures and sampler bound for the geometry pass.
///
/// Materials are created once at scene setup and shared by every entity
/// that references them through a [`MaterialHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Material {
    pub shaders: ShaderPair,
    pub diffuse: TextureHandle,
    pub normal: TextureHandle,
    pub sampler: SamplerHandle,
}

impl Material {
    pub fn new(diffuse: TextureHandle, normal: TextureHandle, sampler: SamplerHandle) -> Self {
        Self {
            shaders: ShaderPair::GBUFFER,
            diffuse,
            normal,
            sampler,
        }
    }
}
