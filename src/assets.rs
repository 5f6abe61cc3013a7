//! Narrow interfaces to the collaborators that own GPU-side resources.
//!
//! Scene setup only ever sees handles. [`HeadlessAssets`] performs the same
//! decoding as the GPU provider without a device, which is what tests and
//! `--summary-only` runs use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{RenderError, Result};
use crate::material::{Material, MaterialHandle, SamplerDesc, SamplerHandle, TextureHandle};
use crate::mesh::{MeshData, MeshRef};
use crate::obj::load_obj_from_str;

const SPHERE_SLICES: u32 = 24;
const SPHERE_STACKS: u32 = 16;

/// Largest texture edge every wgpu backend accepts by default.
pub const MAX_TEXTURE_DIMENSION: u32 = 8192;

const CHECKER_CELL: u32 = 8;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeshSource {
    Sphere,
    Cube,
    Obj(PathBuf),
}

impl MeshSource {
    pub fn label(&self) -> String {
        match self {
            Self::Sphere => "sphere".to_string(),
            Self::Cube => "cube".to_string(),
            Self::Obj(path) => path.display().to_string(),
        }
    }

    /// Builds or parses the mesh on the CPU.
    pub fn load(&self) -> Result<MeshData> {
        match self {
            Self::Sphere => Ok(MeshData::sphere(SPHERE_SLICES, SPHERE_STACKS)),
            Self::Cube => Ok(MeshData::cube()),
            Self::Obj(path) => {
                let text = std::fs::read_to_string(path)
                    .map_err(|err| RenderError::asset("mesh", self.label(), err))?;
                load_obj_from_str(&text)
                    .map_err(|err| RenderError::asset("mesh", self.label(), format!("{err:#}")))
            }
        }
    }
}

/// Whether texel values are color (sRGB encoded) or data (normal maps).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureUsage {
    Color,
    Data,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureSource {
    Solid([u8; 4]),
    Checker {
        a: [u8; 4],
        b: [u8; 4],
        cells: u32,
    },
    File(PathBuf),
}

impl TextureSource {
    /// Tangent-space normal map that leaves surface normals untouched.
    pub const FLAT_NORMAL: Self = Self::Solid([128, 128, 255, 255]);

    pub fn label(&self) -> String {
        match self {
            Self::Solid([r, g, b, a]) => format!("solid({r},{g},{b},{a})"),
            Self::Checker { cells, .. } => format!("checker({cells})"),
            Self::File(path) => path.display().to_string(),
        }
    }

    /// Decodes the source into tightly packed RGBA8 texels.
    pub fn decode(&self) -> Result<DecodedTexture> {
        match self {
            Self::Solid(color) => Ok(DecodedTexture {
                width: 1,
                height: 1,
                rgba: color.to_vec(),
            }),
            Self::Checker { a, b, cells } => checker(*a, *b, (*cells).max(1)).ok_or_else(|| {
                RenderError::asset(
                    "texture",
                    self.label(),
                    format!("{cells} cells exceed the {MAX_TEXTURE_DIMENSION} texel limit"),
                )
            }),
            Self::File(path) => decode_file(path),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTexture {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl DecodedTexture {
    /// Texel at integer coordinates, wrapping like the material sampler.
    pub fn texel(&self, x: i64, y: i64) -> [u8; 4] {
        let x = x.rem_euclid(self.width as i64) as usize;
        let y = y.rem_euclid(self.height as i64) as usize;
        let offset = (y * self.width as usize + x) * 4;
        [
            self.rgba[offset],
            self.rgba[offset + 1],
            self.rgba[offset + 2],
            self.rgba[offset + 3],
        ]
    }
}

fn checker(a: [u8; 4], b: [u8; 4], cells: u32) -> Option<DecodedTexture> {
    let size = cells
        .checked_mul(CHECKER_CELL)
        .filter(|size| *size <= MAX_TEXTURE_DIMENSION)?;
    let mut rgba = Vec::with_capacity(size as usize * size as usize * 4);
    for y in 0..size {
        for x in 0..size {
            let color = if (x / CHECKER_CELL + y / CHECKER_CELL) % 2 == 0 { a } else { b };
            rgba.extend_from_slice(&color);
        }
    }
    Some(DecodedTexture {
        width: size,
        height: size,
        rgba,
    })
}

fn decode_file(path: &Path) -> Result<DecodedTexture> {
    let image = image::open(path)
        .map_err(|err| RenderError::asset("texture", path.display().to_string(), err))?
        .to_rgba8();
    let (width, height) = image.dimensions();
    Ok(DecodedTexture {
        width,
        height,
        rgba: image.into_raw(),
    })
}

/// Mesh, texture, sampler and material provider used during scene setup.
pub trait AssetProvider {
    fn load_mesh(&mut self, source: &MeshSource) -> Result<MeshRef>;
    fn load_texture(&mut self, source: &TextureSource, usage: TextureUsage) -> Result<TextureHandle>;
    fn create_sampler(&mut self, desc: &SamplerDesc) -> Result<SamplerHandle>;
    fn register_material(&mut self, material: &Material) -> Result<MaterialHandle>;
}

/// CPU-only provider: decodes everything, keeps the results, uploads nothing.
#[derive(Debug, Default)]
pub struct HeadlessAssets {
    meshes: Vec<(MeshSource, MeshData)>,
    textures: Vec<(TextureSource, DecodedTexture)>,
    samplers: Vec<SamplerDesc>,
    materials: Vec<Material>,
}

impl HeadlessAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mesh(&self, mesh: &MeshRef) -> Option<&MeshData> {
        self.meshes.get(mesh.handle.index()).map(|(_, data)| data)
    }

    pub fn texture(&self, handle: TextureHandle) -> Option<&DecodedTexture> {
        self.textures.get(handle.index()).map(|(_, data)| data)
    }

    pub fn material(&self, handle: MaterialHandle) -> Option<&Material> {
        self.materials.get(handle.index())
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }
}

impl AssetProvider for HeadlessAssets {
    fn load_mesh(&mut self, source: &MeshSource) -> Result<MeshRef> {
        let handle = crate::material::MeshHandle(self.meshes.len());
        let data = source.load()?;
        let mesh = data.to_ref(handle);
        self.meshes.push((source.clone(), data));
        Ok(mesh)
    }

    fn load_texture(&mut self, source: &TextureSource, _usage: TextureUsage) -> Result<TextureHandle> {
        let handle = TextureHandle(self.textures.len());
        let decoded = source.decode()?;
        self.textures.push((source.clone(), decoded));
        Ok(handle)
    }

    fn create_sampler(&mut self, desc: &SamplerDesc) -> Result<SamplerHandle> {
        self.samplers.push(*desc);
        Ok(SamplerHandle(self.samplers.len() - 1))
    }

    fn register_material(&mut self, material: &Material) -> Result<MaterialHandle> {
        for (kind, index, len) in [
            ("texture", material.diffuse.index(), self.textures.len()),
            ("texture", material.normal.index(), self.textures.len()),
            ("sampler", material.sampler.index(), self.samplers.len()),
        ] {
            if index >= len {
                return Err(RenderError::UnknownHandle { kind, index });
            }
        }
        self.materials.push(*material);
        Ok(MaterialHandle(self.materials.len() - 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checker_alternates_cells() {
        let texture = TextureSource::Checker {
            a: [255, 255, 255, 255],
            b: [0, 0, 0, 255],
            cells: 2,
        }
        .decode()
        .unwrap();
        assert_eq!(texture.width, 16);
        assert_eq!(texture.texel(0, 0), [255, 255, 255, 255]);
        assert_eq!(texture.texel(8, 0), [0, 0, 0, 255]);
        assert_eq!(texture.texel(16, 0), [255, 255, 255, 255]);
    }

    #[test]
    fn oversized_checker_is_an_asset_error() {
        for cells in [1025, 8192, u32::MAX] {
            let err = TextureSource::Checker {
                a: [255, 255, 255, 255],
                b: [0, 0, 0, 255],
                cells,
            }
            .decode()
            .unwrap_err();
            assert!(matches!(err, RenderError::Asset { kind: "texture", .. }), "{err}");
        }
        let largest = TextureSource::Checker {
            a: [255, 255, 255, 255],
            b: [0, 0, 0, 255],
            cells: MAX_TEXTURE_DIMENSION / CHECKER_CELL,
        }
        .decode()
        .unwrap();
        assert_eq!(largest.width, MAX_TEXTURE_DIMENSION);
    }

    #[test]
    fn missing_texture_file_reports_its_name() {
        let err = TextureSource::File(PathBuf::from("does/not/exist.png"))
            .decode()
            .unwrap_err();
        assert!(err.to_string().contains("does/not/exist.png"));
    }

    #[test]
    fn headless_provider_validates_material_handles() {
        let mut assets = HeadlessAssets::new();
        let diffuse = assets
            .load_texture(&TextureSource::Solid([255, 0, 0, 255]), TextureUsage::Color)
            .unwrap();
        let sampler = assets.create_sampler(&SamplerDesc::default()).unwrap();
        let bogus = Material::new(diffuse, TextureHandle(7), sampler);
        assert!(matches!(
            assets.register_material(&bogus),
            Err(RenderError::UnknownHandle { kind: "texture", index: 7 })
        ));
        let normal = assets
            .load_texture(&TextureSource::FLAT_NORMAL, TextureUsage::Data)
            .unwrap();
        let handle = assets
            .register_material(&Material::new(diffuse, normal, sampler))
            .unwrap();
        assert_eq!(assets.material(handle).map(|m| m.diffuse), Some(diffuse));
    }

    #[test]
    fn sphere_source_reports_index_count() {
        let mut assets = HeadlessAssets::new();
        let mesh = assets.load_mesh(&MeshSource::Sphere).unwrap();
        assert_eq!(Some(mesh.index_count), assets.mesh(&mesh).map(MeshData::index_count));
        assert!(mesh.inscribed_radius > 0.45);
    }
}
