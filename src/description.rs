//! Declarative scene files and the built-in demo scene.
//!
//! A description names its textures, materials and meshes and refers to
//! them by name from entities. [`SceneDescription::instantiate`] resolves
//! those names through an [`AssetProvider`], loading each asset at most once.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use glam::{Vec3, Vec4};
use log::info;
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};

use crate::assets::{AssetProvider, MeshSource, TextureSource, TextureUsage};
use crate::camera::Camera;
use crate::light::{AmbientLight, DirectionalLight, PointLight, SpotLight, VolumeLight};
use crate::material::{
    AddressMode, FilterMode, Material, MaterialHandle, SamplerDesc, SamplerHandle, TextureHandle,
};
use crate::mesh::MeshRef;
use crate::scene::{Entity, EntityRole, Scene};
use crate::settings::{LightDepthPolicy, RendererSettings};
use crate::transform::Transform;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraDesc {
    pub position: Vec3,
    /// Radians.
    pub yaw: f32,
    /// Radians.
    pub pitch: f32,
}

impl Default for CameraDesc {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 1.0, -6.0),
            yaw: 0.0,
            pitch: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureDesc {
    pub name: String,
    pub source: TextureSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialDesc {
    pub name: String,
    pub diffuse: String,
    /// Falls back to a flat normal map.
    pub normal: Option<String>,
    pub sampler: SamplerDesc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshDesc {
    pub name: String,
    pub source: MeshSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDesc {
    pub name: String,
    pub role: EntityRole,
    pub mesh: String,
    pub material: String,
    pub position: Vec3,
    /// Euler angles in radians.
    pub rotation: Vec3,
    pub scale: Vec3,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightDesc {
    pub name: String,
    pub light: VolumeLight,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SceneDescription {
    pub settings: RendererSettings,
    pub camera: CameraDesc,
    pub textures: Vec<TextureDesc>,
    pub materials: Vec<MaterialDesc>,
    pub meshes: Vec<MeshDesc>,
    pub entities: Vec<EntityDesc>,
    pub directional: Option<DirectionalLight>,
    pub ambient: Option<AmbientLight>,
    pub lights: Vec<LightDesc>,
}

impl SceneDescription {
    pub fn from_path(path: &Path) -> Result<Self> {
        let xml = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scene {}", path.display()))?;
        Self::from_xml(&xml, path.parent())
    }

    /// Parses a scene document. Relative asset paths are resolved against
    /// `base_dir` when given.
    pub fn from_xml(xml: &str, base_dir: Option<&Path>) -> Result<Self> {
        let document = Document::parse(xml).context("invalid scene XML")?;
        let root = document.root_element();
        let resolve = |path: String| -> PathBuf {
            match base_dir {
                Some(dir) if Path::new(&path).is_relative() => dir.join(path),
                _ => PathBuf::from(path),
            }
        };

        let mut description = Self::default();
        for node in root.children().filter(Node::is_element) {
            match node.tag_name().name() {
                "settings" => {
                    description.settings =
                        parse_settings(&node, description.settings).context("invalid <settings>")?
                }
                "camera" => description.camera = parse_camera(&node).context("invalid <camera>")?,
                "texture" => {
                    let name = required_text(&node, "name")?;
                    let source = parse_texture_source(&node, &resolve)
                        .with_context(|| format!("invalid texture {name}"))?;
                    description.textures.push(TextureDesc { name, source });
                }
                "material" => {
                    let name = required_text(&node, "name")?;
                    let material = parse_material(&node, name.clone())
                        .with_context(|| format!("invalid material {name}"))?;
                    description.materials.push(material);
                }
                "mesh" => {
                    let name = required_text(&node, "name")?;
                    let source = match (optional_text(&node, "primitive"), optional_text(&node, "path")) {
                        (Some(primitive), None) => parse_primitive(&primitive)?,
                        (None, Some(path)) => MeshSource::Obj(resolve(path)),
                        _ => bail!("mesh {name} needs exactly one of <primitive> or <path>"),
                    };
                    description.meshes.push(MeshDesc { name, source });
                }
                "entity" => {
                    let name = required_text(&node, "name")?;
                    let entity = parse_entity(&node, name.clone())
                        .with_context(|| format!("invalid entity {name}"))?;
                    description.entities.push(entity);
                }
                "directional-light" => {
                    description.directional = Some(DirectionalLight::new(
                        parse_color(optional_text(&node, "color"), Vec4::ONE)?,
                        parse_vec3(optional_text(&node, "direction"), Vec3::new(1.0, -1.0, 1.0))?,
                    ))
                }
                "ambient-light" => {
                    description.ambient = Some(AmbientLight::new(parse_color(
                        optional_text(&node, "color"),
                        AmbientLight::default().ambient_color,
                    )?))
                }
                "point-light" | "spot-light" => {
                    let name = required_text(&node, "name")?;
                    let light = parse_light(&node)
                        .with_context(|| format!("invalid light {name}"))?;
                    description.lights.push(LightDesc { name, light });
                }
                other => bail!("unknown scene element <{other}>"),
            }
        }
        Ok(description)
    }

    /// Loads every referenced asset and builds the runtime scene.
    pub fn instantiate(&self, assets: &mut dyn AssetProvider) -> Result<Scene> {
        let settings = self.settings.sanitized();
        let mut camera = Camera::new(self.camera.position, settings.projection, settings.aspect());
        camera.set_orientation(self.camera.yaw, self.camera.pitch);
        camera.update_view_matrix();

        let mut scene = Scene::new(camera, settings);
        if let Some(directional) = self.directional {
            scene.directional = directional;
        }
        if let Some(ambient) = self.ambient {
            scene.ambient = ambient;
        }

        let mut resolver = Resolver::new(self, assets);
        for desc in &self.entities {
            let mesh = resolver
                .mesh(&desc.mesh)
                .with_context(|| format!("entity {}", desc.name))?;
            let material = resolver
                .material(&desc.material)
                .with_context(|| format!("entity {}", desc.name))?;
            let mut transform = Transform::from_position(desc.position);
            transform.set_rotation(desc.rotation);
            transform.set_scale(desc.scale);
            transform.update_world_matrix();
            scene.add_entity(Entity::renderable(desc.name.clone(), desc.role, mesh, material, transform));
        }

        if !self.lights.is_empty() {
            let volume = resolver.load_mesh(&MeshSource::Sphere).context("light volume mesh")?;
            for desc in &self.lights {
                scene.add_light(desc.name.clone(), desc.light, volume);
            }
        }

        info!(
            "instantiated scene: {} entities, {} volume lights, {} materials",
            scene.entities().len(),
            scene.lights().len(),
            resolver.materials.len()
        );
        scene.update();
        Ok(scene)
    }
}

/// Name lookups with per-instantiation caches.
struct Resolver<'a> {
    description: &'a SceneDescription,
    assets: &'a mut dyn AssetProvider,
    meshes: HashMap<String, MeshRef>,
    /// Keyed by source so user mesh names never shadow the volume sphere.
    mesh_sources: HashMap<MeshSource, MeshRef>,
    textures: HashMap<(String, TextureUsage), TextureHandle>,
    samplers: HashMap<SamplerDesc, SamplerHandle>,
    materials: HashMap<String, MaterialHandle>,
    flat_normal: Option<TextureHandle>,
}

impl<'a> Resolver<'a> {
    fn new(description: &'a SceneDescription, assets: &'a mut dyn AssetProvider) -> Self {
        Self {
            description,
            assets,
            meshes: HashMap::new(),
            mesh_sources: HashMap::new(),
            textures: HashMap::new(),
            samplers: HashMap::new(),
            materials: HashMap::new(),
            flat_normal: None,
        }
    }

    fn mesh(&mut self, name: &str) -> Result<MeshRef> {
        if let Some(mesh) = self.meshes.get(name) {
            return Ok(*mesh);
        }
        let source = match self.description.meshes.iter().find(|m| m.name == name) {
            Some(desc) => desc.source.clone(),
            None => parse_primitive(name).map_err(|_| anyhow!("unknown mesh `{name}`"))?,
        };
        let mesh = self.load_mesh(&source)?;
        self.meshes.insert(name.to_string(), mesh);
        Ok(mesh)
    }

    fn load_mesh(&mut self, source: &MeshSource) -> Result<MeshRef> {
        if let Some(mesh) = self.mesh_sources.get(source) {
            return Ok(*mesh);
        }
        let mesh = self.assets.load_mesh(source)?;
        self.mesh_sources.insert(source.clone(), mesh);
        Ok(mesh)
    }

    fn texture(&mut self, name: &str, usage: TextureUsage) -> Result<TextureHandle> {
        let key = (name.to_string(), usage);
        if let Some(handle) = self.textures.get(&key) {
            return Ok(*handle);
        }
        let desc = self
            .description
            .textures
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| anyhow!("unknown texture `{name}`"))?;
        let handle = self.assets.load_texture(&desc.source, usage)?;
        self.textures.insert(key, handle);
        Ok(handle)
    }

    fn flat_normal(&mut self) -> Result<TextureHandle> {
        if let Some(handle) = self.flat_normal {
            return Ok(handle);
        }
        let handle = self
            .assets
            .load_texture(&TextureSource::FLAT_NORMAL, TextureUsage::Data)?;
        self.flat_normal = Some(handle);
        Ok(handle)
    }

    fn sampler(&mut self, desc: SamplerDesc) -> Result<SamplerHandle> {
        if let Some(handle) = self.samplers.get(&desc) {
            return Ok(*handle);
        }
        let handle = self.assets.create_sampler(&desc)?;
        self.samplers.insert(desc, handle);
        Ok(handle)
    }

    fn material(&mut self, name: &str) -> Result<MaterialHandle> {
        if let Some(handle) = self.materials.get(name) {
            return Ok(*handle);
        }
        let desc = self
            .description
            .materials
            .iter()
            .find(|m| m.name == name)
            .ok_or_else(|| anyhow!("unknown material `{name}`"))?;
        let diffuse = self.texture(&desc.diffuse, TextureUsage::Color)?;
        let normal = match &desc.normal {
            Some(normal) => self.texture(normal, TextureUsage::Data)?,
            None => self.flat_normal()?,
        };
        let sampler = self.sampler(desc.sampler)?;
        let handle = self
            .assets
            .register_material(&Material::new(diffuse, normal, sampler))?;
        self.materials.insert(name.to_string(), handle);
        Ok(handle)
    }
}

/// Ground, three walls, a three by three grid of spheres, one blue point
/// light and a warm spot light.
pub fn default_scene() -> SceneDescription {
    let mut description = SceneDescription {
        directional: Some(DirectionalLight::new(
            Vec4::new(0.5, 0.5, 0.5, 1.0),
            Vec3::new(1.0, -1.0, 1.0),
        )),
        ambient: Some(AmbientLight::default()),
        ..SceneDescription::default()
    };

    description.textures = vec![
        TextureDesc {
            name: "cobblestone".into(),
            source: TextureSource::Checker {
                a: [150, 140, 130, 255],
                b: [90, 85, 80, 255],
                cells: 8,
            },
        },
        TextureDesc {
            name: "red".into(),
            source: TextureSource::Solid([200, 30, 30, 255]),
        },
    ];
    description.materials = ["cobblestone", "red"]
        .into_iter()
        .map(|name| MaterialDesc {
            name: name.into(),
            diffuse: name.into(),
            normal: None,
            sampler: SamplerDesc::default(),
        })
        .collect();

    let flat = Vec3::new(5.0, 0.01, 5.0);
    let walls = [
        ("ground", EntityRole::Ground, Vec3::new(0.0, -1.5, 0.0), Vec3::ZERO),
        ("wall_east", EntityRole::Wall, Vec3::new(4.5, 0.0, 0.0), Vec3::new(0.0, 0.0, -1.6)),
        ("wall_north", EntityRole::Wall, Vec3::new(0.0, 0.0, 4.5), Vec3::new(1.6, 0.0, 0.0)),
        ("wall_west", EntityRole::Wall, Vec3::new(-4.5, 0.0, 0.0), Vec3::new(0.0, 0.0, 1.6)),
    ];
    for (name, role, position, rotation) in walls {
        description.entities.push(EntityDesc {
            name: name.into(),
            role,
            mesh: "cube".into(),
            material: "red".into(),
            position,
            rotation,
            scale: flat,
        });
    }
    for z in [2.0, 0.0, -2.0] {
        for x in [0.0, 2.0, -2.0] {
            description.entities.push(EntityDesc {
                name: format!("sphere_{}", description.entities.len() - walls.len()),
                role: EntityRole::Prop,
                mesh: "sphere".into(),
                material: "cobblestone".into(),
                position: Vec3::new(x, 0.0, z),
                rotation: Vec3::ZERO,
                scale: Vec3::ONE,
            });
        }
    }

    description.lights = vec![
        LightDesc {
            name: "blue_light".into(),
            light: VolumeLight::Point(PointLight::new(
                Vec4::new(0.1, 0.3, 1.0, 1.0),
                Vec3::new(2.0, 0.0, 0.0),
                7.0,
            )),
        },
        LightDesc {
            name: "spot_light".into(),
            light: VolumeLight::Spot(SpotLight::new(
                PointLight::new(Vec4::new(1.0, 0.85, 0.6, 1.0), Vec3::new(-2.0, 3.0, -2.0), 6.0),
                Vec3::new(0.3, -1.0, 0.3),
                30f32.to_radians(),
            )),
        },
    ];
    description
}

fn parse_settings(node: &Node<'_, '_>, defaults: RendererSettings) -> Result<RendererSettings> {
    let mut settings = defaults;
    settings.background = parse_color(optional_text(node, "background"), settings.background)?;
    let fov = parse_f32(optional_text(node, "fov"), settings.projection.fov_y.to_degrees())?;
    if !(fov > 0.0 && fov < 180.0) {
        bail!("fov must be between 0 and 180 degrees, got {fov}");
    }
    settings.projection.fov_y = fov.to_radians();
    settings.projection.near = parse_f32(optional_text(node, "near"), settings.projection.near)?;
    settings.projection.far = parse_f32(optional_text(node, "far"), settings.projection.far)?;
    settings.light_volume_scale = parse_f32(
        optional_text(node, "light-volume-scale"),
        settings.light_volume_scale,
    )?;
    if let Some(policy) = optional_text(node, "light-depth") {
        settings.light_depth = policy.parse::<LightDepthPolicy>().map_err(|err| anyhow!(err))?;
    }
    settings.window_width = parse_u32(optional_text(node, "width"), settings.window_width)?;
    settings.window_height = parse_u32(optional_text(node, "height"), settings.window_height)?;
    Ok(settings.sanitized())
}

fn parse_camera(node: &Node<'_, '_>) -> Result<CameraDesc> {
    let defaults = CameraDesc::default();
    Ok(CameraDesc {
        position: parse_vec3(optional_text(node, "position"), defaults.position)?,
        yaw: parse_f32(optional_text(node, "yaw"), 0.0)?.to_radians(),
        pitch: parse_f32(optional_text(node, "pitch"), 0.0)?.to_radians(),
    })
}

fn parse_texture_source(
    node: &Node<'_, '_>,
    resolve: &impl Fn(String) -> PathBuf,
) -> Result<TextureSource> {
    if let Some(path) = optional_text(node, "path") {
        return Ok(TextureSource::File(resolve(path)));
    }
    if let Some(cells) = optional_text(node, "checker") {
        let cells = cells
            .parse::<u32>()
            .map_err(|err| anyhow!("failed to parse checker cell count: {err}"))?;
        let a = parse_color(optional_text(node, "color"), Vec4::ONE)?;
        let b = parse_color(optional_text(node, "alternate"), Vec4::new(0.0, 0.0, 0.0, 1.0))?;
        return Ok(TextureSource::Checker {
            a: to_rgba8(a),
            b: to_rgba8(b),
            cells,
        });
    }
    let solid = optional_text(node, "solid").ok_or_else(|| anyhow!("texture needs <path>, <checker> or <solid>"))?;
    Ok(TextureSource::Solid(to_rgba8(parse_color(Some(solid), Vec4::ONE)?)))
}

fn parse_material(node: &Node<'_, '_>, name: String) -> Result<MaterialDesc> {
    let mut sampler = SamplerDesc::default();
    if let Some(address) = optional_text(node, "address") {
        sampler.address = match address.as_str() {
            "wrap" => AddressMode::Wrap,
            "clamp" => AddressMode::Clamp,
            other => bail!("unknown address mode `{other}`"),
        };
    }
    if let Some(filter) = optional_text(node, "filter") {
        sampler.filter = match filter.as_str() {
            "linear" => FilterMode::Linear,
            "nearest" => FilterMode::Nearest,
            other => bail!("unknown filter `{other}`"),
        };
    }
    Ok(MaterialDesc {
        name,
        diffuse: required_text(node, "diffuse")?,
        normal: optional_text(node, "normal"),
        sampler,
    })
}

fn parse_primitive(value: &str) -> Result<MeshSource> {
    match value {
        "sphere" => Ok(MeshSource::Sphere),
        "cube" => Ok(MeshSource::Cube),
        other => Err(anyhow!("unknown primitive `{other}`")),
    }
}

fn parse_entity(node: &Node<'_, '_>, name: String) -> Result<EntityDesc> {
    let role = match optional_text(node, "role").as_deref() {
        None | Some("prop") => EntityRole::Prop,
        Some("ground") => EntityRole::Ground,
        Some("wall") => EntityRole::Wall,
        Some(other) => bail!("unknown role `{other}`"),
    };
    let rotation = parse_vec3(optional_text(node, "rotation"), Vec3::ZERO)?;
    Ok(EntityDesc {
        name,
        role,
        mesh: required_text(node, "mesh")?,
        material: required_text(node, "material")?,
        position: parse_vec3(optional_text(node, "position"), Vec3::ZERO)?,
        rotation: Vec3::new(
            rotation.x.to_radians(),
            rotation.y.to_radians(),
            rotation.z.to_radians(),
        ),
        scale: parse_vec3(optional_text(node, "scale"), Vec3::ONE)?,
    })
}

fn parse_light(node: &Node<'_, '_>) -> Result<VolumeLight> {
    let point = PointLight::new(
        parse_color(optional_text(node, "color"), Vec4::ONE)?,
        parse_vec3(optional_text(node, "position"), Vec3::ZERO)?,
        parse_f32(Some(required_text(node, "range")?), 0.0)?,
    );
    if node.has_tag_name("point-light") {
        return Ok(VolumeLight::Point(point));
    }
    Ok(VolumeLight::Spot(SpotLight::new(
        point,
        parse_vec3(optional_text(node, "direction"), Vec3::NEG_Y)?,
        parse_f32(optional_text(node, "angle"), 30.0)?.to_radians(),
    )))
}

fn required_text(node: &Node<'_, '_>, tag: &str) -> Result<String> {
    optional_text(node, tag).ok_or_else(|| anyhow!("<{tag}> tag is missing"))
}

fn optional_text(node: &Node<'_, '_>, tag: &str) -> Option<String> {
    node.children()
        .find(|child| child.has_tag_name(tag))
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| text.to_string())
}

fn parse_components(value: &str, what: &str, min: usize) -> Result<Vec<f32>> {
    let numbers = value
        .split_whitespace()
        .map(|component| {
            component
                .parse::<f32>()
                .map_err(|err| anyhow!("failed to parse {what} component `{component}`: {err}"))
        })
        .collect::<Result<Vec<_>>>()?;
    if numbers.len() < min {
        bail!("{what} is missing components");
    }
    Ok(numbers)
}

fn parse_vec3(value: Option<String>, default: Vec3) -> Result<Vec3> {
    let Some(value) = value else {
        return Ok(default);
    };
    let numbers = parse_components(&value, "vector", 3)?;
    Ok(Vec3::new(numbers[0], numbers[1], numbers[2]))
}

/// `r g b [a]` in 0..=255, clamped into the unit range.
fn parse_color(value: Option<String>, default: Vec4) -> Result<Vec4> {
    let Some(value) = value else {
        return Ok(default);
    };
    let numbers = parse_components(&value, "color", 3)?;
    let alpha = numbers.get(3).copied().unwrap_or(255.0);
    Ok(crate::light::clamp_color(
        Vec4::new(numbers[0], numbers[1], numbers[2], alpha) / 255.0,
    ))
}

fn to_rgba8(color: Vec4) -> [u8; 4] {
    color.to_array().map(|channel| (channel * 255.0).round() as u8)
}

fn parse_f32(value: Option<String>, default: f32) -> Result<f32> {
    match value {
        Some(value) => value
            .parse::<f32>()
            .map_err(|err| anyhow!("failed to parse float: {err}")),
        None => Ok(default),
    }
}

fn parse_u32(value: Option<String>, default: u32) -> Result<u32> {
    match value {
        Some(value) => value
            .parse::<u32>()
            .map_err(|err| anyhow!("failed to parse integer: {err}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::HeadlessAssets;
    use crate::mesh::MeshData;
    use crate::scene::EntityKind;

    const SAMPLE: &str = r#"
    <scene>
        <settings>
            <background>0 0 0</background>
            <fov>60</fov>
            <light-volume-scale>1.5</light-volume-scale>
            <light-depth>off</light-depth>
        </settings>
        <camera><position>0 2 -8</position></camera>
        <texture><name>white</name><solid>255 255 255</solid></texture>
        <material><name>plain</name><diffuse>white</diffuse></material>
        <entity>
            <name>floor</name>
            <role>ground</role>
            <mesh>cube</mesh>
            <material>plain</material>
            <scale>10 0.1 10</scale>
        </entity>
        <entity>
            <name>ball</name>
            <mesh>sphere</mesh>
            <material>plain</material>
            <rotation>0 90 0</rotation>
        </entity>
        <point-light>
            <name>lamp</name>
            <color>255 510 0</color>
            <position>0 3 0</position>
            <range>5</range>
        </point-light>
    </scene>
    "#;

    #[test]
    fn parse_scene_reads_settings_entities_and_lights() {
        let description = SceneDescription::from_xml(SAMPLE, None).unwrap();
        assert_eq!(description.settings.light_depth, LightDepthPolicy::Disabled);
        assert_eq!(description.settings.light_volume_scale, 1.5);
        assert!((description.settings.projection.fov_y - 60f32.to_radians()).abs() < 1e-6);
        assert_eq!(description.camera.position, Vec3::new(0.0, 2.0, -8.0));
        assert_eq!(description.entities.len(), 2);
        assert_eq!(description.entities[0].role, EntityRole::Ground);
        assert!((description.entities[1].rotation.y - std::f32::consts::FRAC_PI_2).abs() < 1e-6);

        let light = description.lights[0].light.point_light();
        assert_eq!(light.diffuse_color, Vec4::new(1.0, 1.0, 0.0, 1.0));
        assert_eq!(light.range, 5.0);
    }

    #[test]
    fn instantiate_shares_materials_and_adds_proxies() {
        let description = SceneDescription::from_xml(SAMPLE, None).unwrap();
        let mut assets = HeadlessAssets::new();
        let scene = description.instantiate(&mut assets).unwrap();
        assert_eq!(scene.entities().len(), 3);
        assert_eq!(assets.material_count(), 1);
        // cube, sphere; the light volume reuses the sphere
        assert_eq!(assets.mesh_count(), 2);
        // white plus the implicit flat normal map
        assert_eq!(assets.texture_count(), 2);
        let proxy = scene.entity(scene.lights()[0].proxy).unwrap();
        assert!(matches!(proxy.kind, EntityKind::LightProxy(_)));
    }

    #[test]
    fn user_mesh_named_sphere_does_not_replace_light_volumes() {
        let xml = r#"<scene>
            <texture><name>white</name><solid>255 255 255</solid></texture>
            <material><name>plain</name><diffuse>white</diffuse></material>
            <mesh><name>sphere</name><primitive>cube</primitive></mesh>
            <entity><name>box</name><mesh>sphere</mesh><material>plain</material></entity>
            <point-light><name>lamp</name><range>2</range></point-light>
        </scene>"#;
        let description = SceneDescription::from_xml(xml, None).unwrap();
        let mut assets = HeadlessAssets::new();
        let scene = description.instantiate(&mut assets).unwrap();
        let entity_mesh = scene.renderables().next().unwrap().1.mesh;
        let volume_mesh = scene.entity(scene.lights()[0].proxy).unwrap().mesh;
        assert_ne!(entity_mesh.handle, volume_mesh.handle);
        assert_eq!(assets.mesh_count(), 2);
        let sphere = MeshData::sphere(24, 16);
        assert_eq!(volume_mesh.index_count, sphere.indices.len() as u32);
    }

    #[test]
    fn fov_outside_open_half_turn_is_rejected() {
        for fov in ["0", "180", "-30", "270", "NaN"] {
            let xml = format!("<scene><settings><fov>{fov}</fov></settings></scene>");
            let err = SceneDescription::from_xml(&xml, None).unwrap_err();
            assert!(format!("{err:#}").contains("fov"), "fov {fov}: {err:#}");
        }
        let xml = "<scene><settings><fov>179.5</fov></settings></scene>";
        assert!(SceneDescription::from_xml(xml, None).is_ok());
    }

    #[test]
    fn relative_paths_resolve_against_scene_directory() {
        let xml = "<scene><mesh><name>m</name><path>models/m.obj</path></mesh></scene>";
        let description = SceneDescription::from_xml(xml, Some(Path::new("/data/scenes"))).unwrap();
        assert_eq!(
            description.meshes[0].source,
            MeshSource::Obj(PathBuf::from("/data/scenes/models/m.obj"))
        );
    }

    #[test]
    fn unknown_material_is_an_error() {
        let xml = "<scene><entity><name>x</name><mesh>cube</mesh><material>nope</material></entity></scene>";
        let description = SceneDescription::from_xml(xml, None).unwrap();
        let err = description.instantiate(&mut HeadlessAssets::new()).unwrap_err();
        assert!(format!("{err:#}").contains("unknown material `nope`"));
    }

    #[test]
    fn missing_name_is_an_error() {
        assert!(SceneDescription::from_xml("<scene><texture><solid>1 1 1</solid></texture></scene>", None).is_err());
    }

    #[test]
    fn default_scene_matches_demo_layout() {
        let scene = default_scene().instantiate(&mut HeadlessAssets::new()).unwrap();
        assert_eq!(scene.renderables().count(), 13);
        assert_eq!(scene.by_role(EntityRole::Wall).count(), 3);
        assert_eq!(scene.by_role(EntityRole::Prop).count(), 9);
        assert_eq!(scene.lights().len(), 2);
        assert_eq!(
            scene.ground().map(|g| g.transform.position),
            Some(Vec3::new(0.0, -1.5, 0.0))
        );
    }
}
