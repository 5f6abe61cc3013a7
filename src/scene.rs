use glam::{Vec3, Vec4};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::camera::Camera;
use crate::light::{clamp_color, AmbientLight, DirectionalLight, VolumeLight};
use crate::material::MaterialHandle;
use crate::mesh::MeshRef;
use crate::settings::RendererSettings;
use crate::transform::Transform;

/// Index of an entity inside its [`Scene`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(usize);

impl EntityId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityRole {
    Ground,
    Wall,
    Prop,
    LightVolume,
}

/// What an entity contributes to a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EntityKind {
    /// Drawn by the geometry pass with the given material.
    Renderable(MaterialHandle),
    /// Mesh used only as a light volume; carries the light's color.
    LightProxy(Vec4),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub name: String,
    pub role: EntityRole,
    pub mesh: MeshRef,
    pub kind: EntityKind,
    pub transform: Transform,
}

impl Entity {
    pub fn renderable(
        name: impl Into<String>,
        role: EntityRole,
        mesh: MeshRef,
        material: MaterialHandle,
        transform: Transform,
    ) -> Self {
        Self {
            name: name.into(),
            role,
            mesh,
            kind: EntityKind::Renderable(material),
            transform,
        }
    }

    pub fn material(&self) -> Option<MaterialHandle> {
        match self.kind {
            EntityKind::Renderable(material) => Some(material),
            EntityKind::LightProxy(_) => None,
        }
    }
}

/// A volume light together with the proxy entity that bounds it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneLight {
    pub light: VolumeLight,
    pub proxy: EntityId,
}

/// Flat list of entities plus the lights and camera that view them.
///
/// The scene owns entities only; meshes and materials stay with the asset
/// provider and are referenced by handle.
#[derive(Debug, Clone)]
pub struct Scene {
    entities: Vec<Entity>,
    lights: Vec<SceneLight>,
    pub directional: DirectionalLight,
    pub ambient: AmbientLight,
    pub camera: Camera,
    pub settings: RendererSettings,
}

impl Scene {
    pub fn new(camera: Camera, settings: RendererSettings) -> Self {
        Self {
            entities: Vec::new(),
            lights: Vec::new(),
            directional: DirectionalLight::off(),
            ambient: AmbientLight::default(),
            camera,
            settings: settings.sanitized(),
        }
    }

    pub fn add_entity(&mut self, entity: Entity) -> EntityId {
        let id = EntityId(self.entities.len());
        self.entities.push(entity);
        id
    }

    /// Adds a volume light and the proxy entity that will be drawn for it.
    pub fn add_light(&mut self, name: impl Into<String>, light: VolumeLight, volume: MeshRef) -> EntityId {
        let point = light.point_light();
        let proxy = self.add_entity(Entity {
            name: name.into(),
            role: EntityRole::LightVolume,
            mesh: volume,
            kind: EntityKind::LightProxy(point.diffuse_color),
            transform: Transform::from_position(point.position),
        });
        self.lights.push(SceneLight { light, proxy });
        self.sync_proxy(self.lights.len() - 1);
        proxy
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id.0)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(id.0)
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Entities the geometry pass draws, in insertion order.
    pub fn renderables(&self) -> impl Iterator<Item = (EntityId, &Entity, MaterialHandle)> + '_ {
        self.entities
            .iter()
            .enumerate()
            .filter_map(|(index, entity)| {
                entity
                    .material()
                    .map(|material| (EntityId(index), entity, material))
            })
    }

    pub fn by_role(&self, role: EntityRole) -> impl Iterator<Item = (EntityId, &Entity)> + '_ {
        self.entities
            .iter()
            .enumerate()
            .filter(move |(_, entity)| entity.role == role)
            .map(|(index, entity)| (EntityId(index), entity))
    }

    pub fn ground(&self) -> Option<&Entity> {
        self.by_role(EntityRole::Ground).next().map(|(_, entity)| entity)
    }

    pub fn lights(&self) -> &[SceneLight] {
        &self.lights
    }

    pub fn light_mut(&mut self, index: usize) -> Option<&mut VolumeLight> {
        self.lights.get_mut(index).map(|entry| &mut entry.light)
    }

    /// Radius of the sphere a light volume must cover.
    pub fn volume_radius(&self, light: &VolumeLight) -> f32 {
        light.point_light().range * self.settings.light_volume_scale
    }

    /// Per-frame update: proxies follow their lights, every world matrix is
    /// recomputed and the camera's view matrix refreshed.
    pub fn update(&mut self) {
        self.directional.diffuse_color = clamp_color(self.directional.diffuse_color);
        self.ambient.ambient_color = clamp_color(self.ambient.ambient_color);
        for index in 0..self.lights.len() {
            self.sync_proxy(index);
        }
        for entity in &mut self.entities {
            entity.transform.update_world_matrix();
        }
        self.camera.update_view_matrix();
    }

    fn sync_proxy(&mut self, index: usize) {
        let light = self.lights[index].light.sanitized();
        self.lights[index].light = light;
        let proxy = self.lights[index].proxy;
        let radius = self.volume_radius(&light);
        let point = *light.point_light();
        let Some(entity) = self.entities.get_mut(proxy.0) else {
            return;
        };
        // Scale the mesh so its inscribed sphere matches the volume radius.
        let fit = if entity.mesh.inscribed_radius > 0.0 {
            radius / entity.mesh.inscribed_radius
        } else {
            radius * 2.0
        };
        entity.transform.position = point.position;
        entity.transform.scale = Vec3::splat(fit);
        entity.kind = EntityKind::LightProxy(point.diffuse_color);
        entity.transform.update_world_matrix();
        debug!(
            "light volume {} at {:?} radius {radius:.3}",
            entity.name, point.position
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Projection;
    use crate::light::PointLight;
    use crate::material::MeshHandle;

    fn sphere() -> MeshRef {
        MeshRef {
            handle: MeshHandle(0),
            index_count: 36,
            inscribed_radius: 0.5,
            bounding_radius: 0.5,
        }
    }

    fn scene() -> Scene {
        let camera = Camera::new(Vec3::new(0.0, 0.0, -5.0), Projection::default(), 1.0);
        let mut scene = Scene::new(camera, RendererSettings::default());
        scene.add_entity(Entity::renderable(
            "ground",
            EntityRole::Ground,
            sphere(),
            MaterialHandle(0),
            Transform::default(),
        ));
        scene.add_light(
            "blue",
            VolumeLight::Point(PointLight::new(Vec4::new(0.0, 0.0, 1.0, 1.0), Vec3::X * 2.0, 7.0)),
            sphere(),
        );
        scene
    }

    #[test]
    fn renderables_skip_light_proxies() {
        let scene = scene();
        assert_eq!(scene.entities().len(), 2);
        let drawn: Vec<_> = scene.renderables().map(|(_, entity, _)| entity.name.clone()).collect();
        assert_eq!(drawn, vec!["ground".to_string()]);
        assert_eq!(scene.by_role(EntityRole::LightVolume).count(), 1);
        assert_eq!(scene.ground().map(|e| e.name.as_str()), Some("ground"));
    }

    #[test]
    fn update_moves_and_resizes_proxy() {
        let mut scene = scene();
        if let Some(light) = scene.light_mut(0) {
            let point = light.point_light_mut();
            point.position = Vec3::new(1.0, 2.0, 3.0);
            point.range = 4.0;
        }
        scene.update();
        let proxy = scene.entity(scene.lights()[0].proxy).unwrap();
        assert_eq!(proxy.transform.position, Vec3::new(1.0, 2.0, 3.0));
        // radius 4 * 1.15 over an inscribed radius of 0.5
        assert!((proxy.transform.scale.x - 9.2).abs() < 1e-4);
        let centre = proxy.transform.world_matrix().transform_point3(Vec3::ZERO);
        assert!((centre - Vec3::new(1.0, 2.0, 3.0)).length() < 1e-6);
    }

    #[test]
    fn update_clamps_lights_edited_in_place() {
        let mut scene = scene();
        if let Some(light) = scene.light_mut(0) {
            let point = light.point_light_mut();
            point.diffuse_color = Vec4::new(3.0, -1.0, 0.5, 1.0);
            point.range = -2.0;
        }
        scene.ambient.ambient_color = Vec4::splat(4.0);
        scene.update();
        let light = scene.lights()[0].light;
        assert_eq!(light.point_light().diffuse_color, Vec4::new(1.0, 0.0, 0.5, 1.0));
        assert_eq!(light.point_light().range, 0.0);
        assert_eq!(scene.ambient.ambient_color, Vec4::ONE);
        let proxy = scene.entity(scene.lights()[0].proxy).unwrap();
        assert_eq!(proxy.kind, EntityKind::LightProxy(Vec4::new(1.0, 0.0, 0.5, 1.0)));
    }

    #[test]
    fn update_refreshes_entity_world_matrices() {
        let mut scene = scene();
        let (id, _) = scene.by_role(EntityRole::Ground).next().unwrap();
        scene.entity_mut(id).unwrap().transform.set_position(Vec3::new(0.0, -1.0, 0.0));
        scene.update();
        let world = scene.entity(id).unwrap().transform.world_matrix();
        assert_eq!(world.transform_point3(Vec3::ZERO), Vec3::new(0.0, -1.0, 0.0));
    }
}
