//! Per-frame draw lists built from the scene.
//!
//! Planning is pure: it decides what each pass draws and with which state,
//! and the GPU backend only executes the result.

use std::fmt;

use glam::{Mat4, Vec3, Vec4};

use super::gbuffer::GBufferTarget;
use super::state::PassState;
use crate::camera::Camera;
use crate::light::{AmbientLight, DirectionalLight, VolumeLight};
use crate::material::MaterialHandle;
use crate::mesh::MeshRef;
use crate::scene::{EntityId, Scene};
use crate::settings::LightDepthPolicy;

/// What the lighting pass puts on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DisplayMode {
    #[default]
    Lit,
    Position,
    Normal,
    Diffuse,
}

impl DisplayMode {
    pub fn target(self) -> Option<GBufferTarget> {
        match self {
            Self::Lit => None,
            Self::Position => Some(GBufferTarget::Position),
            Self::Normal => Some(GBufferTarget::Normal),
            Self::Diffuse => Some(GBufferTarget::Diffuse),
        }
    }

    /// Number keys `0`-`3`.
    pub fn from_digit(digit: u8) -> Option<Self> {
        match digit {
            0 => Some(Self::Lit),
            1 => Some(Self::Position),
            2 => Some(Self::Normal),
            3 => Some(Self::Diffuse),
            _ => None,
        }
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Lit => "lit",
            Self::Position => "position",
            Self::Normal => "normal",
            Self::Diffuse => "diffuse",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometryDraw {
    pub entity: EntityId,
    pub mesh: MeshRef,
    pub material: MaterialHandle,
    pub world: Mat4,
    pub normal: Mat4,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightDraw {
    pub proxy: EntityId,
    pub mesh: MeshRef,
    pub world: Mat4,
    pub light: VolumeLight,
    /// Radius the volume is guaranteed to cover.
    pub radius: f32,
    pub camera_inside: bool,
    pub state: PassState,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LightingPlan {
    Lit {
        directional: DirectionalLight,
        ambient: AmbientLight,
        volumes: Vec<LightDraw>,
    },
    Display(GBufferTarget),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FramePlan {
    pub background: Vec4,
    pub view_projection: Mat4,
    pub geometry: Vec<GeometryDraw>,
    pub lighting: LightingPlan,
}

impl FramePlan {
    pub fn volume_count(&self) -> usize {
        match &self.lighting {
            LightingPlan::Lit { volumes, .. } => volumes.len(),
            LightingPlan::Display(_) => 0,
        }
    }
}

/// State for one light volume given where the camera is.
pub fn volume_state(policy: LightDepthPolicy, camera_inside: bool) -> PassState {
    match policy {
        LightDepthPolicy::Test if !camera_inside => PassState::VOLUME_OUTSIDE,
        _ => PassState::VOLUME_INSIDE,
    }
}

/// Whether the near plane can cut into a volume of `bounding` radius.
pub fn camera_inside(camera: &Camera, center: Vec3, bounding: f32) -> bool {
    camera.position().distance(center) <= bounding + camera.near_plane_reach()
}

/// Builds the draws for one frame. The scene must already be updated.
pub fn build_frame_plan(scene: &Scene, display: DisplayMode) -> FramePlan {
    let geometry = scene
        .renderables()
        .map(|(entity_id, entity, material)| GeometryDraw {
            entity: entity_id,
            mesh: entity.mesh,
            material,
            world: entity.transform.world_matrix(),
            normal: entity.transform.normal_matrix(),
        })
        .collect();

    let lighting = match display.target() {
        Some(target) => LightingPlan::Display(target),
        None => LightingPlan::Lit {
            directional: scene.directional,
            ambient: scene.ambient,
            volumes: scene
                .lights()
                .iter()
                .filter_map(|entry| {
                    let proxy = scene.entity(entry.proxy)?;
                    let radius = scene.volume_radius(&entry.light);
                    let bounding = if proxy.mesh.inscribed_radius > 0.0 {
                        radius * proxy.mesh.bounding_radius / proxy.mesh.inscribed_radius
                    } else {
                        radius
                    };
                    let inside =
                        camera_inside(&scene.camera, entry.light.point_light().position, bounding);
                    Some(LightDraw {
                        proxy: entry.proxy,
                        mesh: proxy.mesh,
                        world: proxy.transform.world_matrix(),
                        light: entry.light,
                        radius,
                        camera_inside: inside,
                        state: volume_state(scene.settings.light_depth, inside),
                    })
                })
                .collect(),
        },
    };

    FramePlan {
        background: scene.settings.background,
        view_projection: scene.camera.view_projection(),
        geometry,
        lighting,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::HeadlessAssets;
    use crate::description::default_scene;
    use crate::scene::{EntityKind, EntityRole};

    fn demo() -> Scene {
        default_scene()
            .instantiate(&mut HeadlessAssets::new())
            .unwrap()
    }

    #[test]
    fn light_proxies_never_reach_the_geometry_plan() {
        let scene = demo();
        let plan = build_frame_plan(&scene, DisplayMode::Lit);
        assert_eq!(plan.geometry.len(), 13);
        for draw in &plan.geometry {
            let entity = scene.entity(draw.entity).unwrap();
            assert!(matches!(entity.kind, EntityKind::Renderable(_)));
            assert_ne!(entity.role, EntityRole::LightVolume);
        }
    }

    #[test]
    fn one_volume_draw_per_light() {
        let scene = demo();
        let plan = build_frame_plan(&scene, DisplayMode::Lit);
        assert_eq!(plan.volume_count(), scene.lights().len());
    }

    #[test]
    fn geometry_keeps_insertion_order() {
        let scene = demo();
        let plan = build_frame_plan(&scene, DisplayMode::Lit);
        let ids: Vec<_> = plan.geometry.iter().map(|draw| draw.entity.index()).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn volume_containing_the_camera_switches_to_back_faces() {
        let mut scene = demo();
        let light = scene.lights()[0].light.point_light().position;
        scene.camera.set_position(light + Vec3::new(0.0, 0.0, -1.0));
        scene.update();
        let plan = build_frame_plan(&scene, DisplayMode::Lit);
        let LightingPlan::Lit { volumes, .. } = &plan.lighting else {
            panic!("expected a lit plan");
        };
        assert!(volumes[0].camera_inside);
        assert_eq!(volumes[0].state, PassState::VOLUME_INSIDE);
    }

    #[test]
    fn distant_volume_is_depth_tested() {
        let mut scene = demo();
        scene.camera.set_position(Vec3::new(0.0, 1.0, -60.0));
        scene.update();
        let plan = build_frame_plan(&scene, DisplayMode::Lit);
        let LightingPlan::Lit { volumes, .. } = &plan.lighting else {
            panic!("expected a lit plan");
        };
        assert!(volumes.iter().all(|v| v.state == PassState::VOLUME_OUTSIDE));
    }

    #[test]
    fn scene_without_volume_lights_still_runs_the_directional_term() {
        let mut description = default_scene();
        description.lights.clear();
        let scene = description.instantiate(&mut HeadlessAssets::new()).unwrap();
        let plan = build_frame_plan(&scene, DisplayMode::Lit);
        let LightingPlan::Lit {
            directional,
            volumes,
            ..
        } = &plan.lighting
        else {
            panic!("expected a lit plan");
        };
        assert!(volumes.is_empty());
        assert_eq!(*directional, scene.directional);
        assert_eq!(plan.volume_count(), 0);
        assert_eq!(plan.geometry.len(), 13);
    }

    #[test]
    fn disabled_policy_always_uses_back_faces() {
        assert_eq!(volume_state(LightDepthPolicy::Disabled, false), PassState::VOLUME_INSIDE);
        assert_eq!(volume_state(LightDepthPolicy::Test, false), PassState::VOLUME_OUTSIDE);
    }

    #[test]
    fn debug_display_replaces_lighting() {
        let plan = build_frame_plan(&demo(), DisplayMode::Normal);
        assert_eq!(plan.lighting, LightingPlan::Display(GBufferTarget::Normal));
        assert_eq!(plan.volume_count(), 0);
        assert_eq!(plan.geometry.len(), 13);
    }
}
