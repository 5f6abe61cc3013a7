//! Two-pass deferred shading renderer.
//!
//! The geometry pass writes world position, normal and diffuse color into a
//! G-buffer; the lighting pass reads it back and accumulates one directional
//! term plus one additive light-volume draw per point or spot light.
//!
//! Everything above the GPU backend (scene, planning, shading math, state
//! tracking) is plain data and runs without a device, which is what the
//! tests and the `--summary-only` mode rely on.

pub mod app;
pub mod assets;
pub mod camera;
pub mod description;
pub mod error;
pub mod input;
pub mod light;
pub mod material;
pub mod mesh;
pub mod obj;
pub mod render;
pub mod scene;
pub mod settings;
pub mod shading;
pub mod transform;

pub use app::{FrameRenderer, Game};
pub use assets::{AssetProvider, HeadlessAssets, MeshSource, TextureSource, TextureUsage};
pub use camera::{Camera, CameraController, Projection};
pub use description::{default_scene, SceneDescription};
pub use error::RenderError;
pub use input::{InputState, KeyCode, MouseButton, NamedKey};
pub use light::{AmbientLight, DirectionalLight, PointLight, SpotLight, VolumeLight};
pub use material::{Material, SamplerDesc};
pub use mesh::{MeshData, MeshRef, Vertex};
pub use obj::load_obj_from_str;
pub use render::{build_frame_plan, DeferredRenderer, DisplayMode, FramePlan, PassState};
pub use scene::{Entity, EntityId, EntityKind, EntityRole, Scene};
pub use settings::{LightDepthPolicy, RendererSettings};
pub use transform::Transform;
