//! Frame planning and the wgpu backend that executes the plans.

pub mod deferred;
pub mod gbuffer;
pub mod gpu;
pub mod pipelines;
pub mod plan;
mod shaders;
pub mod state;
pub mod uniforms;

pub use deferred::DeferredRenderer;
pub use gbuffer::{GBufferLayout, GBufferTarget};
pub use gpu::{GpuContext, GpuResources};
pub use plan::{build_frame_plan, DisplayMode, FramePlan, GeometryDraw, LightDraw, LightingPlan};
pub use state::{BlendMode, CullMode, DepthCompare, PassState, StateTracker};
