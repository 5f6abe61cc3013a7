use thiserror::Error;

/// Failures surfaced by the renderer and its resource providers.
///
/// Everything raised during initialization is treated as fatal by the
/// frame orchestrator; only [`RenderError::Surface`] is expected at frame
/// time.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to create rendering surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),

    #[error("failed to acquire GPU adapter: {0}")]
    RequestAdapter(#[from] wgpu::RequestAdapterError),

    #[error("failed to create GPU device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("surface reports no supported texture formats")]
    NoSurfaceFormat,

    #[error("window has zero area")]
    ZeroSizedWindow,

    #[error(
        "adapter supports {available} color attachment bytes per sample, G-buffer needs {required}"
    )]
    UnsupportedGBuffer { required: u32, available: u32 },

    #[error("failed to load {kind} asset {name}: {reason}")]
    Asset {
        kind: &'static str,
        name: String,
        reason: String,
    },

    #[error("unknown {kind} handle {index}")]
    UnknownHandle { kind: &'static str, index: usize },

    #[error("no pipeline prepared for {0}")]
    MissingPipeline(String),

    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),

    #[error("failed to read back output: {0}")]
    Readback(String),
}

impl RenderError {
    pub(crate) fn asset(kind: &'static str, name: impl Into<String>, reason: impl ToString) -> Self {
        Self::Asset {
            kind,
            name: name.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T, E = RenderError> = std::result::Result<T, E>;
