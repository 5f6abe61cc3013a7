//! Explicit pass state.
//!
//! Rasterizer, blend and depth settings travel as a [`PassState`] value.
//! A pass acquires its state from the [`StateTracker`] and gets a
//! [`PassScope`] back; dropping the scope restores [`PassState::DEFAULT`].

use glam::Vec4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullMode {
    None,
    Front,
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendMode {
    /// Output overwrites the target.
    Replace,
    /// `src * 1 + dst * 1` on color and alpha.
    Additive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepthCompare {
    Less,
    LessEqual,
    Greater,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthState {
    pub compare: DepthCompare,
    pub write: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PassState {
    pub raster: CullMode,
    pub blend: BlendMode,
    pub depth: DepthState,
}

impl PassState {
    /// Back-face culling, `Less` with writes, no blending.
    pub const DEFAULT: Self = Self {
        raster: CullMode::Back,
        blend: BlendMode::Replace,
        depth: DepthState {
            compare: DepthCompare::Less,
            write: true,
        },
    };

    pub const GEOMETRY: Self = Self::DEFAULT;

    /// Full-screen directional term: only pixels in front of the far plane.
    pub const DIRECTIONAL: Self = Self {
        raster: CullMode::None,
        blend: BlendMode::Replace,
        depth: DepthState {
            compare: DepthCompare::Greater,
            write: false,
        },
    };

    /// Volume front faces tested against scene depth.
    pub const VOLUME_OUTSIDE: Self = Self {
        raster: CullMode::Back,
        blend: BlendMode::Additive,
        depth: DepthState {
            compare: DepthCompare::LessEqual,
            write: false,
        },
    };

    /// Volume back faces, untested; used when the eye is inside the volume
    /// or depth testing is disabled.
    pub const VOLUME_INSIDE: Self = Self {
        raster: CullMode::Front,
        blend: BlendMode::Additive,
        depth: DepthState {
            compare: DepthCompare::Always,
            write: false,
        },
    };

    /// Raw G-buffer view.
    pub const DISPLAY: Self = Self {
        raster: CullMode::None,
        blend: BlendMode::Replace,
        depth: DepthState {
            compare: DepthCompare::Always,
            write: false,
        },
    };

    /// Every state a frame can request, for pipeline pre-warming.
    pub const ALL: [Self; 5] = [
        Self::GEOMETRY,
        Self::DIRECTIONAL,
        Self::VOLUME_OUTSIDE,
        Self::VOLUME_INSIDE,
        Self::DISPLAY,
    ];
}

impl Default for PassState {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// Everything a pass needs besides its draws.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassContext {
    pub label: &'static str,
    pub viewport: Viewport,
    /// Color every target is cleared to, if the pass clears.
    pub clear: Option<Vec4>,
    pub state: PassState,
}

#[derive(Debug, Default)]
pub struct StateTracker {
    current: PassState,
    active: Option<&'static str>,
    transitions: usize,
}

impl StateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> PassState {
        self.current
    }

    /// Label of the pass holding the tracker, if any.
    pub fn active(&self) -> Option<&'static str> {
        self.active
    }

    /// Number of state changes since creation, restores included.
    pub fn transitions(&self) -> usize {
        self.transitions
    }

    pub fn acquire(&mut self, context: PassContext) -> PassScope<'_> {
        self.apply(context.state);
        self.active = Some(context.label);
        PassScope {
            tracker: self,
            context,
        }
    }

    fn apply(&mut self, state: PassState) {
        if self.current != state {
            self.current = state;
            self.transitions += 1;
        }
    }
}

/// Exclusive hold on the tracker for one pass.
#[derive(Debug)]
pub struct PassScope<'a> {
    tracker: &'a mut StateTracker,
    context: PassContext,
}

impl PassScope<'_> {
    pub fn context(&self) -> &PassContext {
        &self.context
    }

    pub fn state(&self) -> PassState {
        self.context.state
    }

    /// Switches state inside the pass, e.g. per light volume.
    pub fn transition(&mut self, state: PassState) -> PassState {
        self.context.state = state;
        self.tracker.apply(state);
        state
    }
}

impl Drop for PassScope<'_> {
    fn drop(&mut self) {
        self.tracker.apply(PassState::DEFAULT);
        self.tracker.active = None;
    }
}
