use std::sync::Arc;

use anyhow::{anyhow, Context};
use log::{info, warn};

use crate::assets::AssetProvider;
use crate::camera::CameraController;
use crate::description::SceneDescription;
use crate::error::{RenderError, Result};
use crate::input::{InputState, KeyCode};
use crate::render::{build_frame_plan, DisplayMode, FramePlan};
use crate::scene::Scene;

/// Backend the frame orchestrator drives.
pub trait FrameRenderer {
    /// Provider used to upload scene assets during [`Game::init`].
    fn assets(&mut self) -> &mut dyn AssetProvider;
    /// Recreates size-dependent targets. Never called with a zero area.
    fn resize(&mut self, width: u32, height: u32);
    fn draw(&mut self, plan: &FramePlan) -> Result<()>;
}

/// Frame orchestrator: owns the scene and sequences update and draw.
pub struct Game<R> {
    renderer: R,
    scene: Scene,
    input: Arc<InputState>,
    controller: CameraController,
    display: DisplayMode,
    size: (u32, u32),
    frames: u64,
}

impl<R: FrameRenderer> Game<R> {
    /// Builds the scene through the renderer's asset provider.
    pub fn init(
        mut renderer: R,
        description: &SceneDescription,
        input: Arc<InputState>,
    ) -> anyhow::Result<Self> {
        let scene = description
            .instantiate(renderer.assets())
            .context("failed to build scene")?;
        let size = (scene.settings.window_width, scene.settings.window_height);
        info!(
            "scene ready: {} entities, {} lights",
            scene.entities().len(),
            scene.lights().len()
        );
        Ok(Self {
            renderer,
            scene,
            input,
            controller: CameraController::default(),
            display: DisplayMode::Lit,
            size,
            frames: 0,
        })
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn display_mode(&self) -> DisplayMode {
        self.display
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Applies a new output size. Zero-area sizes (minimized windows) are
    /// ignored and leave every target and the projection untouched.
    pub fn on_resize(&mut self, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 {
            return false;
        }
        self.size = (width, height);
        self.renderer.resize(width, height);
        self.scene
            .camera
            .update_projection(width as f32 / height as f32);
        true
    }

    /// Reads input, moves the camera and refreshes every world matrix.
    /// Returns false once quitting was requested.
    pub fn update(&mut self, delta_time: f32, _total_time: f32) -> bool {
        if self.input.quit_requested() {
            return false;
        }
        self.controller
            .update(&mut self.scene.camera, &self.input, delta_time);
        for digit in 0..=3 {
            if !self.input.is_key_down(KeyCode::Digit(digit)) {
                continue;
            }
            if let Some(mode) = DisplayMode::from_digit(digit) {
                if mode != self.display {
                    info!("display mode: {mode}");
                    self.display = mode;
                }
            }
        }
        self.scene.update();
        true
    }

    pub fn frame_plan(&self) -> FramePlan {
        build_frame_plan(&self.scene, self.display)
    }

    /// Renders one frame. Transient surface errors skip the frame; running
    /// out of memory is fatal.
    pub fn draw(&mut self, _delta_time: f32, _total_time: f32) -> anyhow::Result<()> {
        let plan = self.frame_plan();
        match self.renderer.draw(&plan) {
            Ok(()) => {
                self.frames += 1;
                Ok(())
            }
            Err(RenderError::Surface(wgpu::SurfaceError::OutOfMemory)) => {
                Err(anyhow!("GPU is out of memory"))
            }
            Err(RenderError::Surface(err)) => {
                warn!("skipping frame: {err}");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::HeadlessAssets;
    use crate::description::default_scene;
    use crate::input::NamedKey;
    use crate::render::LightingPlan;

    #[derive(Default)]
    struct RecordingRenderer {
        assets: HeadlessAssets,
        resizes: Vec<(u32, u32)>,
        plans: Vec<FramePlan>,
        fail_with: Option<wgpu::SurfaceError>,
    }

    impl FrameRenderer for RecordingRenderer {
        fn assets(&mut self) -> &mut dyn AssetProvider {
            &mut self.assets
        }

        fn resize(&mut self, width: u32, height: u32) {
            self.resizes.push((width, height));
        }

        fn draw(&mut self, plan: &FramePlan) -> Result<()> {
            if let Some(err) = self.fail_with.clone() {
                return Err(err.into());
            }
            self.plans.push(plan.clone());
            Ok(())
        }
    }

    fn game() -> (Game<RecordingRenderer>, Arc<InputState>) {
        let input = Arc::new(InputState::new());
        let game = Game::init(RecordingRenderer::default(), &default_scene(), Arc::clone(&input))
            .unwrap();
        (game, input)
    }

    #[test]
    fn zero_area_resize_is_skipped() {
        let (mut game, _) = game();
        let projection = game.scene().camera.projection();
        assert!(!game.on_resize(0, 600));
        assert!(!game.on_resize(800, 0));
        assert!(game.renderer().resizes.is_empty());
        assert_eq!(game.scene().camera.projection(), projection);

        assert!(game.on_resize(800, 600));
        assert_eq!(game.renderer().resizes, vec![(800, 600)]);
        assert_eq!(game.size(), (800, 600));
        assert_ne!(game.scene().camera.projection(), projection);
    }

    #[test]
    fn draw_hands_the_plan_to_the_renderer() {
        let (mut game, _) = game();
        assert!(game.update(0.016, 0.016));
        game.draw(0.016, 0.016).unwrap();
        let plan = &game.renderer().plans[0];
        assert_eq!(plan.geometry.len(), 13);
        assert_eq!(plan.volume_count(), 2);
        assert_eq!(game.frames(), 1);
    }

    #[test]
    fn digit_keys_switch_display_mode() {
        let (mut game, input) = game();
        input.set_key_down(KeyCode::Digit(2));
        game.update(0.016, 0.016);
        assert_eq!(game.display_mode(), DisplayMode::Normal);
        assert!(matches!(game.frame_plan().lighting, LightingPlan::Display(_)));

        input.set_key_up(KeyCode::Digit(2));
        input.set_key_down(KeyCode::Digit(0));
        game.update(0.016, 0.032);
        assert_eq!(game.display_mode(), DisplayMode::Lit);
    }

    #[test]
    fn escape_stops_the_loop() {
        let (mut game, input) = game();
        input.set_key_down(KeyCode::Named(NamedKey::Escape));
        assert!(!game.update(0.016, 0.016));
    }

    #[test]
    fn transient_surface_errors_skip_the_frame() {
        let (mut game, _) = game();
        game.renderer_mut().fail_with = Some(wgpu::SurfaceError::Timeout);
        assert!(game.draw(0.016, 0.016).is_ok());
        assert_eq!(game.frames(), 0);

        game.renderer_mut().fail_with = Some(wgpu::SurfaceError::OutOfMemory);
        assert!(game.draw(0.016, 0.016).is_err());
    }
}
