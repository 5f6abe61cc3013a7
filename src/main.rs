use std::any::Any;
use std::env;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use glam::Vec2;
use log::{error, info};
use pollster::block_on;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, MouseButton as WinitMouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode as WinitKeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use deferred_shading::{
    build_frame_plan, default_scene, DeferredRenderer, DisplayMode, Game, HeadlessAssets,
    InputState, KeyCode, LightDepthPolicy, MouseButton, NamedKey, PassState, RenderError,
    SceneDescription,
};

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse(env::args().skip(1))?;
    let mut description = match &options.scene {
        Some(path) => SceneDescription::from_path(path)
            .with_context(|| format!("failed to load scene {}", path.display()))?,
        None => default_scene(),
    };
    if let Some(policy) = options.light_depth {
        description.settings.light_depth = policy;
    }

    if options.summary_only {
        return run_headless(&description);
    }
    match run_interactive(&description) {
        Ok(()) => Ok(()),
        Err(err) => {
            if err.downcast_ref::<WindowInitError>().is_some() {
                eprintln!(
                    "{err}. Falling back to --summary-only mode (set DISPLAY or install a GPU driver to enable rendering)."
                );
                run_headless(&description)
            } else {
                Err(err)
            }
        }
    }
}

fn run_headless(description: &SceneDescription) -> Result<()> {
    let mut assets = HeadlessAssets::new();
    let mut scene = description
        .instantiate(&mut assets)
        .context("failed to build scene")?;
    scene.update();

    println!(
        "Loaded scene with {} entities ({} lights)",
        scene.entities().len(),
        scene.lights().len()
    );
    for entity in scene.entities() {
        let p = entity.transform.position;
        println!(
            " - {} ({:?}) pos=({:.2}, {:.2}, {:.2})",
            entity.name, entity.role, p.x, p.y, p.z
        );
    }
    println!(
        "Assets: {} meshes, {} textures, {} materials",
        assets.mesh_count(),
        assets.texture_count(),
        assets.material_count()
    );

    let plan = build_frame_plan(&scene, DisplayMode::Lit);
    println!(
        "Frame plan: {} geometry draws, {} light volumes (light depth: {})",
        plan.geometry.len(),
        plan.volume_count(),
        scene.settings.light_depth
    );
    if let deferred_shading::render::LightingPlan::Lit { volumes, .. } = &plan.lighting {
        for volume in volumes {
            let name = scene
                .entity(volume.proxy)
                .map_or("?", |entity| entity.name.as_str());
            let kind = if volume.light.is_spot() { "spot" } else { "point" };
            println!(
                " - {name}: {kind} radius={:.2} camera_inside={} faces={}",
                volume.radius,
                volume.camera_inside,
                if volume.state == PassState::VOLUME_OUTSIDE {
                    "front"
                } else {
                    "back"
                }
            );
        }
    }
    Ok(())
}

fn run_interactive(description: &SceneDescription) -> Result<()> {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let event_loop = panic::catch_unwind(AssertUnwindSafe(EventLoop::new));
    panic::set_hook(default_hook);
    let event_loop = event_loop
        .map_err(|panic| WindowInitError::from_panic("event loop", panic))?
        .map_err(|err| WindowInitError::from_error("event loop", err))?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App {
        description: description.clone(),
        input: Arc::new(InputState::new()),
        game: None,
        error: None,
        started: Instant::now(),
        last_frame: Instant::now(),
    };
    event_loop
        .run_app(&mut app)
        .context("event loop terminated abnormally")?;

    if let Some(game) = &app.game {
        println!("Rendered {} frame(s)", game.frames());
    }
    match app.error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

struct App {
    description: SceneDescription,
    input: Arc<InputState>,
    game: Option<Game<DeferredRenderer>>,
    error: Option<anyhow::Error>,
    started: Instant,
    last_frame: Instant,
}

impl App {
    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let settings = &self.description.settings;
        let attributes = Window::default_attributes()
            .with_title("Deferred Shading")
            .with_inner_size(LogicalSize::new(
                settings.window_width as f64,
                settings.window_height as f64,
            ));
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .map_err(|err| WindowInitError::from_error("window", err))?,
        );
        let size = window.inner_size();

        let renderer = match block_on(DeferredRenderer::new(window)) {
            Ok(renderer) => renderer,
            Err(err @ (RenderError::CreateSurface(_) | RenderError::RequestAdapter(_))) => {
                return Err(WindowInitError::from_error("GPU", err).into());
            }
            Err(err) => return Err(err).context("failed to initialize renderer"),
        };
        let mut game = Game::init(renderer, &self.description, Arc::clone(&self.input))?;
        game.on_resize(size.width, size.height);
        info!("renderer ready at {}x{}", size.width, size.height);

        self.last_frame = Instant::now();
        self.game = Some(game);
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!("{err:#}");
        self.error = Some(err);
        event_loop.exit();
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(game) = self.game.as_mut() else {
            return;
        };
        let now = Instant::now();
        let delta = now.duration_since(self.last_frame).as_secs_f32();
        let total = now.duration_since(self.started).as_secs_f32();
        self.last_frame = now;

        if !game.update(delta, total) {
            event_loop.exit();
            return;
        }
        if let Err(err) = game.draw(delta, total) {
            self.fail(event_loop, err);
        }
    }

    fn handle_keyboard(&self, code: WinitKeyCode, state: ElementState) {
        let Some(key) = map_keycode(code) else {
            return;
        };
        match state {
            ElementState::Pressed => self.input.set_key_down(key),
            ElementState::Released => self.input.set_key_up(key),
        }
    }

    fn handle_mouse_button(&self, state: ElementState, button: WinitMouseButton) {
        let button = match button {
            WinitMouseButton::Left => MouseButton::LEFT,
            WinitMouseButton::Right => MouseButton::RIGHT,
            WinitMouseButton::Middle => MouseButton::MIDDLE,
            _ => return,
        };
        match state {
            ElementState::Pressed => self.input.set_mouse_button_down(button),
            ElementState::Released => self.input.set_mouse_button_up(button),
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.game.is_some() {
            return;
        }
        if let Err(err) = self.start(event_loop) {
            self.fail(event_loop, err);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        let Some(game) = self.game.as_mut() else {
            return;
        };
        if Some(window_id) != game.renderer().gpu().window_id() {
            return;
        }
        match event {
            WindowEvent::CloseRequested => {
                info!("window close requested");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                game.on_resize(size.width, size.height);
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(code) = event.physical_key {
                    self.handle_keyboard(code, event.state);
                }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                self.handle_mouse_button(state, button);
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.input
                    .set_mouse_position(Vec2::new(position.x as f32, position.y as f32));
            }
            WindowEvent::RedrawRequested => {
                self.redraw(event_loop);
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = self.game.as_ref().and_then(|game| game.renderer().gpu().window()) {
            window.request_redraw();
        }
    }
}

#[derive(Debug)]
struct WindowInitError {
    message: String,
}

impl WindowInitError {
    fn from_panic(stage: &str, panic: Box<dyn Any + Send>) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {}", panic_message(panic)),
        }
    }

    fn from_error(stage: &str, err: impl fmt::Display) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {err}"),
        }
    }
}

impl fmt::Display for WindowInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for WindowInitError {}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(msg) => *msg,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(msg) => (*msg).to_string(),
            Err(_) => "unknown panic".into(),
        },
    }
}

fn map_keycode(code: WinitKeyCode) -> Option<KeyCode> {
    Some(match code {
        WinitKeyCode::Space => KeyCode::Named(NamedKey::Space),
        WinitKeyCode::Escape => KeyCode::Named(NamedKey::Escape),
        WinitKeyCode::ShiftLeft => KeyCode::Named(NamedKey::LeftShift),
        WinitKeyCode::ShiftRight => KeyCode::Named(NamedKey::RightShift),
        WinitKeyCode::KeyW => KeyCode::Character('W'),
        WinitKeyCode::KeyA => KeyCode::Character('A'),
        WinitKeyCode::KeyS => KeyCode::Character('S'),
        WinitKeyCode::KeyD => KeyCode::Character('D'),
        WinitKeyCode::KeyX => KeyCode::Character('X'),
        WinitKeyCode::Digit0 => KeyCode::Digit(0),
        WinitKeyCode::Digit1 => KeyCode::Digit(1),
        WinitKeyCode::Digit2 => KeyCode::Digit(2),
        WinitKeyCode::Digit3 => KeyCode::Digit(3),
        _ => return None,
    })
}

struct CliOptions {
    scene: Option<PathBuf>,
    summary_only: bool,
    light_depth: Option<LightDepthPolicy>,
}

impl CliOptions {
    const USAGE: &'static str =
        "Usage: deferred-shading [scene.xml] [--summary-only] [--light-depth test|off]";

    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut scene = None;
        let mut summary_only = false;
        let mut light_depth = None;
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--summary-only" => summary_only = true,
                "--light-depth" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--light-depth needs a value. {}", Self::USAGE))?;
                    light_depth = Some(value.parse::<LightDepthPolicy>().map_err(|err| anyhow!(err))?);
                }
                "-h" | "--help" => return Err(anyhow!(Self::USAGE)),
                other if other.starts_with("--") => {
                    return Err(anyhow!(
                        "Unknown argument: {other}. Expected --summary-only or --light-depth"
                    ));
                }
                other => {
                    if scene.is_some() {
                        return Err(anyhow!("Only one scene file may be given. {}", Self::USAGE));
                    }
                    scene = Some(PathBuf::from(other));
                }
            }
        }
        Ok(Self {
            scene,
            summary_only,
            light_depth,
        })
    }
}
