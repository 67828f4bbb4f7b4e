use std::env;
use std::fs;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use glam::{Vec2, Vec3};
use log::{info, warn};
use pollster::block_on;
use rand::rngs::StdRng;
use rand::SeedableRng;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{DeviceEvent, DeviceId, ElementState, MouseButton as WinitMouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::window::{CursorGrabMode, Window, WindowId};

use rayview::{
    projection_matrix, ray_direction, screen_ray_matrix, Camera, CameraController, FrameInput,
    FrameParams, InputState, KeyCode, LightParams, LightSpec, NamedKey, Renderer, Scene,
    SkyParams, TuningState,
};

const NEAR: f32 = 2.0;
const FAR: f32 = 20.0;
const AMBIENT_SAMPLES: u32 = 64;

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse()?;
    let scene = match &options.scene {
        Some(path) => {
            let xml = fs::read_to_string(path)
                .with_context(|| format!("failed to read scene file {path}"))?;
            Scene::from_xml(&xml).context("failed to parse scene XML")?
        }
        None => Scene::default(),
    };

    println!("Loaded scene with {} light(s)", scene.lights.len().max(1));

    let tuning = TuningState::from_scene(&scene);

    if options.summary_only {
        run_headless(&scene, &tuning)
    } else {
        match run_interactive(scene.clone(), tuning.clone()) {
            Ok(()) => Ok(()),
            Err(InteractiveError::NoDisplay(err)) => {
                eprintln!(
                    "{err}. Falling back to --summary-only mode (set DISPLAY or install X11 libs to enable rendering)."
                );
                run_headless(&scene, &tuning)
            }
            Err(InteractiveError::Fatal(err)) => Err(err),
        }
    }
}

/// Prints the derived camera state and a seeded lighting summary, then exits.
/// Used by the CLI test and as the fallback when no display is available.
fn run_headless(scene: &Scene, tuning: &TuningState) -> Result<()> {
    let values = tuning.snapshot();
    let camera = Camera::new(scene.camera.position, scene.camera.yaw, scene.camera.pitch);
    let forward = camera.forward();
    println!(
        "Camera eye=({:.2}, {:.2}, {:.2}) yaw={:.1} pitch={:.1} fov={:.1}",
        camera.eye.x, camera.eye.y, camera.eye.z, camera.yaw, camera.pitch, values.fov
    );
    println!(
        "Camera forward=({:.2}, {:.2}, {:.2})",
        forward.x, forward.y, forward.z
    );

    let aspect = 1280.0 / 720.0;
    let projection = projection_matrix(values.fov, aspect, NEAR, FAR)?;
    let inv = screen_ray_matrix(camera.view_matrix(), projection)?;
    let center = ray_direction(inv, Vec2::ZERO)?;
    println!(
        "Center ray=({:.2}, {:.2}, {:.2})",
        center.x, center.y, center.z
    );

    let mut rng = StdRng::seed_from_u64(0xA1B2);
    let ambient = scene.sky.ambient_estimate(&mut rng, Vec3::Y, 256)?;
    println!(
        "Ambient sky=({:.2}, {:.2}, {:.2})",
        ambient.x, ambient.y, ambient.z
    );
    Ok(())
}

enum InteractiveError {
    /// The event loop could not start at all; headless fallback applies.
    NoDisplay(anyhow::Error),
    Fatal(anyhow::Error),
}

fn run_interactive(scene: Scene, tuning: TuningState) -> Result<(), InteractiveError> {
    let event_loop = EventLoop::new()
        .map_err(|err| InteractiveError::NoDisplay(anyhow!("failed to create event loop: {err}")))?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(scene, tuning);
    event_loop
        .run_app(&mut app)
        .map_err(|err| InteractiveError::Fatal(anyhow!("event loop error: {err}")))?;

    if let Some(err) = app.last_error {
        if !app.window_created {
            return Err(InteractiveError::NoDisplay(err));
        }
        return Err(InteractiveError::Fatal(err));
    }
    Ok(())
}

struct App {
    scene: Scene,
    tuning: TuningState,
    input: Arc<InputState>,
    camera: Camera,
    controller: CameraController,
    renderer: Option<Renderer>,
    rng: StdRng,
    last_frame: Instant,
    window_created: bool,
    last_error: Option<anyhow::Error>,
}

impl App {
    fn new(scene: Scene, tuning: TuningState) -> Self {
        let camera = Camera::new(scene.camera.position, scene.camera.yaw, scene.camera.pitch);
        Self {
            scene,
            tuning,
            input: Arc::new(InputState::new()),
            camera,
            controller: CameraController::default(),
            renderer: None,
            rng: StdRng::from_entropy(),
            last_frame: Instant::now(),
            window_created: false,
            last_error: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        self.last_error = Some(err);
        event_loop.exit();
    }

    /// One frame: sample input, advance the camera, rebuild the matrices,
    /// upload uniforms, draw. A failed derivation skips the frame without
    /// touching the persistent camera state.
    fn tick(&mut self) -> Result<()> {
        let Some(renderer) = self.renderer.as_mut() else {
            return Ok(());
        };

        let now = Instant::now();
        let dt = (now - self.last_frame).as_secs_f32();
        self.last_frame = now;

        let frame_input = FrameInput {
            forward: is_down(&self.input, 'W') || is_named_down(&self.input, NamedKey::Up),
            back: is_down(&self.input, 'S') || is_named_down(&self.input, NamedKey::Down),
            left: is_down(&self.input, 'A') || is_named_down(&self.input, NamedKey::Left),
            right: is_down(&self.input, 'D') || is_named_down(&self.input, NamedKey::Right),
            mouse_delta: self.input.take_mouse_delta(),
            captured: self.input.is_captured(),
        };
        self.camera.apply(&frame_input, &self.controller, dt);

        let values = self.tuning.snapshot();
        let projection = match projection_matrix(values.fov, renderer.aspect(), NEAR, FAR) {
            Ok(matrix) => matrix,
            Err(err) => {
                warn!("skipping frame: {err}");
                return Ok(());
            }
        };
        let inv_view_proj = match screen_ray_matrix(self.camera.view_matrix(), projection) {
            Ok(matrix) => matrix,
            Err(err) => {
                warn!("skipping frame: {err}");
                return Ok(());
            }
        };
        let ambient = match self
            .scene
            .sky
            .ambient_estimate(&mut self.rng, Vec3::Y, AMBIENT_SAMPLES)
        {
            Ok(ambient) => ambient,
            Err(err) => {
                warn!("skipping frame: {err}");
                return Ok(());
            }
        };

        let light_spec = self.scene.lights.first().copied().unwrap_or(LightSpec::default());
        let frame = FrameParams {
            inv_view_proj,
            eye: self.camera.eye,
        };
        let light = LightParams {
            position: light_spec.position,
            color: values.light_color,
            intensity: values.light_intensity,
            kind: values.light_kind,
        };
        let sky = SkyParams {
            horizon: self.scene.sky.horizon,
            zenith: self.scene.sky.zenith,
            ambient_radiance: ambient,
        };

        renderer.update_globals(&frame, &light, &values, &sky);
        if let Err(err) = renderer.render() {
            match err {
                wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
                    let size = renderer.window().inner_size();
                    renderer.resize(size);
                }
                wgpu::SurfaceError::OutOfMemory => {
                    return Err(anyhow!("GPU is out of memory"));
                }
                wgpu::SurfaceError::Timeout => {
                    info!("Surface timeout; skipping frame");
                }
                wgpu::SurfaceError::Other => {
                    return Err(anyhow!("surface rendering failed"));
                }
            }
        }
        Ok(())
    }

    fn handle_keyboard(&mut self, event: &winit::event::KeyEvent) {
        let PhysicalKey::Code(code) = event.physical_key else {
            return;
        };
        let Some(key) = map_keycode(code) else {
            return;
        };
        match event.state {
            ElementState::Pressed => {
                self.input.set_key_down(key);
                self.apply_tuning_key(key);
            }
            ElementState::Released => self.input.set_key_up(key),
        }
    }

    /// Keyboard stand-ins for the sliders and radio buttons of the original
    /// GUI panel.
    fn apply_tuning_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Named(NamedKey::Escape) => self.release_pointer(),
            KeyCode::Digit(1) => self.tuning.set_shading(0),
            KeyCode::Digit(2) => self.tuning.set_shading(1),
            KeyCode::Digit(3) => self.tuning.set_shading(2),
            KeyCode::Character('[') => self.tuning.adjust_fov(-5.0),
            KeyCode::Character(']') => self.tuning.adjust_fov(5.0),
            KeyCode::Character('R') => self.tuning.adjust_roughness(0.05),
            KeyCode::Character('F') => self.tuning.adjust_roughness(-0.05),
            KeyCode::Character('T') => self.tuning.adjust_metallic(0.05),
            KeyCode::Character('G') => self.tuning.adjust_metallic(-0.05),
            KeyCode::Character('C') => self.tuning.adjust_ambient(0.05),
            KeyCode::Character('V') => self.tuning.adjust_ambient(-0.05),
            KeyCode::Character('L') => self.tuning.toggle_light_kind(),
            _ => {}
        }
    }

    fn capture_pointer(&self) {
        let Some(renderer) = self.renderer.as_ref() else {
            return;
        };
        let window = renderer.window();
        let grabbed = window
            .set_cursor_grab(CursorGrabMode::Locked)
            .or_else(|_| window.set_cursor_grab(CursorGrabMode::Confined));
        match grabbed {
            Ok(()) => {
                window.set_cursor_visible(false);
                self.input.set_captured(true);
            }
            Err(err) => warn!("pointer capture unavailable: {err}"),
        }
    }

    fn release_pointer(&self) {
        if let Some(renderer) = self.renderer.as_ref() {
            let _ = renderer.window().set_cursor_grab(CursorGrabMode::None);
            renderer.window().set_cursor_visible(true);
        }
        self.input.set_captured(false);
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.renderer.is_some() {
            return;
        }
        let attributes = Window::default_attributes()
            .with_title("Rayview")
            .with_inner_size(LogicalSize::new(1280.0, 720.0));
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                self.fail(event_loop, anyhow!("failed to create window: {err}"));
                return;
            }
        };
        self.window_created = true;
        match block_on(Renderer::new(Arc::clone(&window))) {
            Ok(renderer) => {
                self.last_frame = Instant::now();
                window.request_redraw();
                self.renderer = Some(renderer);
            }
            Err(err) => self.fail(event_loop, err.context("failed to initialize renderer")),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        let owns_window = self
            .renderer
            .as_ref()
            .map(|renderer| renderer.window_id() == window_id)
            .unwrap_or(false);
        if !owns_window {
            return;
        }
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.resize(size);
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                self.handle_keyboard(&event);
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let index = match button {
                    WinitMouseButton::Left => 0,
                    WinitMouseButton::Right => 1,
                    WinitMouseButton::Middle => 2,
                    WinitMouseButton::Other(value) => value as u8,
                    _ => return,
                };
                let mapped = rayview::MouseButton::new(index);
                match state {
                    ElementState::Pressed => {
                        self.input.set_mouse_button_down(mapped);
                        if mapped == rayview::MouseButton::LEFT {
                            self.capture_pointer();
                        }
                    }
                    ElementState::Released => self.input.set_mouse_button_up(mapped),
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.input
                    .set_mouse_position(Vec2::new(position.x as f32, position.y as f32));
            }
            WindowEvent::RedrawRequested => {
                if let Err(err) = self.tick() {
                    self.fail(event_loop, err);
                    return;
                }
                if let Some(renderer) = self.renderer.as_ref() {
                    renderer.window().request_redraw();
                }
            }
            _ => {}
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _id: DeviceId, event: DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            if self.input.is_captured() {
                self.input.add_mouse_delta(Vec2::new(dx as f32, dy as f32));
            }
        }
    }
}

fn is_down(input: &InputState, ch: char) -> bool {
    input.is_key_down(KeyCode::Character(ch))
}

fn is_named_down(input: &InputState, key: NamedKey) -> bool {
    input.is_key_down(KeyCode::Named(key))
}

fn map_keycode(code: winit::keyboard::KeyCode) -> Option<KeyCode> {
    use winit::keyboard::KeyCode as Key;
    Some(match code {
        Key::Space => KeyCode::Named(NamedKey::Space),
        Key::Enter => KeyCode::Named(NamedKey::Enter),
        Key::Tab => KeyCode::Named(NamedKey::Tab),
        Key::ArrowLeft => KeyCode::Named(NamedKey::Left),
        Key::ArrowRight => KeyCode::Named(NamedKey::Right),
        Key::ArrowUp => KeyCode::Named(NamedKey::Up),
        Key::ArrowDown => KeyCode::Named(NamedKey::Down),
        Key::Escape => KeyCode::Named(NamedKey::Escape),
        Key::Backspace => KeyCode::Named(NamedKey::Backspace),
        Key::ShiftLeft => KeyCode::Named(NamedKey::LeftShift),
        Key::ShiftRight => KeyCode::Named(NamedKey::RightShift),
        Key::ControlLeft => KeyCode::Named(NamedKey::LeftCtrl),
        Key::ControlRight => KeyCode::Named(NamedKey::RightCtrl),
        Key::BracketLeft => KeyCode::Character('['),
        Key::BracketRight => KeyCode::Character(']'),
        Key::Digit0 => KeyCode::Digit(0),
        Key::Digit1 => KeyCode::Digit(1),
        Key::Digit2 => KeyCode::Digit(2),
        Key::Digit3 => KeyCode::Digit(3),
        Key::Digit4 => KeyCode::Digit(4),
        Key::Digit5 => KeyCode::Digit(5),
        Key::Digit6 => KeyCode::Digit(6),
        Key::Digit7 => KeyCode::Digit(7),
        Key::Digit8 => KeyCode::Digit(8),
        Key::Digit9 => KeyCode::Digit(9),
        Key::KeyA => KeyCode::Character('A'),
        Key::KeyB => KeyCode::Character('B'),
        Key::KeyC => KeyCode::Character('C'),
        Key::KeyD => KeyCode::Character('D'),
        Key::KeyE => KeyCode::Character('E'),
        Key::KeyF => KeyCode::Character('F'),
        Key::KeyG => KeyCode::Character('G'),
        Key::KeyH => KeyCode::Character('H'),
        Key::KeyI => KeyCode::Character('I'),
        Key::KeyJ => KeyCode::Character('J'),
        Key::KeyK => KeyCode::Character('K'),
        Key::KeyL => KeyCode::Character('L'),
        Key::KeyM => KeyCode::Character('M'),
        Key::KeyN => KeyCode::Character('N'),
        Key::KeyO => KeyCode::Character('O'),
        Key::KeyP => KeyCode::Character('P'),
        Key::KeyQ => KeyCode::Character('Q'),
        Key::KeyR => KeyCode::Character('R'),
        Key::KeyS => KeyCode::Character('S'),
        Key::KeyT => KeyCode::Character('T'),
        Key::KeyU => KeyCode::Character('U'),
        Key::KeyV => KeyCode::Character('V'),
        Key::KeyW => KeyCode::Character('W'),
        Key::KeyX => KeyCode::Character('X'),
        Key::KeyY => KeyCode::Character('Y'),
        Key::KeyZ => KeyCode::Character('Z'),
        Key::F1 => KeyCode::Function(1),
        Key::F2 => KeyCode::Function(2),
        Key::F3 => KeyCode::Function(3),
        Key::F4 => KeyCode::Function(4),
        _ => return None,
    })
}

struct CliOptions {
    scene: Option<String>,
    summary_only: bool,
}

impl CliOptions {
    fn parse() -> Result<Self> {
        let mut scene = None;
        let mut summary_only = false;
        for arg in env::args().skip(1) {
            match arg.as_str() {
                "--summary-only" => summary_only = true,
                "--help" | "-h" => {
                    return Err(anyhow!("Usage: rayview [scene.xml] [--summary-only]"));
                }
                other if other.starts_with("--") => {
                    return Err(anyhow!(
                        "Unknown argument: {other}. Expected --summary-only"
                    ));
                }
                path => {
                    if scene.replace(path.to_string()).is_some() {
                        return Err(anyhow!("only one scene file may be given"));
                    }
                }
            }
        }
        Ok(Self {
            scene,
            summary_only,
        })
    }
}
