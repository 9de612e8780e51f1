use std::error::Error;
use std::fmt::Display;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use glam::{Mat4, Vec2, Vec3};
use sdl2::event::{Event, WindowEvent};
use sdl2::keyboard::{Keycode, Scancode};
use sdl2::video::GLProfile;
use sdl2::EventPump;

mod camera;
mod config;
mod renderer;

use camera::{Camera, CameraController, ControllerKind, InputSnapshot, MovementKeys};
use config::ViewerConfig;
use renderer::traversal::{self, Light};
use renderer::{environment, gltf, readback, Renderer};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
    let config = ViewerConfig::parse();

    let scene = gltf::load_gltf_file(&config.scene)?;
    log::info!(
        "loaded {}: {} nodes, {} meshes, {} materials",
        config.scene.display(),
        scene.nodes.len(),
        scene.meshes.len(),
        scene.materials.len(),
    );
    let (min, max) = scene
        .bounds()
        .with_context(|| format!("invalid node hierarchy in {}", config.scene.display()))?
        .unwrap_or((Vec3::ZERO, Vec3::ZERO));
    let max_distance = match max.distance(min) {
        distance if distance > 0.0 => distance,
        _ => 100.0,
    };
    let camera = config.lookat.unwrap_or_else(|| Camera::framing_bounds(min, max));

    let panorama = match &config.environment {
        Some(path) => match environment::load_panorama(path) {
            Ok(panorama) => Some(panorama),
            Err(err) => {
                log::warn!("{err:#}, continuing without an environment");
                None
            }
        },
        None => None,
    };

    let sdl_context = sdl2::init().map_err(SdlErr)?;
    let video_subsystem = sdl_context.video().map_err(SdlErr)?;
    let gl_attr = video_subsystem.gl_attr();
    gl_attr.set_context_profile(GLProfile::GLES);
    gl_attr.set_context_version(3, 0);
    // Linear->sRGB conversion is done in the shader.
    gl_attr.set_framebuffer_srgb_compatible(false);
    let mut window_builder = video_subsystem.window(env!("CARGO_PKG_NAME"), config.size.width, config.size.height);
    window_builder.opengl();
    if config.output.is_some() {
        window_builder.hidden();
    } else {
        window_builder.resizable();
    }
    let window = window_builder.build()?;
    let _gl_context = window.gl_create_context().map_err(SdlErr)?;

    let mut renderer = Renderer::new(
        &video_subsystem,
        window.drawable_size(),
        &scene,
        panorama.as_ref(),
        max_distance,
    )?;
    drop(panorama);

    let world_light_direction = traversal::light_direction_from_angles(config.light_vertical, config.light_horizontal);
    let light = |view: Mat4, from_camera: bool| {
        if from_camera {
            Light::from_camera(config.light_radiance)
        } else {
            Light::from_world_direction(view, world_light_direction, config.light_radiance)
        }
    };
    let mut light_from_camera = !config.world_light;

    if let Some(output) = &config.output {
        let size = (config.size.width, config.size.height);
        let view = camera.view_matrix();
        let image = renderer.render_to_image(&scene, view, light(view, light_from_camera), size)?;
        readback::write_png(&image, output)?;
        log::info!("wrote {}", output.display());
        return Ok(());
    }

    if let Err(err) = video_subsystem.gl_set_swap_interval(1) {
        log::warn!("could not enable vsync: {err}");
    }
    let mut event_pump = sdl_context.event_pump().map_err(SdlErr)?;
    let speed = 0.5 * max_distance;
    let mut controller = CameraController::new(ControllerKind::Trackball, Vec3::Y, speed);
    controller.set_camera(camera);
    let mut last_frame = Instant::now();

    'running: loop {
        for event in event_pump.poll_iter() {
            match event {
                Event::Quit { .. }
                | Event::KeyDown {
                    keycode: Some(Keycode::Escape),
                    ..
                } => break 'running,
                Event::Window {
                    win_event: WindowEvent::SizeChanged(..),
                    ..
                } => {
                    let (width, height) = window.drawable_size();
                    renderer.resize(width, height);
                }
                Event::KeyDown {
                    keycode: Some(keycode),
                    repeat: false,
                    ..
                } => match keycode {
                    Keycode::C => {
                        let kind = match controller.kind() {
                            ControllerKind::Trackball => ControllerKind::FirstPerson,
                            ControllerKind::FirstPerson => ControllerKind::Trackball,
                        };
                        controller.switch_to(kind, speed);
                        log::info!("camera controller: {kind:?}");
                    }
                    Keycode::L => {
                        light_from_camera = !light_from_camera;
                        log::info!("light follows the camera: {light_from_camera}");
                    }
                    Keycode::P => println!("{}", controller.camera().lookat_argument()),
                    _ => {}
                },
                _ => {}
            }
        }

        let now = Instant::now();
        let elapsed_seconds = now.duration_since(last_frame).as_secs_f32();
        last_frame = now;
        controller.update(&read_input(&event_pump), elapsed_seconds);

        let view = controller.camera().view_matrix();
        let stats = renderer.render(&scene, view, light(view, light_from_camera))?;
        log::trace!("frame: {stats:?}");
        window.gl_swap_window();
    }

    Ok(())
}

/// Samples the mouse and keyboard state the camera controllers read.
fn read_input(event_pump: &EventPump) -> InputSnapshot {
    let mouse = event_pump.mouse_state();
    // Read every frame so the delta doesn't pile up while the button is up.
    let relative = event_pump.relative_mouse_state();
    let keyboard = event_pump.keyboard_state();
    let held = |scancode| keyboard.is_scancode_pressed(scancode);
    InputSnapshot {
        cursor: Vec2::new(mouse.x() as f32, mouse.y() as f32),
        orbit_button: mouse.middle(),
        look_delta: if mouse.left() {
            Vec2::new(relative.x() as f32, relative.y() as f32)
        } else {
            Vec2::ZERO
        },
        movement: MovementKeys {
            forward: held(Scancode::W),
            backward: held(Scancode::S),
            left: held(Scancode::A),
            right: held(Scancode::D),
            up: held(Scancode::Up),
            down: held(Scancode::Down),
            roll_left: held(Scancode::Q),
            roll_right: held(Scancode::E),
        },
    }
}

#[derive(Debug)]
pub struct SdlErr(String);
impl Display for SdlErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sdl error: {}", self.0)
    }
}
impl Error for SdlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        None
    }
}
