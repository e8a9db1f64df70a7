//! Window thread and render thread of a tutorial.
//!
//! The event loop owns the main thread. Everything touching the GPU runs on a
//! render thread that receives [`WindowMessage`]s over a channel and wakes
//! the event loop through a proxy once it is done.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use gfx_hal::{prelude::*, window::Extent2D, Features};
use glam::Vec3;
use winit::{
    dpi::{LogicalSize, PhysicalSize, Size},
    event::{
        ElementState, Event, KeyboardInput, ModifiersState, MouseButton, MouseScrollDelta,
        VirtualKeyCode, WindowEvent,
    },
    event_loop::{ControlFlow, EventLoop},
    window::{Window, WindowBuilder},
};

use crate::back;
use crate::camera::{Camera, Mode};
use crate::config::{Tutorial, CAMERA_START, MIN_WINDOW_SIZE, ORTHO_FAR};
use crate::controls::Controls;
use crate::error::DebugContext;
use crate::overlay::{InputEvent, Overlay};
use crate::renderer::{FrameInput, Renderer, RendererOptions, ShaderSet};
use crate::scene::Scene;
use crate::shader::{self, Stage};

type Surface = <back::Backend as gfx_hal::Backend>::Surface;

/// Scroll distance, in pixels, that counts as one wheel notch.
const PIXELS_PER_LINE: f32 = 20.0;
const FPS_LOG_INTERVAL: Duration = Duration::from_secs(1);

/// Window events the render thread cares about.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WindowMessage {
    Close,
    Resized { width: u32, height: u32 },
    Key(VirtualKeyCode, ElementState),
    FocusLost,
    /// Pointer, text and modifier input only the overlay consumes.
    Input(InputEvent),
}

/// Sent by the render thread when its loop has ended, for whatever reason.
#[derive(Debug)]
struct RenderFinished;

/// Opens the tutorial's window and runs it until it is closed.
pub fn run(tutorial: Tutorial) -> Result<()> {
    let event_loop = EventLoop::<RenderFinished>::with_user_event();
    let window = WindowBuilder::new()
        .with_title(tutorial.title)
        .with_inner_size(Size::Physical(PhysicalSize::new(
            tutorial.dims.width,
            tutorial.dims.height,
        )))
        .with_min_inner_size(Size::Logical(LogicalSize::new(
            MIN_WINDOW_SIZE,
            MIN_WINDOW_SIZE,
        )))
        .build(&event_loop)
        .context("failed to create window")?;

    let (sender, receiver) = mpsc::channel();
    let proxy = event_loop.create_proxy();
    let handler = thread::spawn(move || {
        let result = render_thread(window, &tutorial, receiver);
        if proxy.send_event(RenderFinished).is_err() {
            log::debug!("event loop already gone");
        }
        result
    });

    let mut handler = Some(handler);
    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Wait;
        match event {
            Event::WindowEvent { event, .. } => {
                if let Some(message) = translate(event) {
                    if message == WindowMessage::Close {
                        notify(&sender, message);
                        finish(&mut handler);
                        *control_flow = ControlFlow::Exit;
                    } else {
                        notify(&sender, message);
                    }
                }
            }
            Event::UserEvent(RenderFinished) => {
                finish(&mut handler);
                *control_flow = ControlFlow::Exit;
            }
            _ => {}
        }
    })
}

fn notify(sender: &Sender<WindowMessage>, message: WindowMessage) {
    if sender.send(message).is_err() {
        log::debug!("render thread gone, dropping {:?}", message);
    }
}

/// Joins the render thread and reports how it ended. A failed tutorial exits
/// the process with a non-zero status.
fn finish(handler: &mut Option<JoinHandle<Result<()>>>) {
    let handler = match handler.take() {
        Some(handler) => handler,
        None => return,
    };
    match handler.join() {
        Ok(Ok(())) => log::info!("closed"),
        Ok(Err(err)) => {
            log::error!("{:?}", err);
            std::process::exit(1);
        }
        Err(_) => {
            log::error!("render thread panicked");
            std::process::exit(1);
        }
    }
}

fn translate(event: WindowEvent) -> Option<WindowMessage> {
    let message = match event {
        WindowEvent::CloseRequested
        | WindowEvent::KeyboardInput {
            input:
                KeyboardInput {
                    virtual_keycode: Some(VirtualKeyCode::Escape),
                    state: ElementState::Pressed,
                    ..
                },
            ..
        } => WindowMessage::Close,
        WindowEvent::KeyboardInput {
            input:
                KeyboardInput {
                    virtual_keycode: Some(key),
                    state,
                    ..
                },
            ..
        } => WindowMessage::Key(key, state),
        WindowEvent::Resized(size) => WindowMessage::Resized {
            width: size.width,
            height: size.height,
        },
        WindowEvent::Focused(false) => WindowMessage::FocusLost,
        WindowEvent::CursorMoved { position, .. } => {
            let position = [position.x as f32, position.y as f32];
            WindowMessage::Input(InputEvent::Moved(position))
        }
        WindowEvent::MouseInput { state, button, .. } => {
            WindowMessage::Input(InputEvent::Button {
                index: button_index(button),
                pressed: state == ElementState::Pressed,
            })
        }
        WindowEvent::MouseWheel { delta, .. } => {
            let lines = match delta {
                MouseScrollDelta::LineDelta(_, y) => y,
                MouseScrollDelta::PixelDelta(position) => position.y as f32 / PIXELS_PER_LINE,
            };
            WindowMessage::Input(InputEvent::Wheel(lines))
        }
        WindowEvent::ReceivedCharacter(c) => WindowMessage::Input(InputEvent::Char(c)),
        WindowEvent::ModifiersChanged(modifiers) => WindowMessage::Input(InputEvent::Modifiers {
            ctrl: modifiers.ctrl(),
            shift: modifiers.shift(),
            alt: modifiers.alt(),
            logo: modifiers.logo(),
        }),
        _ => return None,
    };
    Some(message)
}

fn button_index(button: MouseButton) -> usize {
    match button {
        MouseButton::Left => 0,
        MouseButton::Right => 1,
        MouseButton::Middle => 2,
        MouseButton::Other(n) => n as usize,
    }
}

fn render_thread(
    window: Window,
    tutorial: &Tutorial,
    messages: Receiver<WindowMessage>,
) -> Result<()> {
    let instance = back::Instance::create(tutorial.title, 1)
        .debug_context("failed to create an instance of gfx")?;
    let mut surface =
        unsafe { instance.create_surface(&window) }.debug_context("failed to create a surface")?;

    let size = window.inner_size();
    let result = render_loop(&instance, &mut surface, size, tutorial, &messages);

    unsafe {
        instance.destroy_surface(surface);
    }
    result
}

fn tutorial_camera() -> Camera {
    let mut camera = Camera::new(
        Vec3::from(CAMERA_START),
        Vec3::new(0.0, 0.0, -1.0),
        Vec3::new(0.0, 1.0, 0.0),
        Camera::default().fovy(),
    );
    camera.set_far(ORTHO_FAR);
    camera.set_mode(Mode::Perspective);
    camera
}

fn render_loop(
    instance: &back::Instance,
    surface: &mut Surface,
    size: PhysicalSize<u32>,
    tutorial: &Tutorial,
    messages: &Receiver<WindowMessage>,
) -> Result<()> {
    let mut adapters = instance.enumerate_adapters();
    if adapters.is_empty() {
        return Err(anyhow!("no graphics adapter found"));
    }
    let adapter = adapters.remove(0);
    log::info!(
        "adapter: {} ({:?}, vendor {:#06x}, device {:#06x})",
        adapter.info.name,
        adapter.info.device_type,
        adapter.info.vendor,
        adapter.info.device
    );

    let family = adapter
        .queue_families
        .iter()
        .find(|family| {
            surface.supports_queue_family(family) && family.queue_type().supports_graphics()
        })
        .ok_or_else(|| anyhow!("no queue family supports graphics on this surface"))?;
    let mut gpu = unsafe {
        adapter
            .physical_device
            .open(&[(family, &[1.0])], Features::empty())
    }
    .debug_context("failed to open the device")?;

    let mut queue_group = gpu
        .queue_groups
        .pop()
        .ok_or_else(|| anyhow!("device has no queue group"))?;
    let queue = queue_group
        .queues
        .first_mut()
        .ok_or_else(|| anyhow!("queue group is empty"))?;
    let device = gpu.device;

    let camera = if tutorial.camera {
        Some(tutorial_camera())
    } else {
        None
    };
    let mut scene = Scene::new(tutorial.clear_color, camera);
    scene.set_viewport(size.width, size.height);

    let mut overlay = if tutorial.overlay {
        Some(Overlay::new(size.width, size.height))
    } else {
        None
    };
    let font_atlas = overlay.as_mut().map(Overlay::font_atlas);

    let shaders = if tutorial.triangle {
        Some((
            shader::load(tutorial.vertex_shader, Stage::Vertex)?,
            shader::load(tutorial.fragment_shader, Stage::Fragment)?,
        ))
    } else {
        None
    };
    let triangle = scene.triangle.clone();

    let mut renderer = Renderer::new(
        surface,
        &adapter,
        &device,
        queue_group.family,
        queue,
        Extent2D {
            width: size.width,
            height: size.height,
        },
        RendererOptions {
            triangle: shaders.as_ref().map(|(vertex, fragment)| {
                (
                    ShaderSet {
                        vertex,
                        fragment,
                    },
                    &triangle,
                )
            }),
            overlay: font_atlas.as_ref(),
        },
    )?;

    let mut controls = Controls::new();
    let mut fps_counter = fps_counter::FPSCounter::new();
    let mut last_fps_log = Instant::now();
    let mut last_frame = Instant::now();

    'frames: loop {
        loop {
            let message = match messages.try_recv() {
                Ok(message) => message,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => break 'frames,
            };
            match message {
                WindowMessage::Close => break 'frames,
                WindowMessage::Resized { width, height } => {
                    scene.set_viewport(width, height);
                    if let Some(overlay) = overlay.as_mut() {
                        overlay.resize(width, height);
                    }
                    renderer.resize(Extent2D { width, height })?;
                }
                WindowMessage::Key(key, state) => {
                    let typing = match overlay.as_mut() {
                        Some(overlay) => {
                            overlay.handle(InputEvent::Key {
                                key,
                                pressed: state == ElementState::Pressed,
                            });
                            overlay.wants_keyboard()
                        }
                        None => false,
                    };
                    if tutorial.camera && !(typing && state == ElementState::Pressed) {
                        if let Some(command) = controls.handle(key, state) {
                            command.apply(&mut scene);
                        }
                    }
                }
                WindowMessage::FocusLost => controls.release_all(),
                WindowMessage::Input(event) => {
                    if let Some(overlay) = overlay.as_mut() {
                        overlay.handle(event);
                    }
                }
            }
        }

        let now = Instant::now();
        let delta = now - last_frame;
        last_frame = now;

        let draw_data = match overlay.as_mut() {
            Some(overlay) => Some(overlay.frame(&mut scene, delta)),
            None => None,
        };
        renderer.render(
            queue,
            &FrameInput {
                clear_color: scene.clear_color,
                pvm: scene.pvm(),
                positions: &scene.triangle.positions,
                overlay: draw_data,
            },
        )?;
        scene.advance();

        let fps = fps_counter.tick();
        if last_fps_log.elapsed() >= FPS_LOG_INTERVAL {
            log::debug!("fps: {}", fps);
            last_fps_log = Instant::now();
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tutorial_camera_sees_the_triangle() {
        let camera = tutorial_camera();
        assert_eq!(camera.mode(), Mode::Perspective);
        let scene = Scene::new([0.5; 3], Some(camera));
        let p = scene.pvm().transform_point3(Vec3::new(0.5, 0.5, 0.0));
        assert!(p.x > 0.0 && p.x < 1.0);
        assert!(p.y > 0.0 && p.y < 1.0);
        assert!(p.z > 0.0 && p.z < 1.0);
    }

    #[test]
    fn mouse_buttons_map_to_imgui_slots() {
        assert_eq!(button_index(MouseButton::Left), 0);
        assert_eq!(button_index(MouseButton::Right), 1);
        assert_eq!(button_index(MouseButton::Middle), 2);
        assert_eq!(button_index(MouseButton::Other(4)), 4);
    }

    #[test]
    fn close_requested_closes() {
        assert_eq!(translate(WindowEvent::CloseRequested), Some(WindowMessage::Close));
    }

    #[test]
    fn resize_carries_the_physical_size() {
        assert_eq!(
            translate(WindowEvent::Resized(PhysicalSize::new(300, 200))),
            Some(WindowMessage::Resized {
                width: 300,
                height: 200
            })
        );
        assert_eq!(translate(WindowEvent::Focused(false)), Some(WindowMessage::FocusLost));
        assert_eq!(translate(WindowEvent::Focused(true)), None);
    }

    #[test]
    fn typed_characters_go_to_the_overlay() {
        assert_eq!(
            translate(WindowEvent::ReceivedCharacter('7')),
            Some(WindowMessage::Input(InputEvent::Char('7')))
        );
    }

    #[test]
    fn modifiers_go_to_the_overlay() {
        let modifiers = ModifiersState::CTRL | ModifiersState::SHIFT;
        assert_eq!(
            translate(WindowEvent::ModifiersChanged(modifiers)),
            Some(WindowMessage::Input(InputEvent::Modifiers {
                ctrl: true,
                shift: true,
                alt: false,
                logo: false,
            }))
        );
    }
}
