//! ImGui debug windows drawn over the scene.

use std::time::Duration;

use imgui::{im_str, ColorEdit, Context, DrawData, FontSource, Key, Slider, Window};
use winit::event::VirtualKeyCode;

use crate::renderer::TextureData;
use crate::scene::Scene;

/// ImGui refuses a zero frame time.
const MIN_DELTA: f32 = 1.0 / 10_000.0;

/// Window key codes behind the keys ImGui's text fields and navigation use.
const KEY_MAP: [(Key, VirtualKeyCode); 21] = [
    (Key::Tab, VirtualKeyCode::Tab),
    (Key::LeftArrow, VirtualKeyCode::Left),
    (Key::RightArrow, VirtualKeyCode::Right),
    (Key::UpArrow, VirtualKeyCode::Up),
    (Key::DownArrow, VirtualKeyCode::Down),
    (Key::PageUp, VirtualKeyCode::PageUp),
    (Key::PageDown, VirtualKeyCode::PageDown),
    (Key::Home, VirtualKeyCode::Home),
    (Key::End, VirtualKeyCode::End),
    (Key::Insert, VirtualKeyCode::Insert),
    (Key::Delete, VirtualKeyCode::Delete),
    (Key::Backspace, VirtualKeyCode::Back),
    (Key::Space, VirtualKeyCode::Space),
    (Key::Enter, VirtualKeyCode::Return),
    (Key::Escape, VirtualKeyCode::Escape),
    (Key::A, VirtualKeyCode::A),
    (Key::C, VirtualKeyCode::C),
    (Key::V, VirtualKeyCode::V),
    (Key::X, VirtualKeyCode::X),
    (Key::Y, VirtualKeyCode::Y),
    (Key::Z, VirtualKeyCode::Z),
];

/// Input forwarded from the window thread. Positions are in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    Moved([f32; 2]),
    Button { index: usize, pressed: bool },
    Wheel(f32),
    Key { key: VirtualKeyCode, pressed: bool },
    Char(char),
    Modifiers {
        ctrl: bool,
        shift: bool,
        alt: bool,
        logo: bool,
    },
}

pub struct Overlay {
    context: Context,
    value: f32,
    counter: u32,
}

impl Overlay {
    pub fn new(width: u32, height: u32) -> Self {
        let mut context = Context::create();
        context.set_ini_filename(None);
        context
            .fonts()
            .add_font(&[FontSource::DefaultFontData { config: None }]);

        let io = context.io_mut();
        for (key, code) in KEY_MAP.iter() {
            io[*key] = *code as u32;
        }

        let mut overlay = Overlay {
            context,
            value: 0.0,
            counter: 0,
        };
        overlay.resize(width, height);
        overlay
    }

    /// RGBA8 pixels of the font atlas, uploaded once by the renderer.
    pub fn font_atlas(&mut self) -> TextureData {
        let mut fonts = self.context.fonts();
        let atlas = fonts.build_rgba32_texture();
        TextureData {
            width: atlas.width,
            height: atlas.height,
            pixels: atlas.data.to_vec(),
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.context.io_mut().display_size = [width as f32, height as f32];
    }

    pub fn handle(&mut self, event: InputEvent) {
        let io = self.context.io_mut();
        match event {
            InputEvent::Moved(pos) => io.mouse_pos = pos,
            InputEvent::Button { index, pressed } => {
                if let Some(down) = io.mouse_down.get_mut(index) {
                    *down = pressed;
                }
            }
            InputEvent::Wheel(delta) => io.mouse_wheel += delta,
            InputEvent::Key { key, pressed } => {
                if let Some(down) = io.keys_down.get_mut(key as usize) {
                    *down = pressed;
                }
            }
            // editing keys arrive through `keys_down`
            InputEvent::Char(c) if c.is_control() => {}
            InputEvent::Char(c) => io.add_input_character(c),
            InputEvent::Modifiers {
                ctrl,
                shift,
                alt,
                logo,
            } => {
                io.key_ctrl = ctrl;
                io.key_shift = shift;
                io.key_alt = alt;
                io.key_super = logo;
            }
        }
    }

    /// True while an ImGui text field holds the keyboard focus.
    pub fn wants_keyboard(&self) -> bool {
        self.context.io().want_text_input
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// Builds this frame's windows. The widgets edit `scene` in place.
    pub fn frame(&mut self, scene: &mut Scene, delta: Duration) -> &DrawData {
        let Overlay {
            context,
            value,
            counter,
        } = self;
        context.io_mut().delta_time = delta.as_secs_f32().max(MIN_DELTA);

        let ui = context.frame();
        let framerate = ui.io().framerate;
        let vertex_labels = [
            im_str!("1st vertex pos"),
            im_str!("2nd vertex pos"),
            im_str!("3rd vertex pos"),
        ];

        Window::new(im_str!("Hello, world!")).build(&ui, || {
            ui.text("This is some useful text.");
            Slider::new(im_str!("float"), 0.0..=1.0).build(&ui, value);
            ColorEdit::new(im_str!("clear color"), &mut scene.clear_color).build(&ui);

            for (label, position) in vertex_labels
                .iter()
                .zip(scene.triangle.positions.iter_mut())
            {
                Slider::new(*label, -3.0..=3.0).build_array(&ui, position);
            }

            if ui.button(im_str!("Button"), [0.0, 0.0]) {
                *counter += 1;
            }
            ui.same_line(0.0);
            ui.text(format!("counter = {}", counter));

            ui.text(frame_time_line(framerate));
        });

        Window::new(im_str!("Another window")).build(&ui, || {});

        ui.render()
    }
}

fn frame_time_line(framerate: f32) -> String {
    format!(
        "Application average {:.3} ms/frame ({:.1} FPS)",
        1000.0 / framerate,
        framerate
    )
}
