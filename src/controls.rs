//! Keyboard bindings.
//!
//! The window reports auto-repeat as further presses, so the set of held keys
//! is tracked here to tell a fresh press from a repeat.

use std::collections::HashSet;

use winit::event::{ElementState, VirtualKeyCode};

use crate::camera::Camera;
use crate::config::{MOVE_STEP, ROTATE_STEP};
use crate::scene::Scene;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    MoveForward(f32),
    MoveBackward(f32),
    MoveLeft(f32),
    MoveRight(f32),
    MoveUp(f32),
    MoveDown(f32),
    RotateLeft(f32),
    RotateRight(f32),
    ToggleProjection,
    Translate { dx: f32, dy: f32 },
    ToggleAnimation,
}

impl Command {
    pub fn apply(self, scene: &mut Scene) {
        match self {
            Command::MoveForward(d) => with_camera(scene, |c| c.move_forward(d)),
            Command::MoveBackward(d) => with_camera(scene, |c| c.move_backward(d)),
            Command::MoveLeft(d) => with_camera(scene, |c| c.move_left(d)),
            Command::MoveRight(d) => with_camera(scene, |c| c.move_right(d)),
            Command::MoveUp(d) => with_camera(scene, |c| c.move_up(d)),
            Command::MoveDown(d) => with_camera(scene, |c| c.move_down(d)),
            Command::RotateLeft(d) => with_camera(scene, |c| c.rotate_left(d)),
            Command::RotateRight(d) => with_camera(scene, |c| c.rotate_right(d)),
            Command::ToggleProjection => with_camera(scene, |c| {
                c.toggle_mode();
                log::info!("projection: {:?}", c.mode());
            }),
            Command::Translate { dx, dy } => scene.translate(dx, dy),
            Command::ToggleAnimation => scene.toggle_animation(),
        }
    }
}

fn with_camera(scene: &mut Scene, f: impl FnOnce(&mut Camera)) {
    if let Some(camera) = scene.camera.as_mut() {
        f(camera);
    }
}

#[derive(Debug, Default)]
pub struct Controls {
    held: HashSet<VirtualKeyCode>,
}

impl Controls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps a key event to a command. Camera movement keeps firing while the
    /// key repeats; everything else fires on the initial press only.
    pub fn handle(&mut self, key: VirtualKeyCode, state: ElementState) -> Option<Command> {
        let repeat = match state {
            ElementState::Pressed => !self.held.insert(key),
            ElementState::Released => {
                self.held.remove(&key);
                return None;
            }
        };

        let command = match key {
            VirtualKeyCode::W => Command::MoveForward(MOVE_STEP),
            VirtualKeyCode::S => Command::MoveBackward(MOVE_STEP),
            VirtualKeyCode::A => Command::MoveLeft(MOVE_STEP),
            VirtualKeyCode::D => Command::MoveRight(MOVE_STEP),
            VirtualKeyCode::PageUp => Command::MoveUp(MOVE_STEP),
            VirtualKeyCode::PageDown => Command::MoveDown(MOVE_STEP),
            VirtualKeyCode::Left => Command::RotateLeft(ROTATE_STEP),
            VirtualKeyCode::Right => Command::RotateRight(ROTATE_STEP),
            _ if repeat => return None,
            VirtualKeyCode::H => Command::Translate {
                dx: -MOVE_STEP,
                dy: 0.0,
            },
            VirtualKeyCode::L => Command::Translate {
                dx: MOVE_STEP,
                dy: 0.0,
            },
            VirtualKeyCode::J => Command::Translate {
                dx: 0.0,
                dy: -MOVE_STEP,
            },
            VirtualKeyCode::K => Command::Translate {
                dx: 0.0,
                dy: MOVE_STEP,
            },
            VirtualKeyCode::P => Command::ToggleAnimation,
            VirtualKeyCode::O => Command::ToggleProjection,
            _ => return None,
        };
        Some(command)
    }

    /// Forgets held keys, e.g. when the window loses focus mid-press.
    pub fn release_all(&mut self) {
        self.held.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn press(controls: &mut Controls, key: VirtualKeyCode) -> Option<Command> {
        controls.handle(key, ElementState::Pressed)
    }

    #[test]
    fn wasd_moves_on_repeat() {
        let mut controls = Controls::new();
        assert_eq!(
            press(&mut controls, VirtualKeyCode::W),
            Some(Command::MoveForward(MOVE_STEP))
        );
        assert_eq!(
            press(&mut controls, VirtualKeyCode::W),
            Some(Command::MoveForward(MOVE_STEP))
        );
    }

    #[test]
    fn every_binding_maps_to_its_command() {
        use winit::event::VirtualKeyCode as K;

        // key, command, fires again on repeat
        let bindings = [
            (K::W, Command::MoveForward(MOVE_STEP), true),
            (K::S, Command::MoveBackward(MOVE_STEP), true),
            (K::A, Command::MoveLeft(MOVE_STEP), true),
            (K::D, Command::MoveRight(MOVE_STEP), true),
            (K::PageUp, Command::MoveUp(MOVE_STEP), true),
            (K::PageDown, Command::MoveDown(MOVE_STEP), true),
            (K::Left, Command::RotateLeft(ROTATE_STEP), true),
            (K::Right, Command::RotateRight(ROTATE_STEP), true),
            (
                K::H,
                Command::Translate {
                    dx: -MOVE_STEP,
                    dy: 0.0,
                },
                false,
            ),
            (
                K::L,
                Command::Translate {
                    dx: MOVE_STEP,
                    dy: 0.0,
                },
                false,
            ),
            (
                K::J,
                Command::Translate {
                    dx: 0.0,
                    dy: -MOVE_STEP,
                },
                false,
            ),
            (
                K::K,
                Command::Translate {
                    dx: 0.0,
                    dy: MOVE_STEP,
                },
                false,
            ),
            (K::P, Command::ToggleAnimation, false),
            (K::O, Command::ToggleProjection, false),
        ];

        for (key, command, repeats) in bindings.iter() {
            let mut controls = Controls::new();
            assert_eq!(press(&mut controls, *key), Some(*command), "{:?}", key);
            let again = if *repeats { Some(*command) } else { None };
            assert_eq!(press(&mut controls, *key), again, "{:?} repeated", key);
        }
    }

    #[test]
    fn rotation_step_is_five_degrees() {
        let mut controls = Controls::new();
        assert_eq!(
            press(&mut controls, VirtualKeyCode::Left),
            Some(Command::RotateLeft(5.0))
        );
        assert_eq!(
            press(&mut controls, VirtualKeyCode::Left),
            Some(Command::RotateLeft(5.0))
        );
    }

    #[test]
    fn object_keys_fire_once_per_press() {
        let mut controls = Controls::new();
        assert_eq!(
            press(&mut controls, VirtualKeyCode::L),
            Some(Command::Translate {
                dx: MOVE_STEP,
                dy: 0.0
            })
        );
        assert_eq!(press(&mut controls, VirtualKeyCode::L), None);
        assert_eq!(
            controls.handle(VirtualKeyCode::L, ElementState::Released),
            None
        );
        assert!(press(&mut controls, VirtualKeyCode::L).is_some());
    }

    #[test]
    fn release_all_rearms_toggle() {
        let mut controls = Controls::new();
        assert_eq!(
            press(&mut controls, VirtualKeyCode::P),
            Some(Command::ToggleAnimation)
        );
        controls.release_all();
        assert_eq!(
            press(&mut controls, VirtualKeyCode::P),
            Some(Command::ToggleAnimation)
        );
    }

    #[test]
    fn unbound_keys_are_ignored() {
        let mut controls = Controls::new();
        assert_eq!(press(&mut controls, VirtualKeyCode::Z), None);
    }

    #[test]
    fn camera_commands_need_a_camera() {
        let mut scene = Scene::new([0.0; 3], None);
        Command::MoveForward(1.0).apply(&mut scene);
        Command::Translate { dx: 0.1, dy: 0.2 }.apply(&mut scene);
        assert!(scene.camera.is_none());
        assert!((scene.offset.y - 0.2).abs() < 1e-6);
    }

    #[test]
    fn commands_drive_the_camera() {
        let mut scene = Scene::new([0.0; 3], Some(Camera::default()));
        Command::MoveRight(0.5).apply(&mut scene);
        Command::ToggleAnimation.apply(&mut scene);
        let camera = scene.camera.as_ref().unwrap();
        assert!(camera
            .position()
            .abs_diff_eq(Vec3::new(0.5, 0.0, 0.0), 1e-6));
        assert!(scene.animating());
    }
}
