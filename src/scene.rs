use glam::{Mat4, Vec3};

use crate::camera::Camera;
use crate::config::ANIMATION_STEP;

pub type Position = [f32; 3];
pub type Color = [f32; 3];

const RED: Color = [1.0, 0.0, 0.0];

/// The one triangle every tutorial draws.
#[derive(Debug, Clone, PartialEq)]
pub struct Triangle {
    pub positions: [Position; 3],
    pub colors: [Color; 3],
}

impl Default for Triangle {
    fn default() -> Self {
        Triangle {
            positions: [[0.5, 0.5, 0.0], [-0.5, -0.5, 0.0], [0.5, -0.5, 0.0]],
            colors: [RED; 3],
        }
    }
}

/// Per-run state: what is drawn and from where.
#[derive(Debug, Clone)]
pub struct Scene {
    pub triangle: Triangle,
    pub clear_color: Color,
    pub offset: Vec3,
    /// `None` renders in clip space with an identity transform.
    pub camera: Option<Camera>,
    animating: bool,
    aspect: f32,
}

impl Scene {
    pub fn new(clear_color: Color, camera: Option<Camera>) -> Self {
        Scene {
            triangle: Triangle::default(),
            clear_color,
            offset: Vec3::ZERO,
            camera,
            animating: false,
            aspect: 1.0,
        }
    }

    pub fn translate(&mut self, dx: f32, dy: f32) {
        self.offset.x += dx;
        self.offset.y += dy;
    }

    pub fn animating(&self) -> bool {
        self.animating
    }

    pub fn toggle_animation(&mut self) {
        self.animating = !self.animating;
        log::info!(
            "{}",
            if self.animating {
                "animation"
            } else {
                "no animation"
            }
        );
    }

    /// One animation step; called once per frame.
    pub fn advance(&mut self) {
        if !self.animating {
            return;
        }
        self.offset.x += ANIMATION_STEP;
        if self.offset.x > 1.0 {
            self.offset.x = -1.0;
        }
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.aspect = width as f32 / height as f32;
    }

    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.offset)
    }

    /// projection * view * model
    pub fn pvm(&self) -> Mat4 {
        match &self.camera {
            Some(camera) => {
                log::trace!(
                    "eye: {:?} center: {:?} up: {:?}",
                    camera.position(),
                    camera.center_position(),
                    camera.up_direction()
                );
                camera.projection_matrix(self.aspect) * camera.view_matrix() * self.model_matrix()
            }
            None => Mat4::IDENTITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Mode;

    fn scene() -> Scene {
        Scene::new([0.5; 3], Some(Camera::default()))
    }

    #[test]
    fn default_triangle_is_red() {
        let triangle = Triangle::default();
        assert!(triangle.colors.iter().all(|c| *c == RED));
        assert_eq!(triangle.positions[1], [-0.5, -0.5, 0.0]);
    }

    #[test]
    fn advance_is_a_no_op_when_paused() {
        let mut scene = scene();
        scene.advance();
        assert_eq!(scene.offset, Vec3::ZERO);
    }

    #[test]
    fn animation_wraps_past_one() {
        let mut scene = scene();
        scene.offset.x = 0.95;
        scene.toggle_animation();
        assert!(scene.animating());
        scene.advance();
        assert_eq!(scene.offset.x, -1.0);
        scene.advance();
        assert!((scene.offset.x + 0.9).abs() < 1e-6);
    }

    #[test]
    fn toggling_twice_stops_animation() {
        let mut scene = scene();
        scene.toggle_animation();
        scene.toggle_animation();
        assert!(!scene.animating());
    }

    #[test]
    fn zero_sized_viewport_keeps_aspect() {
        let mut scene = scene();
        scene.set_viewport(800, 400);
        assert_eq!(scene.aspect(), 2.0);
        scene.set_viewport(0, 400);
        assert_eq!(scene.aspect(), 2.0);
    }

    #[test]
    fn without_camera_pvm_is_identity() {
        let mut scene = Scene::new([0.5; 3], None);
        scene.translate(0.3, 0.0);
        assert_eq!(scene.pvm(), Mat4::IDENTITY);
    }

    #[test]
    fn translation_shows_up_in_clip_space() {
        let mut scene = scene();
        if let Some(camera) = scene.camera.as_mut() {
            camera.set_mode(Mode::Ortho);
        }
        scene.translate(0.2, -0.1);
        assert_eq!(scene.camera.as_ref().map(Camera::position), Some(Vec3::ZERO));
        let p = scene.pvm().transform_point3(Vec3::ZERO);
        assert!((p.x - 0.2).abs() < 1e-5);
        assert!((p.y + 0.1).abs() < 1e-5);
    }
}
