use glam::{Mat4, Quat, Vec3};

const PERSPECTIVE_NEAR: f32 = 0.001;
const PERSPECTIVE_FAR: f32 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Ortho,
    Perspective,
}

/// A first person camera.
///
/// `front`, `up` and `right` are kept unit length; `right` is always
/// `front × up`.
#[derive(Debug, Clone)]
pub struct Camera {
    position: Vec3,
    front: Vec3,
    up: Vec3,
    right: Vec3,
    near: f32,
    far: f32,
    fovy: f32,
    mode: Mode,
}

impl Default for Camera {
    fn default() -> Self {
        Camera {
            position: Vec3::ZERO,
            front: Vec3::new(0.0, 0.0, -1.0),
            up: Vec3::new(0.0, 1.0, 0.0),
            right: Vec3::new(1.0, 0.0, 0.0),
            near: -1.0,
            far: 1.0,
            fovy: 45.0,
            mode: Mode::Ortho,
        }
    }
}

impl Camera {
    pub fn new(position: Vec3, front: Vec3, up: Vec3, fovy: f32) -> Self {
        let front = front.normalize();
        let up = up.normalize();
        Camera {
            position,
            front,
            up,
            right: front.cross(up).normalize(),
            fovy,
            ..Self::default()
        }
    }

    pub fn move_forward(&mut self, delta: f32) {
        self.position += delta * self.front;
    }

    pub fn move_backward(&mut self, delta: f32) {
        self.move_forward(-delta);
    }

    pub fn move_left(&mut self, delta: f32) {
        self.position -= delta * self.right;
    }

    pub fn move_right(&mut self, delta: f32) {
        self.move_left(-delta);
    }

    pub fn move_up(&mut self, delta: f32) {
        self.position += delta * self.up;
    }

    pub fn move_down(&mut self, delta: f32) {
        self.move_up(-delta);
    }

    /// Yaws the camera around its up axis, `delta` in degrees.
    pub fn rotate_left(&mut self, delta: f32) {
        let yaw = Quat::from_axis_angle(self.up, delta.to_radians());
        self.front = (yaw * self.front).normalize();
        self.right = self.front.cross(self.up).normalize();
    }

    pub fn rotate_right(&mut self, delta: f32) {
        self.rotate_left(-delta);
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn front_direction(&self) -> Vec3 {
        self.front
    }

    pub fn up_direction(&self) -> Vec3 {
        self.up
    }

    pub fn right_direction(&self) -> Vec3 {
        self.right
    }

    /// The point the camera looks at.
    pub fn center_position(&self) -> Vec3 {
        self.position + self.front
    }

    pub fn near(&self) -> f32 {
        self.near
    }

    pub fn far(&self) -> f32 {
        self.far
    }

    pub fn set_near(&mut self, near: f32) {
        self.near = near;
    }

    pub fn set_far(&mut self, far: f32) {
        self.far = far;
    }

    pub fn fovy(&self) -> f32 {
        self.fovy
    }

    pub fn set_fovy(&mut self, fovy: f32) {
        self.fovy = fovy;
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    pub fn toggle_mode(&mut self) {
        self.mode = match self.mode {
            Mode::Ortho => Mode::Perspective,
            Mode::Perspective => Mode::Ortho,
        };
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.center_position(), self.up)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        match self.mode {
            Mode::Perspective => Mat4::perspective_rh(
                self.fovy.to_radians(),
                aspect,
                PERSPECTIVE_NEAR,
                PERSPECTIVE_FAR,
            ),
            Mode::Ortho => {
                Mat4::orthographic_rh(-aspect, aspect, -1.0, 1.0, self.near, self.far)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    fn assert_vec(actual: Vec3, expected: Vec3) {
        assert!(
            actual.abs_diff_eq(expected, EPS),
            "{:?} != {:?}",
            actual,
            expected
        );
    }

    #[test]
    fn default_looks_down_negative_z() {
        let camera = Camera::default();
        assert_vec(camera.center_position(), Vec3::new(0.0, 0.0, -1.0));
        assert_eq!(camera.mode(), Mode::Ortho);
        assert_eq!(camera.fovy(), 45.0);
    }

    #[test]
    fn new_derives_right_from_front_and_up() {
        let camera = Camera::new(
            Vec3::ZERO,
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            60.0,
        );
        assert_vec(camera.right_direction(), Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(camera.fovy(), 60.0);
    }

    #[test]
    fn forward_and_backward_cancel() {
        let mut camera = Camera::default();
        camera.move_forward(0.3);
        assert_vec(camera.position(), Vec3::new(0.0, 0.0, -0.3));
        camera.move_backward(0.3);
        assert_vec(camera.position(), Vec3::ZERO);
    }

    #[test]
    fn strafing_follows_right_axis() {
        let mut camera = Camera::default();
        camera.move_left(0.1);
        assert_vec(camera.position(), Vec3::new(-0.1, 0.0, 0.0));
        camera.move_right(0.2);
        assert_vec(camera.position(), Vec3::new(0.1, 0.0, 0.0));
    }

    #[test]
    fn vertical_moves_follow_up_axis() {
        let mut camera = Camera::default();
        camera.move_up(0.5);
        camera.move_down(0.2);
        assert_vec(camera.position(), Vec3::new(0.0, 0.3, 0.0));
    }

    #[test]
    fn rotate_left_quarter_turn_faces_negative_x() {
        let mut camera = Camera::default();
        camera.rotate_left(90.0);
        assert_vec(camera.front_direction(), Vec3::new(-1.0, 0.0, 0.0));
        assert_vec(camera.right_direction(), Vec3::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn rotation_keeps_axes_orthonormal() {
        let mut camera = Camera::default();
        for _ in 0..37 {
            camera.rotate_right(13.0);
        }
        let (f, u, r) = (
            camera.front_direction(),
            camera.up_direction(),
            camera.right_direction(),
        );
        assert!((f.length() - 1.0).abs() < EPS);
        assert!((r.length() - 1.0).abs() < EPS);
        assert!(f.dot(u).abs() < EPS);
        assert!(f.dot(r).abs() < EPS);
        assert!(u.dot(r).abs() < EPS);
    }

    #[test]
    fn view_matrix_moves_center_onto_negative_z() {
        let camera = Camera::new(
            Vec3::new(0.0, 0.0, 2.0),
            Vec3::new(0.0, 0.0, -1.0),
            Vec3::new(0.0, 1.0, 0.0),
            45.0,
        );
        let center = camera.view_matrix().transform_point3(camera.center_position());
        assert_vec(center, Vec3::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn toggle_mode_switches_projection() {
        let mut camera = Camera::default();
        let ortho = camera.projection_matrix(1.0);
        camera.toggle_mode();
        assert_eq!(camera.mode(), Mode::Perspective);
        assert_ne!(camera.projection_matrix(1.0), ortho);
        camera.toggle_mode();
        assert_eq!(camera.mode(), Mode::Ortho);
    }

    #[test]
    fn ortho_projection_scales_x_by_aspect() {
        let camera = Camera::default();
        let wide = camera.projection_matrix(2.0);
        let p = wide.transform_point3(Vec3::new(2.0, 1.0, 0.0));
        assert!((p.x - 1.0).abs() < EPS);
        assert!((p.y - 1.0).abs() < EPS);
    }
}
