use gfx_hal::window::Extent2D;

pub const VERTEX_SHADER_PATH: &str = "./shader/vertex.glsl";
pub const FRAGMENT_SHADER_PATH: &str = "./shader/fragment.glsl";

/// Distance the camera and the model travel per key event.
pub const MOVE_STEP: f32 = 0.1;
/// Camera yaw per key event, in degrees.
pub const ROTATE_STEP: f32 = 5.0;
/// Model offset gained per frame while animating.
pub const ANIMATION_STEP: f32 = 0.1;

pub const MIN_WINDOW_SIZE: f64 = 64.0;

/// Eye position of the tutorials that drive a camera, looking down -Z.
pub const CAMERA_START: [f32; 3] = [0.0, 0.0, 2.0];
/// Far plane used while the camera stays orthographic.
pub const ORTHO_FAR: f32 = 10.0;

const GRAY: [f32; 3] = [0.5, 0.5, 0.5];

/// Everything that distinguishes one tutorial binary from another.
#[derive(Debug, Clone)]
pub struct Tutorial {
    pub title: &'static str,
    pub dims: Extent2D,
    pub clear_color: [f32; 3],
    /// GLSL sources of the triangle program, relative to the working directory.
    pub vertex_shader: &'static str,
    pub fragment_shader: &'static str,
    /// Compile the shaders and draw the triangle.
    pub triangle: bool,
    /// Drive the view/projection from a camera bound to the keyboard.
    pub camera: bool,
    /// Draw the ImGui debug windows on top of the scene.
    pub overlay: bool,
}

impl Tutorial {
    /// A window that only clears to gray.
    pub fn dev_setup() -> Self {
        Tutorial {
            title: "Hello World",
            dims: Extent2D {
                width: 640,
                height: 480,
            },
            clear_color: GRAY,
            vertex_shader: VERTEX_SHADER_PATH,
            fragment_shader: FRAGMENT_SHADER_PATH,
            triangle: false,
            camera: false,
            overlay: false,
        }
    }

    pub fn hello_triangle() -> Self {
        Tutorial {
            title: "Hello Triangle",
            dims: Extent2D {
                width: 500,
                height: 500,
            },
            clear_color: GRAY,
            vertex_shader: VERTEX_SHADER_PATH,
            fragment_shader: FRAGMENT_SHADER_PATH,
            triangle: true,
            camera: false,
            overlay: false,
        }
    }

    pub fn imgui_overlay() -> Self {
        Tutorial {
            camera: true,
            overlay: true,
            ..Self::hello_triangle()
        }
    }
}
