#[cfg(feature = "metal")]
pub use gfx_backend_metal as back;

#[cfg(feature = "vulkan")]
pub use gfx_backend_vulkan as back;

pub mod app;
pub mod camera;
pub mod config;
pub mod controls;
pub mod error;
pub mod logging;
pub mod overlay;
pub mod renderer;
pub mod scene;
pub mod shader;
