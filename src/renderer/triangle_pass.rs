use anyhow::Result;
use gfx_hal::{adapter::MemoryType, buffer as b, device, prelude::*, pso, Backend, Limits};
use glam::Mat4;

use super::buffer::Buffer;
use super::memory::Memory;
use super::pipeline::{Pipeline, ShaderSet};
use super::vertex::VertexLayout;
use crate::error::DebugContext;
use crate::scene::{Color, Position, Triangle};

const PVM_BYTES: u32 = 64;

/// Vulkan clip space points y down; flip so the scene reads like GL.
fn clip_correction() -> Mat4 {
    Mat4::from_scale(glam::Vec3::new(1.0, -1.0, 1.0))
}

/// Draws the triangle from a position buffer and a color buffer.
pub struct TrianglePass<'a, B: Backend> {
    device: &'a B::Device,
    positions: Memory<'a, B, Position>,
    colors: Memory<'a, B, Color>,
    uploaded: [Position; 3],
    pipeline: Pipeline<'a, B>,
}

impl<'a, B: Backend> TrianglePass<'a, B> {
    pub fn new(
        device: &'a B::Device,
        memory_types: &[MemoryType],
        limits: &Limits,
        render_pass: &B::RenderPass,
        shaders: ShaderSet,
        triangle: &Triangle,
    ) -> Result<Self> {
        let positions = Memory::with_content(
            Buffer::new(device, triangle.positions.len(), b::Usage::VERTEX, limits)?,
            memory_types,
            &triangle.positions,
        )?;
        let colors = Memory::with_content(
            Buffer::new(device, triangle.colors.len(), b::Usage::VERTEX, limits)?,
            memory_types,
            &triangle.colors,
        )?;

        let pipeline = Pipeline::new(
            device,
            shaders,
            render_pass,
            &[],
            &[(pso::ShaderStageFlags::VERTEX, 0..PVM_BYTES)],
            VertexLayout::triangle(),
        )?;
        log::info!("triangle pipeline created");

        Ok(TrianglePass {
            device,
            positions,
            colors,
            uploaded: triangle.positions,
            pipeline,
        })
    }

    /// Rewrites the position buffer when the CPU copy changed. Waits for every
    /// in-flight frame first since they all read the same buffer.
    pub fn sync_positions(
        &mut self,
        positions: &[Position; 3],
        in_flight: &[B::Fence],
    ) -> Result<()> {
        if !needs_upload(&self.uploaded, positions) {
            return Ok(());
        }
        unsafe {
            self.device
                .wait_for_fences(in_flight, device::WaitFor::All, !0)
                .debug_context("can't wait for in-flight frames")?;
        }
        self.positions.upload(positions)?;
        self.uploaded = *positions;
        Ok(())
    }

    pub unsafe fn record(&self, cmd_buffer: &mut B::CommandBuffer, pvm: Mat4) {
        let constants = push_constants(clip_correction() * pvm);

        cmd_buffer.bind_graphics_pipeline(&self.pipeline.pipeline);
        cmd_buffer.bind_vertex_buffers(
            0,
            vec![
                (&*self.positions.buffer.buf, b::SubRange::WHOLE),
                (&*self.colors.buffer.buf, b::SubRange::WHOLE),
            ],
        );
        cmd_buffer.push_graphics_constants(
            &self.pipeline.pipeline_layout,
            pso::ShaderStageFlags::VERTEX,
            0,
            &constants,
        );
        cmd_buffer.draw(0..self.positions.len() as u32, 0..1);
    }
}

fn needs_upload(uploaded: &[Position; 3], current: &[Position; 3]) -> bool {
    uploaded != current
}

/// Column major, as GLSL reads a `mat4`.
fn push_constants(matrix: Mat4) -> [u32; 16] {
    let mut words = [0u32; 16];
    for (word, value) in words.iter_mut().zip(matrix.to_cols_array().iter()) {
        *word = value.to_bits();
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_constants_are_column_major_bits() {
        let matrix = Mat4::from_translation(glam::Vec3::new(1.0, 2.0, 3.0));
        let words = push_constants(matrix);
        assert_eq!(words[0], 1.0f32.to_bits());
        assert_eq!(words[12], 1.0f32.to_bits());
        assert_eq!(words[13], 2.0f32.to_bits());
        assert_eq!(words[14], 3.0f32.to_bits());
        assert_eq!(words.len() as u32 * 4, PVM_BYTES);
    }

    #[test]
    fn edited_vertices_are_uploaded_again() {
        let uploaded = Triangle::default().positions;
        let mut scene = crate::scene::Scene::new([0.5; 3], None);
        assert!(!needs_upload(&uploaded, &scene.triangle.positions));

        scene.triangle.positions[2][1] = -0.75;
        assert!(needs_upload(&uploaded, &scene.triangle.positions));
    }

    #[test]
    fn clip_correction_flips_y_only() {
        let p = clip_correction().transform_point3(glam::Vec3::new(0.5, 0.5, 0.25));
        assert_eq!(p, glam::Vec3::new(0.5, -0.5, 0.25));
    }
}
