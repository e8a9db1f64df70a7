use anyhow::Result;
use gfx_hal::{adapter::MemoryType, buffer as b, prelude::*, pso, Backend, IndexType, Limits};
use imgui::{DrawCmd, DrawCmdParams, DrawData, DrawIdx, DrawVert};
use std::iter;

use super::buffer::Buffer;
use super::descriptor_set::DescriptorSet;
use super::memory::Memory;
use super::pipeline::{Pipeline, ShaderSet};
use super::texture::{Texture, TextureData};
use super::vertex::VertexLayout;
use crate::shader::{self, Stage};

const VERTEX_SHADER: &str = include_str!("../../shader/overlay_vertex.glsl");
const FRAGMENT_SHADER: &str = include_str!("../../shader/overlay_fragment.glsl");

const SCREEN_BYTES: u32 = 16;
const MIN_VERTICES: usize = 1024;
const MIN_INDICES: usize = 2048;

/// Geometry buffers for one frame in flight.
struct FrameGeometry<'a, B: Backend> {
    vertices: Option<Memory<'a, B, DrawVert>>,
    indices: Option<Memory<'a, B, DrawIdx>>,
}

/// Renders ImGui draw lists on top of the scene.
pub struct OverlayPass<'a, B: Backend> {
    device: &'a B::Device,
    memory_types: Vec<MemoryType>,
    limits: Limits,
    frames: Vec<FrameGeometry<'a, B>>,
    pipeline: Pipeline<'a, B>,
    descriptor_set: DescriptorSet<'a, B>,
    /// Bound through `descriptor_set`; only held to keep it alive.
    _font: Texture<'a, B>,
}

impl<'a, B: Backend> OverlayPass<'a, B> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        device: &'a B::Device,
        memory_types: &[MemoryType],
        limits: &Limits,
        render_pass: &B::RenderPass,
        command_pool: &mut B::CommandPool,
        queue: &mut B::CommandQueue,
        font_atlas: &TextureData,
        frames_in_flight: usize,
    ) -> Result<Self> {
        let font = Texture::new(device, memory_types, limits, command_pool, queue, font_atlas)?;
        let descriptor_set = DescriptorSet::new(device)?;
        descriptor_set.write(&*font.view, &*font.sampler);

        let vertex = shader::compile(VERTEX_SHADER, Stage::Vertex)?;
        let fragment = shader::compile(FRAGMENT_SHADER, Stage::Fragment)?;
        let pipeline = Pipeline::new(
            device,
            ShaderSet {
                vertex: &vertex,
                fragment: &fragment,
            },
            render_pass,
            &[&*descriptor_set.set_layout],
            &[(pso::ShaderStageFlags::VERTEX, 0..SCREEN_BYTES)],
            VertexLayout::overlay(),
        )?;
        log::info!("overlay pipeline created");

        let frames = (0..frames_in_flight)
            .map(|_| FrameGeometry {
                vertices: None,
                indices: None,
            })
            .collect();

        Ok(OverlayPass {
            device,
            memory_types: memory_types.to_vec(),
            limits: limits.clone(),
            frames,
            pipeline,
            descriptor_set,
            _font: font,
        })
    }

    /// Copies this frame's draw lists into the buffers of `frame_idx`. The
    /// slot's fence must already be waited on.
    pub fn prepare(&mut self, frame_idx: usize, draw_data: &DrawData) -> Result<()> {
        let mut vertices = Vec::with_capacity(draw_data.total_vtx_count as usize);
        let mut indices = Vec::with_capacity(draw_data.total_idx_count as usize);
        for draw_list in draw_data.draw_lists() {
            vertices.extend_from_slice(draw_list.vtx_buffer());
            indices.extend_from_slice(draw_list.idx_buffer());
        }

        let device = self.device;
        let memory_types = &self.memory_types;
        let limits = &self.limits;
        let frame = &mut self.frames[frame_idx];
        upload(
            &mut frame.vertices,
            &vertices,
            MIN_VERTICES,
            b::Usage::VERTEX,
            device,
            memory_types,
            limits,
        )?;
        upload(
            &mut frame.indices,
            &indices,
            MIN_INDICES,
            b::Usage::INDEX,
            device,
            memory_types,
            limits,
        )?;
        Ok(())
    }

    /// Records the draw commands prepared for `frame_idx`. Leaves the scissor
    /// at the last clip rectangle.
    pub unsafe fn record(
        &self,
        cmd_buffer: &mut B::CommandBuffer,
        frame_idx: usize,
        draw_data: &DrawData,
    ) {
        let frame = &self.frames[frame_idx];
        let (vertices, indices) = match (&frame.vertices, &frame.indices) {
            (Some(v), Some(i)) if v.len() > 0 && i.len() > 0 => (v, i),
            _ => return,
        };
        let [width, height] = draw_data.display_size;
        if width <= 0.0 || height <= 0.0 {
            return;
        }

        cmd_buffer.bind_graphics_pipeline(&self.pipeline.pipeline);
        cmd_buffer.bind_graphics_descriptor_sets(
            &self.pipeline.pipeline_layout,
            0,
            iter::once(&self.descriptor_set.set),
            &[],
        );
        cmd_buffer.bind_vertex_buffers(
            0,
            iter::once((&*vertices.buffer.buf, b::SubRange::WHOLE)),
        );
        cmd_buffer.bind_index_buffer(b::IndexBufferView {
            buffer: &*indices.buffer.buf,
            range: b::SubRange::WHOLE,
            index_type: IndexType::U16,
        });
        cmd_buffer.push_graphics_constants(
            &self.pipeline.pipeline_layout,
            pso::ShaderStageFlags::VERTEX,
            0,
            &screen_constants(draw_data.display_pos, draw_data.display_size),
        );

        let mut vertex_base = 0;
        let mut index_base = 0;
        for draw_list in draw_data.draw_lists() {
            for cmd in draw_list.commands() {
                if let DrawCmd::Elements {
                    count,
                    cmd_params:
                        DrawCmdParams {
                            clip_rect,
                            vtx_offset,
                            idx_offset,
                            ..
                        },
                } = cmd
                {
                    let scissor = match scissor_rect(
                        clip_rect,
                        draw_data.display_pos,
                        draw_data.framebuffer_scale,
                    ) {
                        Some(rect) => rect,
                        None => continue,
                    };
                    cmd_buffer.set_scissors(0, &[scissor]);

                    let first = (index_base + idx_offset) as u32;
                    cmd_buffer.draw_indexed(
                        first..first + count as u32,
                        (vertex_base + vtx_offset) as i32,
                        0..1,
                    );
                }
            }
            vertex_base += draw_list.vtx_buffer().len();
            index_base += draw_list.idx_buffer().len();
        }
    }
}

fn upload<'a, B: Backend, T: Copy>(
    slot: &mut Option<Memory<'a, B, T>>,
    content: &[T],
    minimum: usize,
    usage: b::Usage,
    device: &'a B::Device,
    memory_types: &[MemoryType],
    limits: &Limits,
) -> Result<()> {
    let capacity = slot.as_ref().map_or(0, Memory::capacity);
    if content.len() > capacity || slot.is_none() {
        let capacity = grown_capacity(capacity, content.len(), minimum);
        log::debug!("growing overlay buffer to {} elements", capacity);
        // drop the old buffer before allocating its replacement
        *slot = None;
        *slot = Some(Memory::new(
            Buffer::new(device, capacity, usage, limits)?,
            memory_types,
        )?);
    }
    if let Some(memory) = slot.as_mut() {
        memory.upload(content)?;
    }
    Ok(())
}

/// Next power of two that fits `needed`, never below `minimum`.
pub fn grown_capacity(current: usize, needed: usize, minimum: usize) -> usize {
    needed.max(current).max(minimum).next_power_of_two()
}

/// Maps ImGui's display rectangle onto clip space: `[scale.x, scale.y,
/// translate.x, translate.y]` as float bits.
pub fn screen_constants(display_pos: [f32; 2], display_size: [f32; 2]) -> [u32; 4] {
    let scale = [2.0 / display_size[0], 2.0 / display_size[1]];
    let translate = [
        -1.0 - display_pos[0] * scale[0],
        -1.0 - display_pos[1] * scale[1],
    ];
    [
        scale[0].to_bits(),
        scale[1].to_bits(),
        translate[0].to_bits(),
        translate[1].to_bits(),
    ]
}

/// Clip rectangle in framebuffer pixels, `None` when nothing is visible.
pub fn scissor_rect(
    clip_rect: [f32; 4],
    display_pos: [f32; 2],
    framebuffer_scale: [f32; 2],
) -> Option<pso::Rect> {
    let x0 = ((clip_rect[0] - display_pos[0]) * framebuffer_scale[0]).max(0.0);
    let y0 = ((clip_rect[1] - display_pos[1]) * framebuffer_scale[1]).max(0.0);
    let x1 = (clip_rect[2] - display_pos[0]) * framebuffer_scale[0];
    let y1 = (clip_rect[3] - display_pos[1]) * framebuffer_scale[1];
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some(pso::Rect {
        x: x0 as i16,
        y: y0 as i16,
        w: (x1 - x0) as i16,
        h: (y1 - y0) as i16,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_grows_to_powers_of_two() {
        assert_eq!(grown_capacity(0, 10, 1024), 1024);
        assert_eq!(grown_capacity(1024, 1500, 1024), 2048);
        assert_eq!(grown_capacity(2048, 100, 1024), 2048);
    }

    #[test]
    fn screen_constants_map_corners_to_clip_space() {
        let words = screen_constants([0.0, 0.0], [500.0, 250.0]);
        let f: Vec<f32> = words.iter().map(|w| f32::from_bits(*w)).collect();
        assert_eq!(f, vec![0.004, 0.008, -1.0, -1.0]);
        // bottom right corner
        assert!((500.0 * f[0] + f[2] - 1.0).abs() < 1e-6);
        assert!((250.0 * f[1] + f[3] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn scissor_is_clamped_to_the_framebuffer_origin() {
        let rect = scissor_rect([-10.0, 5.0, 100.0, 50.0], [0.0, 0.0], [1.0, 1.0]).unwrap();
        assert_eq!((rect.x, rect.y, rect.w, rect.h), (0, 5, 100, 45));
    }

    #[test]
    fn scissor_scales_with_framebuffer() {
        let rect = scissor_rect([10.0, 10.0, 20.0, 30.0], [0.0, 0.0], [2.0, 2.0]).unwrap();
        assert_eq!((rect.x, rect.y, rect.w, rect.h), (20, 20, 20, 40));
    }

    #[test]
    fn empty_clip_rect_is_skipped() {
        assert!(scissor_rect([10.0, 10.0, 10.0, 30.0], [0.0, 0.0], [1.0, 1.0]).is_none());
    }

    #[test]
    fn overlay_shaders_compile() {
        assert!(shader::compile(VERTEX_SHADER, Stage::Vertex).is_ok());
        assert!(shader::compile(FRAGMENT_SHADER, Stage::Fragment).is_ok());
    }
}
