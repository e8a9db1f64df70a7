use gfx_hal::{format as f, pso};
use std::mem;

use crate::scene::{Color, Position};

/// How vertex buffers feed the attributes of a pipeline.
#[derive(Debug, Clone)]
pub struct VertexLayout {
    pub buffers: Vec<pso::VertexBufferDesc>,
    pub attributes: Vec<pso::AttributeDesc>,
}

impl VertexLayout {
    /// Positions and colors live in separate buffers: `a_position` at
    /// binding/location 0, `a_color` at binding/location 1.
    pub fn triangle() -> Self {
        VertexLayout {
            buffers: vec![
                per_vertex(0, mem::size_of::<Position>()),
                per_vertex(1, mem::size_of::<Color>()),
            ],
            attributes: vec![
                attribute(0, 0, f::Format::Rgb32Sfloat, 0),
                attribute(1, 1, f::Format::Rgb32Sfloat, 0),
            ],
        }
    }

    /// Interleaved `imgui::DrawVert`: position, uv, packed color.
    pub fn overlay() -> Self {
        VertexLayout {
            buffers: vec![per_vertex(0, mem::size_of::<imgui::DrawVert>())],
            attributes: vec![
                attribute(0, 0, f::Format::Rg32Sfloat, 0),
                attribute(1, 0, f::Format::Rg32Sfloat, 8),
                attribute(2, 0, f::Format::Rgba8Unorm, 16),
            ],
        }
    }
}

fn per_vertex(binding: u32, stride: usize) -> pso::VertexBufferDesc {
    pso::VertexBufferDesc {
        binding,
        stride: stride as u32,
        rate: pso::VertexInputRate::Vertex,
    }
}

fn attribute(location: u32, binding: u32, format: f::Format, offset: u32) -> pso::AttributeDesc {
    pso::AttributeDesc {
        location,
        binding,
        element: pso::Element { format, offset },
    }
}
