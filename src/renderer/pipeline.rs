use anyhow::Result;
use gfx_hal::{pass::Subpass, prelude::*, pso, Backend};
use std::mem::ManuallyDrop;
use std::ops::Range;
use std::ptr;

use super::vertex::VertexLayout;
use crate::error::DebugContext;

const ENTRY_NAME: &str = "main";

/// Compiled shader stages, as SPIR-V words.
pub struct ShaderSet<'s> {
    pub vertex: &'s [u32],
    pub fragment: &'s [u32],
}

/// A graphics pipeline: the linked shader program plus its fixed state.
pub struct Pipeline<'a, B: Backend> {
    device: &'a B::Device,
    pub pipeline: ManuallyDrop<B::GraphicsPipeline>,
    pub pipeline_layout: ManuallyDrop<B::PipelineLayout>,
}

impl<'a, B: Backend> Pipeline<'a, B> {
    pub fn new(
        device: &'a B::Device,
        shaders: ShaderSet,
        render_pass: &B::RenderPass,
        set_layouts: &[&B::DescriptorSetLayout],
        push_constants: &[(pso::ShaderStageFlags, Range<u32>)],
        vertex_layout: VertexLayout,
    ) -> Result<Self> {
        let pipeline_layout = ManuallyDrop::new(
            unsafe { device.create_pipeline_layout(set_layouts.iter().cloned(), push_constants) }
                .debug_context("can't create pipeline layout")?,
        );

        let vs_module = unsafe { device.create_shader_module(shaders.vertex) }
            .debug_context("can't create vertex shader module")?;
        let fs_module = match unsafe { device.create_shader_module(shaders.fragment) } {
            Ok(module) => module,
            Err(err) => unsafe {
                device.destroy_shader_module(vs_module);
                device.destroy_pipeline_layout(ManuallyDrop::into_inner(pipeline_layout));
                anyhow::bail!("can't create fragment shader module: {:?}", err);
            },
        };

        let graphic_pipeline = {
            let (vs_entry, fs_entry) = (
                pso::EntryPoint {
                    entry: ENTRY_NAME,
                    module: &vs_module,
                    specialization: pso::Specialization::default(),
                },
                pso::EntryPoint {
                    entry: ENTRY_NAME,
                    module: &fs_module,
                    specialization: pso::Specialization::default(),
                },
            );

            let shader_entries = pso::GraphicsShaderSet {
                vertex: vs_entry,
                hull: None,
                domain: None,
                geometry: None,
                fragment: Some(fs_entry),
            };

            let subpass = Subpass {
                index: 0,
                main_pass: render_pass,
            };

            let mut pipeline_desc = pso::GraphicsPipelineDesc::new(
                shader_entries,
                pso::Primitive::TriangleList,
                pso::Rasterizer::FILL,
                &*pipeline_layout,
                subpass,
            );
            pipeline_desc.blender.targets.push(pso::ColorBlendDesc {
                mask: pso::ColorMask::ALL,
                blend: Some(pso::BlendState::ALPHA),
            });
            pipeline_desc.vertex_buffers = vertex_layout.buffers;
            pipeline_desc.attributes = vertex_layout.attributes;

            unsafe { device.create_graphics_pipeline(&pipeline_desc, None) }
        };

        unsafe {
            device.destroy_shader_module(vs_module);
            device.destroy_shader_module(fs_module);
        }

        let graphic_pipeline = match graphic_pipeline {
            Ok(pipeline) => pipeline,
            Err(err) => {
                unsafe {
                    device.destroy_pipeline_layout(ManuallyDrop::into_inner(pipeline_layout));
                }
                anyhow::bail!("can't create graphics pipeline: {:?}", err);
            }
        };

        Ok(Pipeline {
            device,
            pipeline: ManuallyDrop::new(graphic_pipeline),
            pipeline_layout,
        })
    }
}

impl<'a, B: Backend> Drop for Pipeline<'a, B> {
    fn drop(&mut self) {
        unsafe {
            self.device
                .destroy_graphics_pipeline(ManuallyDrop::into_inner(ptr::read(&self.pipeline)));
            self.device
                .destroy_pipeline_layout(ManuallyDrop::into_inner(ptr::read(
                    &self.pipeline_layout,
                )));
        }
    }
}
