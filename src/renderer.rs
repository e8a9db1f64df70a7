use anyhow::Result;
use gfx_hal::{
    adapter, command, format as f, image as i, pass, pool,
    prelude::*,
    queue::{family::QueueFamilyId, Submission},
    window, Backend,
};
use glam::Mat4;

use std::borrow::Borrow;
use std::iter;
use std::mem::ManuallyDrop;
use std::ptr;

mod buffer;
mod descriptor_set;
mod memory;
mod overlay_pass;
mod pipeline;
mod swapchain;
mod texture;
mod triangle_pass;
mod vertex;

pub use pipeline::ShaderSet;
pub use texture::TextureData;

use crate::error::DebugContext;
use crate::scene::{Position, Triangle};
use overlay_pass::OverlayPass;
use swapchain::Swapchain;
use triangle_pass::TrianglePass;

const FRAMES_IN_FLIGHT: usize = 2;

/// What to build besides the clear pass.
pub struct RendererOptions<'o> {
    /// Shaders and initial geometry for the triangle.
    pub triangle: Option<(ShaderSet<'o>, &'o Triangle)>,
    /// Font atlas for the ImGui overlay.
    pub overlay: Option<&'o TextureData>,
}

/// Everything a frame needs from the scene.
pub struct FrameInput<'f> {
    pub clear_color: [f32; 3],
    pub pvm: Mat4,
    pub positions: &'f [Position; 3],
    pub overlay: Option<&'f imgui::DrawData>,
}

pub struct Renderer<'a, B: Backend> {
    frame: usize,
    device: &'a B::Device,
    frames_in_flight: usize,
    command_buffers: Vec<B::CommandBuffer>,
    submission_complete_semaphores: Vec<B::Semaphore>,
    submission_complete_fences: Vec<B::Fence>,
    framebuffers: Vec<Option<B::Framebuffer>>,
    command_pool: ManuallyDrop<B::CommandPool>,
    triangle: ManuallyDrop<Option<TrianglePass<'a, B>>>,
    overlay: ManuallyDrop<Option<OverlayPass<'a, B>>>,
    swapchain: ManuallyDrop<Swapchain<'a, B>>,
    render_pass: ManuallyDrop<B::RenderPass>,
}

impl<'a, B> Renderer<'a, B>
where
    B: Backend,
{
    pub fn new(
        surface: &'a mut B::Surface,
        adapter: &'a adapter::Adapter<B>,
        device: &'a B::Device,
        family: QueueFamilyId,
        queue: &mut B::CommandQueue,
        init_dims: window::Extent2D,
        options: RendererOptions,
    ) -> Result<Self> {
        let memory_types = adapter.physical_device.memory_properties().memory_types;
        let limits = adapter.physical_device.limits();

        let swapchain = Swapchain::new(device, surface, adapter, init_dims)?;
        let render_pass = Self::create_render_pass(device, swapchain.format)?;
        let mut command_pool = Self::create_command_pool(device, family)?;

        let triangle = match options.triangle {
            Some((shaders, triangle)) => Some(TrianglePass::new(
                device,
                &memory_types,
                &limits,
                &*render_pass,
                shaders,
                triangle,
            )?),
            None => None,
        };

        let overlay = match options.overlay {
            Some(font_atlas) => Some(OverlayPass::new(
                device,
                &memory_types,
                &limits,
                &*render_pass,
                &mut command_pool,
                queue,
                font_atlas,
                FRAMES_IN_FLIGHT,
            )?),
            None => None,
        };

        let frames_in_flight = FRAMES_IN_FLIGHT;
        let command_buffers = Self::allocate_command_buffer(&mut command_pool, frames_in_flight);
        let submission_complete_semaphores = Self::create_semaphores(device, frames_in_flight)?;
        let submission_complete_fences = Self::create_fences(device, frames_in_flight)?;

        Ok(Renderer {
            device,
            submission_complete_semaphores,
            submission_complete_fences,
            frames_in_flight,
            framebuffers: (0..frames_in_flight).map(|_| None).collect(),
            command_pool: ManuallyDrop::new(command_pool),
            triangle: ManuallyDrop::new(triangle),
            overlay: ManuallyDrop::new(overlay),
            swapchain: ManuallyDrop::new(swapchain),
            render_pass,
            command_buffers,
            frame: 0,
        })
    }

    pub fn resize(&mut self, dims: window::Extent2D) -> Result<()> {
        if dims.width == 0 || dims.height == 0 {
            return Ok(());
        }
        self.device
            .wait_idle()
            .debug_context("can't wait for device idle")?;
        self.swapchain.resize(dims)
    }

    pub fn render(&mut self, queue: &mut B::CommandQueue, input: &FrameInput) -> Result<()> {
        let surface_image = unsafe {
            match self.swapchain.surface.acquire_image(!0) {
                Ok((image, _)) => image,
                Err(err) => {
                    log::debug!("can't acquire swapchain image: {:?}", err);
                    self.device
                        .wait_idle()
                        .debug_context("can't wait for device idle")?;
                    self.swapchain.recreate()?;
                    return Ok(());
                }
            }
        };

        let frame_idx = self.frame % self.frames_in_flight;

        unsafe {
            let fence = &self.submission_complete_fences[frame_idx];
            self.device
                .wait_for_fence(fence, !0)
                .debug_context("can't wait for fence")?;

            if let Some(triangle) = self.triangle.as_mut() {
                triangle.sync_positions(input.positions, &self.submission_complete_fences)?;
            }

            self.device
                .reset_fence(fence)
                .debug_context("can't reset fence")?;
            if let Some(framebuffer) = self.framebuffers[frame_idx].take() {
                self.device.destroy_framebuffer(framebuffer);
            }
        }

        if let (Some(overlay), Some(draw_data)) = (self.overlay.as_mut(), input.overlay) {
            overlay.prepare(frame_idx, draw_data)?;
        }

        let extent = self.swapchain.extent();
        let framebuffer = unsafe {
            self.device.create_framebuffer(
                &self.render_pass,
                iter::once(surface_image.borrow()),
                i::Extent {
                    width: extent.width,
                    height: extent.height,
                    depth: 1,
                },
            )
        }
        .debug_context("can't create framebuffer")?;

        let [r, g, b] = input.clear_color;
        let viewport = self.swapchain.viewport.clone();
        let cmd_buffer = &mut self.command_buffers[frame_idx];
        unsafe {
            cmd_buffer.reset(false);
            cmd_buffer.begin_primary(command::CommandBufferFlags::ONE_TIME_SUBMIT);
            cmd_buffer.set_viewports(0, &[viewport.clone()]);
            cmd_buffer.set_scissors(0, &[viewport.rect]);
            cmd_buffer.begin_render_pass(
                &self.render_pass,
                &framebuffer,
                viewport.rect,
                &[command::ClearValue {
                    color: command::ClearColor {
                        float32: [r, g, b, 1.0],
                    },
                }],
                command::SubpassContents::Inline,
            );
            if let Some(triangle) = self.triangle.as_ref() {
                triangle.record(cmd_buffer, input.pvm);
            }
            if let (Some(overlay), Some(draw_data)) = (self.overlay.as_ref(), input.overlay) {
                overlay.record(cmd_buffer, frame_idx, draw_data);
            }
            cmd_buffer.end_render_pass();
            cmd_buffer.finish();

            let submission = Submission {
                command_buffers: iter::once(&*cmd_buffer),
                wait_semaphores: None,
                signal_semaphores: iter::once(&self.submission_complete_semaphores[frame_idx]),
            };

            queue.submit(
                submission,
                Some(&self.submission_complete_fences[frame_idx]),
            );

            let result = queue.present_surface(
                &mut self.swapchain.surface,
                surface_image,
                Some(&self.submission_complete_semaphores[frame_idx]),
            );

            self.framebuffers[frame_idx] = Some(framebuffer);

            if let Err(err) = result {
                log::debug!("can't present: {:?}", err);
                self.device
                    .wait_idle()
                    .debug_context("can't wait for device idle")?;
                self.swapchain.recreate()?;
            }
        }

        self.frame += 1;
        Ok(())
    }

    fn create_render_pass(
        device: &B::Device,
        format: f::Format,
    ) -> Result<ManuallyDrop<B::RenderPass>> {
        let attachment = pass::Attachment {
            format: Some(format),
            samples: 1,
            ops: pass::AttachmentOps::new(
                pass::AttachmentLoadOp::Clear,
                pass::AttachmentStoreOp::Store,
            ),
            stencil_ops: pass::AttachmentOps::DONT_CARE,
            layouts: i::Layout::Undefined..i::Layout::Present,
        };

        let subpass = pass::SubpassDesc {
            colors: &[(0, i::Layout::ColorAttachmentOptimal)],
            depth_stencil: None,
            inputs: &[],
            resolves: &[],
            preserves: &[],
        };

        let render_pass = unsafe { device.create_render_pass(&[attachment], &[subpass], &[]) }
            .debug_context("can't create render pass")?;
        Ok(ManuallyDrop::new(render_pass))
    }

    fn create_command_pool(device: &B::Device, family: QueueFamilyId) -> Result<B::CommandPool> {
        let flags = pool::CommandPoolCreateFlags::RESET_INDIVIDUAL;
        unsafe { device.create_command_pool(family, flags) }
            .debug_context("can't create command pool")
    }

    fn allocate_command_buffer(
        command_pool: &mut B::CommandPool,
        frames_in_flight: usize,
    ) -> Vec<B::CommandBuffer> {
        let mut v = Vec::with_capacity(frames_in_flight);
        for _ in 0..frames_in_flight {
            v.push(unsafe { command_pool.allocate_one(command::Level::Primary) });
        }
        v
    }

    fn create_semaphores(device: &B::Device, frames_in_flight: usize) -> Result<Vec<B::Semaphore>> {
        let mut v = Vec::with_capacity(frames_in_flight);
        for _ in 0..frames_in_flight {
            v.push(
                device
                    .create_semaphore()
                    .debug_context("can't create semaphore")?,
            );
        }
        Ok(v)
    }

    fn create_fences(device: &B::Device, frames_in_flight: usize) -> Result<Vec<B::Fence>> {
        let mut v = Vec::with_capacity(frames_in_flight);
        for _ in 0..frames_in_flight {
            v.push(device.create_fence(true).debug_context("can't create fence")?);
        }
        Ok(v)
    }
}

impl<'a, B: Backend> Drop for Renderer<'a, B> {
    fn drop(&mut self) {
        let device = &self.device;
        if let Err(err) = device.wait_idle() {
            log::error!("can't wait for device idle: {:?}", err);
        }
        unsafe {
            ManuallyDrop::drop(&mut self.triangle);
            ManuallyDrop::drop(&mut self.overlay);
            for framebuffer in self.framebuffers.drain(..).flatten() {
                device.destroy_framebuffer(framebuffer);
            }
            device.destroy_command_pool(ManuallyDrop::into_inner(ptr::read(&self.command_pool)));
            for s in self.submission_complete_semaphores.drain(..) {
                device.destroy_semaphore(s);
            }

            for f in self.submission_complete_fences.drain(..) {
                device.destroy_fence(f);
            }

            device.destroy_render_pass(ManuallyDrop::into_inner(ptr::read(&self.render_pass)));
            ManuallyDrop::drop(&mut self.swapchain);
        }
    }
}
