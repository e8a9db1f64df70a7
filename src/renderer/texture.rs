use anyhow::{anyhow, bail, ensure, Result};
use gfx_hal::{
    adapter::MemoryType,
    buffer as b, command, format as f, image as i, memory as m,
    prelude::*,
    pso::PipelineStage,
    Backend, Limits,
};
use std::iter;
use std::mem::ManuallyDrop;
use std::ptr;

use super::buffer::{align_up, Buffer};
use super::memory::{find_memory_type, Memory};
use crate::error::DebugContext;

const COLOR_RANGE: i::SubresourceRange = i::SubresourceRange {
    aspects: f::Aspects::COLOR,
    levels: 0..1,
    layers: 0..1,
};

const RGBA_STRIDE: u32 = 4;

/// Tightly packed RGBA8 pixels.
#[derive(Debug, Clone)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// A sampled 2D image living in device local memory.
pub struct Texture<'a, B: Backend> {
    device: &'a B::Device,
    image: ManuallyDrop<B::Image>,
    memory: ManuallyDrop<B::Memory>,
    pub view: ManuallyDrop<B::ImageView>,
    pub sampler: ManuallyDrop<B::Sampler>,
}

impl<'a, B: Backend> Texture<'a, B> {
    /// Uploads `data` through a staging buffer and waits for the copy.
    pub fn new(
        device: &'a B::Device,
        memory_types: &[MemoryType],
        limits: &Limits,
        command_pool: &mut B::CommandPool,
        queue: &mut B::CommandQueue,
        data: &TextureData,
    ) -> Result<Self> {
        ensure!(
            data.pixels.len() == (data.width * data.height * RGBA_STRIDE) as usize,
            "texture is {}x{} but has {} bytes",
            data.width,
            data.height,
            data.pixels.len()
        );

        let row_pitch = row_pitch(data.width, limits.optimal_buffer_copy_pitch_alignment);
        let staged = pad_rows(data, row_pitch);
        let staging = Memory::with_content(
            Buffer::<B, u8>::new(device, staged.len(), b::Usage::TRANSFER_SRC, limits)?,
            memory_types,
            &staged,
        )?;

        let mut image = unsafe {
            device.create_image(
                i::Kind::D2(data.width, data.height, 1, 1),
                1,
                f::Format::Rgba8Unorm,
                i::Tiling::Optimal,
                i::Usage::TRANSFER_DST | i::Usage::SAMPLED,
                i::ViewCapabilities::empty(),
            )
        }
        .debug_context("can't create image")?;

        let memory = match unsafe { Self::bind_memory(device, memory_types, &mut image) } {
            Ok(memory) => memory,
            Err(err) => {
                unsafe { device.destroy_image(image) };
                return Err(err);
            }
        };
        let view = unsafe {
            device.create_image_view(
                &image,
                i::ViewKind::D2,
                f::Format::Rgba8Unorm,
                f::Swizzle::NO,
                COLOR_RANGE.clone(),
            )
        };
        let view = match view {
            Ok(view) => view,
            Err(err) => unsafe {
                device.destroy_image(image);
                device.free_memory(memory);
                bail!("can't create image view: {:?}", err);
            },
        };

        let sampler = unsafe {
            device.create_sampler(&i::SamplerDesc::new(i::Filter::Linear, i::WrapMode::Clamp))
        };
        let sampler = match sampler {
            Ok(sampler) => sampler,
            Err(err) => unsafe {
                device.destroy_image_view(view);
                device.destroy_image(image);
                device.free_memory(memory);
                bail!("can't create sampler: {:?}", err);
            },
        };

        let texture = Texture {
            device,
            image: ManuallyDrop::new(image),
            memory: ManuallyDrop::new(memory),
            view: ManuallyDrop::new(view),
            sampler: ManuallyDrop::new(sampler),
        };
        texture.copy_from(&*staging.buffer.buf, data, row_pitch, command_pool, queue)?;
        Ok(texture)
    }

    unsafe fn bind_memory(
        device: &B::Device,
        memory_types: &[MemoryType],
        image: &mut B::Image,
    ) -> Result<B::Memory> {
        let req = device.get_image_requirements(image);
        let device_type = find_memory_type(memory_types, &req, m::Properties::DEVICE_LOCAL)?;
        let memory = device
            .allocate_memory(device_type, req.size)
            .debug_context("can't allocate image memory")?;
        if let Err(err) = device.bind_image_memory(&memory, 0, image) {
            device.free_memory(memory);
            return Err(anyhow!("can't bind image memory: {:?}", err));
        }
        Ok(memory)
    }

    fn copy_from(
        &self,
        staging: &B::Buffer,
        data: &TextureData,
        row_pitch: u32,
        command_pool: &mut B::CommandPool,
        queue: &mut B::CommandQueue,
    ) -> Result<()> {
        let fence = self
            .device
            .create_fence(false)
            .debug_context("can't create fence")?;

        unsafe {
            let mut cmd_buffer = command_pool.allocate_one(command::Level::Primary);
            cmd_buffer.begin_primary(command::CommandBufferFlags::ONE_TIME_SUBMIT);

            let to_transfer = m::Barrier::Image {
                states: (i::Access::empty(), i::Layout::Undefined)
                    ..(i::Access::TRANSFER_WRITE, i::Layout::TransferDstOptimal),
                target: &*self.image,
                families: None,
                range: COLOR_RANGE.clone(),
            };
            cmd_buffer.pipeline_barrier(
                PipelineStage::TOP_OF_PIPE..PipelineStage::TRANSFER,
                m::Dependencies::empty(),
                &[to_transfer],
            );

            cmd_buffer.copy_buffer_to_image(
                staging,
                &self.image,
                i::Layout::TransferDstOptimal,
                &[command::BufferImageCopy {
                    buffer_offset: 0,
                    buffer_width: row_pitch / RGBA_STRIDE,
                    buffer_height: data.height,
                    image_layers: i::SubresourceLayers {
                        aspects: f::Aspects::COLOR,
                        level: 0,
                        layers: 0..1,
                    },
                    image_offset: i::Offset { x: 0, y: 0, z: 0 },
                    image_extent: i::Extent {
                        width: data.width,
                        height: data.height,
                        depth: 1,
                    },
                }],
            );

            let to_shader = m::Barrier::Image {
                states: (i::Access::TRANSFER_WRITE, i::Layout::TransferDstOptimal)
                    ..(i::Access::SHADER_READ, i::Layout::ShaderReadOnlyOptimal),
                target: &*self.image,
                families: None,
                range: COLOR_RANGE.clone(),
            };
            cmd_buffer.pipeline_barrier(
                PipelineStage::TRANSFER..PipelineStage::FRAGMENT_SHADER,
                m::Dependencies::empty(),
                &[to_shader],
            );

            cmd_buffer.finish();

            queue.submit_without_semaphores(iter::once(&cmd_buffer), Some(&fence));
            let waited = self
                .device
                .wait_for_fence(&fence, !0)
                .debug_context("can't wait for texture upload");

            self.device.destroy_fence(fence);
            command_pool.free(iter::once(cmd_buffer));
            waited?;
        }

        log::debug!("uploaded {}x{} texture", data.width, data.height);
        Ok(())
    }
}

impl<'a, B: Backend> Drop for Texture<'a, B> {
    fn drop(&mut self) {
        unsafe {
            self.device
                .destroy_sampler(ManuallyDrop::into_inner(ptr::read(&self.sampler)));
            self.device
                .destroy_image_view(ManuallyDrop::into_inner(ptr::read(&self.view)));
            self.device
                .destroy_image(ManuallyDrop::into_inner(ptr::read(&self.image)));
            self.device
                .free_memory(ManuallyDrop::into_inner(ptr::read(&self.memory)));
        }
    }
}

/// Bytes per staged row, padded to the device's copy pitch alignment.
pub fn row_pitch(width: u32, alignment: u64) -> u32 {
    align_up((width * RGBA_STRIDE) as u64, alignment) as u32
}

fn pad_rows(data: &TextureData, row_pitch: u32) -> Vec<u8> {
    let row_len = (data.width * RGBA_STRIDE) as usize;
    let mut staged = vec![0u8; row_pitch as usize * data.height as usize];
    for (src, dst) in data
        .pixels
        .chunks_exact(row_len)
        .zip(staged.chunks_exact_mut(row_pitch as usize))
    {
        dst[..row_len].copy_from_slice(src);
    }
    staged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_memory_must_be_device_local() {
        let types = [MemoryType {
            properties: m::Properties::CPU_VISIBLE | m::Properties::COHERENT,
            heap_index: 0,
        }];
        let req = m::Requirements {
            size: 4096,
            alignment: 256,
            type_mask: 0b1,
        };
        let err = find_memory_type(&types, &req, m::Properties::DEVICE_LOCAL).unwrap_err();
        assert!(err.to_string().contains("DEVICE_LOCAL"));
    }

    #[test]
    fn row_pitch_is_aligned() {
        assert_eq!(row_pitch(3, 256), 256);
        assert_eq!(row_pitch(64, 256), 256);
        assert_eq!(row_pitch(65, 256), 512);
        assert_eq!(row_pitch(3, 1), 12);
    }

    #[test]
    fn padded_rows_keep_pixels_at_row_starts() {
        let data = TextureData {
            width: 1,
            height: 2,
            pixels: vec![1, 2, 3, 4, 5, 6, 7, 8],
        };
        let staged = pad_rows(&data, 8);
        assert_eq!(staged, vec![1, 2, 3, 4, 0, 0, 0, 0, 5, 6, 7, 8, 0, 0, 0, 0]);
    }
}
