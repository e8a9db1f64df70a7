use anyhow::Result;
use gfx_hal::{image as i, prelude::*, pso, Backend};
use std::mem::ManuallyDrop;
use std::ptr;

use crate::error::DebugContext;

const SAMPLED_IMAGE: pso::DescriptorType = pso::DescriptorType::Image {
    ty: pso::ImageDescriptorType::Sampled { with_sampler: false },
};

/// One descriptor set holding a sampled image (binding 0) and its sampler
/// (binding 1), read by the fragment stage.
pub struct DescriptorSet<'a, B: Backend> {
    device: &'a B::Device,
    pub set_layout: ManuallyDrop<B::DescriptorSetLayout>,
    pool: ManuallyDrop<B::DescriptorPool>,
    pub set: B::DescriptorSet,
}

impl<'a, B: Backend> DescriptorSet<'a, B> {
    pub fn new(device: &'a B::Device) -> Result<Self> {
        let set_layout = Self::create_descriptor_set_layout(device)?;
        let mut pool = Self::create_descriptor_pool(device)?;
        let set = Self::create_descriptor_set(&mut pool, &set_layout)?;

        Ok(DescriptorSet {
            set_layout,
            pool,
            set,
            device,
        })
    }

    fn create_descriptor_set_layout(
        device: &B::Device,
    ) -> Result<ManuallyDrop<B::DescriptorSetLayout>> {
        let layout = unsafe {
            device.create_descriptor_set_layout(
                &[
                    pso::DescriptorSetLayoutBinding {
                        binding: 0,
                        ty: SAMPLED_IMAGE,
                        count: 1,
                        stage_flags: pso::ShaderStageFlags::FRAGMENT,
                        immutable_samplers: false,
                    },
                    pso::DescriptorSetLayoutBinding {
                        binding: 1,
                        ty: pso::DescriptorType::Sampler,
                        count: 1,
                        stage_flags: pso::ShaderStageFlags::FRAGMENT,
                        immutable_samplers: false,
                    },
                ],
                &[],
            )
        }
        .debug_context("can't create descriptor set layout")?;
        Ok(ManuallyDrop::new(layout))
    }

    fn create_descriptor_pool(device: &B::Device) -> Result<ManuallyDrop<B::DescriptorPool>> {
        let pool = unsafe {
            device.create_descriptor_pool(
                1,
                &[
                    pso::DescriptorRangeDesc {
                        ty: SAMPLED_IMAGE,
                        count: 1,
                    },
                    pso::DescriptorRangeDesc {
                        ty: pso::DescriptorType::Sampler,
                        count: 1,
                    },
                ],
                pso::DescriptorPoolCreateFlags::empty(),
            )
        }
        .debug_context("can't create descriptor pool")?;
        Ok(ManuallyDrop::new(pool))
    }

    fn create_descriptor_set(
        desc_pool: &mut ManuallyDrop<B::DescriptorPool>,
        layout: &ManuallyDrop<B::DescriptorSetLayout>,
    ) -> Result<B::DescriptorSet> {
        unsafe { desc_pool.allocate_set(layout) }.debug_context("can't allocate descriptor set")
    }

    /// Points the set at `view` and `sampler`.
    pub fn write(&self, view: &B::ImageView, sampler: &B::Sampler) {
        unsafe {
            self.device.write_descriptor_sets(vec![
                pso::DescriptorSetWrite {
                    set: &self.set,
                    binding: 0,
                    array_offset: 0,
                    descriptors: Some(pso::Descriptor::Image(
                        view,
                        i::Layout::ShaderReadOnlyOptimal,
                    )),
                },
                pso::DescriptorSetWrite {
                    set: &self.set,
                    binding: 1,
                    array_offset: 0,
                    descriptors: Some(pso::Descriptor::Sampler(sampler)),
                },
            ]);
        }
    }
}

impl<'a, B: Backend> Drop for DescriptorSet<'a, B> {
    fn drop(&mut self) {
        unsafe {
            self.device
                .destroy_descriptor_set_layout(ManuallyDrop::into_inner(ptr::read(
                    &self.set_layout,
                )));
            self.device
                .destroy_descriptor_pool(ManuallyDrop::into_inner(ptr::read(&self.pool)));
        }
    }
}
