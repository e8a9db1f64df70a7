use anyhow::{anyhow, ensure, Result};
use gfx_hal::{adapter::MemoryType, memory as m, prelude::*, Backend, MemoryTypeId};
use std::iter;
use std::mem::ManuallyDrop;
use std::ptr;

use super::buffer::{byte_len, Buffer};
use crate::error::DebugContext;

/// A buffer bound to CPU visible memory that can be rewritten in place.
pub struct Memory<'a, B: Backend, T> {
    pub buffer: ManuallyDrop<Buffer<'a, B, T>>,
    memory: ManuallyDrop<B::Memory>,
    len: usize,
}

impl<'a, B: Backend, T: Copy> Memory<'a, B, T> {
    pub fn new(mut buffer: Buffer<'a, B, T>, memory_types: &[MemoryType]) -> Result<Self> {
        let memory = Self::allocate_gpu_memory(&mut buffer, memory_types)?;
        Ok(Memory {
            buffer: ManuallyDrop::new(buffer),
            memory,
            len: 0,
        })
    }

    /// Creates the buffer, binds memory and fills it with `content`.
    pub fn with_content(
        buffer: Buffer<'a, B, T>,
        memory_types: &[MemoryType],
        content: &[T],
    ) -> Result<Self> {
        let mut memory = Self::new(buffer, memory_types)?;
        memory.upload(content)?;
        Ok(memory)
    }

    fn allocate_gpu_memory(
        buffer: &mut Buffer<'a, B, T>,
        memory_types: &[MemoryType],
    ) -> Result<ManuallyDrop<B::Memory>> {
        let device = buffer.device;
        unsafe {
            let buffer_req = device.get_buffer_requirements(&buffer.buf);
            let upload_type = upload_type(memory_types, &buffer_req)?;
            let memory = device
                .allocate_memory(upload_type, buffer_req.size)
                .debug_context("can't allocate buffer memory")?;
            device
                .bind_buffer_memory(&memory, 0, &mut buffer.buf)
                .debug_context("can't bind buffer memory")?;
            Ok(ManuallyDrop::new(memory))
        }
    }

    /// Copies `content` to the start of the buffer. The caller makes sure the
    /// GPU is no longer reading it.
    pub fn upload(&mut self, content: &[T]) -> Result<()> {
        ensure!(
            content.len() <= self.buffer.capacity,
            "{} elements don't fit a buffer of {}",
            content.len(),
            self.buffer.capacity
        );
        if content.is_empty() {
            self.len = 0;
            return Ok(());
        }

        let device = self.buffer.device;
        unsafe {
            let mapping = device
                .map_memory(&self.memory, m::Segment::ALL)
                .debug_context("can't map buffer memory")?;
            ptr::copy_nonoverlapping(
                content.as_ptr() as *const u8,
                mapping,
                byte_len::<T>(content.len()) as usize,
            );
            device
                .flush_mapped_memory_ranges(iter::once((&*self.memory, m::Segment::ALL)))
                .debug_context("can't flush buffer memory")?;
            device.unmap_memory(&self.memory);
        }
        self.len = content.len();
        Ok(())
    }

    /// Number of elements written by the last upload.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity
    }
}

pub fn upload_type(
    properties: &[MemoryType],
    buffer_req: &m::Requirements,
) -> Result<MemoryTypeId> {
    find_memory_type(properties, buffer_req, m::Properties::CPU_VISIBLE)
}

pub fn find_memory_type(
    properties: &[MemoryType],
    req: &m::Requirements,
    wanted: m::Properties,
) -> Result<MemoryTypeId> {
    properties
        .iter()
        .enumerate()
        .position(|(id, mem_type)| {
            req.type_mask & (1 << id) != 0 && mem_type.properties.contains(wanted)
        })
        .map(MemoryTypeId::from)
        .ok_or_else(|| anyhow!("no memory type with {:?}", wanted))
}

impl<'a, B: Backend, T> Drop for Memory<'a, B, T> {
    fn drop(&mut self) {
        unsafe {
            let device = self.buffer.device;
            ManuallyDrop::drop(&mut self.buffer);
            device.free_memory(ManuallyDrop::into_inner(ptr::read(&self.memory)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mem_type(properties: m::Properties) -> MemoryType {
        MemoryType {
            properties,
            heap_index: 0,
        }
    }

    #[test]
    fn picks_first_cpu_visible_type_allowed_by_mask() {
        let types = [
            mem_type(m::Properties::DEVICE_LOCAL),
            mem_type(m::Properties::CPU_VISIBLE | m::Properties::COHERENT),
            mem_type(m::Properties::CPU_VISIBLE),
        ];
        let req = m::Requirements {
            size: 64,
            alignment: 4,
            type_mask: 0b110,
        };
        assert_eq!(upload_type(&types, &req).unwrap(), MemoryTypeId(1));

        let req = m::Requirements {
            type_mask: 0b100,
            ..req
        };
        assert_eq!(upload_type(&types, &req).unwrap(), MemoryTypeId(2));
    }

    #[test]
    fn missing_memory_type_is_an_error() {
        let types = [mem_type(m::Properties::DEVICE_LOCAL)];
        let req = m::Requirements {
            size: 64,
            alignment: 4,
            type_mask: 0b1,
        };
        assert!(upload_type(&types, &req).is_err());
    }
}
