use anyhow::{ensure, Result};
use gfx_hal::{buffer, prelude::*, Backend, Limits};
use std::marker::PhantomData;
use std::mem::{self, ManuallyDrop};
use std::ptr;

use crate::error::DebugContext;

/// A GPU buffer sized for `capacity` elements of `T`, not yet backed by memory.
pub struct Buffer<'a, B: Backend, T> {
    pub device: &'a B::Device,
    pub buf: ManuallyDrop<B::Buffer>,
    pub capacity: usize,
    _content: PhantomData<T>,
}

impl<'a, B: Backend, T> Buffer<'a, B, T> {
    pub fn new(
        device: &'a B::Device,
        capacity: usize,
        usage: buffer::Usage,
        limits: &Limits,
    ) -> Result<Self> {
        let buffer_len = byte_len::<T>(capacity);
        ensure!(buffer_len != 0, "can't create an empty buffer");
        let memory_size = align_up(buffer_len, limits.non_coherent_atom_size as u64);

        let buf = unsafe { device.create_buffer(memory_size, usage) }
            .debug_context("can't create buffer")?;

        Ok(Buffer {
            device,
            buf: ManuallyDrop::new(buf),
            capacity,
            _content: PhantomData,
        })
    }
}

impl<'a, B: Backend, T> Drop for Buffer<'a, B, T> {
    fn drop(&mut self) {
        unsafe {
            self.device
                .destroy_buffer(ManuallyDrop::into_inner(ptr::read(&self.buf)))
        }
    }
}

pub fn byte_len<T>(count: usize) -> u64 {
    (count * mem::size_of::<T>()) as u64
}

pub fn align_up(len: u64, alignment: u64) -> u64 {
    if alignment <= 1 {
        return len;
    }
    ((len + alignment - 1) / alignment) * alignment
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_up_rounds_to_atom() {
        assert_eq!(align_up(36, 64), 64);
        assert_eq!(align_up(64, 64), 64);
        assert_eq!(align_up(65, 64), 128);
    }

    #[test]
    fn align_up_ignores_trivial_alignment() {
        assert_eq!(align_up(37, 0), 37);
        assert_eq!(align_up(37, 1), 37);
    }

    #[test]
    fn byte_len_counts_elements() {
        assert_eq!(byte_len::<[f32; 3]>(3), 36);
        assert_eq!(byte_len::<u16>(0), 0);
    }
}
