//! Storage buffers and their copy paths.

use std::sync::Arc;

use log::debug;

use kernex_core::{check_alignment, check_range, DeviceBuffer, Error, Result};

use crate::context::Gpu;

/// wgpu copies address whole words; offsets and byte counts must respect
/// this on every device copy path.
fn check_copy_alignment(offset: usize, len: usize) -> Result<()> {
    const ALIGN: usize = wgpu::COPY_BUFFER_ALIGNMENT as usize;
    check_alignment(offset, ALIGN)?;
    check_alignment(len, ALIGN)
}

/// A fixed-capacity storage buffer in device memory.
///
/// Clones share the same allocation. The buffer never moves or grows, so
/// sub-buffer bindings handed to kernels stay valid for its lifetime.
#[derive(Clone)]
pub struct WgpuBuffer {
    gpu: Arc<Gpu>,
    raw: Arc<wgpu::Buffer>,
    capacity: usize,
}

impl WgpuBuffer {
    pub(crate) fn allocate(gpu: &Arc<Gpu>, capacity: usize) -> Result<Self> {
        if capacity as u64 > gpu.limits.max_buffer_size {
            return Err(Error::Allocation {
                requested: capacity,
                reason: format!(
                    "exceeds device max buffer size of {} bytes",
                    gpu.limits.max_buffer_size
                ),
            });
        }
        gpu.device.push_error_scope(wgpu::ErrorFilter::Validation);
        gpu.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let raw = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("kernex-storage"),
            size: capacity as u64,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let oom = pollster::block_on(gpu.device.pop_error_scope());
        let validation = pollster::block_on(gpu.device.pop_error_scope());
        if let Some(e) = oom.or(validation) {
            return Err(Error::Allocation {
                requested: capacity,
                reason: e.to_string(),
            });
        }
        Ok(Self {
            gpu: Arc::clone(gpu),
            raw: Arc::new(raw),
            capacity,
        })
    }

    pub(crate) fn raw(&self) -> &Arc<wgpu::Buffer> {
        &self.raw
    }
}

impl std::fmt::Debug for WgpuBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuBuffer")
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl DeviceBuffer for WgpuBuffer {
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn alignment(&self) -> usize {
        self.gpu.limits.min_storage_buffer_offset_alignment as usize
    }

    fn write(&self, offset: usize, data: &[u8]) -> Result<()> {
        check_range(self.capacity, offset, data.len())?;
        check_copy_alignment(offset, data.len())?;
        if data.is_empty() {
            return Ok(());
        }
        debug!("wgpu write: {} bytes at offset {offset}", data.len());
        self.gpu.queue.write_buffer(&self.raw, offset as u64, data);
        // Flush so the write is ordered before anything submitted later.
        self.gpu.queue.submit(std::iter::empty());
        Ok(())
    }

    fn read(&self, offset: usize, len: usize) -> Result<Vec<u8>> {
        check_range(self.capacity, offset, len)?;
        check_copy_alignment(offset, len)?;
        self.gpu.read_bytes(&self.raw, offset as u64, len as u64)
    }

    fn copy_from_buffer(
        &self,
        src: &Self,
        src_offset: usize,
        dst_offset: usize,
        len: usize,
    ) -> Result<()> {
        check_range(src.capacity, src_offset, len)?;
        check_range(self.capacity, dst_offset, len)?;
        check_copy_alignment(src_offset, len)?;
        check_copy_alignment(dst_offset, len)?;
        if len == 0 {
            return Ok(());
        }

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("kernex-copy"),
            });
        if Arc::ptr_eq(&self.raw, &src.raw) {
            // Same-buffer copies go through a scratch buffer; wgpu rejects
            // overlapping copy_buffer_to_buffer calls outright.
            let scratch = WgpuBuffer::allocate(&self.gpu, len)?;
            encoder.copy_buffer_to_buffer(&src.raw, src_offset as u64, &scratch.raw, 0, len as u64);
            encoder.copy_buffer_to_buffer(&scratch.raw, 0, &self.raw, dst_offset as u64, len as u64);
        } else {
            encoder.copy_buffer_to_buffer(
                &src.raw,
                src_offset as u64,
                &self.raw,
                dst_offset as u64,
                len as u64,
            );
        }
        self.gpu.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn copy_region(&self, offset: usize, len: usize) -> Result<Self> {
        check_range(self.capacity, offset, len)?;
        check_copy_alignment(offset, len)?;
        let snapshot = WgpuBuffer::allocate(&self.gpu, len)?;
        snapshot.copy_from_buffer(self, offset, 0, len)?;
        Ok(snapshot)
    }
}
