//! Staging-buffer pool for readback.
//!
//! Mapping requires a MAP_READ buffer distinct from storage buffers, so
//! every read stages through one of these. Buffers are bucketed by
//! power-of-two size and recycled instead of reallocated.

use std::collections::HashMap;
use std::sync::Mutex;

use wgpu::{Buffer, BufferDescriptor, BufferUsages, Device};

pub(crate) struct StagingPool {
    buffers: Mutex<HashMap<u64, Vec<Buffer>>>,
}

fn bucket(len: u64) -> u64 {
    len.next_power_of_two().max(256)
}

impl StagingPool {
    pub fn new() -> Self {
        Self {
            buffers: Mutex::new(HashMap::new()),
        }
    }

    /// Returns a staging buffer of at least `len` bytes.
    pub fn acquire(&self, device: &Device, len: u64) -> Buffer {
        let size = bucket(len);
        if let Some(buffer) = self
            .buffers
            .lock()
            .unwrap()
            .get_mut(&size)
            .and_then(|list| list.pop())
        {
            return buffer;
        }
        device.create_buffer(&BufferDescriptor {
            label: Some("kernex-staging"),
            size,
            usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Returns an unmapped staging buffer to the pool.
    pub fn recycle(&self, buffer: Buffer) {
        let size = buffer.size();
        self.buffers
            .lock()
            .unwrap()
            .entry(size)
            .or_default()
            .push(buffer);
    }
}
