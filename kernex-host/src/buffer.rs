//! Host-memory buffers.

use std::sync::{Arc, Mutex};

use log::debug;

use kernex_core::{check_range, DeviceBuffer, Error, Result};

/// A fixed-capacity region of host memory behind the device-buffer
/// contract.
///
/// Clones share the same storage, mirroring how device buffer handles
/// alias one allocation.
#[derive(Clone)]
pub struct HostBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
    capacity: usize,
}

impl HostBuffer {
    pub(crate) fn allocate(capacity: usize) -> Result<Self> {
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(capacity)
            .map_err(|e| Error::Allocation {
                requested: capacity,
                reason: e.to_string(),
            })?;
        bytes.resize(capacity, 0);
        Ok(Self {
            bytes: Arc::new(Mutex::new(bytes)),
            capacity,
        })
    }

    /// Shared storage handle, as passed to native kernels.
    pub(crate) fn shared_bytes(&self) -> Arc<Mutex<Vec<u8>>> {
        Arc::clone(&self.bytes)
    }
}

impl std::fmt::Debug for HostBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostBuffer")
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl DeviceBuffer for HostBuffer {
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn alignment(&self) -> usize {
        // Host pointers carry no extra alignment requirement.
        1
    }

    fn write(&self, offset: usize, data: &[u8]) -> Result<()> {
        check_range(self.capacity, offset, data.len())?;
        debug!("host write: {} bytes at offset {offset}", data.len());
        self.bytes.lock().unwrap()[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn read(&self, offset: usize, len: usize) -> Result<Vec<u8>> {
        check_range(self.capacity, offset, len)?;
        Ok(self.bytes.lock().unwrap()[offset..offset + len].to_vec())
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
        if Arc::ptr_eq(&self.bytes, &src.bytes) {
            self.bytes
                .lock()
                .unwrap()
                .copy_within(src_offset..src_offset + len, dst_offset);
        } else {
            let source = src.bytes.lock().unwrap();
            self.bytes.lock().unwrap()[dst_offset..dst_offset + len]
                .copy_from_slice(&source[src_offset..src_offset + len]);
        }
        Ok(())
    }

    fn copy_region(&self, offset: usize, len: usize) -> Result<Self> {
        check_range(self.capacity, offset, len)?;
        let copy = HostBuffer::allocate(len)?;
        copy.copy_from_buffer(self, offset, 0, len)?;
        Ok(copy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_alias_one_allocation() {
        let a = HostBuffer::allocate(8).unwrap();
        let b = a.clone();
        a.write(0, &[1, 2, 3, 4]).unwrap();
        assert_eq!(b.read(0, 4).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn overlapping_same_buffer_copy() {
        let buffer = HostBuffer::allocate(8).unwrap();
        buffer.write(0, &[1, 2, 3, 4, 0, 0, 0, 0]).unwrap();
        buffer.copy_from_buffer(&buffer.clone(), 0, 2, 4).unwrap();
        assert_eq!(buffer.read(0, 8).unwrap(), vec![1, 2, 1, 2, 3, 4, 0, 0]);
    }
}
