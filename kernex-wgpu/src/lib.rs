//! # Kernex wgpu Backend
//!
//! GPU implementation of the kernex contract on wgpu, targeting Vulkan,
//! Metal, DX12 and GL through one code path. Kernel sources are WGSL
//! compiled at runtime; buffers are storage buffers addressed by byte
//! offset; readback goes through pooled staging buffers.
//!
//! Construction is the capability query: [`WgpuContext::new`] returns
//! `Err(Error::BackendUnavailable)` when no adapter is present, and
//! [`is_available`] answers the question without building a device.

mod buffer;
mod context;
mod fft;
mod kernel;
mod staging;

pub use buffer::WgpuBuffer;
pub use context::{enumerate_adapters, is_available, AdapterEntry, WgpuContext};
pub use fft::WgpuFftPlan;
pub use kernel::{WgpuCompletion, WgpuKernel};
