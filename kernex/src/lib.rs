//! # Kernex
//!
//! Device-memory buffer management and kernel dispatch for numeric
//! applications, behind one backend-agnostic contract. A context owns one
//! device and one queue; it allocates offset-addressed buffers, compiles
//! named kernels from source, marshals keyed argument sets into native
//! launches, and plans in-place transforms, all without the caller knowing
//! the underlying device API.
//!
//! Two backends ship with the workspace:
//!
//! - [`HostContext`]: host memory, always available, wait-on-call.
//! - [`WgpuContext`]: GPU via wgpu (Vulkan/Metal/DX12/GL), runtime WGSL
//!   compilation.
//!
//! ## Picking a backend
//!
//! ```rust,no_run
//! use kernex::prelude::*;
//!
//! if kernex::gpu_available() {
//!     let ctx = WgpuContext::new().expect("adapter disappeared");
//!     println!("running on {}", ctx.adapter_name());
//! } else {
//!     let _ctx = HostContext::new();
//!     println!("no GPU adapter; using the host backend");
//! }
//! ```
//!
//! Code that should run on either backend takes `C: ComputeContext`:
//!
//! ```rust
//! use kernex::prelude::*;
//!
//! fn upload_and_sum_bytes<C: ComputeContext>(ctx: &C) -> Result<u32> {
//!     let buffer = ctx.create_buffer(256)?;
//!     buffer.write(0, &[1u8; 256])?;
//!     Ok(buffer.read(0, 256)?.iter().map(|&b| b as u32).sum())
//! }
//!
//! assert_eq!(upload_and_sum_bytes(&HostContext::new()).unwrap(), 256);
//! ```

pub use kernex_core::{
    assemble, check_alignment, check_args, check_range, prepare, resolve_thread_count,
    validate_transform_axes, ArgKind, ArgSpec, ArgValue, Args, BufferSlice, BuildOptions,
    Completion, ComputeContext, DType, DeviceArray, DeviceBuffer, Element, Error, HostArray,
    KernelBinding, KernelSpec, LineFft, Passthrough, Result, Scalar, Source, Specializer,
    ThreadCount, TransformPlan, WaitPolicy,
};
pub use kernex_host::{
    HostBuffer, HostCompletion, HostContext, HostFftPlan, HostKernel, NativeArg, NativeKernelFn,
};
pub use kernex_wgpu::{
    enumerate_adapters, AdapterEntry, WgpuBuffer, WgpuContext, WgpuFftPlan, WgpuKernel,
};

/// Whether a GPU adapter is present on this machine.
///
/// The context factory is the authoritative check: [`WgpuContext::new`]
/// fails with [`Error::BackendUnavailable`] when it cannot build a device.
pub fn gpu_available() -> bool {
    kernex_wgpu::is_available()
}

/// Prelude module - import everything you need with `use kernex::prelude::*`
pub mod prelude {
    pub use crate::{
        ArgKind, Args, BuildOptions, Completion, ComputeContext, DType, DeviceArray, DeviceBuffer,
        Error, HostArray, HostContext, KernelBinding, KernelSpec, Result, Scalar, Source,
        ThreadCount, TransformPlan, WaitPolicy, WgpuContext,
    };
}
