//! # Kernex Core
//!
//! Backend-independent contract for device-memory buffers and kernel
//! dispatch. A backend crate (`kernex-host`, `kernex-wgpu`) implements the
//! [`ComputeContext`], [`DeviceBuffer`], [`KernelBinding`] and
//! [`TransformPlan`] traits; application code written against those traits
//! never touches the underlying device API.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use kernex_core::prelude::*;
//!
//! fn roundtrip<C: ComputeContext>(ctx: &C) -> Result<()> {
//!     let buffer = ctx.create_buffer(1024)?;
//!     buffer.write(0, &[0xAB; 100])?;
//!     assert_eq!(buffer.read(0, 100)?, vec![0xAB; 100]);
//!     Ok(())
//! }
//! ```

pub mod array;
pub mod context;
pub mod dtype;
pub mod error;
pub mod fft;
pub mod kernel;
pub mod source;

pub use array::HostArray;
pub use context::{
    check_alignment, check_range, BufferSlice, Completion, ComputeContext, DeviceArray,
    DeviceBuffer, KernelBinding, TransformPlan,
};
pub use dtype::{DType, Element, Scalar};
pub use error::{Error, Result};
pub use fft::{validate_transform_axes, LineFft};
pub use kernel::{
    check_args, resolve_thread_count, ArgKind, ArgSpec, ArgValue, Args, KernelSpec, ThreadCount,
    WaitPolicy,
};
pub use source::{assemble, prepare, BuildOptions, Passthrough, Source, Specializer};

/// Prelude module - import the whole contract with `use kernex_core::prelude::*`
pub mod prelude {
    pub use crate::array::HostArray;
    pub use crate::context::{
        BufferSlice, Completion, ComputeContext, DeviceArray, DeviceBuffer, KernelBinding,
        TransformPlan,
    };
    pub use crate::dtype::{DType, Scalar};
    pub use crate::error::{Error, Result};
    pub use crate::kernel::{ArgKind, Args, KernelSpec, ThreadCount, WaitPolicy};
    pub use crate::source::{BuildOptions, Source};
}
