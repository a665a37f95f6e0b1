//! # Kernex Host Backend
//!
//! Reference implementation of the kernex contract on plain host memory.
//! Buffers are byte vectors, the queue is the calling thread (every
//! submission waits on call), and kernels are native Rust functions
//! registered by entry-point name. Always available; used as the
//! correctness baseline for the GPU backends.
//!
//! ## Quick Start
//!
//! ```rust
//! use kernex_core::prelude::*;
//! use kernex_host::{HostContext, NativeArg};
//! use std::collections::HashMap;
//!
//! let ctx = HostContext::new();
//! ctx.register_kernel("fill", |n, args: &[NativeArg]| {
//!     let value = args[1].as_scalar().and_then(|s| s.as_usize()).unwrap_or(0) as u8;
//!     args[0].fill_bytes(value, n)
//! });
//!
//! let mut specs = HashMap::new();
//! specs.insert(
//!     "fill".to_string(),
//!     KernelSpec::new(ThreadCount::Fixed(64))
//!         .arg("out", ArgKind::Pointer(DType::U8))
//!         .arg("value", ArgKind::Value(DType::U32)),
//! );
//! ctx.add_kernels(&[Source::text("// native kernels")], &specs, &BuildOptions::default())
//!     .unwrap();
//!
//! let buffer = ctx.create_buffer(64).unwrap();
//! let out = buffer.view(0, DType::U8, &[64]).unwrap();
//! ctx.invoke("fill", &Args::new().array("out", out).scalar("value", 7u32)).unwrap();
//! assert_eq!(buffer.read(0, 4).unwrap(), vec![7, 7, 7, 7]);
//! ```

mod buffer;
mod fft;
mod kernel;

pub use buffer::HostBuffer;
pub use fft::HostFftPlan;
pub use kernel::{HostCompletion, HostKernel, NativeArg, NativeKernelFn};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use kernex_core::{
    BuildOptions, ComputeContext, DeviceArray, Error, KernelSpec, LineFft, Result, Source,
    WaitPolicy,
};

/// Host-memory compute context.
///
/// Cheap to clone; clones share the kernel registry and bindings. One
/// logical queue: the calling thread, so every operation is complete when
/// the call returns.
#[derive(Clone, Default)]
pub struct HostContext {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    kernels: Mutex<HashMap<String, HostKernel>>,
    registry: Mutex<HashMap<String, NativeKernelFn>>,
}

impl HostContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a native kernel under an entry-point name.
    ///
    /// `add_kernels` resolves kernel descriptions against this registry
    /// the way a GPU backend resolves entry points in compiled programs.
    pub fn register_kernel<F>(&self, native_name: impl Into<String>, func: F)
    where
        F: Fn(usize, &[NativeArg]) -> Result<()> + Send + Sync + 'static,
    {
        self.inner
            .registry
            .lock()
            .unwrap()
            .insert(native_name.into(), Arc::new(func));
    }
}

impl std::fmt::Debug for HostContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kernels = self.inner.kernels.lock().unwrap();
        f.debug_struct("HostContext")
            .field("kernels", &kernels.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ComputeContext for HostContext {
    type Buffer = HostBuffer;
    type Kernel = HostKernel;
    type Completion = HostCompletion;
    type Plan = HostFftPlan;

    fn backend_name(&self) -> &'static str {
        "host"
    }

    fn create_buffer(&self, capacity: usize) -> Result<HostBuffer> {
        HostBuffer::allocate(capacity)
    }

    fn add_kernels(
        &self,
        sources: &[Source],
        specs: &HashMap<String, KernelSpec>,
        options: &BuildOptions,
    ) -> Result<()> {
        // The host backend runs registered native functions; the source
        // text still flows through specialization and the save-as side
        // effect so call sites behave identically across backends.
        let _source = kernex_core::prepare(sources, "host", options)?;

        let registry = self.inner.registry.lock().unwrap();
        let mut kernels = self.inner.kernels.lock().unwrap();
        for (name, spec) in specs {
            let native = spec.resolved_native_name(name);
            let func = registry.get(native).cloned().ok_or_else(|| Error::Compilation {
                diagnostics: format!("no registered host kernel named `{native}`"),
            })?;
            kernels.insert(
                name.clone(),
                HostKernel::new(name.clone(), Arc::new(spec.clone()), func),
            );
        }
        Ok(())
    }

    fn kernel(&self, name: &str) -> Option<HostKernel> {
        self.inner.kernels.lock().unwrap().get(name).cloned()
    }

    fn synchronize(&self) -> Result<()> {
        // Every submission already waited on call.
        Ok(())
    }

    fn plan_fft(
        &self,
        data: &DeviceArray<HostBuffer>,
        axes: &[usize],
        wait: WaitPolicy,
    ) -> Result<HostFftPlan> {
        let engine = LineFft::new(data.shape(), axes, data.dtype())?;
        Ok(HostFftPlan::new(engine, wait))
    }
}
