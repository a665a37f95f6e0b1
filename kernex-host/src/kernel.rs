//! Native kernel bindings and argument marshaling.

use std::sync::{Arc, Mutex};

use kernex_core::{
    check_args, resolve_thread_count, ArgKind, ArgValue, Args, Completion, Element, Error,
    KernelBinding, KernelSpec, Result, Scalar,
};

use crate::buffer::HostBuffer;

/// One marshaled argument as a native kernel receives it: either a shared
/// byte region with an element offset, or a scalar value.
pub enum NativeArg {
    Buffer {
        bytes: Arc<Mutex<Vec<u8>>>,
        offset: usize,
    },
    Scalar(Scalar),
}

impl NativeArg {
    pub fn as_scalar(&self) -> Option<Scalar> {
        match self {
            NativeArg::Scalar(s) => Some(*s),
            NativeArg::Buffer { .. } => None,
        }
    }

    /// Copies `count` elements out of the pointed-to region.
    pub fn read_vec<T: Element>(&self, count: usize) -> Result<Vec<T>> {
        match self {
            NativeArg::Buffer { bytes, offset } => {
                let guard = bytes.lock().unwrap();
                let len = count * std::mem::size_of::<T>();
                kernex_core::check_range(guard.len(), *offset, len)?;
                Ok(bytemuck::pod_collect_to_vec(
                    &guard[*offset..*offset + len],
                ))
            }
            NativeArg::Scalar(_) => Err(Error::Unsupported("reading bytes of a scalar argument")),
        }
    }

    /// Writes a typed slice into the pointed-to region.
    pub fn write_slice<T: Element>(&self, data: &[T]) -> Result<()> {
        match self {
            NativeArg::Buffer { bytes, offset } => {
                let raw: &[u8] = bytemuck::cast_slice(data);
                let mut guard = bytes.lock().unwrap();
                kernex_core::check_range(guard.len(), *offset, raw.len())?;
                guard[*offset..*offset + raw.len()].copy_from_slice(raw);
                Ok(())
            }
            NativeArg::Scalar(_) => Err(Error::Unsupported("writing bytes of a scalar argument")),
        }
    }

    /// Fills `len` bytes of the pointed-to region with one value.
    pub fn fill_bytes(&self, value: u8, len: usize) -> Result<()> {
        match self {
            NativeArg::Buffer { bytes, offset } => {
                let mut guard = bytes.lock().unwrap();
                kernex_core::check_range(guard.len(), *offset, len)?;
                guard[*offset..*offset + len].fill(value);
                Ok(())
            }
            NativeArg::Scalar(_) => Err(Error::Unsupported("writing bytes of a scalar argument")),
        }
    }
}

/// Signature of a registered native kernel: thread count plus marshaled
/// arguments in declaration order.
pub type NativeKernelFn = Arc<dyn Fn(usize, &[NativeArg]) -> Result<()> + Send + Sync>;

/// A bound native kernel.
#[derive(Clone)]
pub struct HostKernel {
    name: String,
    spec: Arc<KernelSpec>,
    func: NativeKernelFn,
}

impl HostKernel {
    pub(crate) fn new(name: String, spec: Arc<KernelSpec>, func: NativeKernelFn) -> Self {
        Self { name, spec, func }
    }
}

impl KernelBinding for HostKernel {
    type Buffer = HostBuffer;
    type Completion = HostCompletion;

    fn name(&self) -> &str {
        &self.name
    }

    fn spec(&self) -> &KernelSpec {
        &self.spec
    }

    fn invoke(&self, args: &Args<HostBuffer>) -> Result<HostCompletion> {
        check_args(&self.name, &self.spec, args)?;

        let mut native = Vec::with_capacity(self.spec.args.len());
        for declared in &self.spec.args {
            let value = args.get(&declared.name).ok_or_else(|| Error::ArgumentCount {
                kernel: self.name.clone(),
                expected: self.spec.args.len(),
                supplied: args.len(),
            })?;
            native.push(marshal(&self.name, &declared.name, declared.kind, value)?);
        }

        let threads = resolve_thread_count(&self.name, &self.spec, args)?;
        // Wait policy is moot here: the call itself is the execution.
        (self.func)(threads, &native)?;
        Ok(HostCompletion)
    }
}

fn marshal(
    kernel: &str,
    name: &str,
    kind: ArgKind,
    value: &ArgValue<HostBuffer>,
) -> Result<NativeArg> {
    match (kind, value) {
        (ArgKind::Pointer(dtype), ArgValue::Array(array)) => {
            if array.dtype() != dtype {
                return Err(Error::Argument {
                    kernel: kernel.to_string(),
                    name: name.to_string(),
                    reason: format!("expected {dtype} elements, got {}", array.dtype()),
                });
            }
            Ok(NativeArg::Buffer {
                bytes: array.buffer().shared_bytes(),
                offset: array.offset(),
            })
        }
        (ArgKind::Pointer(_), ArgValue::Slice(slice)) => Ok(NativeArg::Buffer {
            bytes: slice.buffer().shared_bytes(),
            offset: slice.offset(),
        }),
        (ArgKind::Pointer(_), ArgValue::Scalar(_)) => Err(Error::ArgumentType {
            kernel: kernel.to_string(),
            name: name.to_string(),
        }),
        (ArgKind::Value(dtype), ArgValue::Scalar(scalar)) => {
            let cast = scalar.cast(dtype).map_err(|_| Error::Argument {
                kernel: kernel.to_string(),
                name: name.to_string(),
                reason: format!("cannot cast {} to {dtype}", scalar.dtype()),
            })?;
            Ok(NativeArg::Scalar(cast))
        }
        (ArgKind::Value(_), _) => Err(Error::Argument {
            kernel: kernel.to_string(),
            name: name.to_string(),
            reason: "a scalar value is required".to_string(),
        }),
        (ArgKind::Record | ArgKind::RecordPointer, _) => {
            Err(Error::Unsupported("structured kernel arguments"))
        }
    }
}

/// Completion of a host launch; the work finished before this existed.
#[derive(Debug)]
pub struct HostCompletion;

impl Completion for HostCompletion {
    fn wait(self) -> Result<()> {
        Ok(())
    }
}
