//! WGSL kernel bindings, marshaling and dispatch.
//!
//! Declared arguments map positionally onto `@group(0)` bindings: argument
//! `i` is `@binding(i)`. Pointer arguments bind a storage-buffer range;
//! value arguments upload a small uniform buffer. Thread count `n`
//! dispatches `ceil(n / workgroup_size)` workgroups; kernels guard the
//! tail themselves.

use std::sync::Arc;

use wgpu::util::DeviceExt;

use kernex_core::{
    check_alignment, check_args, resolve_thread_count, ArgKind, ArgValue, Args, Completion,
    DeviceBuffer, DType, Error, KernelBinding, KernelSpec, Result, WaitPolicy,
};

use crate::buffer::WgpuBuffer;
use crate::context::Gpu;

/// A compiled WGSL entry point bound to one context.
#[derive(Clone)]
pub struct WgpuKernel {
    gpu: Arc<Gpu>,
    name: String,
    spec: Arc<KernelSpec>,
    pipeline: Arc<wgpu::ComputePipeline>,
}

/// One marshaled binding, kept alive until the launch is submitted.
enum Bound {
    Storage {
        raw: Arc<wgpu::Buffer>,
        offset: u64,
        size: u64,
    },
    Uniform(wgpu::Buffer),
}

impl WgpuKernel {
    pub(crate) fn new(
        gpu: Arc<Gpu>,
        name: String,
        spec: Arc<KernelSpec>,
        pipeline: Arc<wgpu::ComputePipeline>,
    ) -> Self {
        Self {
            gpu,
            name,
            spec,
            pipeline,
        }
    }

    fn marshal(&self, kind: ArgKind, name: &str, value: &ArgValue<WgpuBuffer>) -> Result<Bound> {
        match (kind, value) {
            (ArgKind::Pointer(dtype), ArgValue::Array(array)) => {
                if array.dtype() != dtype {
                    return Err(Error::Argument {
                        kernel: self.name.clone(),
                        name: name.to_string(),
                        reason: format!("expected {dtype} elements, got {}", array.dtype()),
                    });
                }
                self.storage_binding(name, array.buffer(), array.offset(), array.nbytes())
            }
            (ArgKind::Pointer(_), ArgValue::Slice(slice)) => {
                self.storage_binding(name, slice.buffer(), slice.offset(), slice.len())
            }
            (ArgKind::Pointer(_), ArgValue::Scalar(_)) => Err(Error::ArgumentType {
                kernel: self.name.clone(),
                name: name.to_string(),
            }),
            (ArgKind::Value(dtype), ArgValue::Scalar(scalar)) => {
                let cast = scalar.cast(dtype).map_err(|_| Error::Argument {
                    kernel: self.name.clone(),
                    name: name.to_string(),
                    reason: format!("cannot cast {} to {dtype}", scalar.dtype()),
                })?;
                // WGSL has no 8- or 64-bit scalar bindings.
                if !matches!(dtype, DType::F32 | DType::I32 | DType::U32) {
                    return Err(Error::Unsupported(
                        "value arguments wider or narrower than 32 bits on the wgpu backend",
                    ));
                }
                let uniform =
                    self.gpu
                        .device
                        .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                            label: Some(name),
                            contents: &cast.to_le_bytes(),
                            usage: wgpu::BufferUsages::UNIFORM,
                        });
                Ok(Bound::Uniform(uniform))
            }
            (ArgKind::Value(_), _) => Err(Error::Argument {
                kernel: self.name.clone(),
                name: name.to_string(),
                reason: "a scalar value is required".to_string(),
            }),
            (ArgKind::Record | ArgKind::RecordPointer, _) => {
                Err(Error::Unsupported("structured kernel arguments"))
            }
        }
    }

    fn storage_binding(
        &self,
        name: &str,
        buffer: &WgpuBuffer,
        offset: usize,
        len: usize,
    ) -> Result<Bound> {
        if len == 0 {
            return Err(Error::Argument {
                kernel: self.name.clone(),
                name: name.to_string(),
                reason: "pointer argument covers an empty region".to_string(),
            });
        }
        check_alignment(offset, buffer.alignment())?;
        Ok(Bound::Storage {
            raw: Arc::clone(buffer.raw()),
            offset: offset as u64,
            size: len as u64,
        })
    }
}

impl KernelBinding for WgpuKernel {
    type Buffer = WgpuBuffer;
    type Completion = WgpuCompletion;

    fn name(&self) -> &str {
        &self.name
    }

    fn spec(&self) -> &KernelSpec {
        &self.spec
    }

    fn invoke(&self, args: &Args<WgpuBuffer>) -> Result<WgpuCompletion> {
        check_args(&self.name, &self.spec, args)?;

        let mut bound = Vec::with_capacity(self.spec.args.len());
        for declared in &self.spec.args {
            let value = args
                .get(&declared.name)
                .ok_or_else(|| Error::ArgumentCount {
                    kernel: self.name.clone(),
                    expected: self.spec.args.len(),
                    supplied: args.len(),
                })?;
            bound.push(self.marshal(declared.kind, &declared.name, value)?);
        }

        let threads = resolve_thread_count(&self.name, &self.spec, args)?;
        let workgroup = self.spec.workgroup_size.max(1) as u64;
        let groups = (threads as u64).div_ceil(workgroup);

        let device = &self.gpu.device;
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let entries: Vec<wgpu::BindGroupEntry> = bound
            .iter()
            .enumerate()
            .map(|(i, binding)| wgpu::BindGroupEntry {
                binding: i as u32,
                resource: match binding {
                    Bound::Storage { raw, offset, size } => {
                        wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                            buffer: raw.as_ref(),
                            offset: *offset,
                            size: wgpu::BufferSize::new(*size),
                        })
                    }
                    Bound::Uniform(buffer) => buffer.as_entire_binding(),
                },
            })
            .collect();
        let layout = self.pipeline.get_bind_group_layout(0);
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&self.name),
            layout: &layout,
            entries: &entries,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some(&self.name),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(&self.name),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(groups as u32, 1, 1);
        }
        let index = self.gpu.queue.submit(Some(encoder.finish()));

        if let Some(e) = pollster::block_on(device.pop_error_scope()) {
            return Err(Error::DeviceExecution(e.to_string()));
        }

        match self.spec.wait {
            WaitPolicy::Block => {
                let _ = device.poll(wgpu::Maintain::WaitForSubmissionIndex(index));
                Ok(WgpuCompletion::done(Arc::clone(&self.gpu)))
            }
            WaitPolicy::Deferred => Ok(WgpuCompletion::pending(Arc::clone(&self.gpu), index)),
        }
    }
}

/// Completion handle for one submission.
pub struct WgpuCompletion {
    gpu: Arc<Gpu>,
    index: Option<wgpu::SubmissionIndex>,
}

impl std::fmt::Debug for WgpuCompletion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuCompletion")
            .field("index", &self.index)
            .finish()
    }
}

impl WgpuCompletion {
    pub(crate) fn done(gpu: Arc<Gpu>) -> Self {
        Self { gpu, index: None }
    }

    pub(crate) fn pending(gpu: Arc<Gpu>, index: wgpu::SubmissionIndex) -> Self {
        Self {
            gpu,
            index: Some(index),
        }
    }
}

impl Completion for WgpuCompletion {
    fn wait(self) -> Result<()> {
        if let Some(index) = self.index {
            let _ = self
                .gpu
                .device
                .poll(wgpu::Maintain::WaitForSubmissionIndex(index));
        }
        Ok(())
    }
}
