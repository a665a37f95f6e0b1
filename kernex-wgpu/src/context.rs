//! Device discovery and the wgpu compute context.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::info;

use kernex_core::{
    BuildOptions, ComputeContext, DeviceArray, Error, KernelSpec, LineFft, Result, Source,
    WaitPolicy,
};

use crate::buffer::WgpuBuffer;
use crate::fft::WgpuFftPlan;
use crate::kernel::{WgpuCompletion, WgpuKernel};
use crate::staging::StagingPool;

/// Shared device state: one device, one queue, and the staging pool bound
/// to them. Buffers, kernels and plans each hold an `Arc` of this.
pub(crate) struct Gpu {
    pub(crate) device: Arc<wgpu::Device>,
    pub(crate) queue: Arc<wgpu::Queue>,
    pub(crate) limits: wgpu::Limits,
    pub(crate) staging: StagingPool,
}

impl Gpu {
    /// Blocking readback of `len` bytes through a pooled staging buffer.
    pub(crate) fn read_bytes(&self, buffer: &wgpu::Buffer, offset: u64, len: u64) -> Result<Vec<u8>> {
        if len == 0 {
            return Ok(Vec::new());
        }
        let staging = self.staging.acquire(&self.device, len);
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("kernex-readback"),
            });
        encoder.copy_buffer_to_buffer(buffer, offset, &staging, 0, len);
        self.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(0..len);
        let (sender, receiver) = futures_intrusive::channel::shared::oneshot_channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        let _ = self.device.poll(wgpu::Maintain::Wait);
        match pollster::block_on(receiver.receive()) {
            Some(Ok(())) => {}
            Some(Err(e)) => return Err(Error::DeviceExecution(e.to_string())),
            None => return Err(Error::DeviceExecution("buffer mapping was abandoned".into())),
        }
        let data = slice.get_mapped_range().to_vec();
        staging.unmap();
        self.staging.recycle(staging);
        Ok(data)
    }
}

/// One enumerated adapter, for device selection UIs and diagnostics.
#[derive(Debug, Clone)]
pub struct AdapterEntry {
    pub index: usize,
    pub name: String,
    pub backend: String,
}

/// Lists every adapter wgpu can see, across all native backends.
pub fn enumerate_adapters() -> Vec<AdapterEntry> {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });
    instance
        .enumerate_adapters(wgpu::Backends::all())
        .iter()
        .enumerate()
        .map(|(index, adapter)| {
            let info = adapter.get_info();
            AdapterEntry {
                index,
                name: info.name.clone(),
                backend: format!("{:?}", info.backend),
            }
        })
        .collect()
}

/// Whether any compute-capable adapter is present.
pub fn is_available() -> bool {
    !enumerate_adapters().is_empty()
}

/// GPU compute context: one adapter, one device, one queue.
///
/// Cheap to clone; clones share the device and the kernel map.
#[derive(Clone)]
pub struct WgpuContext {
    gpu: Arc<Gpu>,
    info: wgpu::AdapterInfo,
    kernels: Arc<Mutex<HashMap<String, WgpuKernel>>>,
}

impl WgpuContext {
    /// Builds a context on the best available adapter.
    ///
    /// Fails with [`Error::BackendUnavailable`] when no adapter is present
    /// or the device cannot be created; there is no global enabled flag to
    /// consult.
    pub fn new() -> Result<Self> {
        pollster::block_on(Self::new_async())
    }

    /// Async version of [`WgpuContext::new`] for use in async contexts.
    pub async fn new_async() -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| {
                Error::BackendUnavailable("no compatible GPU adapter found".to_string())
            })?;

        let info = adapter.get_info();
        info!("using adapter {} ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("kernex-device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .map_err(|e| Error::BackendUnavailable(e.to_string()))?;

        let limits = device.limits();
        Ok(Self {
            gpu: Arc::new(Gpu {
                device: Arc::new(device),
                queue: Arc::new(queue),
                limits,
                staging: StagingPool::new(),
            }),
            info,
            kernels: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Adapter name, e.g. "NVIDIA GeForce RTX 3080".
    pub fn adapter_name(&self) -> &str {
        &self.info.name
    }

    /// Native API behind the adapter (Vulkan, Metal, DX12, GL).
    pub fn adapter_backend(&self) -> String {
        format!("{:?}", self.info.backend)
    }

    pub(crate) fn gpu(&self) -> &Arc<Gpu> {
        &self.gpu
    }
}

impl std::fmt::Debug for WgpuContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuContext")
            .field("adapter", &self.info.name)
            .field("backend", &self.info.backend)
            .finish()
    }
}

impl ComputeContext for WgpuContext {
    type Buffer = WgpuBuffer;
    type Kernel = WgpuKernel;
    type Completion = WgpuCompletion;
    type Plan = WgpuFftPlan;

    fn backend_name(&self) -> &'static str {
        "wgpu"
    }

    fn create_buffer(&self, capacity: usize) -> Result<WgpuBuffer> {
        WgpuBuffer::allocate(&self.gpu, capacity)
    }

    fn add_kernels(
        &self,
        sources: &[Source],
        specs: &HashMap<String, KernelSpec>,
        options: &BuildOptions,
    ) -> Result<()> {
        let source = kernex_core::prepare(sources, "wgsl", options)?;

        let device = &self.gpu.device;
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("kernex-kernels"),
            source: wgpu::ShaderSource::Wgsl(Cow::Owned(source)),
        });
        if let Some(e) = pollster::block_on(device.pop_error_scope()) {
            return Err(Error::Compilation {
                diagnostics: e.to_string(),
            });
        }

        let mut kernels = self.kernels.lock().unwrap();
        for (name, spec) in specs {
            let entry = spec.resolved_native_name(name);
            device.push_error_scope(wgpu::ErrorFilter::Validation);
            let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(entry),
                layout: None,
                module: &module,
                entry_point: Some(entry),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            });
            if let Some(e) = pollster::block_on(device.pop_error_scope()) {
                return Err(Error::Compilation {
                    diagnostics: format!("entry point `{entry}`: {e}"),
                });
            }
            kernels.insert(
                name.clone(),
                WgpuKernel::new(
                    Arc::clone(&self.gpu),
                    name.clone(),
                    Arc::new(spec.clone()),
                    Arc::new(pipeline),
                ),
            );
        }
        Ok(())
    }

    fn kernel(&self, name: &str) -> Option<WgpuKernel> {
        self.kernels.lock().unwrap().get(name).cloned()
    }

    fn synchronize(&self) -> Result<()> {
        let _ = self.gpu.device.poll(wgpu::Maintain::Wait);
        Ok(())
    }

    fn plan_fft(
        &self,
        data: &DeviceArray<WgpuBuffer>,
        axes: &[usize],
        wait: WaitPolicy,
    ) -> Result<WgpuFftPlan> {
        let engine = LineFft::new(data.shape(), axes, data.dtype())?;
        Ok(WgpuFftPlan::new(Arc::clone(&self.gpu), engine, wait))
    }
}
