//! In-place transforms on wgpu buffers.
//!
//! There is no clFFT equivalent in the wgpu ecosystem, so the transform
//! stages through the host: download the bound region, run the planned
//! rustfft lines, upload the result in place. The plan and lifecycle
//! contract is identical to the host backend's.

use std::sync::Arc;

use kernex_core::{
    DeviceArray, DeviceBuffer, Error, LineFft, Result, TransformPlan, WaitPolicy,
};

use crate::buffer::WgpuBuffer;
use crate::context::Gpu;
use crate::kernel::WgpuCompletion;

/// A transform plan bound to one device array's shape and axes.
pub struct WgpuFftPlan {
    gpu: Arc<Gpu>,
    engine: Arc<LineFft>,
    wait: WaitPolicy,
}

impl WgpuFftPlan {
    pub(crate) fn new(gpu: Arc<Gpu>, engine: LineFft, wait: WaitPolicy) -> Self {
        Self {
            gpu,
            engine: Arc::new(engine),
            wait,
        }
    }

    pub fn wait_policy(&self) -> WaitPolicy {
        self.wait
    }

    fn run(&self, data: &DeviceArray<WgpuBuffer>, inverse: bool) -> Result<WgpuCompletion> {
        if data.shape() != self.engine.shape() || data.dtype() != self.engine.dtype() {
            return Err(Error::Shape(format!(
                "array of shape {:?} ({}) does not match plan over {:?} ({})",
                data.shape(),
                data.dtype(),
                self.engine.shape(),
                self.engine.dtype()
            )));
        }
        let buffer = data.buffer();
        let mut bytes = buffer.read(data.offset(), data.nbytes())?;
        self.engine.process(&mut bytes, inverse)?;
        buffer.write(data.offset(), &bytes)?;

        let index = self.gpu.queue.submit(std::iter::empty());
        match self.wait {
            WaitPolicy::Block => {
                let _ = self
                    .gpu
                    .device
                    .poll(wgpu::Maintain::WaitForSubmissionIndex(index));
                Ok(WgpuCompletion::done(Arc::clone(&self.gpu)))
            }
            WaitPolicy::Deferred => Ok(WgpuCompletion::pending(Arc::clone(&self.gpu), index)),
        }
    }
}

impl TransformPlan for WgpuFftPlan {
    type Buffer = WgpuBuffer;
    type Completion = WgpuCompletion;

    fn shape(&self) -> &[usize] {
        self.engine.shape()
    }

    fn axes(&self) -> &[usize] {
        self.engine.axes()
    }

    fn forward(&self, data: &DeviceArray<WgpuBuffer>) -> Result<WgpuCompletion> {
        self.run(data, false)
    }

    fn inverse(&self, data: &DeviceArray<WgpuBuffer>) -> Result<WgpuCompletion> {
        self.run(data, true)
    }
}
