//! In-place transforms on host buffers.

use std::sync::Arc;

use kernex_core::{DeviceArray, Error, LineFft, Result, TransformPlan, WaitPolicy};

use crate::buffer::HostBuffer;
use crate::kernel::HostCompletion;

/// A transform plan bound to one host array's shape and axes.
#[derive(Clone)]
pub struct HostFftPlan {
    engine: Arc<LineFft>,
    wait: WaitPolicy,
}

impl HostFftPlan {
    pub(crate) fn new(engine: LineFft, wait: WaitPolicy) -> Self {
        Self {
            engine: Arc::new(engine),
            wait,
        }
    }

    pub fn wait_policy(&self) -> WaitPolicy {
        self.wait
    }

    fn run(&self, data: &DeviceArray<HostBuffer>, inverse: bool) -> Result<HostCompletion> {
        if data.shape() != self.engine.shape() || data.dtype() != self.engine.dtype() {
            return Err(Error::Shape(format!(
                "array of shape {:?} ({}) does not match plan over {:?} ({})",
                data.shape(),
                data.dtype(),
                self.engine.shape(),
                self.engine.dtype()
            )));
        }
        let shared = data.buffer().shared_bytes();
        let mut guard = shared.lock().unwrap();
        let region = &mut guard[data.offset()..data.offset() + data.nbytes()];
        self.engine.process(region, inverse)?;
        Ok(HostCompletion)
    }
}

impl TransformPlan for HostFftPlan {
    type Buffer = HostBuffer;
    type Completion = HostCompletion;

    fn shape(&self) -> &[usize] {
        self.engine.shape()
    }

    fn axes(&self) -> &[usize] {
        self.engine.axes()
    }

    fn forward(&self, data: &DeviceArray<HostBuffer>) -> Result<HostCompletion> {
        self.run(data, false)
    }

    fn inverse(&self, data: &DeviceArray<HostBuffer>) -> Result<HostCompletion> {
        self.run(data, true)
    }
}
