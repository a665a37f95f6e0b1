//! Error kinds shared by every backend.

use thiserror::Error;

/// Unified error type for buffer, kernel and transform operations.
///
/// All variants are raised synchronously at the call that detects them and
/// are never retried internally. Asynchronous device faults surface as
/// [`Error::DeviceExecution`] when the corresponding completion is waited
/// on.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to allocate {requested} bytes of device memory: {reason}")]
    Allocation { requested: usize, reason: String },

    #[error("offset {offset} + {len} bytes exceeds buffer capacity {capacity}")]
    Range {
        offset: usize,
        len: usize,
        capacity: usize,
    },

    #[error("misaligned value {offset}: must be a multiple of {required} bytes")]
    Alignment { offset: usize, required: usize },

    #[error("kernel build failed: {diagnostics}")]
    Compilation { diagnostics: String },

    #[error("kernel `{kernel}` takes {expected} arguments, {supplied} supplied")]
    ArgumentCount {
        kernel: String,
        expected: usize,
        supplied: usize,
    },

    #[error("invalid argument `{name}` for kernel `{kernel}`: {reason}")]
    Argument {
        kernel: String,
        name: String,
        reason: String,
    },

    #[error("argument `{name}` of kernel `{kernel}` must be a device-resident array")]
    ArgumentType { kernel: String, name: String },

    #[error("unknown kernel `{0}`")]
    UnknownKernel(String),

    #[error("invalid array layout: {0}")]
    Shape(String),

    #[error("{0} is not supported")]
    Unsupported(&'static str),

    #[error("no usable compute device: {0}")]
    BackendUnavailable(String),

    #[error("device execution failed: {0}")]
    DeviceExecution(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_error_names_the_bounds() {
        let err = Error::Range {
            offset: 1000,
            len: 100,
            capacity: 1024,
        };
        let msg = err.to_string();
        assert!(msg.contains("1000"));
        assert!(msg.contains("1024"));
    }

    #[test]
    fn argument_count_names_the_kernel() {
        let err = Error::ArgumentCount {
            kernel: "saxpy".into(),
            expected: 4,
            supplied: 3,
        };
        assert!(err.to_string().contains("saxpy"));
    }
}
