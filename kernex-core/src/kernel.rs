//! Kernel descriptions and call-time argument sets.
//!
//! A kernel is described once, at bind time, by a [`KernelSpec`]: the
//! native entry-point name, the ordered argument signature, the thread
//! count source and the wait discipline. Call sites supply an [`Args`] set
//! keyed by argument name; backends marshal it into a positional native
//! call using the helpers at the bottom of this module.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::context::{BufferSlice, DeviceArray, DeviceBuffer};
use crate::dtype::{DType, Scalar};
use crate::error::{Error, Result};

/// Kind of one declared kernel argument, resolved when the kernel is bound.
///
/// Marshaling switches on this tag; the supplied value is never probed
/// structurally. The record kinds are declared but rejected at call time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "dtype", rename_all = "snake_case")]
pub enum ArgKind {
    /// Numeric scalar passed by value.
    Value(DType),
    /// Pointer into device memory holding elements of the given dtype.
    Pointer(DType),
    /// Structured record passed by value. Unsupported at call time.
    Record,
    /// Pointer to structured records. Unsupported at call time.
    RecordPointer,
}

/// One declared argument: unique name plus kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgSpec {
    pub name: String,
    #[serde(flatten)]
    pub kind: ArgKind,
}

/// Where the launch thread count comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ThreadCount {
    /// Fixed count configured at bind time.
    Fixed(usize),
    /// Read from the named scalar argument at call time.
    FromArg(String),
}

/// Blocking discipline for a launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitPolicy {
    /// Block until the device reports completion before returning.
    #[default]
    Block,
    /// Return a completion handle immediately; the caller waits later.
    Deferred,
}

/// Description of one kernel entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelSpec {
    /// Entry-point name on the device side; defaults to the exposed name.
    #[serde(default)]
    pub native_name: Option<String>,
    /// Declared arguments, in declaration order.
    #[serde(default)]
    pub args: Vec<ArgSpec>,
    /// Launch thread count source.
    pub threads: ThreadCount,
    /// Blocking discipline for launches of this kernel.
    #[serde(default)]
    pub wait: WaitPolicy,
    /// Workgroup size the kernel was authored with (GPU backends dispatch
    /// `ceil(threads / workgroup_size)` groups).
    #[serde(default = "default_workgroup_size")]
    pub workgroup_size: u32,
}

fn default_workgroup_size() -> u32 {
    64
}

impl KernelSpec {
    pub fn new(threads: ThreadCount) -> Self {
        Self {
            native_name: None,
            args: Vec::new(),
            threads,
            wait: WaitPolicy::default(),
            workgroup_size: default_workgroup_size(),
        }
    }

    /// Appends a declared argument.
    pub fn arg(mut self, name: impl Into<String>, kind: ArgKind) -> Self {
        self.args.push(ArgSpec {
            name: name.into(),
            kind,
        });
        self
    }

    pub fn native_name(mut self, name: impl Into<String>) -> Self {
        self.native_name = Some(name.into());
        self
    }

    pub fn wait(mut self, wait: WaitPolicy) -> Self {
        self.wait = wait;
        self
    }

    pub fn workgroup_size(mut self, size: u32) -> Self {
        self.workgroup_size = size;
        self
    }

    /// Entry-point name to resolve, defaulting to the exposed name.
    pub fn resolved_native_name<'a>(&'a self, exposed: &'a str) -> &'a str {
        self.native_name.as_deref().unwrap_or(exposed)
    }
}

/// A value supplied for one kernel argument.
#[derive(Clone)]
pub enum ArgValue<B: DeviceBuffer> {
    /// Device-resident typed array (pointer argument).
    Array(DeviceArray<B>),
    /// Raw sub-buffer handle (pointer argument).
    Slice(BufferSlice<B>),
    /// Scalar passed by value.
    Scalar(Scalar),
}

/// Keyed argument set for one kernel invocation.
///
/// Must contain exactly one entry per declared argument name; no extras,
/// no omissions.
#[derive(Clone)]
pub struct Args<B: DeviceBuffer> {
    values: HashMap<String, ArgValue<B>>,
}

impl<B: DeviceBuffer> Args<B> {
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    pub fn array(mut self, name: impl Into<String>, array: DeviceArray<B>) -> Self {
        self.values.insert(name.into(), ArgValue::Array(array));
        self
    }

    pub fn slice(mut self, name: impl Into<String>, slice: BufferSlice<B>) -> Self {
        self.values.insert(name.into(), ArgValue::Slice(slice));
        self
    }

    pub fn scalar(mut self, name: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.values
            .insert(name.into(), ArgValue::Scalar(value.into()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue<B>> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<B: DeviceBuffer> Default for Args<B> {
    fn default() -> Self {
        Self::new()
    }
}

/// Verifies the supplied set matches the declared signature exactly.
///
/// Checked before any marshaling; a mismatch means nothing was submitted.
pub fn check_args<B: DeviceBuffer>(kernel: &str, spec: &KernelSpec, args: &Args<B>) -> Result<()> {
    if args.len() != spec.args.len() {
        return Err(Error::ArgumentCount {
            kernel: kernel.to_string(),
            expected: spec.args.len(),
            supplied: args.len(),
        });
    }
    for arg in &spec.args {
        if args.get(&arg.name).is_none() {
            return Err(Error::ArgumentCount {
                kernel: kernel.to_string(),
                expected: spec.args.len(),
                supplied: args.len(),
            });
        }
    }
    Ok(())
}

/// Resolves the launch thread count from the spec and the supplied args.
pub fn resolve_thread_count<B: DeviceBuffer>(
    kernel: &str,
    spec: &KernelSpec,
    args: &Args<B>,
) -> Result<usize> {
    match &spec.threads {
        ThreadCount::Fixed(n) => Ok(*n),
        ThreadCount::FromArg(name) => match args.get(name) {
            Some(ArgValue::Scalar(s)) => s.as_usize().ok_or_else(|| Error::Argument {
                kernel: kernel.to_string(),
                name: name.clone(),
                reason: format!("thread count must be a non-negative integer, got {:?}", s),
            }),
            Some(_) => Err(Error::Argument {
                kernel: kernel.to_string(),
                name: name.clone(),
                reason: "thread-count argument must be a scalar".to_string(),
            }),
            None => Err(Error::Argument {
                kernel: kernel.to_string(),
                name: name.clone(),
                reason: "thread-count argument was not supplied".to_string(),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_from_json() {
        let json = r#"{
            "native_name": "saxpy_f32",
            "args": [
                {"name": "x", "kind": "pointer", "dtype": "f32"},
                {"name": "a", "kind": "value", "dtype": "f32"},
                {"name": "n", "kind": "value", "dtype": "u32"}
            ],
            "threads": "n",
            "wait": "deferred"
        }"#;
        let spec: KernelSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.resolved_native_name("saxpy"), "saxpy_f32");
        assert_eq!(spec.args.len(), 3);
        assert_eq!(spec.args[0].kind, ArgKind::Pointer(DType::F32));
        assert_eq!(spec.threads, ThreadCount::FromArg("n".into()));
        assert_eq!(spec.wait, WaitPolicy::Deferred);
        assert_eq!(spec.workgroup_size, 64);
    }

    #[test]
    fn fixed_threads_from_json() {
        let spec: KernelSpec = serde_json::from_str(r#"{"threads": 128}"#).unwrap();
        assert_eq!(spec.threads, ThreadCount::Fixed(128));
        assert_eq!(spec.resolved_native_name("fill"), "fill");
    }
}
