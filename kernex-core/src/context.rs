//! The uniform backend contract.
//!
//! One context owns one device and one command queue. Buffers, kernels and
//! transform plans created through a context stay bound to that context's
//! queue for its lifetime. Operations on two different contexts are never
//! ordered relative to each other.

use std::collections::HashMap;

use crate::array::HostArray;
use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::kernel::{Args, KernelSpec, WaitPolicy};
use crate::source::{BuildOptions, Source};

/// Fails unless `[offset, offset + len)` fits a buffer of `capacity` bytes.
pub fn check_range(capacity: usize, offset: usize, len: usize) -> Result<()> {
    match offset.checked_add(len) {
        Some(end) if end <= capacity => Ok(()),
        _ => Err(Error::Range {
            offset,
            len,
            capacity,
        }),
    }
}

/// Fails unless `offset` is a multiple of `required` (1 disables the check).
pub fn check_alignment(offset: usize, required: usize) -> Result<()> {
    if required > 1 && offset % required != 0 {
        return Err(Error::Alignment { offset, required });
    }
    Ok(())
}

/// A waitable handle for one submitted device operation.
pub trait Completion {
    /// Blocks until the operation completes. Device-side failures surface
    /// here with the backend's message.
    fn wait(self) -> Result<()>;
}

/// One contiguous, fixed-capacity region of device memory.
///
/// Buffers never grow: callers needing more space allocate a larger buffer
/// and migrate, which keeps device-pointer identity stable for kernels
/// holding raw pointers into the region. Capacity is the only size a
/// buffer enforces; all offsets are validated against it.
pub trait DeviceBuffer: Clone {
    /// Capacity in bytes.
    fn capacity(&self) -> usize;

    /// Pointer alignment the backend requires for kernel arguments.
    fn alignment(&self) -> usize;

    /// Copies host bytes into `[offset, offset + data.len())`.
    fn write(&self, offset: usize, data: &[u8]) -> Result<()>;

    /// Copies `len` bytes starting at `offset` into a fresh host buffer.
    fn read(&self, offset: usize, len: usize) -> Result<Vec<u8>>;

    /// Partial device-to-device copy from `src` into self. Never stages
    /// through the host.
    fn copy_from_buffer(
        &self,
        src: &Self,
        src_offset: usize,
        dst_offset: usize,
        len: usize,
    ) -> Result<()>;

    /// Allocates a new buffer of `len` bytes holding a detached copy of
    /// `[offset, offset + len)`.
    fn copy_region(&self, offset: usize, len: usize) -> Result<Self>;

    /// Partial host-to-device copy.
    fn copy_from_host(
        &self,
        src: &[u8],
        src_offset: usize,
        dst_offset: usize,
        len: usize,
    ) -> Result<()> {
        check_range(src.len(), src_offset, len)?;
        self.write(dst_offset, &src[src_offset..src_offset + len])
    }

    /// Copies the full contents into another device buffer.
    fn copy_to_device(&self, dest: &Self) -> Result<()> {
        dest.copy_from_buffer(self, 0, 0, self.capacity())
    }

    /// Copies the full contents into a host slice.
    fn copy_to_host(&self, dest: &mut [u8]) -> Result<()> {
        check_range(dest.len(), 0, self.capacity())?;
        let bytes = self.read(0, self.capacity())?;
        dest[..bytes.len()].copy_from_slice(&bytes);
        Ok(())
    }

    /// Zero-copy typed view over `[offset, offset + byte_size)`.
    ///
    /// No data moves; the view aliases this buffer's memory and becomes
    /// invalid once the buffer is freed.
    fn view(&self, offset: usize, dtype: DType, shape: &[usize]) -> Result<DeviceArray<Self>> {
        DeviceArray::new(self.clone(), offset, dtype, shape)
    }

    /// Casts `src` to `dest_dtype` if needed, then writes its bytes at
    /// `offset`.
    fn update_from_host(&self, offset: usize, dest_dtype: DType, src: &HostArray) -> Result<()> {
        let cast = src.cast(dest_dtype)?;
        self.write(offset, cast.bytes())
    }

    /// Writes a device array's bytes at `offset` over the device path.
    ///
    /// The element dtypes must already match; device-side casting would
    /// need a kernel and is not a buffer operation.
    fn update_from_device(
        &self,
        offset: usize,
        dest_dtype: DType,
        src: &DeviceArray<Self>,
    ) -> Result<()> {
        if src.dtype() != dest_dtype {
            return Err(Error::Unsupported("device-side dtype casts"));
        }
        self.copy_from_buffer(src.buffer(), src.offset(), offset, src.nbytes())
    }

    /// Sub-buffer handle for `[offset, offset + len)`, usable directly as
    /// a kernel pointer argument. No bytes are copied.
    fn as_kernel_arg(&self, offset: usize, len: usize) -> Result<BufferSlice<Self>> {
        check_range(self.capacity(), offset, len)?;
        check_alignment(offset, self.alignment())?;
        Ok(BufferSlice {
            buffer: self.clone(),
            offset,
            len,
        })
    }
}

/// A zero-copy typed view over a region of a device buffer.
#[derive(Clone)]
pub struct DeviceArray<B: DeviceBuffer> {
    buffer: B,
    offset: usize,
    dtype: DType,
    shape: Vec<usize>,
}

impl<B: DeviceBuffer> DeviceArray<B> {
    /// Builds a view; fails if the typed region exceeds the buffer.
    pub fn new(buffer: B, offset: usize, dtype: DType, shape: &[usize]) -> Result<Self> {
        check_range(buffer.capacity(), offset, dtype.byte_size(shape))?;
        Ok(Self {
            buffer,
            offset,
            dtype,
            shape: shape.to_vec(),
        })
    }

    pub fn buffer(&self) -> &B {
        &self.buffer
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn nbytes(&self) -> usize {
        self.dtype.byte_size(&self.shape)
    }

    /// The view's region as a kernel pointer argument.
    pub fn as_kernel_arg(&self) -> Result<BufferSlice<B>> {
        self.buffer.as_kernel_arg(self.offset, self.nbytes())
    }
}

/// A raw sub-buffer handle: buffer, byte offset and byte length.
#[derive(Clone)]
pub struct BufferSlice<B: DeviceBuffer> {
    buffer: B,
    offset: usize,
    len: usize,
}

impl<B: DeviceBuffer> BufferSlice<B> {
    pub fn buffer(&self) -> &B {
        &self.buffer
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// A compiled, named kernel entry point bound to one context.
pub trait KernelBinding: Clone {
    type Buffer: DeviceBuffer;
    type Completion: Completion;

    /// Exposed kernel name.
    fn name(&self) -> &str;

    /// The signature the kernel was bound with.
    fn spec(&self) -> &KernelSpec;

    /// Marshals the keyed argument set into a positional native call and
    /// launches it with the resolved thread count.
    fn invoke(&self, args: &Args<Self::Buffer>) -> Result<Self::Completion>;
}

/// A reusable in-place transform bound to one array's shape and axes.
pub trait TransformPlan {
    type Buffer: DeviceBuffer;
    type Completion: Completion;

    fn shape(&self) -> &[usize];

    fn axes(&self) -> &[usize];

    /// Forward transform, in place on the bound array.
    fn forward(&self, data: &DeviceArray<Self::Buffer>) -> Result<Self::Completion>;

    /// Inverse transform, in place, scaled by 1/N per transformed axis.
    fn inverse(&self, data: &DeviceArray<Self::Buffer>) -> Result<Self::Completion>;
}

/// One device plus one command queue, and everything bound to them.
///
/// All copies, launches and transforms issued through a context go to its
/// single queue and are observed in submission order by that queue. Queue
/// access is assumed single-threaded.
pub trait ComputeContext: Clone {
    type Buffer: DeviceBuffer;
    type Kernel: KernelBinding<Buffer = Self::Buffer, Completion = Self::Completion>;
    type Completion: Completion;
    type Plan: TransformPlan<Buffer = Self::Buffer, Completion = Self::Completion>;

    fn backend_name(&self) -> &'static str;

    /// Allocates a buffer of `capacity` bytes. Contents are unspecified;
    /// zero fill is not guaranteed.
    fn create_buffer(&self, capacity: usize) -> Result<Self::Buffer>;

    /// Assembles and compiles kernel sources, then binds every described
    /// entry point under its exposed name. Re-adding a name replaces the
    /// prior binding.
    fn add_kernels(
        &self,
        sources: &[Source],
        specs: &HashMap<String, KernelSpec>,
        options: &BuildOptions,
    ) -> Result<()>;

    /// Looks up a bound kernel by exposed name.
    fn kernel(&self, name: &str) -> Option<Self::Kernel>;

    /// Invokes a bound kernel by exposed name.
    fn invoke(&self, name: &str, args: &Args<Self::Buffer>) -> Result<Self::Completion> {
        self.kernel(name)
            .ok_or_else(|| Error::UnknownKernel(name.to_string()))?
            .invoke(args)
    }

    /// Copies a host array into a newly allocated device array of the same
    /// shape and dtype. The source is left unmodified.
    fn to_device(&self, host: &HostArray) -> Result<DeviceArray<Self::Buffer>> {
        let buffer = self.create_buffer(host.nbytes())?;
        buffer.write(0, host.bytes())?;
        DeviceArray::new(buffer, 0, host.dtype(), host.shape())
    }

    /// Copies a device array back into a fresh host array.
    fn to_host(&self, array: &DeviceArray<Self::Buffer>) -> Result<HostArray> {
        let bytes = array.buffer().read(array.offset(), array.nbytes())?;
        HostArray::from_bytes(bytes, array.dtype(), array.shape())
    }

    /// Allocates a zero-initialized device array.
    fn zeros(&self, shape: &[usize], dtype: DType) -> Result<DeviceArray<Self::Buffer>> {
        let nbytes = dtype.byte_size(shape);
        let buffer = self.create_buffer(nbytes)?;
        buffer.write(0, &vec![0u8; nbytes])?;
        DeviceArray::new(buffer, 0, dtype, shape)
    }

    /// Allocates a buffer of `new_capacity` bytes and migrates the
    /// overlapping prefix of `buffer` into it.
    ///
    /// This is the growth path: buffers never grow in place, so code
    /// holding raw device pointers into the old buffer keeps a stable
    /// target until the caller drops it.
    fn reallocate(&self, buffer: &Self::Buffer, new_capacity: usize) -> Result<Self::Buffer> {
        let grown = self.create_buffer(new_capacity)?;
        let migrated = buffer.capacity().min(new_capacity);
        grown.copy_from_buffer(buffer, 0, 0, migrated)?;
        Ok(grown)
    }

    /// Blocks until all previously submitted operations on this context's
    /// queue have completed. A no-op on backends where every submission
    /// already waits on call, but always present so callers stay
    /// backend-agnostic.
    fn synchronize(&self) -> Result<()>;

    /// Builds a reusable in-place transform plan over `data`'s shape and
    /// the given axes.
    fn plan_fft(
        &self,
        data: &DeviceArray<Self::Buffer>,
        axes: &[usize],
        wait: WaitPolicy,
    ) -> Result<Self::Plan>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::Scalar;
    use crate::kernel::{check_args, resolve_thread_count, ArgKind, ThreadCount};
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Minimal in-memory buffer used to exercise the shared helpers.
    #[derive(Clone)]
    struct MockBuffer {
        bytes: Rc<RefCell<Vec<u8>>>,
        alignment: usize,
    }

    impl MockBuffer {
        fn new(capacity: usize, alignment: usize) -> Self {
            Self {
                bytes: Rc::new(RefCell::new(vec![0; capacity])),
                alignment,
            }
        }
    }

    impl DeviceBuffer for MockBuffer {
        fn capacity(&self) -> usize {
            self.bytes.borrow().len()
        }

        fn alignment(&self) -> usize {
            self.alignment
        }

        fn write(&self, offset: usize, data: &[u8]) -> Result<()> {
            check_range(self.capacity(), offset, data.len())?;
            self.bytes.borrow_mut()[offset..offset + data.len()].copy_from_slice(data);
            Ok(())
        }

        fn read(&self, offset: usize, len: usize) -> Result<Vec<u8>> {
            check_range(self.capacity(), offset, len)?;
            Ok(self.bytes.borrow()[offset..offset + len].to_vec())
        }

        fn copy_from_buffer(
            &self,
            src: &Self,
            src_offset: usize,
            dst_offset: usize,
            len: usize,
        ) -> Result<()> {
            let chunk = src.read(src_offset, len)?;
            self.write(dst_offset, &chunk)
        }

        fn copy_region(&self, offset: usize, len: usize) -> Result<Self> {
            let copy = MockBuffer::new(len, self.alignment);
            copy.write(0, &self.read(offset, len)?)?;
            Ok(copy)
        }
    }

    #[test]
    fn range_checks() {
        assert!(check_range(1024, 0, 1024).is_ok());
        assert!(check_range(1024, 1024, 0).is_ok());
        assert!(matches!(
            check_range(1024, 1000, 100),
            Err(Error::Range { .. })
        ));
        assert!(matches!(
            check_range(8, usize::MAX, 2),
            Err(Error::Range { .. })
        ));
    }

    #[test]
    fn alignment_checks() {
        assert!(check_alignment(512, 256).is_ok());
        assert!(check_alignment(7, 1).is_ok());
        assert!(matches!(
            check_alignment(100, 256),
            Err(Error::Alignment { .. })
        ));
    }

    #[test]
    fn kernel_arg_respects_alignment() {
        let buffer = MockBuffer::new(1024, 256);
        assert!(buffer.as_kernel_arg(256, 128).is_ok());
        assert!(matches!(
            buffer.as_kernel_arg(128, 64),
            Err(Error::Alignment { .. })
        ));
    }

    #[test]
    fn view_is_zero_copy_alias() {
        let buffer = MockBuffer::new(64, 1);
        buffer.write(16, &42f32.to_le_bytes()).unwrap();
        let view = buffer.view(16, DType::F32, &[4]).unwrap();
        assert_eq!(view.nbytes(), 16);
        // Writing through the buffer is visible at the view's offset.
        buffer.write(20, &7f32.to_le_bytes()).unwrap();
        let bytes = view.buffer().read(view.offset(), 8).unwrap();
        assert_eq!(&bytes[0..4], &42f32.to_le_bytes());
        assert_eq!(&bytes[4..8], &7f32.to_le_bytes());
    }

    #[test]
    fn view_rejects_overrun() {
        let buffer = MockBuffer::new(16, 1);
        assert!(matches!(
            buffer.view(8, DType::F64, &[2]),
            Err(Error::Range { .. })
        ));
    }

    #[test]
    fn update_from_host_casts() {
        let buffer = MockBuffer::new(16, 1);
        let host = HostArray::from_slice(&[1i32, 2, 3, 4], &[4]).unwrap();
        buffer.update_from_host(0, DType::F32, &host).unwrap();
        let back: Vec<f32> = bytemuck::pod_collect_to_vec(&buffer.read(0, 16).unwrap());
        assert_eq!(back, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn update_from_device_requires_matching_dtype() {
        let a = MockBuffer::new(16, 1);
        let b = MockBuffer::new(16, 1);
        let src = b.view(0, DType::F32, &[4]).unwrap();
        assert!(a.update_from_device(0, DType::F32, &src).is_ok());
        assert!(matches!(
            a.update_from_device(0, DType::I32, &src),
            Err(Error::Unsupported(_))
        ));
    }

    fn sample_spec() -> KernelSpec {
        KernelSpec::new(ThreadCount::FromArg("n".into()))
            .arg("x", ArgKind::Pointer(DType::F32))
            .arg("n", ArgKind::Value(DType::U32))
    }

    #[test]
    fn arg_count_mismatch_detected() {
        let spec = sample_spec();
        let missing: Args<MockBuffer> = Args::new().scalar("n", 4u32);
        assert!(matches!(
            check_args("k", &spec, &missing),
            Err(Error::ArgumentCount { .. })
        ));

        let buffer = MockBuffer::new(16, 1);
        let extra = Args::new()
            .array("x", buffer.view(0, DType::F32, &[4]).unwrap())
            .scalar("n", 4u32)
            .scalar("stray", 1u32);
        assert!(matches!(
            check_args("k", &spec, &extra),
            Err(Error::ArgumentCount { .. })
        ));

        let renamed = Args::new()
            .array("y", buffer.view(0, DType::F32, &[4]).unwrap())
            .scalar("n", 4u32);
        assert!(matches!(
            check_args("k", &spec, &renamed),
            Err(Error::ArgumentCount { .. })
        ));
    }

    #[test]
    fn thread_count_resolution() {
        let buffer = MockBuffer::new(16, 1);
        let spec = sample_spec();
        let args = Args::new()
            .array("x", buffer.view(0, DType::F32, &[4]).unwrap())
            .scalar("n", 4u32);
        assert_eq!(resolve_thread_count("k", &spec, &args).unwrap(), 4);

        let fixed = KernelSpec::new(ThreadCount::Fixed(128));
        let empty: Args<MockBuffer> = Args::new();
        assert_eq!(resolve_thread_count("k", &fixed, &empty).unwrap(), 128);

        let bad = Args::new()
            .array("x", buffer.view(0, DType::F32, &[4]).unwrap())
            .scalar("n", Scalar::F32(4.0));
        assert!(matches!(
            resolve_thread_count("k", &spec, &bad),
            Err(Error::Argument { .. })
        ));
    }
}
