//! Shared transform engine.
//!
//! Plans and executes in-place multi-axis FFTs over a row-major complex
//! byte region. rustfft supplies the transform algorithm; this module owns
//! plan lifecycle, axis validation and the strided line gather/scatter.
//! Backends feed it the bytes: the host backend in place, the GPU backend
//! around a download/upload pair.

use std::sync::Arc;

use num_complex::Complex;
use num_traits::Zero;
use rustfft::{Fft, FftNum, FftPlanner};

use crate::dtype::DType;
use crate::error::{Error, Result};

/// Validates a transform layout.
///
/// Every transformed axis except the last must have a power-of-two extent
/// (transform-library constraint, not relaxable); all axes must be in
/// range and all extents non-zero.
pub fn validate_transform_axes(shape: &[usize], axes: &[usize]) -> Result<()> {
    if axes.is_empty() {
        return Err(Error::Shape("at least one transform axis is required".into()));
    }
    let max_axis = *axes.iter().max().expect("axes checked non-empty");
    if shape.len() <= max_axis {
        return Err(Error::Shape(format!(
            "axis {max_axis} out of range for shape {shape:?}"
        )));
    }
    if shape.iter().any(|&n| n == 0) {
        return Err(Error::Shape(format!("shape {shape:?} has a zero extent")));
    }
    for &axis in &axes[..axes.len() - 1] {
        let extent = shape[axis];
        if !extent.is_power_of_two() {
            return Err(Error::Shape(format!(
                "extent {extent} of transformed axis {axis} must be a power of two"
            )));
        }
    }
    Ok(())
}

/// Complex component types the engine can process.
trait FftScalar: FftNum + bytemuck::Pod {
    fn recip_of(n: usize) -> Self;
}

impl FftScalar for f32 {
    fn recip_of(n: usize) -> f32 {
        1.0 / n as f32
    }
}

impl FftScalar for f64 {
    fn recip_of(n: usize) -> f64 {
        1.0 / n as f64
    }
}

type PlanPair<T> = (Arc<dyn Fft<T>>, Arc<dyn Fft<T>>);

enum PlanSet {
    C64(Vec<PlanPair<f32>>),
    C128(Vec<PlanPair<f64>>),
}

/// Per-axis FFT plans bound to one shape and dtype.
///
/// Reusable for any number of transforms while the bound shape is
/// unchanged; plan lifetime is independent of the array contents.
pub struct LineFft {
    shape: Vec<usize>,
    axes: Vec<usize>,
    dtype: DType,
    plans: PlanSet,
}

impl LineFft {
    /// Plans transforms along `axes` of a row-major array of the given
    /// shape. Fails before any plan is built if the layout is invalid.
    pub fn new(shape: &[usize], axes: &[usize], dtype: DType) -> Result<Self> {
        validate_transform_axes(shape, axes)?;
        let plans = match dtype {
            DType::C64 => PlanSet::C64(build_plans::<f32>(shape, axes)),
            DType::C128 => PlanSet::C128(build_plans::<f64>(shape, axes)),
            _ => return Err(Error::Unsupported("transforms on non-complex arrays")),
        };
        Ok(Self {
            shape: shape.to_vec(),
            axes: axes.to_vec(),
            dtype,
            plans,
        })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn axes(&self) -> &[usize] {
        &self.axes
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Byte length of the bound array.
    pub fn nbytes(&self) -> usize {
        self.dtype.byte_size(&self.shape)
    }

    /// Runs the transform in place over `bytes`.
    ///
    /// The inverse direction scales by 1/N per transformed axis, so a
    /// forward/inverse pair is the identity.
    pub fn process(&self, bytes: &mut [u8], inverse: bool) -> Result<()> {
        if bytes.len() != self.nbytes() {
            return Err(Error::Shape(format!(
                "{} bytes do not match planned shape {:?} of {}",
                bytes.len(),
                self.shape,
                self.dtype
            )));
        }
        match &self.plans {
            PlanSet::C64(plans) => run_lines::<f32>(bytes, &self.shape, &self.axes, plans, inverse),
            PlanSet::C128(plans) => run_lines::<f64>(bytes, &self.shape, &self.axes, plans, inverse),
        }
        Ok(())
    }
}

fn build_plans<T: FftScalar>(shape: &[usize], axes: &[usize]) -> Vec<PlanPair<T>> {
    let mut planner = FftPlanner::<T>::new();
    axes.iter()
        .map(|&axis| {
            let n = shape[axis];
            (planner.plan_fft_forward(n), planner.plan_fft_inverse(n))
        })
        .collect()
}

fn run_lines<T: FftScalar>(
    bytes: &mut [u8],
    shape: &[usize],
    axes: &[usize],
    plans: &[PlanPair<T>],
    inverse: bool,
) {
    let mut data: Vec<Complex<T>> = bytemuck::pod_collect_to_vec(bytes);
    for (&axis, (forward, backward)) in axes.iter().zip(plans.iter()) {
        let plan = if inverse { backward } else { forward };
        let scale = if inverse {
            Some(T::recip_of(shape[axis]))
        } else {
            None
        };
        transform_axis(&mut data, shape, axis, plan.as_ref(), scale);
    }
    bytes.copy_from_slice(bytemuck::cast_slice(&data));
}

/// Transforms every line along `axis` of a row-major array.
fn transform_axis<T: FftScalar>(
    data: &mut [Complex<T>],
    shape: &[usize],
    axis: usize,
    plan: &dyn Fft<T>,
    scale: Option<T>,
) {
    let n = shape[axis];
    let inner: usize = shape[axis + 1..].iter().product();
    let outer: usize = shape[..axis].iter().product();
    let mut line = vec![Complex::<T>::zero(); n];

    for o in 0..outer {
        let base_block = o * n * inner;
        for i in 0..inner {
            let base = base_block + i;
            for k in 0..n {
                line[k] = data[base + k * inner];
            }
            plan.process(&mut line);
            match scale {
                Some(s) => {
                    for k in 0..n {
                        data[base + k * inner] = line[k] * s;
                    }
                }
                None => {
                    for k in 0..n {
                        data[base + k * inner] = line[k];
                    }
                }
            }
        }
    }
}
