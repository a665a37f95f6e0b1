//! Host-resident numeric arrays.
//!
//! [`HostArray`] is the host side of every transfer: a byte buffer plus an
//! element dtype and a shape. Backends move its bytes verbatim; typed
//! access goes through [`Element`] and bytemuck.

use num_complex::Complex;

use crate::dtype::{DType, Element};
use crate::error::{Error, Result};

/// A host numeric array: contiguous bytes, element dtype and shape.
#[derive(Debug, Clone, PartialEq)]
pub struct HostArray {
    bytes: Vec<u8>,
    dtype: DType,
    shape: Vec<usize>,
}

impl HostArray {
    /// Creates an array from a typed slice.
    pub fn from_slice<T: Element>(data: &[T], shape: &[usize]) -> Result<Self> {
        let count: usize = shape.iter().product();
        if count != data.len() {
            return Err(Error::Shape(format!(
                "{} elements do not fill shape {:?}",
                data.len(),
                shape
            )));
        }
        Ok(Self {
            bytes: bytemuck::cast_slice(data).to_vec(),
            dtype: T::DTYPE,
            shape: shape.to_vec(),
        })
    }

    /// Creates an array from raw bytes; the byte length must match the
    /// dtype and shape.
    pub fn from_bytes(bytes: Vec<u8>, dtype: DType, shape: &[usize]) -> Result<Self> {
        if bytes.len() != dtype.byte_size(shape) {
            return Err(Error::Shape(format!(
                "{} bytes do not fill a {dtype} array of shape {:?}",
                bytes.len(),
                shape
            )));
        }
        Ok(Self {
            bytes,
            dtype,
            shape: shape.to_vec(),
        })
    }

    /// Creates a zero-filled array.
    pub fn zeros(shape: &[usize], dtype: DType) -> Self {
        Self {
            bytes: vec![0u8; dtype.byte_size(shape)],
            dtype,
            shape: shape.to_vec(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
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
        self.bytes.len()
    }

    /// Copies the contents out as a typed vector.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        if T::DTYPE != self.dtype {
            return Err(Error::Shape(format!(
                "array holds {} elements, {} requested",
                self.dtype,
                T::DTYPE
            )));
        }
        Ok(bytemuck::pod_collect_to_vec(&self.bytes))
    }

    /// Converts the array to another dtype, element by element.
    ///
    /// Real types convert through `f64`; real values widen to complex with
    /// a zero imaginary part. Narrowing complex to real is rejected.
    pub fn cast(&self, to: DType) -> Result<HostArray> {
        if to == self.dtype {
            return Ok(self.clone());
        }
        if self.dtype.is_complex() {
            let lanes = self.complex_lanes()?;
            return match to {
                DType::C64 => {
                    let data: Vec<Complex<f32>> = lanes
                        .iter()
                        .map(|c| Complex::new(c.re as f32, c.im as f32))
                        .collect();
                    HostArray::from_slice(&data, &self.shape)
                }
                DType::C128 => HostArray::from_slice(&lanes, &self.shape),
                _ => Err(Error::Unsupported("narrowing a complex array to a real dtype")),
            };
        }
        let lanes = self.real_lanes()?;
        match to {
            DType::U8 => from_lanes(&self.shape, lanes.iter().map(|&v| v as u8)),
            DType::I32 => from_lanes(&self.shape, lanes.iter().map(|&v| v as i32)),
            DType::U32 => from_lanes(&self.shape, lanes.iter().map(|&v| v as u32)),
            DType::I64 => from_lanes(&self.shape, lanes.iter().map(|&v| v as i64)),
            DType::F32 => from_lanes(&self.shape, lanes.iter().map(|&v| v as f32)),
            DType::F64 => from_lanes(&self.shape, lanes.iter().copied()),
            DType::C64 => from_lanes(
                &self.shape,
                lanes.iter().map(|&v| Complex::new(v as f32, 0.0f32)),
            ),
            DType::C128 => from_lanes(&self.shape, lanes.iter().map(|&v| Complex::new(v, 0.0f64))),
        }
    }

    fn real_lanes(&self) -> Result<Vec<f64>> {
        Ok(match self.dtype {
            DType::U8 => self.to_vec::<u8>()?.iter().map(|&v| v as f64).collect(),
            DType::I32 => self.to_vec::<i32>()?.iter().map(|&v| v as f64).collect(),
            DType::U32 => self.to_vec::<u32>()?.iter().map(|&v| v as f64).collect(),
            DType::I64 => self.to_vec::<i64>()?.iter().map(|&v| v as f64).collect(),
            DType::F32 => self.to_vec::<f32>()?.iter().map(|&v| v as f64).collect(),
            DType::F64 => self.to_vec::<f64>()?,
            DType::C64 | DType::C128 => {
                return Err(Error::Unsupported("reading a complex array as real lanes"))
            }
        })
    }

    fn complex_lanes(&self) -> Result<Vec<Complex<f64>>> {
        Ok(match self.dtype {
            DType::C64 => self
                .to_vec::<Complex<f32>>()?
                .iter()
                .map(|c| Complex::new(c.re as f64, c.im as f64))
                .collect(),
            DType::C128 => self.to_vec::<Complex<f64>>()?,
            _ => return Err(Error::Unsupported("reading a real array as complex lanes")),
        })
    }
}

fn from_lanes<T: Element>(shape: &[usize], lanes: impl Iterator<Item = T>) -> Result<HostArray> {
    let data: Vec<T> = lanes.collect();
    HostArray::from_slice(&data, shape)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_round_trip() {
        let arr = HostArray::from_slice(&[1.0f32, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
        assert_eq!(arr.dtype(), DType::F32);
        assert_eq!(arr.nbytes(), 16);
        assert_eq!(arr.to_vec::<f32>().unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn shape_mismatch_rejected() {
        assert!(HostArray::from_slice(&[1.0f32, 2.0], &[3]).is_err());
        assert!(HostArray::from_bytes(vec![0u8; 7], DType::F32, &[2]).is_err());
    }

    #[test]
    fn cast_real_to_real() {
        let arr = HostArray::from_slice(&[1.9f64, -2.1], &[2]).unwrap();
        let ints = arr.cast(DType::I32).unwrap();
        assert_eq!(ints.to_vec::<i32>().unwrap(), vec![1, -2]);
    }

    #[test]
    fn cast_real_to_complex_and_back_is_rejected() {
        let arr = HostArray::from_slice(&[1.0f32, 2.0], &[2]).unwrap();
        let c = arr.cast(DType::C64).unwrap();
        let vals = c.to_vec::<Complex<f32>>().unwrap();
        assert_eq!(vals[1], Complex::new(2.0, 0.0));
        assert!(c.cast(DType::F32).is_err());
    }

    #[test]
    fn zeros_are_zero() {
        let arr = HostArray::zeros(&[3], DType::I64);
        assert_eq!(arr.to_vec::<i64>().unwrap(), vec![0, 0, 0]);
    }
}
