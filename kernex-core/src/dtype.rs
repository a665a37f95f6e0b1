//! Element data types and scalar values.

use std::fmt;

use num_complex::Complex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Element type of a device or host array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    U8,
    I32,
    U32,
    I64,
    F32,
    F64,
    /// Complex number with `f32` components.
    C64,
    /// Complex number with `f64` components.
    C128,
}

impl DType {
    /// Size of a single element in bytes.
    pub fn size_bytes(self) -> usize {
        match self {
            DType::U8 => 1,
            DType::I32 | DType::U32 | DType::F32 => 4,
            DType::I64 | DType::F64 | DType::C64 => 8,
            DType::C128 => 16,
        }
    }

    pub fn is_complex(self) -> bool {
        matches!(self, DType::C64 | DType::C128)
    }

    /// Total byte size of an array of this dtype with the given shape.
    pub fn byte_size(self, shape: &[usize]) -> usize {
        self.size_bytes() * shape.iter().product::<usize>()
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DType::U8 => "u8",
            DType::I32 => "i32",
            DType::U32 => "u32",
            DType::I64 => "i64",
            DType::F32 => "f32",
            DType::F64 => "f64",
            DType::C64 => "c64",
            DType::C128 => "c128",
        };
        f.write_str(name)
    }
}

/// Maps a Rust element type to its [`DType`] tag.
///
/// Implemented for the plain-old-data types a buffer can hold; used by the
/// typed constructors and accessors of host and device arrays.
pub trait Element: bytemuck::Pod {
    const DTYPE: DType;
}

impl Element for u8 {
    const DTYPE: DType = DType::U8;
}
impl Element for i32 {
    const DTYPE: DType = DType::I32;
}
impl Element for u32 {
    const DTYPE: DType = DType::U32;
}
impl Element for i64 {
    const DTYPE: DType = DType::I64;
}
impl Element for f32 {
    const DTYPE: DType = DType::F32;
}
impl Element for f64 {
    const DTYPE: DType = DType::F64;
}
impl Element for Complex<f32> {
    const DTYPE: DType = DType::C64;
}
impl Element for Complex<f64> {
    const DTYPE: DType = DType::C128;
}

/// A typed scalar value passed to a kernel by value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    U8(u8),
    I32(i32),
    U32(u32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl Scalar {
    pub fn dtype(self) -> DType {
        match self {
            Scalar::U8(_) => DType::U8,
            Scalar::I32(_) => DType::I32,
            Scalar::U32(_) => DType::U32,
            Scalar::I64(_) => DType::I64,
            Scalar::F32(_) => DType::F32,
            Scalar::F64(_) => DType::F64,
        }
    }

    /// Converts the value to the declared native scalar type.
    ///
    /// Integer/float conversions follow Rust `as` semantics; complex
    /// targets are rejected because scalars carry no imaginary part.
    pub fn cast(self, to: DType) -> Result<Scalar> {
        if to.is_complex() {
            return Err(Error::Unsupported("casting a scalar to a complex dtype"));
        }
        let v = self.as_f64();
        Ok(match to {
            DType::U8 => Scalar::U8(v as u8),
            DType::I32 => Scalar::I32(v as i32),
            DType::U32 => Scalar::U32(v as u32),
            DType::I64 => Scalar::I64(v as i64),
            DType::F32 => Scalar::F32(v as f32),
            DType::F64 => Scalar::F64(v),
            DType::C64 | DType::C128 => unreachable!(),
        })
    }

    fn as_f64(self) -> f64 {
        match self {
            Scalar::U8(v) => v as f64,
            Scalar::I32(v) => v as f64,
            Scalar::U32(v) => v as f64,
            Scalar::I64(v) => v as f64,
            Scalar::F32(v) => v as f64,
            Scalar::F64(v) => v,
        }
    }

    /// Integer value as a thread count, if non-negative and integral.
    pub fn as_usize(self) -> Option<usize> {
        match self {
            Scalar::U8(v) => Some(v as usize),
            Scalar::U32(v) => Some(v as usize),
            Scalar::I32(v) => usize::try_from(v).ok(),
            Scalar::I64(v) => usize::try_from(v).ok(),
            Scalar::F32(_) | Scalar::F64(_) => None,
        }
    }

    /// Little-endian byte representation, as uploaded for value arguments.
    pub fn to_le_bytes(self) -> Vec<u8> {
        match self {
            Scalar::U8(v) => vec![v],
            Scalar::I32(v) => v.to_le_bytes().to_vec(),
            Scalar::U32(v) => v.to_le_bytes().to_vec(),
            Scalar::I64(v) => v.to_le_bytes().to_vec(),
            Scalar::F32(v) => v.to_le_bytes().to_vec(),
            Scalar::F64(v) => v.to_le_bytes().to_vec(),
        }
    }
}

impl From<u8> for Scalar {
    fn from(v: u8) -> Self {
        Scalar::U8(v)
    }
}
impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Scalar::I32(v)
    }
}
impl From<u32> for Scalar {
    fn from(v: u32) -> Self {
        Scalar::U32(v)
    }
}
impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::I64(v)
    }
}
impl From<f32> for Scalar {
    fn from(v: f32) -> Self {
        Scalar::F32(v)
    }
}
impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::F64(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dtype_sizes() {
        assert_eq!(DType::U8.size_bytes(), 1);
        assert_eq!(DType::F32.size_bytes(), 4);
        assert_eq!(DType::F64.size_bytes(), 8);
        assert_eq!(DType::C64.size_bytes(), 8);
        assert_eq!(DType::C128.size_bytes(), 16);
        assert_eq!(DType::F32.byte_size(&[4, 8]), 128);
    }

    #[test]
    fn scalar_casts() {
        assert_eq!(Scalar::F64(3.7).cast(DType::I32).unwrap(), Scalar::I32(3));
        assert_eq!(Scalar::I32(7).cast(DType::F32).unwrap(), Scalar::F32(7.0));
        assert!(Scalar::F32(1.0).cast(DType::C64).is_err());
    }

    #[test]
    fn scalar_thread_counts() {
        assert_eq!(Scalar::U32(256).as_usize(), Some(256));
        assert_eq!(Scalar::I32(-1).as_usize(), None);
        assert_eq!(Scalar::F32(8.0).as_usize(), None);
    }

    #[test]
    fn dtype_serde_names() {
        let dt: DType = serde_json::from_str("\"f32\"").unwrap();
        assert_eq!(dt, DType::F32);
        assert_eq!(serde_json::to_string(&DType::C64).unwrap(), "\"c64\"");
    }
}
