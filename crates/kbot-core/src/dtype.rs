use std::fmt;
use std::str::FromStr;

use crate::{CoreError, Shape};

/// Element types a challenge can declare for its tensors.
///
/// Challenges are floating-point workloads; integer-valued distributions
/// are stored in one of these float types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    /// 16-bit IEEE 754 half-precision float
    F16,
    /// 32-bit IEEE 754 single-precision float
    F32,
    /// 64-bit IEEE 754 double-precision float
    F64,
}

impl DType {
    /// All supported dtypes, in display order.
    pub const ALL: [DType; 3] = [DType::F16, DType::F32, DType::F64];

    /// Size in bytes of a single element.
    pub fn element_size(&self) -> usize {
        match self {
            DType::F16 => 2,
            DType::F32 => 4,
            DType::F64 => 8,
        }
    }

    /// Number of bytes needed to store `n` elements of this dtype,
    /// saturating at `usize::MAX`.
    pub fn storage_bytes(&self, n: usize) -> usize {
        self.element_size().saturating_mul(n)
    }

    /// Bytes needed for a tensor of `shape`, or `TooLarge` on overflow.
    pub fn checked_storage_bytes(&self, shape: &Shape) -> crate::Result<usize> {
        shape
            .checked_numel()?
            .checked_mul(self.element_size())
            .ok_or_else(|| CoreError::TooLarge(format!("{self} tensor of shape {shape} exceeds the address space")))
    }

    /// Name used by challenge authors (`half`, `single`, `double`).
    pub fn challenge_name(&self) -> &'static str {
        match self {
            DType::F16 => "half",
            DType::F32 => "single",
            DType::F64 => "double",
        }
    }

    /// Encode `values` as little-endian bytes of this dtype.
    pub fn encode(&self, values: &[f64]) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.storage_bytes(values.len()));
        match self {
            DType::F16 => {
                for &v in values {
                    out.extend_from_slice(&half::f16::from_f64(v).to_le_bytes());
                }
            }
            DType::F32 => {
                for &v in values {
                    out.extend_from_slice(&(v as f32).to_le_bytes());
                }
            }
            DType::F64 => {
                for &v in values {
                    out.extend_from_slice(&v.to_le_bytes());
                }
            }
        }
        out
    }

    /// Decode little-endian bytes of this dtype into `f64` values.
    ///
    /// Trailing bytes that do not form a whole element are ignored; callers
    /// validate lengths up front.
    pub fn decode(&self, bytes: &[u8]) -> Vec<f64> {
        match self {
            DType::F16 => bytes
                .chunks_exact(2)
                .map(|b| half::f16::from_le_bytes([b[0], b[1]]).to_f64())
                .collect(),
            DType::F32 => bytes
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64)
                .collect(),
            DType::F64 => bytes
                .chunks_exact(8)
                .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
                .collect(),
        }
    }
}

impl FromStr for DType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "half" | "f16" | "float16" => Ok(DType::F16),
            "single" | "f32" | "float32" | "float" => Ok(DType::F32),
            "double" | "f64" | "float64" => Ok(DType::F64),
            _ => Err(CoreError::UnknownDType(s.to_string())),
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DType::F16 => write!(f, "f16"),
            DType::F32 => write!(f, "f32"),
            DType::F64 => write!(f, "f64"),
        }
    }
}
