use crate::{CoreError, DType, Result, Shape};

/// A tensor living in host memory, stored as little-endian bytes.
///
/// This is what the harness uploads to and downloads from a device and what
/// the test-suite codec reads and writes. Values are decoded to `f64` only
/// for comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct HostTensor {
    dtype: DType,
    shape: Shape,
    data: Vec<u8>,
}

impl HostTensor {
    /// Wrap raw bytes, validating the length against `dtype` and `shape`.
    pub fn from_bytes(dtype: DType, shape: Shape, data: Vec<u8>) -> Result<Self> {
        let expected = dtype.checked_storage_bytes(&shape)?;
        if data.len() != expected {
            return Err(CoreError::ByteLength {
                dtype,
                shape,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { dtype, shape, data })
    }

    /// Encode `values` into a tensor of the given dtype and shape.
    pub fn from_f64(dtype: DType, shape: Shape, values: &[f64]) -> Result<Self> {
        Self::from_bytes(dtype, shape, dtype.encode(values))
    }

    /// A zero-filled tensor.
    pub fn zeros(dtype: DType, shape: Shape) -> Result<Self> {
        let data = vec![0u8; dtype.checked_storage_bytes(&shape)?];
        Ok(Self { dtype, shape, data })
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn numel(&self) -> usize {
        self.shape.numel()
    }

    /// Raw little-endian bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Size of the backing storage in bytes.
    pub fn nbytes(&self) -> usize {
        self.data.len()
    }

    /// Decode every element to `f64`.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        self.dtype.decode(&self.data)
    }

    /// Check that `other` has the same dtype and shape as `self`.
    pub fn check_layout(&self, other: &HostTensor) -> Result<()> {
        if self.dtype != other.dtype {
            return Err(CoreError::DTypeMismatch {
                expected: self.dtype,
                actual: other.dtype,
            });
        }
        if self.shape != other.shape {
            return Err(CoreError::ShapeMismatch {
                expected: self.shape.clone(),
                actual: other.shape.clone(),
            });
        }
        Ok(())
    }
}
