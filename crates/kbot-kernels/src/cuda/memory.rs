//! Device memory allocation and host↔device transfer.

use std::sync::Arc;

use cudarc::driver::{CudaDevice, CudaSlice};

use super::context::map_alloc_error;
use crate::{DeviceBuffer, DeviceError};

/// Raw bytes on a CUDA device. The allocation is freed on drop.
pub struct CudaBuffer {
    pub(crate) inner: CudaSlice<u8>,
    nbytes: usize,
}

impl CudaBuffer {
    /// Allocate zeroed device memory.
    pub fn zeros(device: &Arc<CudaDevice>, nbytes: usize) -> Result<Self, DeviceError> {
        // cudaMalloc rejects zero-byte requests
        let inner = device
            .alloc_zeros::<u8>(nbytes.max(1))
            .map_err(|e| map_alloc_error(device, nbytes, e))?;
        Ok(Self { inner, nbytes })
    }

    /// Copy host bytes into this buffer (H2D).
    pub fn copy_from_host(&mut self, device: &Arc<CudaDevice>, data: &[u8]) -> Result<(), DeviceError> {
        if data.len() != self.nbytes {
            return Err(DeviceError::SizeMismatch { buffer: self.nbytes, data: data.len() });
        }
        if data.is_empty() {
            return Ok(());
        }
        device
            .htod_sync_copy_into(data, &mut self.inner)
            .map_err(|e| DeviceError::Transfer(format!("htod_copy({} bytes): {e}", data.len())))
    }

    /// Copy this buffer back to the host (D2H).
    pub fn to_host(&self, device: &Arc<CudaDevice>) -> Result<Vec<u8>, DeviceError> {
        let mut data = device
            .dtoh_sync_copy(&self.inner)
            .map_err(|e| DeviceError::Transfer(format!("dtoh_sync_copy: {e}")))?;
        data.truncate(self.nbytes);
        Ok(data)
    }

    pub fn as_cuda_slice(&self) -> &CudaSlice<u8> {
        &self.inner
    }
}

impl std::fmt::Debug for CudaBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CudaBuffer").field("nbytes", &self.nbytes).finish()
    }
}

impl DeviceBuffer for CudaBuffer {
    fn len(&self) -> usize {
        self.nbytes
    }
}
