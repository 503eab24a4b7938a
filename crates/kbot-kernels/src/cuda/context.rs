//! CUDA device context management.
//!
//! Lazily initialized `CudaDevice` handles, one per GPU index.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use cudarc::driver::sys::CUresult;
use cudarc::driver::{CudaDevice, DriverError};
use parking_lot::Mutex;

use crate::DeviceError;

static DEVICES: OnceLock<Mutex<HashMap<usize, Arc<CudaDevice>>>> = OnceLock::new();

fn devices() -> &'static Mutex<HashMap<usize, Arc<CudaDevice>>> {
    DEVICES.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Get or create the handle for GPU `device_idx`.
pub fn get_device(device_idx: usize) -> Result<Arc<CudaDevice>, DeviceError> {
    let mut map = devices().lock();
    if let Some(dev) = map.get(&device_idx) {
        return Ok(Arc::clone(dev));
    }
    let dev = CudaDevice::new(device_idx)
        .map_err(|e| DeviceError::NotAvailable(format!("CUDA (device {device_idx}: {e})")))?;
    map.insert(device_idx, Arc::clone(&dev));
    Ok(dev)
}

/// Whether any CUDA device can be opened.
pub fn is_cuda_available() -> bool {
    get_device(0).is_ok()
}

/// Number of CUDA devices visible to the driver.
pub fn device_count() -> usize {
    (0..16).take_while(|&i| get_device(i).is_ok()).count()
}

/// Free device memory in bytes, or 0 if the driver cannot say.
pub(crate) fn free_memory(device: &CudaDevice) -> usize {
    if device.bind_to_thread().is_err() {
        return 0;
    }
    cudarc::driver::result::mem_get_info()
        .map(|(free, _total)| free)
        .unwrap_or(0)
}

/// Map a driver error, turning out-of-memory into `ResourceExhausted`.
pub(crate) fn map_alloc_error(device: &CudaDevice, requested: usize, err: DriverError) -> DeviceError {
    if err.0 == CUresult::CUDA_ERROR_OUT_OF_MEMORY {
        DeviceError::ResourceExhausted { requested, available: free_memory(device) }
    } else {
        DeviceError::Transfer(format!("alloc_zeros({requested} bytes): {err}"))
    }
}
