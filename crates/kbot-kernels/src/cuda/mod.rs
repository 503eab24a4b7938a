//! CUDA backend.
//!
//! Provides:
//! - Device context management (lazy singleton per GPU)
//! - Device memory allocation and host↔device transfers
//! - Runtime compilation of CUDA C++ (NVRTC) and PTX loading
//! - [`CudaAccelerator`], the [`Accelerator`](crate::Accelerator) over all of the above

pub mod context;
pub mod memory;
pub mod launch;

use std::sync::Arc;

use cudarc::driver::CudaDevice;
use kbot_core::LaunchGeometry;

use crate::{Accelerator, DeviceError, KernelType, LaunchReport};

pub use context::{device_count, is_cuda_available};
pub use launch::CudaProgram;
pub use memory::CudaBuffer;

/// One CUDA device, driven through cudarc.
pub struct CudaAccelerator {
    device: Arc<CudaDevice>,
    device_idx: usize,
}

impl CudaAccelerator {
    /// Open GPU `device_idx`.
    pub fn new(device_idx: usize) -> Result<Self, DeviceError> {
        let device = context::get_device(device_idx)?;
        tracing::info!("cuda: opened device {}", device_idx);
        Ok(Self { device, device_idx })
    }

    pub fn device_idx(&self) -> usize {
        self.device_idx
    }
}

impl Accelerator for CudaAccelerator {
    type Program = CudaProgram;
    type Buffer = CudaBuffer;

    fn describe(&self) -> String {
        format!("cuda:{}", self.device_idx)
    }

    fn compile(
        &mut self,
        source: &str,
        kernel_type: KernelType,
        entry: &str,
    ) -> Result<CudaProgram, DeviceError> {
        let module = launch::module_name(self.device_idx, source, kernel_type, entry);
        launch::load_program(&self.device, &module, source, kernel_type, entry)
    }

    fn alloc(&mut self, nbytes: usize) -> Result<CudaBuffer, DeviceError> {
        CudaBuffer::zeros(&self.device, nbytes)
    }

    fn upload(&mut self, buffer: &mut CudaBuffer, data: &[u8]) -> Result<(), DeviceError> {
        buffer.copy_from_host(&self.device, data)
    }

    fn download(&mut self, buffer: &CudaBuffer) -> Result<Vec<u8>, DeviceError> {
        buffer.to_host(&self.device)
    }

    fn launch(
        &mut self,
        program: &CudaProgram,
        geometry: &LaunchGeometry,
        args: &[&CudaBuffer],
    ) -> Result<LaunchReport, DeviceError> {
        launch::launch(&self.device, program, geometry, args)
    }
}
