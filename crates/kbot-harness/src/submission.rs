//! A kernel as submitted: source, dialect, entry point and launch geometry.

use kbot_core::LaunchGeometry;
use kbot_kernels::{Accelerator, KernelType};

use crate::Result;

#[derive(Debug, Clone, PartialEq)]
pub struct KernelSubmission {
    pub source: String,
    pub kernel_type: KernelType,
    pub entry: String,
    pub geometry: LaunchGeometry,
}

impl KernelSubmission {
    pub fn new(
        source: impl Into<String>,
        kernel_type: KernelType,
        entry: impl Into<String>,
        geometry: LaunchGeometry,
    ) -> Self {
        Self {
            source: source.into(),
            kernel_type,
            entry: entry.into(),
            geometry,
        }
    }

    /// Compile on `device`.
    pub fn compile<A: Accelerator>(&self, device: &mut A) -> Result<A::Program> {
        self.geometry.validate()?;
        let program = device.compile(&self.source, self.kernel_type, &self.entry)?;
        Ok(program)
    }
}
