use std::fmt;
use std::str::FromStr;

use crate::DeviceError;

/// Kernel source dialects the harness can compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelType {
    /// CUDA C++ source, compiled at runtime by NVRTC
    Cuda,
    /// PTX assembly, loaded directly by the driver
    Ptx,
}

impl KernelType {
    pub const ALL: [KernelType; 2] = [KernelType::Cuda, KernelType::Ptx];

    /// Tag as shown to users and stored alongside submissions.
    pub fn as_str(&self) -> &'static str {
        match self {
            KernelType::Cuda => "CUDA",
            KernelType::Ptx => "PTX",
        }
    }
}

impl FromStr for KernelType {
    type Err = DeviceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CUDA" => Ok(KernelType::Cuda),
            "PTX" => Ok(KernelType::Ptx),
            _ => Err(DeviceError::UnsupportedKernelType(s.to_string())),
        }
    }
}

impl fmt::Display for KernelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
