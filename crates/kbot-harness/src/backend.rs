//! Runtime selection of the device behind the queue.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use kbot_kernels::EmulatedDevice;
#[cfg(feature = "cuda")]
use kbot_kernels::cuda::CudaAccelerator;

use crate::generator::{GeneratedSuite, SuiteRequest};
use crate::runner::Evaluation;
use crate::{DeviceQueue, HarnessConfig, HarnessError, KernelSubmission, Result};

/// Which accelerator to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Emulator,
    Cuda,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Emulator => "emulator",
            BackendKind::Cuda => "cuda",
        }
    }
}

impl FromStr for BackendKind {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "emulator" | "emu" | "host" => Ok(BackendKind::Emulator),
            "cuda" | "gpu" => Ok(BackendKind::Cuda),
            _ => Err(HarnessError::InvalidArgument(format!(
                "unknown backend '{s}', expected emulator or cuda"
            ))),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A device queue over whichever accelerator was selected.
#[derive(Clone)]
pub enum Backend {
    Emulator(DeviceQueue<EmulatedDevice>),
    #[cfg(feature = "cuda")]
    Cuda(DeviceQueue<CudaAccelerator>),
}

impl Backend {
    /// Open the selected device.
    pub fn open(kind: BackendKind, config: HarnessConfig) -> Result<Self> {
        config.validate()?;
        match kind {
            BackendKind::Emulator => Ok(Self::emulator(config)),
            #[cfg(feature = "cuda")]
            BackendKind::Cuda => {
                let device = CudaAccelerator::new(config.device_index)?;
                Ok(Backend::Cuda(DeviceQueue::new(device, config)))
            }
            #[cfg(not(feature = "cuda"))]
            BackendKind::Cuda => Err(HarnessError::InvalidArgument(
                "this build has no CUDA support (enable the `cuda` feature)".into(),
            )),
        }
    }

    /// The emulated device with the built-in kernels.
    pub fn emulator(config: HarnessConfig) -> Self {
        let device = EmulatedDevice::with_capacity(config.emulator_capacity).with_builtin_kernels();
        Backend::Emulator(DeviceQueue::new(device, config))
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::Emulator(_) => BackendKind::Emulator,
            #[cfg(feature = "cuda")]
            Backend::Cuda(_) => BackendKind::Cuda,
        }
    }

    pub fn config(&self) -> &HarnessConfig {
        match self {
            Backend::Emulator(q) => q.config(),
            #[cfg(feature = "cuda")]
            Backend::Cuda(q) => q.config(),
        }
    }

    /// Device description. Waits for the device lock.
    pub fn describe(&self) -> String {
        use kbot_kernels::Accelerator;
        match self {
            Backend::Emulator(q) => q.with_device(|d, _| d.describe()),
            #[cfg(feature = "cuda")]
            Backend::Cuda(q) => q.with_device(|d, _| d.describe()),
        }
    }

    pub async fn create_challenge(
        &self,
        reference: KernelSubmission,
        request: SuiteRequest,
    ) -> Result<GeneratedSuite> {
        match self {
            Backend::Emulator(q) => q.create_challenge(reference, request).await,
            #[cfg(feature = "cuda")]
            Backend::Cuda(q) => q.create_challenge(reference, request).await,
        }
    }

    pub async fn evaluate(&self, submission: KernelSubmission, blob: Arc<Vec<u8>>) -> Result<Evaluation> {
        match self {
            Backend::Emulator(q) => q.evaluate(submission, blob).await,
            #[cfg(feature = "cuda")]
            Backend::Cuda(q) => q.evaluate(submission, blob).await,
        }
    }

    /// Blocking variants for callers outside an async runtime.
    pub fn create_challenge_blocking(
        &self,
        reference: &KernelSubmission,
        request: &SuiteRequest,
    ) -> Result<GeneratedSuite> {
        match self {
            Backend::Emulator(q) => {
                q.with_device(|d, c| crate::queue::create_challenge(d, reference, request, c))
            }
            #[cfg(feature = "cuda")]
            Backend::Cuda(q) => {
                q.with_device(|d, c| crate::queue::create_challenge(d, reference, request, c))
            }
        }
    }

    pub fn evaluate_blocking(&self, submission: &KernelSubmission, blob: &[u8]) -> Result<Evaluation> {
        match self {
            Backend::Emulator(q) => q.with_device(|d, c| crate::queue::evaluate(d, submission, blob, c)),
            #[cfg(feature = "cuda")]
            Backend::Cuda(q) => q.with_device(|d, c| crate::queue::evaluate(d, submission, blob, c)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kind() {
        assert_eq!("Emulator".parse::<BackendKind>().unwrap(), BackendKind::Emulator);
        assert_eq!("cuda".parse::<BackendKind>().unwrap(), BackendKind::Cuda);
        assert!("rocm".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_emulator_backend() {
        let backend = Backend::open(BackendKind::Emulator, HarnessConfig::default()).unwrap();
        assert_eq!(backend.kind(), BackendKind::Emulator);
        assert!(backend.describe().starts_with("emulator"));
    }

    #[cfg(not(feature = "cuda"))]
    #[test]
    fn test_cuda_unavailable_without_feature() {
        assert!(matches!(
            Backend::open(BackendKind::Cuda, HarnessConfig::default()),
            Err(HarnessError::InvalidArgument(_))
        ));
    }
}
