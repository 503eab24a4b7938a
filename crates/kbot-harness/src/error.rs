use kbot_core::CoreError;
use kbot_kernels::DeviceError;

/// Every way a challenge creation or evaluation can fail.
///
/// User-caused failures (bad source, wrong answers, bad arguments) are
/// separated from operational ones so callers can report them differently.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HarnessError {
    #[error("compilation of '{name}' failed:\n{log}")]
    Compile { name: String, log: String },

    #[error("unsupported kernel type '{0}', expected one of: CUDA, PTX")]
    UnsupportedKernelType(String),

    #[error("device out of memory in test case {case}: requested {requested} bytes, {available} available")]
    ResourceExhausted {
        case: usize,
        requested: usize,
        available: usize,
    },

    #[error("test case {case} failed at element {index}: got {actual}, expected {expected}")]
    Correctness {
        case: usize,
        index: usize,
        actual: f64,
        expected: f64,
    },

    #[error("malformed test suite: {0}")]
    MalformedSuite(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Device(DeviceError),

    #[error("device job did not complete: {0}")]
    Internal(String),
}

impl HarnessError {
    /// Attach the test case being processed to a device error.
    pub fn in_case(err: DeviceError, case: usize) -> Self {
        match err {
            DeviceError::ResourceExhausted { requested, available } => {
                HarnessError::ResourceExhausted { case, requested, available }
            }
            other => other.into(),
        }
    }

    /// Build a `MalformedSuite`, logging it: a stored suite that cannot be
    /// decoded means the store itself is inconsistent.
    pub fn malformed(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        tracing::error!("internal consistency: malformed test suite: {}", msg);
        HarnessError::MalformedSuite(msg)
    }

    /// Whether the same request may succeed if retried later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            HarnessError::ResourceExhausted { .. }
                | HarnessError::Device(DeviceError::ResourceExhausted { .. })
        )
    }

    /// Whether the failure is attributable to the submitted kernel or request.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            HarnessError::Compile { .. }
                | HarnessError::UnsupportedKernelType(_)
                | HarnessError::Correctness { .. }
                | HarnessError::InvalidArgument(_)
                | HarnessError::Device(DeviceError::Launch(_))
                | HarnessError::Device(DeviceError::SizeMismatch { .. })
        )
    }

    /// Stable machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            HarnessError::Compile { .. } => "compile_error",
            HarnessError::UnsupportedKernelType(_) => "unsupported_kernel_type",
            HarnessError::ResourceExhausted { .. } => "resource_exhausted",
            HarnessError::Correctness { .. } => "correctness_error",
            HarnessError::MalformedSuite(_) => "malformed_suite",
            HarnessError::InvalidArgument(_) => "invalid_argument",
            HarnessError::Config(_) => "config_error",
            HarnessError::Device(DeviceError::ResourceExhausted { .. }) => "resource_exhausted",
            HarnessError::Device(DeviceError::Launch(_)) => "launch_error",
            HarnessError::Device(_) => "device_error",
            HarnessError::Internal(_) => "internal_error",
        }
    }
}

impl From<DeviceError> for HarnessError {
    fn from(err: DeviceError) -> Self {
        match err {
            DeviceError::Compile { name, log } => HarnessError::Compile { name, log },
            DeviceError::EntryPointNotFound { entry } => HarnessError::Compile {
                log: format!("error: entry point '{entry}' not found in compiled module"),
                name: entry,
            },
            DeviceError::UnsupportedKernelType(tag) => HarnessError::UnsupportedKernelType(tag),
            other => HarnessError::Device(other),
        }
    }
}

impl From<CoreError> for HarnessError {
    fn from(err: CoreError) -> Self {
        HarnessError::InvalidArgument(err.to_string())
    }
}
