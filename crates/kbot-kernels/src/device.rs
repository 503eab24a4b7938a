//! The device abstraction every backend implements.

use std::time::Duration;

use kbot_core::LaunchGeometry;

use crate::KernelType;

/// A region of device memory with a size fixed at allocation.
///
/// Dropping a buffer releases its memory.
pub trait DeviceBuffer: Send {
    /// Number of bytes.
    fn len(&self) -> usize;

    /// Whether this buffer is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Outcome of a completed kernel launch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaunchReport {
    /// Wall-clock time from launch until the device reported completion.
    pub elapsed: Duration,
    /// Operation estimate, when the backend can provide one.
    pub ops: Option<u64>,
}

/// A single accelerator: its compiler, its allocator and its launch queue.
///
/// Implementations have no internal concurrency control. Callers hold the
/// device exclusively (`&mut self`) for the whole compile → allocate →
/// upload → launch → download → free sequence of a request, and every
/// method blocks until the device confirms completion.
pub trait Accelerator: Send {
    /// A compiled, loaded program. Only valid on the device that built it.
    type Program: Send;
    /// Device memory owned by the caller.
    type Buffer: DeviceBuffer;

    /// Short human-readable description (backend and device index).
    fn describe(&self) -> String;

    /// Compile `source` of the given dialect and resolve `entry`.
    fn compile(
        &mut self,
        source: &str,
        kernel_type: KernelType,
        entry: &str,
    ) -> Result<Self::Program, DeviceError>;

    /// Allocate `nbytes` of zeroed device memory.
    fn alloc(&mut self, nbytes: usize) -> Result<Self::Buffer, DeviceError>;

    /// Copy host bytes into `buffer` (H2D). `data` must match the buffer size.
    fn upload(&mut self, buffer: &mut Self::Buffer, data: &[u8]) -> Result<(), DeviceError>;

    /// Copy `buffer` back to the host (D2H).
    fn download(&mut self, buffer: &Self::Buffer) -> Result<Vec<u8>, DeviceError>;

    /// Release a buffer.
    fn free(&mut self, buffer: Self::Buffer) {
        drop(buffer);
    }

    /// Launch `program` with one pointer argument per buffer and wait for it
    /// to finish.
    fn launch(
        &mut self,
        program: &Self::Program,
        geometry: &LaunchGeometry,
        args: &[&Self::Buffer],
    ) -> Result<LaunchReport, DeviceError>;

    /// Allocate a buffer sized for `data` and upload it.
    fn alloc_from_host(&mut self, data: &[u8]) -> Result<Self::Buffer, DeviceError> {
        let mut buffer = self.alloc(data.len())?;
        self.upload(&mut buffer, data)?;
        Ok(buffer)
    }
}

/// Device-level errors shared by all backends.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DeviceError {
    #[error("no {0} device available")]
    NotAvailable(String),

    #[error("unsupported kernel type '{0}', expected one of: CUDA, PTX")]
    UnsupportedKernelType(String),

    #[error("compilation of '{name}' failed:\n{log}")]
    Compile { name: String, log: String },

    #[error("entry point '{entry}' not found")]
    EntryPointNotFound { entry: String },

    #[error("device out of memory: requested {requested} bytes, {available} available")]
    ResourceExhausted { requested: usize, available: usize },

    #[error("buffer holds {buffer} bytes but {data} bytes were supplied")]
    SizeMismatch { buffer: usize, data: usize },

    #[error("kernel launch failed: {0}")]
    Launch(String),

    #[error("device transfer failed: {0}")]
    Transfer(String),
}
