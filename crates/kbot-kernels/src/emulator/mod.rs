//! Emulated accelerator backed by host memory.
//!
//! Kernels are host functions registered by entry-point name. Compilation
//! runs the same source checks a real toolchain front-end would (entry point
//! declared for the dialect, `#error` directives) and then binds the entry
//! point to its registered host implementation. Device memory is a
//! capacity-limited pool, so allocation failure behaves like a real device
//! running out of memory.

pub mod builtins;
pub mod memory;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use kbot_core::LaunchGeometry;

use crate::compile::{declares_entry, error_directives, precheck};
use crate::{Accelerator, DeviceBuffer, DeviceError, KernelType, LaunchReport};

pub use memory::EmulatedBuffer;
use memory::{Pool, SharedPool};

/// Default emulated memory capacity (1 GiB).
pub const DEFAULT_CAPACITY: usize = 1 << 30;

type KernelFn = dyn Fn(&LaunchGeometry, &mut [Vec<u8>]) -> Result<Option<u64>, String> + Send + Sync;

/// A host implementation of a kernel entry point.
///
/// Receives one byte vector per launch argument and may return an
/// operation estimate for the launch.
#[derive(Clone)]
pub struct HostKernel {
    f: Arc<KernelFn>,
}

impl HostKernel {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&LaunchGeometry, &mut [Vec<u8>]) -> Result<Option<u64>, String> + Send + Sync + 'static,
    {
        Self { f: Arc::new(f) }
    }

    pub fn call(&self, geometry: &LaunchGeometry, args: &mut [Vec<u8>]) -> Result<Option<u64>, String> {
        (self.f)(geometry, args)
    }
}

impl fmt::Debug for HostKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HostKernel")
    }
}

/// A compiled program on the emulated device.
#[derive(Debug, Clone)]
pub struct EmulatedProgram {
    entry: String,
    kernel_type: KernelType,
    kernel: HostKernel,
}

impl EmulatedProgram {
    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn kernel_type(&self) -> KernelType {
        self.kernel_type
    }
}

/// Host-memory accelerator with a registry of host kernels.
pub struct EmulatedDevice {
    registry: HashMap<String, HostKernel>,
    pool: SharedPool,
    compiled: u64,
    launched: u64,
}

impl EmulatedDevice {
    /// An empty device with the default memory capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// An empty device with `capacity` bytes of memory.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            registry: HashMap::new(),
            pool: Pool::shared(capacity),
            compiled: 0,
            launched: 0,
        }
    }

    /// A device with the built-in kernels registered.
    pub fn with_builtins() -> Self {
        Self::new().with_builtin_kernels()
    }

    /// Register every built-in kernel.
    pub fn with_builtin_kernels(mut self) -> Self {
        for (name, kernel) in builtins::all() {
            self.register(name, kernel);
        }
        self
    }

    /// Register (or replace) the host implementation of `entry`.
    pub fn register(&mut self, entry: &str, kernel: HostKernel) -> &mut Self {
        self.registry.insert(entry.to_string(), kernel);
        self
    }

    /// Builder form of [`register`](Self::register).
    pub fn with_kernel(mut self, entry: &str, kernel: HostKernel) -> Self {
        self.register(entry, kernel);
        self
    }

    /// Entry points with a registered implementation, sorted.
    pub fn kernels(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.registry.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Bytes currently allocated.
    pub fn memory_used(&self) -> usize {
        self.pool.lock().used()
    }

    /// Number of live buffers.
    pub fn live_buffers(&self) -> usize {
        self.pool.lock().live_buffers()
    }

    /// Number of successful compilations so far.
    pub fn compile_count(&self) -> u64 {
        self.compiled
    }

    /// Number of completed launches so far.
    pub fn launch_count(&self) -> u64 {
        self.launched
    }
}

impl Default for EmulatedDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl Accelerator for EmulatedDevice {
    type Program = EmulatedProgram;
    type Buffer = EmulatedBuffer;

    fn describe(&self) -> String {
        format!("emulator ({} kernels)", self.registry.len())
    }

    fn compile(
        &mut self,
        source: &str,
        kernel_type: KernelType,
        entry: &str,
    ) -> Result<EmulatedProgram, DeviceError> {
        precheck(source, entry)?;

        let errors = error_directives(source);
        if !errors.is_empty() {
            let log = errors
                .iter()
                .map(|(line, msg)| format!("{entry}({line}): error: #error directive: {msg}"))
                .collect::<Vec<_>>()
                .join("\n");
            return Err(DeviceError::Compile { name: entry.to_string(), log });
        }

        if !declares_entry(source, kernel_type, entry) {
            let log = match kernel_type {
                KernelType::Cuda => format!("error: no __global__ function named \"{entry}\" in source"),
                KernelType::Ptx => format!("error: no .entry directive for \"{entry}\" in source"),
            };
            return Err(DeviceError::Compile { name: entry.to_string(), log });
        }

        let kernel = self
            .registry
            .get(entry)
            .cloned()
            .ok_or_else(|| DeviceError::EntryPointNotFound { entry: entry.to_string() })?;

        self.compiled += 1;
        tracing::debug!("emulator: compiled {} ({})", entry, kernel_type);
        Ok(EmulatedProgram { entry: entry.to_string(), kernel_type, kernel })
    }

    fn alloc(&mut self, nbytes: usize) -> Result<EmulatedBuffer, DeviceError> {
        EmulatedBuffer::zeros(&self.pool, nbytes)
    }

    fn upload(&mut self, buffer: &mut EmulatedBuffer, data: &[u8]) -> Result<(), DeviceError> {
        if data.len() != buffer.len() {
            return Err(DeviceError::SizeMismatch { buffer: buffer.len(), data: data.len() });
        }
        let mut pool = self.pool.lock();
        pool.slab_mut(buffer.id)?.copy_from_slice(data);
        Ok(())
    }

    fn download(&mut self, buffer: &EmulatedBuffer) -> Result<Vec<u8>, DeviceError> {
        let pool = self.pool.lock();
        Ok(pool.slab(buffer.id)?.clone())
    }

    fn launch(
        &mut self,
        program: &EmulatedProgram,
        geometry: &LaunchGeometry,
        args: &[&EmulatedBuffer],
    ) -> Result<LaunchReport, DeviceError> {
        geometry
            .validate()
            .map_err(|e| DeviceError::Launch(e.to_string()))?;

        let mut data = {
            let pool = self.pool.lock();
            args.iter()
                .map(|b| pool.slab(b.id).cloned())
                .collect::<Result<Vec<_>, _>>()?
        };

        let start = Instant::now();
        let ops = program
            .kernel
            .call(geometry, &mut data)
            .map_err(|msg| DeviceError::Launch(format!("{}: {msg}", program.entry)))?;
        let elapsed = start.elapsed();

        let mut pool = self.pool.lock();
        for (i, (buffer, bytes)) in args.iter().zip(data).enumerate() {
            if bytes.len() != buffer.len() {
                return Err(DeviceError::Launch(format!(
                    "{}: argument {i} was resized from {} to {} bytes",
                    program.entry,
                    buffer.len(),
                    bytes.len()
                )));
            }
            *pool.slab_mut(buffer.id)? = bytes;
        }

        self.launched += 1;
        Ok(LaunchReport { elapsed, ops })
    }
}
