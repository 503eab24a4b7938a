//! Runtime compilation and kernel launch.
//!
//! CUDA C++ goes through NVRTC; PTX is handed to the driver as-is. Modules are
//! named after a hash of what they contain, so resubmitting a program reuses
//! the loaded module and different programs with the same entry point never
//! collide.

use std::collections::hash_map::DefaultHasher;
use std::ffi::c_void;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Instant;

use cudarc::driver::{CudaDevice, CudaFunction, DeviceRepr, LaunchAsync, LaunchConfig};
use cudarc::nvrtc::{CompileError, Ptx};
use kbot_core::LaunchGeometry;

use super::memory::CudaBuffer;
use crate::compile::{declares_entry, precheck};
use crate::{DeviceError, KernelType, LaunchReport};

/// A loaded module and its resolved entry point.
#[derive(Debug, Clone)]
pub struct CudaProgram {
    module: String,
    entry: String,
    func: CudaFunction,
}

impl CudaProgram {
    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }
}

/// Module name for a program: equal inputs always map to the same name.
pub fn module_name(device_idx: usize, source: &str, kernel_type: KernelType, entry: &str) -> String {
    let mut hasher = DefaultHasher::new();
    source.hash(&mut hasher);
    kernel_type.hash(&mut hasher);
    entry.hash(&mut hasher);
    format!("kbot_{}_{:016x}", device_idx, hasher.finish())
}

/// Compile (or assemble) `source`, load it as `module` and resolve `entry`.
///
/// If `module` is already loaded on the device the compiled function is
/// reused and nothing is compiled.
pub fn load_program(
    device: &Arc<CudaDevice>,
    module: &str,
    source: &str,
    kernel_type: KernelType,
    entry: &str,
) -> Result<CudaProgram, DeviceError> {
    precheck(source, entry)?;

    if let Some(func) = device.get_func(module, entry) {
        tracing::debug!("cuda: reusing module {} for {}", module, entry);
        return Ok(CudaProgram { module: module.to_string(), entry: entry.to_string(), func });
    }

    let ptx = match kernel_type {
        KernelType::Cuda => cudarc::nvrtc::compile_ptx(source).map_err(|e| DeviceError::Compile {
            name: entry.to_string(),
            log: nvrtc_log(e),
        })?,
        KernelType::Ptx => {
            if !declares_entry(source, kernel_type, entry) {
                return Err(DeviceError::EntryPointNotFound { entry: entry.to_string() });
            }
            Ptx::from_src(source)
        }
    };

    // load_ptx wants 'static function names. Modules are never loaded twice,
    // so this is one string per distinct program.
    let func_name: &'static str = Box::leak(entry.to_string().into_boxed_str());
    device
        .load_ptx(ptx, module, &[func_name])
        .map_err(|e| DeviceError::Compile {
            name: entry.to_string(),
            log: format!("module load failed: {e}"),
        })?;

    let func = device
        .get_func(module, entry)
        .ok_or_else(|| DeviceError::EntryPointNotFound { entry: entry.to_string() })?;

    tracing::debug!("cuda: loaded {} as module {}", entry, module);
    Ok(CudaProgram { module: module.to_string(), entry: entry.to_string(), func })
}

fn nvrtc_log(err: CompileError) -> String {
    match err {
        CompileError::CompileError { log, .. } => log.to_string_lossy().into_owned(),
        other => other.to_string(),
    }
}

/// Launch configuration for a geometry: `global` is the grid, `local` the block.
pub fn launch_config(geometry: &LaunchGeometry) -> LaunchConfig {
    let [gx, gy, gz] = geometry.global;
    let [lx, ly, lz] = geometry.local;
    LaunchConfig {
        grid_dim: (gx, gy, gz),
        block_dim: (lx, ly, lz),
        shared_mem_bytes: 0,
    }
}

/// Launch with one device pointer per buffer and block until the device is idle.
pub fn launch(
    device: &Arc<CudaDevice>,
    program: &CudaProgram,
    geometry: &LaunchGeometry,
    args: &[&CudaBuffer],
) -> Result<LaunchReport, DeviceError> {
    geometry
        .validate()
        .map_err(|e| DeviceError::Launch(e.to_string()))?;
    let cfg = launch_config(geometry);

    let slices: Vec<_> = args.iter().map(|b| b.as_cuda_slice()).collect();
    let mut params: Vec<*mut c_void> = slices.iter().map(|s| s.as_kernel_param()).collect();

    let start = Instant::now();
    // SAFETY: every parameter is a live device allocation owned by the caller
    // for the duration of the call, and the kernel signature is the caller's
    // contract (one pointer per buffer).
    unsafe { program.func.clone().launch(cfg, &mut params) }
        .map_err(|e| DeviceError::Launch(format!("{}: {e}", program.entry)))?;
    device
        .synchronize()
        .map_err(|e| DeviceError::Launch(format!("{}: {e}", program.entry)))?;
    let elapsed = start.elapsed();

    Ok(LaunchReport { elapsed, ops: None })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_config_maps_axes() {
        let g = LaunchGeometry::new([4, 2, 1], [128, 2, 1]).unwrap();
        let cfg = launch_config(&g);
        assert_eq!(cfg.grid_dim, (4, 2, 1));
        assert_eq!(cfg.block_dim, (128, 2, 1));
        assert_eq!(cfg.shared_mem_bytes, 0);
    }

    #[test]
    fn test_module_name_is_content_addressed() {
        let src = "extern \"C\" __global__ void k(float* o) {}";
        let a = module_name(0, src, KernelType::Cuda, "k");
        assert_eq!(a, module_name(0, src, KernelType::Cuda, "k"));
        assert!(a.starts_with("kbot_0_"));
        assert_ne!(a, module_name(1, src, KernelType::Cuda, "k"));
        assert_ne!(a, module_name(0, src, KernelType::Ptx, "k"));
        assert_ne!(a, module_name(0, "// v2\n", KernelType::Cuda, "k"));
    }
}
