//! # kbot-kernels
//!
//! Compiler adapters and device memory managers behind one [`Accelerator`]
//! trait.
//!
//! Provides:
//! - The closed set of supported kernel dialects ([`KernelType`])
//! - Entry-point validation shared by every backend
//! - An emulated host device with a registry of host kernels
//! - CUDA dispatch through cudarc + NVRTC (behind the `cuda` feature flag)

pub mod kernel_type;
pub mod device;
pub mod compile;
pub mod emulator;

#[cfg(feature = "cuda")]
pub mod cuda;

pub use kernel_type::KernelType;
pub use device::{Accelerator, DeviceBuffer, DeviceError, LaunchReport};
pub use emulator::{EmulatedDevice, HostKernel};
