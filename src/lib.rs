//! # kernelbot
//!
//! Kernel benchmark harness: compile user-submitted accelerator kernels,
//! generate randomized test suites from a reference kernel, verify and time
//! submissions against them.
//!
//! This crate re-exports the workspace crates:
//! - [`core`]: dtypes, shapes, host tensors, launch geometry, literals, timing
//! - [`kernels`]: the `Accelerator` trait, the emulated device and CUDA
//! - [`harness`]: suite generation, verification and the device queue

pub use kbot_core as core;
pub use kbot_harness as harness;
pub use kbot_kernels as kernels;

pub use kbot_core::{fmt_time, DType, LaunchGeometry, Shape};
pub use kbot_harness::{Backend, BackendKind, HarnessConfig, HarnessError, KernelSubmission, SuiteRequest};
