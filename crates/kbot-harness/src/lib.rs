//! # kbot-harness
//!
//! The kernel benchmark harness proper.
//!
//! Provides:
//! - Randomized test-suite generation from a reference kernel
//! - Suite verification and timing of submitted kernels
//! - The safetensors suite codec (`test{i}.in.{j}` / `test{i}.out`)
//! - `HarnessConfig` (tolerances, timing repeats, seeding)
//! - `DeviceQueue`, serializing all device work in the process
//! - `Backend`, choosing the emulated or CUDA device at runtime

pub mod backend;
pub mod config;
pub mod distribution;
pub mod error;
pub mod generator;
pub mod queue;
pub mod runner;
pub mod submission;
pub mod suite;

pub use backend::{Backend, BackendKind};
pub use config::HarnessConfig;
pub use distribution::Distribution;
pub use error::HarnessError;
pub use generator::{generate, GeneratedSuite, SuiteRequest};
pub use queue::DeviceQueue;
pub use runner::{run, run_suite, Evaluation};
pub use submission::KernelSubmission;
pub use suite::{TestCase, TestSuite};

pub type Result<T> = std::result::Result<T, HarnessError>;
