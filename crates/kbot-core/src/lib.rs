//! # kbot-core
//!
//! Host-side value types shared by every kernelbot crate.
//!
//! Provides:
//! - Element dtypes accepted by challenges (half, single, double)
//! - Small-vector backed tensor shapes
//! - Host tensors holding little-endian bytes that decode to `f64`
//! - Launch geometry (global + local extents)
//! - A recursive-descent parser for shape and geometry literals
//! - The relative + absolute tolerance check
//! - Human-readable timing display

pub mod dtype;
pub mod shape;
pub mod tensor;
pub mod geometry;
pub mod literal;
pub mod tolerance;
pub mod timing;
pub mod error;

pub use dtype::DType;
pub use shape::Shape;
pub use tensor::HostTensor;
pub use geometry::LaunchGeometry;
pub use tolerance::Tolerance;
pub use timing::fmt_time;
pub use error::CoreError;

pub type Result<T> = std::result::Result<T, CoreError>;
