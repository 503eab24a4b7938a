use crate::{DType, Shape};

/// Errors raised while building or decoding host-side values.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    #[error("invalid literal at byte {pos}: {msg}")]
    Parse { pos: usize, msg: String },

    #[error("unknown dtype '{0}', expected one of: half, single, double")]
    UnknownDType(String),

    #[error("expected {expected} bytes for {dtype} tensor of shape {shape}, got {actual}")]
    ByteLength {
        dtype: DType,
        shape: Shape,
        expected: usize,
        actual: usize,
    },

    #[error("shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: Shape, actual: Shape },

    #[error("dtype mismatch: expected {expected}, got {actual}")]
    DTypeMismatch { expected: DType, actual: DType },

    #[error("launch geometry must be strictly positive, got {0}")]
    Geometry(String),

    #[error("size overflow: {0}")]
    TooLarge(String),
}
