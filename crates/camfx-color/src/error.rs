//! Color subsystem errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ColorError {
    #[error("invalid LUT format: {0}")]
    InvalidLut(String),
    #[error("LUT size mismatch: {left} vs {right}")]
    SizeMismatch { left: usize, right: usize },
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("unsupported LUT domain: [{min}, {max}]")]
    UnsupportedDomain { min: f32, max: f32 },
    #[error("parse error: {0}")]
    Parse(String),
}
