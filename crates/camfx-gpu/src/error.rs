//! GPU renderer errors.

use camfx_core::CamFxError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GpuError {
    #[error("no suitable GPU adapter found")]
    NoAdapter,
    #[error("failed to create device: {0}")]
    RequestDevice(String),
    #[error("shader or pipeline validation failed: {0}")]
    Shader(String),
    #[error("GPU context lost")]
    ContextLost,
    #[error("GPU renderer disabled")]
    Disabled,
    #[error("GPU not ready (retry pending)")]
    NotReady,
    #[error("readback failed: {0}")]
    Readback(String),
    #[error("unsupported frame: {0}")]
    UnsupportedFrame(String),
}

impl From<GpuError> for CamFxError {
    fn from(err: GpuError) -> Self {
        CamFxError::Gpu(err.to_string())
    }
}
