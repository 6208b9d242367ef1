//! Pipeline errors.

use camfx_core::CamFxError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// The output surface is gone; the scheduler has stopped.
    #[error("Output surface lost: {0}")]
    SurfaceLost(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] CamFxError),
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
