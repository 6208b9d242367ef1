//! Error types for the segmentation subsystem.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in segmentation.
#[derive(Debug, Error)]
pub enum AiError {
    /// The model file was not found.
    #[error("Model not found: {}", path.display())]
    ModelNotFound { path: PathBuf },

    /// Backend used before `initialize()` succeeded.
    #[error("Model not loaded; call initialize() first")]
    ModelNotLoaded,

    /// ONNX Runtime error.
    #[error("ONNX Runtime error: {0}")]
    Onnx(String),

    /// Preprocessing error (frame conversion, format issues, etc.).
    #[error("Preprocessing error: {0}")]
    PreprocessError(String),

    /// The backend failed to produce a mask.
    #[error("Inference failed: {0}")]
    Inference(String),

    /// The backend panicked during `initialize` or `infer`.
    #[error("Segmentation backend panicked: {0}")]
    Panicked(String),

    /// The inference thread could not be started.
    #[error("Failed to spawn segmentation worker: {0}")]
    WorkerSpawn(String),

    /// The inference thread exited or its channel closed.
    #[error("Segmentation worker is gone")]
    WorkerGone,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for segmentation operations.
pub type AiResult<T> = std::result::Result<T, AiError>;
