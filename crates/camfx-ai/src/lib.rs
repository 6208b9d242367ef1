//! CamFX AI - Person segmentation for the live pipeline
//!
//! Provides:
//! - [`SegmentationManager`]: picks a worker-thread or main-thread strategy,
//!   enforces one request in flight, matches responses to requests by id,
//!   times out silent requests and disables itself after repeated failures
//! - [`MaskBuffer`]: single-channel coverage masks
//! - [`SegmentationBackend`] implementations: a model-free luma key and,
//!   with the `onnx` feature, an ONNX Runtime selfie segmenter
//! - Auto-framing derived from the mask

pub mod autoframe;
pub mod backend;
pub mod config;
pub mod error;
pub mod manager;
pub mod mask;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod strategy;
pub mod worker;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use autoframe::{compute_auto_frame, AutoFrameConfig, AutoFrameTransform, AutoFramer};
pub use backend::{BackendFactory, InferenceOutput, LumaKeyBackend, SegmentationBackend};
pub use config::{
    default_models_dir, SegmentationConfig, MAX_CONSECUTIVE_FAILURES, REQUEST_TIMEOUT,
    WORKER_INIT_TIMEOUT,
};
pub use error::{AiError, AiResult};
pub use manager::{
    SegmentationEvent, SegmentationManager, SegmentationState, SegmentationStats, SubmitError,
};
pub use mask::MaskBuffer;
#[cfg(feature = "onnx")]
pub use onnx::OnnxSegmenter;

/// Identifies one segmentation request. Monotonic per manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where inference runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SegmentationMode {
    /// Dedicated `camfx-segmentation` thread.
    Worker,
    /// Synchronously inside `submit`.
    MainThread,
}
