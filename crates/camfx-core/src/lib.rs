//! CamFX Core - Foundation types for the live effects pipeline
//!
//! This crate provides the fundamental types used throughout CamFX:
//! - Frame buffers and pixel formats
//! - The per-frame effect parameter snapshot
//! - Geometric primitives and facial landmarks
//! - Fixed-size rolling sample windows for frame timing

pub mod error;
pub mod frame;
pub mod geometry;
pub mod landmarks;
pub mod params;
pub mod stats;

pub use error::{CamFxError, Result};
pub use frame::{FrameBuffer, PixelFormat};
pub use geometry::{Rect, Transform2D, Vec2};
pub use landmarks::{FaceLandmarks, LandmarkKind};
pub use params::{
    AspectLock, ColorFilterId, EffectParameterSet, GridType, LutId, PeakingColor,
    PerformanceMode,
};
pub use stats::RollingWindow;

/// Frame timing constants.
pub mod timing {
    /// Number of samples kept by rolling frame-time windows.
    pub const SAMPLE_WINDOW: usize = 30;

    /// Frame rate below which the pipeline is considered to be struggling.
    pub const STRUGGLING_FPS: f32 = 30.0;
}
