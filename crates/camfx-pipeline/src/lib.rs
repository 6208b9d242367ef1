//! CamFX Pipeline - the live loop around the compositor
//!
//! Implements:
//! - [`FrameScheduler`]: one tick per display refresh, adaptive skipping,
//!   segmentation submission and presentation
//! - [`PerformanceMonitor`]: rolling frame-rate window
//! - I/O seams ([`VideoSource`], [`OutputSink`], [`DisplayLink`])
//! - [`PipelineConfig`] loading and [`PipelineBuilder`]

pub mod config;
pub mod error;
pub mod io;
pub mod monitor;
pub mod pipeline;
pub mod scheduler;

pub use config::{load_params, PipelineConfig, SchedulerConfig};
pub use error::{PipelineError, PipelineResult};
pub use io::{
    DisplayLink, FrameRequestId, HardwareControls, ManualDisplayLink, NullSink, OutputSink,
    SurfaceError, SyntheticSource, VideoSource,
};
pub use monitor::PerformanceMonitor;
pub use pipeline::PipelineBuilder;
pub use scheduler::{FrameScheduler, TickOutcome, TickStats};
