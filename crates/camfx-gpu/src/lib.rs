//! CamFX GPU - wgpu color grading and face warp
//!
//! Two fullscreen passes: a radial face warp driven by landmark uniforms and
//! a 3D LUT grade sampled from a packed 2D texture. When no GPU can be
//! acquired the [`SoftwareGrader`] evaluates the same math on the CPU.

pub mod backoff;
pub mod config;
pub mod context;
pub mod error;
pub mod grader;
pub mod renderer;
pub mod software;
pub mod texture;

pub use backoff::InitBackoff;
pub use config::GpuConfig;
pub use context::GpuContext;
pub use error::GpuError;
pub use grader::{GradeBackend, GradeRequest, Grader};
pub use renderer::{GpuRenderer, RendererState};
pub use software::SoftwareGrader;
pub use texture::GpuTexture;
