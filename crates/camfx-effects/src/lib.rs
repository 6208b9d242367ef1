//! CamFX Effects - CPU effect stages and the ordered compositor
//!
//! Provides the geometric transform, color-matrix filters and presets,
//! segmentation-driven background effects, finishing passes (letterbox,
//! sharpen, vignette) and monitoring overlays. [`Compositor`] chains them
//! and hands grading to `camfx-gpu`.

pub mod ai;
pub mod blur;
pub mod compositor;
pub mod config;
pub mod filter;
pub mod letterbox;
pub mod overlays;
pub mod presets;
pub mod sharpen;
pub mod transform;
pub mod vignette;

pub use ai::{cover_resize, AiInput, AiStage};
pub use blur::{box_radius_for_sigma, BoxBlur};
pub use compositor::{CompositeInput, CompositeReport, Compositor, Stage, StageSet};
pub use config::CompositorConfig;
pub use filter::{ColorMatrix, FilterCache, FilterSettings};
pub use overlays::{grid_lines, OverlayRenderer, OverlayReport};
pub use presets::{FilterPreset, Tint};
pub use sharpen::Sharpener;
pub use transform::{view_transform, GeometryStage};
pub use vignette::VignetteCache;
