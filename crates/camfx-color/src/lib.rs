//! CamFX Color: cinematic LUT grading data and face-warp uniforms.
//!
//! Everything here is plain CPU data: the GPU renderer uploads what this
//! crate produces, and the software grader evaluates the same math.

pub mod error;
pub mod lut;
pub mod presets;
pub mod store;
pub mod warp;

pub use error::ColorError;
pub use lut::{blend_luts, generate_identity_lut, LutData, PackedLut};
pub use presets::generate_preset;
pub use store::{LutStore, DEFAULT_LUT_SIZE};
pub use warp::{WarpPoint, WarpStrengths, WarpUniforms, MIN_WARP_LANDMARKS};
