//! Compositor tuning.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositorConfig {
    /// Box radius used to soften mask edges, in frame pixels.
    pub mask_feather: u32,
    /// Blur sigma of the skin-smoothing layer.
    pub smoothing_sigma: f32,
    /// Share of the smoothing layer mixed in at 100 % face smoothing.
    pub smoothing_mix: f32,
    /// Background darkening at 100 % portrait lighting.
    pub background_dim: f32,
    /// Unsharp-mask blur radius.
    pub sharpen_radius: usize,
    /// Unsharp-mask gain at 100 % sharpness.
    pub sharpen_amount: f32,
    /// Corner darkening at 100 % vignette.
    pub vignette_darkening: f32,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            mask_feather: 4,
            smoothing_sigma: 3.0,
            smoothing_mix: 0.6,
            background_dim: 0.6,
            sharpen_radius: 1,
            sharpen_amount: 1.5,
            vignette_darkening: 0.85,
        }
    }
}
