//! Color-filter presets: adjustments folded into the base filter plus an
//! optional flat tint drawn after the AI stage.

use camfx_core::{ColorFilterId, FrameBuffer};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Flat color laid over the whole frame with normal blending.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tint {
    pub rgb: [u8; 3],
    /// 0–1.
    pub opacity: f32,
}

impl Tint {
    pub const fn new(rgb: [u8; 3], opacity: f32) -> Self {
        Self { rgb, opacity }
    }

    pub fn apply(&self, frame: &mut FrameBuffer) {
        let a = self.opacity.clamp(0.0, 1.0);
        if a <= 0.0 {
            return;
        }
        let tint = [
            self.rgb[0] as f32 * a,
            self.rgb[1] as f32 * a,
            self.rgb[2] as f32 * a,
        ];
        let keep = 1.0 - a;
        let stride = frame.stride().max(1);
        frame.data.par_chunks_mut(stride).for_each(|row| {
            for px in row.chunks_exact_mut(4) {
                for c in 0..3 {
                    px[c] = (px[c] as f32 * keep + tint[c]).round().min(255.0) as u8;
                }
            }
        });
    }
}

/// Adjustments a preset contributes. Multipliers are percentages
/// (100 neutral); `hue`, `sepia` and `grayscale` are added.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterPreset {
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub hue: f32,
    pub sepia: f32,
    pub grayscale: f32,
    pub tint: Option<Tint>,
}

impl FilterPreset {
    const NEUTRAL: Self = Self {
        brightness: 100.0,
        contrast: 100.0,
        saturation: 100.0,
        hue: 0.0,
        sepia: 0.0,
        grayscale: 0.0,
        tint: None,
    };

    pub fn for_id(id: ColorFilterId) -> Self {
        let n = Self::NEUTRAL;
        match id {
            ColorFilterId::None => n,
            ColorFilterId::Vintage => Self {
                contrast: 90.0,
                saturation: 80.0,
                sepia: 30.0,
                tint: Some(Tint::new([255, 200, 140], 0.08)),
                ..n
            },
            ColorFilterId::Noir => Self {
                contrast: 130.0,
                brightness: 95.0,
                grayscale: 100.0,
                ..n
            },
            ColorFilterId::Warm => Self {
                saturation: 110.0,
                hue: -10.0,
                tint: Some(Tint::new([255, 160, 60], 0.10)),
                ..n
            },
            ColorFilterId::Cool => Self {
                saturation: 95.0,
                hue: 10.0,
                tint: Some(Tint::new([60, 140, 255], 0.10)),
                ..n
            },
            ColorFilterId::Vivid => Self {
                contrast: 110.0,
                saturation: 150.0,
                ..n
            },
            ColorFilterId::Dramatic => Self {
                brightness: 90.0,
                contrast: 150.0,
                saturation: 80.0,
                ..n
            },
            ColorFilterId::Fade => Self {
                brightness: 110.0,
                contrast: 80.0,
                saturation: 70.0,
                tint: Some(Tint::new([240, 235, 225], 0.12)),
                ..n
            },
            ColorFilterId::Cyberpunk => Self {
                contrast: 120.0,
                saturation: 140.0,
                hue: 30.0,
                tint: Some(Tint::new([255, 0, 200], 0.12)),
                ..n
            },
            ColorFilterId::SepiaTone => Self { sepia: 100.0, ..n },
        }
    }
}
