//! Base color filter compiled into a 3×4 color matrix.
//!
//! Brightness, contrast, saturation, hue rotation, sepia and grayscale
//! compose into one affine transform on linear-in-display RGB (0–1), so the
//! whole chain costs one matrix multiply per pixel.

use camfx_core::{EffectParameterSet, FrameBuffer};
use rayon::prelude::*;
use tracing::trace;

use crate::presets::FilterPreset;

/// Row-major 3×4 affine color transform: `out = M[..3] · rgb + M[3]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorMatrix {
    pub m: [[f32; 4]; 3],
}

impl ColorMatrix {
    pub const IDENTITY: Self = Self {
        m: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
        ],
    };

    fn linear(l: [[f32; 3]; 3]) -> Self {
        Self {
            m: [
                [l[0][0], l[0][1], l[0][2], 0.0],
                [l[1][0], l[1][1], l[1][2], 0.0],
                [l[2][0], l[2][1], l[2][2], 0.0],
            ],
        }
    }

    /// Scale by `amount` (1.0 neutral).
    pub fn brightness(amount: f32) -> Self {
        Self::linear([[amount, 0.0, 0.0], [0.0, amount, 0.0], [0.0, 0.0, amount]])
    }

    /// Stretch around mid-gray (1.0 neutral).
    pub fn contrast(amount: f32) -> Self {
        let offset = 0.5 - 0.5 * amount;
        Self {
            m: [
                [amount, 0.0, 0.0, offset],
                [0.0, amount, 0.0, offset],
                [0.0, 0.0, amount, offset],
            ],
        }
    }

    /// Saturation (1.0 neutral, 0.0 gray).
    pub fn saturation(s: f32) -> Self {
        Self::linear([
            [0.213 + 0.787 * s, 0.715 - 0.715 * s, 0.072 - 0.072 * s],
            [0.213 - 0.213 * s, 0.715 + 0.285 * s, 0.072 - 0.072 * s],
            [0.213 - 0.213 * s, 0.715 - 0.715 * s, 0.072 + 0.928 * s],
        ])
    }

    /// Hue rotation in degrees.
    pub fn hue_rotate(degrees: f32) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Self::linear([
            [
                0.213 + cos * 0.787 - sin * 0.213,
                0.715 - cos * 0.715 - sin * 0.715,
                0.072 - cos * 0.072 + sin * 0.928,
            ],
            [
                0.213 - cos * 0.213 + sin * 0.143,
                0.715 + cos * 0.285 + sin * 0.140,
                0.072 - cos * 0.072 - sin * 0.283,
            ],
            [
                0.213 - cos * 0.213 - sin * 0.787,
                0.715 - cos * 0.715 + sin * 0.715,
                0.072 + cos * 0.928 + sin * 0.072,
            ],
        ])
    }

    /// Sepia toning, `amount` in 0–1.
    pub fn sepia(amount: f32) -> Self {
        let a = 1.0 - amount.clamp(0.0, 1.0);
        Self::linear([
            [0.393 + 0.607 * a, 0.769 - 0.769 * a, 0.189 - 0.189 * a],
            [0.349 - 0.349 * a, 0.686 + 0.314 * a, 0.168 - 0.168 * a],
            [0.272 - 0.272 * a, 0.534 - 0.534 * a, 0.131 + 0.869 * a],
        ])
    }

    /// Desaturate toward Rec.709 luma, `amount` in 0–1.
    pub fn grayscale(amount: f32) -> Self {
        let a = 1.0 - amount.clamp(0.0, 1.0);
        Self::linear([
            [0.2126 + 0.7874 * a, 0.7152 - 0.7152 * a, 0.0722 - 0.0722 * a],
            [0.2126 - 0.2126 * a, 0.7152 + 0.2848 * a, 0.0722 - 0.0722 * a],
            [0.2126 - 0.2126 * a, 0.7152 - 0.7152 * a, 0.0722 + 0.9278 * a],
        ])
    }

    /// `self` applied first, then `next`.
    pub fn then(self, next: Self) -> Self {
        let a = &self.m;
        let b = &next.m;
        let mut m = [[0.0f32; 4]; 3];
        for (r, row) in m.iter_mut().enumerate() {
            for (c, out) in row.iter_mut().enumerate() {
                let mut v = b[r][0] * a[0][c] + b[r][1] * a[1][c] + b[r][2] * a[2][c];
                if c == 3 {
                    v += b[r][3];
                }
                *out = v;
            }
        }
        Self { m }
    }

    pub fn is_identity(&self) -> bool {
        self.m
            .iter()
            .flatten()
            .zip(Self::IDENTITY.m.iter().flatten())
            .all(|(a, b)| (a - b).abs() < 1e-6)
    }

    #[inline]
    pub fn apply_rgb(&self, rgb: [f32; 3]) -> [f32; 3] {
        let m = &self.m;
        [
            m[0][0] * rgb[0] + m[0][1] * rgb[1] + m[0][2] * rgb[2] + m[0][3],
            m[1][0] * rgb[0] + m[1][1] * rgb[1] + m[1][2] * rgb[2] + m[1][3],
            m[2][0] * rgb[0] + m[2][1] * rgb[1] + m[2][2] * rgb[2] + m[2][3],
        ]
    }

    /// Apply to every pixel of an RGBA8 frame; alpha is untouched.
    pub fn apply_to_frame(&self, frame: &mut FrameBuffer) {
        if self.is_identity() {
            return;
        }
        let stride = frame.stride().max(1);
        frame.data.par_chunks_mut(stride).for_each(|row| {
            for px in row.chunks_exact_mut(4) {
                let out = self.apply_rgb([
                    px[0] as f32 / 255.0,
                    px[1] as f32 / 255.0,
                    px[2] as f32 / 255.0,
                ]);
                px[0] = to_u8(out[0]);
                px[1] = to_u8(out[1]);
                px[2] = to_u8(out[2]);
            }
        });
    }
}

impl Default for ColorMatrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[inline]
fn to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Effective filter settings after folding in the selected preset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterSettings {
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub hue: f32,
    pub sepia: f32,
    pub grayscale: f32,
}

impl FilterSettings {
    pub fn resolve(params: &EffectParameterSet, preset: &FilterPreset) -> Self {
        Self {
            brightness: params.brightness * preset.brightness / 100.0,
            contrast: params.contrast * preset.contrast / 100.0,
            saturation: params.saturation * preset.saturation / 100.0,
            hue: params.hue + preset.hue,
            sepia: (params.sepia + preset.sepia).min(100.0),
            grayscale: (params.grayscale + preset.grayscale).min(100.0),
        }
    }

    /// Compose the chain in fixed order: brightness, contrast, saturation,
    /// hue, sepia, grayscale.
    pub fn to_matrix(&self) -> ColorMatrix {
        let mut m = ColorMatrix::IDENTITY;
        if self.brightness != 100.0 {
            m = m.then(ColorMatrix::brightness(self.brightness / 100.0));
        }
        if self.contrast != 100.0 {
            m = m.then(ColorMatrix::contrast(self.contrast / 100.0));
        }
        if self.saturation != 100.0 {
            m = m.then(ColorMatrix::saturation(self.saturation / 100.0));
        }
        if self.hue != 0.0 {
            m = m.then(ColorMatrix::hue_rotate(self.hue));
        }
        if self.sepia > 0.0 {
            m = m.then(ColorMatrix::sepia(self.sepia / 100.0));
        }
        if self.grayscale > 0.0 {
            m = m.then(ColorMatrix::grayscale(self.grayscale / 100.0));
        }
        m
    }

    fn key(&self) -> [u32; 6] {
        [
            self.brightness.to_bits(),
            self.contrast.to_bits(),
            self.saturation.to_bits(),
            self.hue.to_bits(),
            self.sepia.to_bits(),
            self.grayscale.to_bits(),
        ]
    }
}

/// Memoizes the compiled matrix for the last exact settings tuple.
#[derive(Debug, Default)]
pub struct FilterCache {
    key: Option<[u32; 6]>,
    matrix: ColorMatrix,
    hits: u64,
    misses: u64,
}

impl FilterCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn matrix(&mut self, settings: &FilterSettings) -> ColorMatrix {
        let key = settings.key();
        if self.key == Some(key) {
            self.hits += 1;
        } else {
            self.matrix = settings.to_matrix();
            self.key = Some(key);
            self.misses += 1;
            trace!(?settings, "Compiled color filter matrix");
        }
        self.matrix
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn invalidate(&mut self) {
        self.key = None;
    }
}
