//! Radial vignette with a cached gradient.

use camfx_core::FrameBuffer;
use rayon::prelude::*;
use tracing::debug;

/// Gradient multipliers keyed by (width, height, intensity).
#[derive(Debug, Default)]
pub struct VignetteCache {
    key: Option<(u32, u32, u32)>,
    /// Per-pixel brightness multiplier in 0–255 (255 = untouched).
    gradient: Vec<u8>,
    generations: u64,
}

impl VignetteCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times the gradient has been generated.
    pub fn generations(&self) -> u64 {
        self.generations
    }

    pub fn invalidate(&mut self) {
        self.key = None;
    }

    /// Darken toward the corners. `intensity` is 0–100; `max_darkening` is
    /// the corner darkening at 100.
    pub fn apply(&mut self, frame: &mut FrameBuffer, intensity: f32, max_darkening: f32) {
        if intensity <= 0.0 || frame.is_empty() {
            return;
        }
        self.ensure(frame.width, frame.height, intensity, max_darkening);
        let gradient = &self.gradient;
        let stride = frame.stride();
        let width = frame.width as usize;
        frame
            .data
            .par_chunks_mut(stride)
            .enumerate()
            .for_each(|(y, row)| {
                let g = &gradient[y * width..(y + 1) * width];
                for (px, &m) in row.chunks_exact_mut(4).zip(g) {
                    if m == 255 {
                        continue;
                    }
                    for v in &mut px[..3] {
                        *v = ((*v as u32 * m as u32 + 127) / 255) as u8;
                    }
                }
            });
    }

    fn ensure(&mut self, width: u32, height: u32, intensity: f32, max_darkening: f32) {
        let key = (width, height, intensity.to_bits());
        if self.key == Some(key) {
            return;
        }
        let strength = intensity / 100.0 * max_darkening.clamp(0.0, 1.0);
        let cx = width as f32 * 0.5;
        let cy = height as f32 * 0.5;
        let max_d = (cx * cx + cy * cy).sqrt().max(1.0);

        self.gradient.resize(width as usize * height as usize, 255);
        self.gradient
            .par_chunks_mut(width.max(1) as usize)
            .enumerate()
            .for_each(|(y, row)| {
                let dy = y as f32 + 0.5 - cy;
                for (x, m) in row.iter_mut().enumerate() {
                    let dx = x as f32 + 0.5 - cx;
                    let d = (dx * dx + dy * dy).sqrt() / max_d;
                    // transparent center, full strength at the corners
                    let t = ((d - 0.4) / 0.6).clamp(0.0, 1.0);
                    let falloff = t * t * (3.0 - 2.0 * t);
                    *m = ((1.0 - strength * falloff) * 255.0).round() as u8;
                }
            });
        self.key = Some(key);
        self.generations += 1;
        debug!(width, height, intensity, "Generated vignette gradient");
    }
}
