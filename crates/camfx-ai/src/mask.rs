//! Single-channel segmentation masks.
//!
//! A mask may have any resolution; consumers sample it bilinearly in
//! normalized coordinates so it lines up with the frame regardless of size.

use camfx_core::Rect;

use crate::error::{AiError, AiResult};

/// A single-channel mask buffer (one byte per pixel, 0 = background, 255 = foreground).
#[derive(Debug, Clone, PartialEq)]
pub struct MaskBuffer {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Mask data (row-major, one byte per pixel).
    pub data: Vec<u8>,
}

impl MaskBuffer {
    /// Create a new empty mask (all zeros = all background).
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; (width as usize) * (height as usize)],
        }
    }

    /// Create a fully opaque mask.
    pub fn opaque(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![255u8; (width as usize) * (height as usize)],
        }
    }

    /// Wrap existing mask bytes.
    pub fn from_data(width: u32, height: u32, data: Vec<u8>) -> AiResult<Self> {
        let expected = width as usize * height as usize;
        if data.len() != expected || expected == 0 {
            return Err(AiError::PreprocessError(format!(
                "mask {width}x{height} needs {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Mask whose foreground is a centered box covering `frac_w` x `frac_h`
    /// of the frame.
    pub fn centered_box(width: u32, height: u32, frac_w: f32, frac_h: f32) -> Self {
        let mut mask = Self::new(width, height);
        let bw = (width as f32 * frac_w.clamp(0.0, 1.0)).round() as u32;
        let bh = (height as f32 * frac_h.clamp(0.0, 1.0)).round() as u32;
        let x0 = (width - bw) / 2;
        let y0 = (height - bh) / 2;
        for y in y0..y0 + bh {
            for x in x0..x0 + bw {
                mask.set(x, y, 255);
            }
        }
        mask
    }

    /// Get the mask value at (x, y). Returns 0 if out of bounds.
    pub fn get(&self, x: u32, y: u32) -> u8 {
        if x >= self.width || y >= self.height {
            return 0;
        }
        self.data[(y as usize) * (self.width as usize) + (x as usize)]
    }

    /// Set the mask value at (x, y).
    pub fn set(&mut self, x: u32, y: u32, value: u8) {
        if x < self.width && y < self.height {
            self.data[(y as usize) * (self.width as usize) + (x as usize)] = value;
        }
    }

    /// Foreground weight in [0, 1] at normalized coordinates, bilinearly
    /// interpolated with clamp-to-edge.
    pub fn sample(&self, u: f32, v: f32) -> f32 {
        if self.width == 0 || self.height == 0 {
            return 0.0;
        }
        let w = self.width as f32;
        let h = self.height as f32;
        let x = (u * w - 0.5).clamp(0.0, w - 1.0);
        let y = (v * h - 0.5).clamp(0.0, h - 1.0);
        let x0 = x.floor() as u32;
        let y0 = y.floor() as u32;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);
        let fx = x - x0 as f32;
        let fy = y - y0 as f32;
        let top = self.get(x0, y0) as f32 * (1.0 - fx) + self.get(x1, y0) as f32 * fx;
        let bottom = self.get(x0, y1) as f32 * (1.0 - fx) + self.get(x1, y1) as f32 * fx;
        (top * (1.0 - fy) + bottom * fy) / 255.0
    }

    /// Resample to `width` x `height` with bilinear filtering.
    pub fn resized(&self, width: u32, height: u32) -> Self {
        if width == self.width && height == self.height {
            return self.clone();
        }
        let mut out = Self::new(width, height);
        for y in 0..height {
            let v = (y as f32 + 0.5) / height as f32;
            for x in 0..width {
                let u = (x as f32 + 0.5) / width as f32;
                let value = (self.sample(u, v) * 255.0).round() as u8;
                out.data[y as usize * width as usize + x as usize] = value;
            }
        }
        out
    }

    /// Soften mask edges with three box-blur passes (Gaussian approximation).
    pub fn feather(&mut self, radius: u32) {
        if radius == 0 {
            return;
        }
        let w = self.width as usize;
        let h = self.height as usize;
        let r = radius as usize;
        let mut temp = vec![0u16; w * h];

        for _pass in 0..3 {
            // Horizontal pass
            for y in 0..h {
                for x in 0..w {
                    let x_start = x.saturating_sub(r);
                    let x_end = (x + r + 1).min(w);
                    let sum: u32 = self.data[y * w + x_start..y * w + x_end]
                        .iter()
                        .map(|&v| v as u32)
                        .sum();
                    temp[y * w + x] = (sum / (x_end - x_start) as u32) as u16;
                }
            }
            // Vertical pass
            for y in 0..h {
                let y_start = y.saturating_sub(r);
                let y_end = (y + r + 1).min(h);
                let count = (y_end - y_start) as u32;
                for x in 0..w {
                    let sum: u32 = (y_start..y_end).map(|yi| temp[yi * w + x] as u32).sum();
                    self.data[y * w + x] = (sum / count) as u8;
                }
            }
        }
    }

    /// Fraction of pixels at or above `threshold`, sampling every
    /// `stride`-th row and column.
    pub fn foreground_ratio(&self, stride: usize, threshold: u8) -> f32 {
        let stride = stride.max(1);
        let w = self.width as usize;
        let (mut total, mut foreground) = (0usize, 0usize);
        for y in (0..self.height as usize).step_by(stride) {
            let row = &self.data[y * w..(y + 1) * w];
            for x in (0..w).step_by(stride) {
                total += 1;
                if row[x] >= threshold {
                    foreground += 1;
                }
            }
        }
        if total == 0 {
            return 0.0;
        }
        foreground as f32 / total as f32
    }

    /// Normalized bounding box of pixels at or above `threshold`, scanning
    /// every `stride`-th row and column.
    pub fn bounding_box(&self, stride: usize, threshold: u8) -> Option<Rect> {
        let stride = stride.max(1);
        let w = self.width as usize;
        let (mut min_x, mut min_y) = (usize::MAX, usize::MAX);
        let (mut max_x, mut max_y) = (0usize, 0usize);
        let mut found = false;
        for y in (0..self.height as usize).step_by(stride) {
            let row = &self.data[y * w..(y + 1) * w];
            for x in (0..w).step_by(stride) {
                if row[x] >= threshold {
                    found = true;
                    min_x = min_x.min(x);
                    max_x = max_x.max(x);
                    min_y = min_y.min(y);
                    max_y = max_y.max(y);
                }
            }
        }
        if !found {
            return None;
        }
        let fw = self.width as f32;
        let fh = self.height as f32;
        Some(Rect::new(
            min_x as f32 / fw,
            min_y as f32 / fh,
            (max_x + 1 - min_x) as f32 / fw,
            (max_y + 1 - min_y) as f32 / fh,
        ))
    }
}
