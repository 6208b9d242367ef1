//! Separable box blur approximating a Gaussian with three passes per axis.
//!
//! Rows are processed in parallel; the vertical passes run on a transposed
//! copy so they stay row-contiguous.

use camfx_core::FrameBuffer;
use rayon::prelude::*;

/// Box radius whose three-pass result matches a Gaussian of `sigma`.
pub fn box_radius_for_sigma(sigma: f32) -> usize {
    if sigma <= 0.0 {
        return 0;
    }
    let width = (4.0 * sigma * sigma + 1.0).sqrt();
    (((width - 1.0) * 0.5).round() as usize).max(1)
}

/// Blur with reusable scratch buffers.
#[derive(Debug, Default)]
pub struct BoxBlur {
    scratch: Vec<u8>,
    transposed: Vec<u8>,
}

impl BoxBlur {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blur an RGBA8 frame in place with a Gaussian-like kernel of `sigma`
    /// pixels.
    pub fn apply(&mut self, frame: &mut FrameBuffer, sigma: f32) {
        let radius = box_radius_for_sigma(sigma);
        self.apply_radius(frame, radius);
    }

    /// Blur with an explicit box radius.
    pub fn apply_radius(&mut self, frame: &mut FrameBuffer, radius: usize) {
        let (w, h) = (frame.width as usize, frame.height as usize);
        if radius == 0 || w == 0 || h == 0 || frame.data.len() != w * h * 4 {
            return;
        }
        let n = frame.data.len();
        self.scratch.resize(n, 0);
        self.transposed.resize(n, 0);

        // horizontal: frame -> scratch -> frame -> scratch
        blur_rows(&frame.data, &mut self.scratch, w, radius);
        blur_rows(&self.scratch, &mut frame.data, w, radius);
        blur_rows(&frame.data, &mut self.scratch, w, radius);
        transpose(&self.scratch, &mut self.transposed, w, h);

        // vertical, on the transposed image (rows of length h)
        blur_rows(&self.transposed, &mut self.scratch, h, radius);
        blur_rows(&self.scratch, &mut self.transposed, h, radius);
        blur_rows(&self.transposed, &mut self.scratch, h, radius);
        transpose(&self.scratch, &mut frame.data, h, w);
    }
}

/// One box pass over every row, edges clamped.
fn blur_rows(src: &[u8], dst: &mut [u8], width: usize, radius: usize) {
    let stride = width * 4;
    let r = radius as isize;
    let last = width as isize - 1;
    let window = (2 * radius + 1) as u32;

    dst.par_chunks_mut(stride)
        .zip(src.par_chunks(stride))
        .for_each(|(out, row)| {
            let at = |x: isize, c: usize| row[x.clamp(0, last) as usize * 4 + c] as u32;
            for c in 0..4 {
                let mut sum: u32 = (-r..=r).map(|x| at(x, c)).sum();
                for x in 0..width as isize {
                    out[x as usize * 4 + c] = ((sum + window / 2) / window) as u8;
                    sum = sum + at(x + r + 1, c) - at(x - r, c);
                }
            }
        });
}

/// `src` is `width` x `height` RGBA; `dst` becomes `height` x `width`.
fn transpose(src: &[u8], dst: &mut [u8], width: usize, height: usize) {
    dst.par_chunks_mut(height * 4)
        .enumerate()
        .for_each(|(x, out)| {
            for y in 0..height {
                let s = (y * width + x) * 4;
                out[y * 4..y * 4 + 4].copy_from_slice(&src[s..s + 4]);
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge_energy(frame: &FrameBuffer) -> u64 {
        let mut e = 0u64;
        for y in 0..frame.height {
            for x in 1..frame.width {
                e += (frame.pixel(x, y)[0] as i32 - frame.pixel(x - 1, y)[0] as i32).unsigned_abs()
                    as u64;
            }
        }
        e
    }

    #[test]
    fn radius_mapping() {
        assert_eq!(box_radius_for_sigma(0.0), 0);
        assert_eq!(box_radius_for_sigma(0.2), 1);
        assert_eq!(box_radius_for_sigma(10.0), 10);
    }

    #[test]
    fn uniform_frame_is_unchanged() {
        let mut frame = FrameBuffer::solid(37, 21, [90, 140, 200, 255]);
        let original = frame.clone();
        BoxBlur::new().apply(&mut frame, 6.0);
        assert_eq!(frame, original);
    }

    #[test]
    fn blur_reduces_high_frequency_energy() {
        let mut frame = FrameBuffer::checkerboard(64, 48, 2);
        let before = edge_energy(&frame);
        BoxBlur::new().apply(&mut frame, 4.0);
        assert!(edge_energy(&frame) * 20 < before);
    }

    #[test]
    fn non_square_frames_keep_dimensions() {
        let mut frame = FrameBuffer::test_pattern(50, 10);
        BoxBlur::new().apply(&mut frame, 3.0);
        assert_eq!(frame.dimensions(), (50, 10));
        assert_eq!(frame.data.len(), 50 * 10 * 4);
    }
}
