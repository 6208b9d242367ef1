//! Unsharp-mask sharpening.

use camfx_core::FrameBuffer;
use rayon::prelude::*;

use crate::blur::BoxBlur;

#[derive(Debug, Default)]
pub struct Sharpener {
    blur: BoxBlur,
    blurred: Option<FrameBuffer>,
}

impl Sharpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// `out = src + amount · (src − blur(src))`. `sharpness` is 0–100;
    /// `max_amount` is the gain at 100.
    pub fn apply(&mut self, frame: &mut FrameBuffer, sharpness: f32, radius: usize, max_amount: f32) {
        if sharpness <= 0.0 || radius == 0 {
            return;
        }
        let amount = sharpness / 100.0 * max_amount;
        let reuse = self.blurred.as_ref().is_some_and(|b| b.same_size(frame));
        if !reuse {
            self.blurred = Some(frame.clone());
        }
        let Some(blurred) = self.blurred.as_mut() else {
            return;
        };
        if reuse {
            blurred.data.copy_from_slice(&frame.data);
        }
        self.blur.apply_radius(blurred, radius);

        let blurred: &FrameBuffer = blurred;
        frame
            .data
            .par_chunks_mut(4)
            .zip(blurred.data.par_chunks(4))
            .for_each(|(px, b)| {
                for c in 0..3 {
                    let v = px[c] as f32 + amount * (px[c] as f32 - b[c] as f32);
                    px[c] = v.round().clamp(0.0, 255.0) as u8;
                }
            });
    }
}
