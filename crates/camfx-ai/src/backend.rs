//! Segmentation backends.
//!
//! The manager never cares how a mask is produced: anything implementing
//! [`SegmentationBackend`] can run on the worker thread or synchronously.

use std::panic::{self, AssertUnwindSafe};

use camfx_core::{FaceLandmarks, FrameBuffer, PixelFormat};
use tracing::debug;

use crate::error::{AiError, AiResult};
use crate::mask::MaskBuffer;

/// One inference result.
#[derive(Debug, Clone)]
pub struct InferenceOutput {
    pub mask: MaskBuffer,
    /// Facial landmarks, when the backend detects them.
    pub landmarks: Option<FaceLandmarks>,
}

/// A person-segmentation model.
pub trait SegmentationBackend: Send {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Load weights and prepare for inference. Called once, on the thread
    /// that will run `infer`.
    fn initialize(&mut self) -> AiResult<()>;

    /// Produce a mask for `frame`.
    fn infer(&mut self, frame: &FrameBuffer) -> AiResult<InferenceOutput>;

    /// Release model resources. Must tolerate repeated calls.
    fn dispose(&mut self);
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// `initialize` with a panic reported as [`AiError::Panicked`].
pub(crate) fn guarded_initialize(backend: &mut dyn SegmentationBackend) -> AiResult<()> {
    panic::catch_unwind(AssertUnwindSafe(|| backend.initialize()))
        .unwrap_or_else(|p| Err(AiError::Panicked(panic_message(p.as_ref()))))
}

/// `infer` with a panic reported as [`AiError::Panicked`].
pub(crate) fn guarded_infer(
    backend: &mut dyn SegmentationBackend,
    frame: &FrameBuffer,
) -> AiResult<InferenceOutput> {
    panic::catch_unwind(AssertUnwindSafe(|| backend.infer(frame)))
        .unwrap_or_else(|p| Err(AiError::Panicked(panic_message(p.as_ref()))))
}

/// Creates a fresh backend; used again on re-initialization.
pub type BackendFactory = Box<dyn Fn() -> Box<dyn SegmentationBackend> + Send + Sync>;

/// Model-free segmenter that keys out the background color estimated from
/// the frame border.
///
/// Good enough for a plain backdrop and cheap enough to run on the render
/// thread, which makes it the default synchronous fallback.
#[derive(Debug, Clone)]
pub struct LumaKeyBackend {
    /// Mask width; height follows the frame aspect.
    pub mask_width: u32,
    /// Color distance (0–1) at which a pixel starts counting as foreground.
    pub threshold: f32,
    /// Width of the soft transition above `threshold`.
    pub softness: f32,
    initialized: bool,
}

impl Default for LumaKeyBackend {
    fn default() -> Self {
        Self {
            mask_width: 160,
            threshold: 0.12,
            softness: 0.10,
            initialized: false,
        }
    }
}

impl LumaKeyBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mean color of a one-pixel ring along the frame border.
    fn border_color(frame: &FrameBuffer) -> [f32; 3] {
        let (w, h) = frame.dimensions();
        let mut sum = [0.0f64; 3];
        let mut count = 0u64;
        let step = (w.max(h) / 64).max(1);
        let mut add = |x: u32, y: u32| {
            let p = frame.pixel(x, y);
            for c in 0..3 {
                sum[c] += p[c] as f64;
            }
            count += 1;
        };
        for x in (0..w).step_by(step as usize) {
            add(x, 0);
            add(x, h - 1);
        }
        for y in (0..h).step_by(step as usize) {
            add(0, y);
            add(w - 1, y);
        }
        let n = count.max(1) as f64 * 255.0;
        [(sum[0] / n) as f32, (sum[1] / n) as f32, (sum[2] / n) as f32]
    }
}

impl SegmentationBackend for LumaKeyBackend {
    fn name(&self) -> &str {
        "luma-key"
    }

    fn initialize(&mut self) -> AiResult<()> {
        self.initialized = true;
        debug!(backend = self.name(), "Segmentation backend initialized");
        Ok(())
    }

    fn infer(&mut self, frame: &FrameBuffer) -> AiResult<InferenceOutput> {
        if !self.initialized {
            return Err(AiError::ModelNotLoaded);
        }
        if frame.format != PixelFormat::Rgba8 || frame.width == 0 || frame.height == 0 {
            return Err(AiError::PreprocessError(
                "luma key needs a non-empty RGBA8 frame".into(),
            ));
        }

        let bg = Self::border_color(frame);
        let mw = self.mask_width.clamp(1, frame.width);
        let mh = ((frame.height as u64 * mw as u64) / frame.width as u64).max(1) as u32;
        let mut mask = MaskBuffer::new(mw, mh);
        let softness = self.softness.max(1e-3);

        for my in 0..mh {
            let sy = ((my as f32 + 0.5) * frame.height as f32 / mh as f32) as u32;
            for mx in 0..mw {
                let sx = ((mx as f32 + 0.5) * frame.width as f32 / mw as f32) as u32;
                let p = frame.pixel(sx, sy);
                let dr = p[0] as f32 / 255.0 - bg[0];
                let dg = p[1] as f32 / 255.0 - bg[1];
                let db = p[2] as f32 / 255.0 - bg[2];
                let dist = (dr * dr + dg * dg + db * db).sqrt() / 3f32.sqrt();
                let t = ((dist - self.threshold) / softness).clamp(0.0, 1.0);
                mask.set(mx, my, (t * t * (3.0 - 2.0 * t) * 255.0).round() as u8);
            }
        }

        Ok(InferenceOutput {
            mask,
            landmarks: None,
        })
    }

    fn dispose(&mut self) {
        self.initialized = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infer_requires_initialize() {
        let mut backend = LumaKeyBackend::new();
        let frame = FrameBuffer::solid(32, 32, [0, 0, 0, 255]);
        assert!(matches!(backend.infer(&frame), Err(AiError::ModelNotLoaded)));
    }

    #[test]
    fn keys_out_uniform_border() {
        let mut frame = FrameBuffer::solid(128, 96, [20, 160, 40, 255]);
        for y in 30..66 {
            for x in 44..84 {
                frame.set_pixel(x, y, [230, 200, 180, 255]);
            }
        }
        let mut backend = LumaKeyBackend {
            mask_width: 64,
            ..Default::default()
        };
        backend.initialize().unwrap();
        let out = backend.infer(&frame).unwrap();
        assert_eq!((out.mask.width, out.mask.height), (64, 48));
        assert!(out.mask.sample(0.5, 0.5) > 0.9);
        assert!(out.mask.sample(0.05, 0.05) < 0.1);
        backend.dispose();
        backend.dispose();
    }
}
