//! Segmentation-driven effects: background blur or replacement, background
//! dimming and foreground skin smoothing, composited through the mask.

use std::sync::Arc;

use camfx_ai::MaskBuffer;
use camfx_core::{EffectParameterSet, FrameBuffer};
use rayon::prelude::*;
use tracing::trace;

use crate::blur::BoxBlur;
use crate::config::CompositorConfig;
use crate::filter::ColorMatrix;

/// Per-frame inputs of the AI stage.
#[derive(Debug, Clone, Copy)]
pub struct AiInput<'a> {
    pub mask: &'a Arc<MaskBuffer>,
    /// Base color filter, applied to a replacement background so it matches
    /// the already-filtered camera image.
    pub filter: &'a ColorMatrix,
    /// Face smoothing allowed this frame.
    pub smoothing: bool,
}

struct AlphaCache {
    mask: Arc<MaskBuffer>,
    width: u32,
    height: u32,
    feather: u32,
    alpha: MaskBuffer,
}

#[derive(Default)]
pub struct AiStage {
    blur: BoxBlur,
    background: Option<FrameBuffer>,
    smoothed: Option<FrameBuffer>,
    alpha: Option<AlphaCache>,
    alpha_builds: u64,
    image: Option<FrameBuffer>,
    scaled_image: Option<FrameBuffer>,
}

impl AiStage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replacement background for `virtual_background`.
    pub fn set_background_image(&mut self, image: Option<FrameBuffer>) {
        self.image = image;
        self.scaled_image = None;
    }

    pub fn has_background_image(&self) -> bool {
        self.image.is_some()
    }

    /// Times the feathered alpha was rebuilt.
    pub fn alpha_builds(&self) -> u64 {
        self.alpha_builds
    }

    /// Drop size-dependent scratch.
    pub fn invalidate(&mut self) {
        self.alpha = None;
        self.scaled_image = None;
        self.background = None;
        self.smoothed = None;
    }

    /// Whether the stage would change anything for these parameters.
    pub fn is_active(&self, params: &EffectParameterSet, smoothing: bool) -> bool {
        params.blur > 0.0
            || (params.virtual_background && self.image.is_some())
            || params.portrait_lighting > 0.0
            || (smoothing && params.face_smoothing > 0.0)
    }

    pub fn apply(
        &mut self,
        frame: &mut FrameBuffer,
        params: &EffectParameterSet,
        input: &AiInput<'_>,
        config: &CompositorConfig,
    ) {
        if !self.is_active(params, input.smoothing) || frame.is_empty() {
            return;
        }
        let (w, h) = frame.dimensions();
        self.update_alpha(input.mask, w, h, config.mask_feather);

        let background = scratch_copy(&mut self.background, frame);
        let replaced = params.virtual_background && self.image.is_some();
        if replaced {
            if let Some(image) = &self.image {
                let scaled = self
                    .scaled_image
                    .get_or_insert_with(|| cover_resize(image, w, h));
                if !scaled.same_size(background) {
                    *scaled = cover_resize(image, w, h);
                }
                background.data.copy_from_slice(&scaled.data);
                input.filter.apply_to_frame(background);
            }
        } else if params.blur > 0.0 {
            self.blur.apply(background, params.blur);
        }
        if params.portrait_lighting > 0.0 {
            let dim = 1.0 - params.portrait_lighting / 100.0 * config.background_dim;
            scale_rgb(background, dim);
        }

        let smoothing = if input.smoothing && params.face_smoothing > 0.0 {
            let smoothed = scratch_copy(&mut self.smoothed, frame);
            self.blur.apply(smoothed, config.smoothing_sigma);
            Some((
                &*smoothed,
                params.face_smoothing / 100.0 * config.smoothing_mix,
            ))
        } else {
            None
        };

        let Some(alpha) = self.alpha.as_ref().map(|a| &a.alpha) else {
            return;
        };
        let background: &FrameBuffer = background;
        let stride = frame.stride();
        frame
            .data
            .par_chunks_mut(stride)
            .enumerate()
            .for_each(|(y, row)| {
                let bg_row = background.row(y as u32);
                let smooth_row = smoothing.map(|(s, mix)| (s.row(y as u32), mix));
                let alpha_row = &alpha.data[y * w as usize..(y + 1) * w as usize];
                for (x, px) in row.chunks_exact_mut(4).enumerate() {
                    let a = alpha_row[x] as f32 / 255.0;
                    let i = x * 4;
                    for c in 0..3 {
                        let mut fg = px[c] as f32;
                        if let Some((s, mix)) = smooth_row {
                            fg += (s[i + c] as f32 - fg) * mix;
                        }
                        let v = fg * a + bg_row[i + c] as f32 * (1.0 - a);
                        px[c] = v.round().clamp(0.0, 255.0) as u8;
                    }
                }
            });
    }

    fn update_alpha(&mut self, mask: &Arc<MaskBuffer>, width: u32, height: u32, feather: u32) {
        let fresh = self.alpha.as_ref().is_some_and(|c| {
            Arc::ptr_eq(&c.mask, mask) && c.width == width && c.height == height && c.feather == feather
        });
        if fresh {
            return;
        }
        let mut alpha = mask.resized(width, height);
        alpha.feather(feather);
        self.alpha = Some(AlphaCache {
            mask: Arc::clone(mask),
            width,
            height,
            feather,
            alpha,
        });
        self.alpha_builds += 1;
        trace!(width, height, feather, "Rebuilt feathered mask");
    }
}

/// Reuse `slot` as a copy of `frame`, reallocating only on size change.
fn scratch_copy<'a>(slot: &'a mut Option<FrameBuffer>, frame: &FrameBuffer) -> &'a mut FrameBuffer {
    let reuse = slot
        .as_ref()
        .is_some_and(|s| s.same_size(frame) && s.format == frame.format);
    if !reuse {
        return slot.insert(frame.clone());
    }
    let scratch = slot.get_or_insert_with(|| frame.clone());
    scratch.data.copy_from_slice(&frame.data);
    scratch
}

fn scale_rgb(frame: &mut FrameBuffer, factor: f32) {
    let factor = factor.clamp(0.0, 1.0);
    frame.data.par_chunks_mut(4).for_each(|px| {
        for v in &mut px[..3] {
            *v = (*v as f32 * factor).round() as u8;
        }
    });
}

/// Scale `image` to cover `width` x `height`, cropping the overflow.
pub fn cover_resize(image: &FrameBuffer, width: u32, height: u32) -> FrameBuffer {
    let mut out = FrameBuffer::solid(width, height, [0, 0, 0, 255]);
    if image.width == 0 || image.height == 0 {
        return out;
    }
    let scale = (width as f32 / image.width as f32).max(height as f32 / image.height as f32);
    let off_x = (image.width as f32 * scale - width as f32) * 0.5;
    let off_y = (image.height as f32 * scale - height as f32) * 0.5;
    let stride = out.stride();
    out.data
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row)| {
            let sy = ((y as f32 + 0.5 + off_y) / scale - 0.5).max(0.0);
            for (x, px) in row.chunks_exact_mut(4).enumerate() {
                let sx = ((x as f32 + 0.5 + off_x) / scale - 0.5).max(0.0);
                let mut p = crate::transform::sample_bilinear(image, sx, sy);
                p[3] = 255;
                px.copy_from_slice(&p);
            }
        });
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(stage: &mut AiStage, frame: &mut FrameBuffer, params: &EffectParameterSet, mask: &Arc<MaskBuffer>) {
        let filter = ColorMatrix::IDENTITY;
        let input = AiInput {
            mask,
            filter: &filter,
            smoothing: true,
        };
        stage.apply(frame, params, &input, &CompositorConfig::default());
    }

    #[test]
    fn inactive_without_effects() {
        let mut frame = FrameBuffer::checkerboard(32, 32, 2);
        let original = frame.clone();
        let mask = Arc::new(MaskBuffer::centered_box(32, 32, 0.5, 0.5));
        let mut stage = AiStage::new();
        run(&mut stage, &mut frame, &EffectParameterSet::default(), &mask);
        assert_eq!(frame, original);
        assert_eq!(stage.alpha_builds(), 0);
    }

    #[test]
    fn blur_leaves_foreground_sharp() {
        let mut frame = FrameBuffer::checkerboard(96, 96, 2);
        let original = frame.clone();
        let mask = Arc::new(MaskBuffer::centered_box(96, 96, 0.5, 0.5));
        let params = EffectParameterSet {
            blur: 8.0,
            ..Default::default()
        };
        let mut stage = AiStage::new();
        run(&mut stage, &mut frame, &params, &mask);
        assert_eq!(frame.pixel(48, 48), original.pixel(48, 48));
        assert_eq!(frame.pixel(49, 48), original.pixel(49, 48));
        let corner = frame.pixel(3, 3)[0];
        assert!(corner > 60 && corner < 200, "corner should be blurred, got {corner}");
    }

    #[test]
    fn virtual_background_replaces_and_dims() {
        let mut frame = FrameBuffer::solid(64, 64, [200, 200, 200, 255]);
        let mask = Arc::new(MaskBuffer::centered_box(64, 64, 0.4, 0.4));
        let params = EffectParameterSet {
            virtual_background: true,
            portrait_lighting: 50.0,
            ..Default::default()
        };
        let mut stage = AiStage::new();
        stage.set_background_image(Some(FrameBuffer::solid(16, 9, [0, 100, 0, 255])));
        run(&mut stage, &mut frame, &params, &mask);
        let dim = 1.0 - 0.5 * CompositorConfig::default().background_dim;
        let expected = (100.0 * dim).round() as u8;
        assert_eq!(frame.pixel(1, 1), [0, expected, 0, 255]);
        assert_eq!(frame.pixel(32, 32), [200, 200, 200, 255]);
    }

    #[test]
    fn alpha_rebuilt_only_for_new_mask() {
        let mut frame = FrameBuffer::solid(40, 30, [10, 20, 30, 255]);
        let mask = Arc::new(MaskBuffer::centered_box(20, 15, 0.5, 0.5));
        let params = EffectParameterSet {
            portrait_lighting: 20.0,
            ..Default::default()
        };
        let mut stage = AiStage::new();
        run(&mut stage, &mut frame, &params, &mask);
        run(&mut stage, &mut frame, &params, &mask);
        assert_eq!(stage.alpha_builds(), 1);
        let newer = Arc::new(MaskBuffer::centered_box(20, 15, 0.5, 0.5));
        run(&mut stage, &mut frame, &params, &newer);
        assert_eq!(stage.alpha_builds(), 2);
    }

    #[test]
    fn cover_resize_fills_frame() {
        let image = FrameBuffer::solid(10, 40, [9, 8, 7, 255]);
        let out = cover_resize(&image, 30, 20);
        assert_eq!(out.dimensions(), (30, 20));
        assert!(out.pixels().iter().all(|p| *p == [9, 8, 7, 255]));
    }
}
