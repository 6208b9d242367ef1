//! Geometric stage: mirror, zoom, rotation and pan by inverse mapping.

use camfx_core::{EffectParameterSet, FrameBuffer, Transform2D, Vec2};
use rayon::prelude::*;

/// View transform described by the parameters for a frame of this size.
pub fn view_transform(params: &EffectParameterSet, width: u32, height: u32) -> Transform2D {
    Transform2D::view(
        width as f32,
        height as f32,
        params.zoom,
        params.rotation,
        Vec2::new(params.pan_x, params.pan_y),
        params.mirror,
    )
}

/// Resamples a frame through a view transform.
#[derive(Debug, Default)]
pub struct GeometryStage {
    scratch: Option<FrameBuffer>,
}

impl GeometryStage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `transform` to `frame` in place. Pixels mapping outside the
    /// source become opaque black.
    pub fn apply(&mut self, frame: &mut FrameBuffer, transform: Transform2D) {
        if transform.is_identity() || frame.is_empty() {
            return;
        }
        let needs_alloc = self
            .scratch
            .as_ref()
            .map_or(true, |s| s.data.len() != frame.data.len() || !s.same_size(frame));
        if needs_alloc {
            self.scratch = Some(frame.clone());
        }
        let Some(src) = self.scratch.as_mut() else {
            return;
        };
        src.data.copy_from_slice(&frame.data);

        let inverse = transform.inverse();
        let src: &FrameBuffer = src;
        let stride = frame.stride();
        frame
            .data
            .par_chunks_mut(stride)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, px) in row.chunks_exact_mut(4).enumerate() {
                    let p = inverse.transform_point(Vec2::new(x as f32 + 0.5, y as f32 + 0.5));
                    px.copy_from_slice(&sample_bilinear(src, p.x - 0.5, p.y - 0.5));
                }
            });
    }
}

/// Bilinear sample at pixel-center coordinates; black outside the frame.
pub(crate) fn sample_bilinear(src: &FrameBuffer, x: f32, y: f32) -> [u8; 4] {
    let w = src.width as f32;
    let h = src.height as f32;
    if x < -0.5 || y < -0.5 || x > w - 0.5 || y > h - 0.5 {
        return [0, 0, 0, 255];
    }
    let x = x.clamp(0.0, w - 1.0);
    let y = y.clamp(0.0, h - 1.0);
    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;
    let p00 = src.pixel(x0, y0);
    let p10 = src.pixel(x0 + 1, y0);
    let p01 = src.pixel(x0, y0 + 1);
    let p11 = src.pixel(x0 + 1, y0 + 1);
    let mut out = [0u8; 4];
    for c in 0..4 {
        let top = p00[c] as f32 * (1.0 - fx) + p10[c] as f32 * fx;
        let bottom = p01[c] as f32 * (1.0 - fx) + p11[c] as f32 * fx;
        out[c] = (top * (1.0 - fy) + bottom * fy).round() as u8;
    }
    out
}
