//! CPU rendition of the grading and warp passes.
//!
//! Used when no GPU is available. The math mirrors `warp.wgsl` and
//! `grade.wgsl`, so results match the GPU within unorm rounding.

use camfx_color::WarpUniforms;
use camfx_core::{FrameBuffer, PixelFormat, Vec2};
use rayon::prelude::*;

use crate::error::GpuError;
use crate::GradeRequest;

/// Row-parallel software grader.
#[derive(Debug, Default)]
pub struct SoftwareGrader {
    scratch: Option<FrameBuffer>,
}

#[inline]
fn to_unorm(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Bilinear clamp-to-edge sample at a UV coordinate, like a linear sampler.
fn sample_bilinear(src: &FrameBuffer, uv: Vec2) -> [u8; 4] {
    let w = src.width as f32;
    let h = src.height as f32;
    let x = (uv.x * w - 0.5).clamp(0.0, w - 1.0);
    let y = (uv.y * h - 0.5).clamp(0.0, h - 1.0);
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
        let top = p00[c] as f32 + (p10[c] as f32 - p00[c] as f32) * fx;
        let bottom = p01[c] as f32 + (p11[c] as f32 - p01[c] as f32) * fx;
        out[c] = (top + (bottom - top) * fy).round() as u8;
    }
    out
}

impl SoftwareGrader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply warp then grade in place.
    pub fn process(&mut self, frame: &mut FrameBuffer, request: &GradeRequest<'_>) -> Result<(), GpuError> {
        if frame.format != PixelFormat::Rgba8 {
            return Err(GpuError::UnsupportedFrame("software grader needs RGBA8".into()));
        }
        if frame.is_empty() {
            return Ok(());
        }
        if let Some(warp) = &request.warp {
            self.warp(frame, warp);
        }
        if let Some(lut) = request.lut {
            let intensity = request.intensity;
            let stride = frame.stride();
            frame.data.par_chunks_mut(stride).for_each(|row| {
                for px in row.chunks_exact_mut(4) {
                    let rgb = [
                        px[0] as f32 / 255.0,
                        px[1] as f32 / 255.0,
                        px[2] as f32 / 255.0,
                    ];
                    let out = lut.grade(rgb, intensity);
                    px[0] = to_unorm(out[0]);
                    px[1] = to_unorm(out[1]);
                    px[2] = to_unorm(out[2]);
                }
            });
        }
        Ok(())
    }

    fn warp(&mut self, frame: &mut FrameBuffer, warp: &WarpUniforms) {
        if !self.scratch.as_ref().is_some_and(|s| s.same_size(frame)) {
            self.scratch = Some(FrameBuffer::new(frame.width, frame.height, PixelFormat::Rgba8));
        }
        let Some(scratch) = self.scratch.as_mut() else {
            return;
        };
        scratch.data.copy_from_slice(&frame.data);
        let src: &FrameBuffer = scratch;

        let (w, h) = (frame.width as f32, frame.height as f32);
        let stride = frame.stride();
        frame
            .data
            .par_chunks_mut(stride)
            .enumerate()
            .for_each(|(y, row)| {
                let v = (y as f32 + 0.5) / h;
                for (x, px) in row.chunks_exact_mut(4).enumerate() {
                    let uv = Vec2::new((x as f32 + 0.5) / w, v);
                    px.copy_from_slice(&sample_bilinear(src, warp.source_uv(uv)));
                }
            });
    }
}
