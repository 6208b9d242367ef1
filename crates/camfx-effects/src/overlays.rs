//! Monitoring overlays: composition grid, luma histogram, zebra stripes and
//! focus peaking.
//!
//! The grid is drawn first, straight onto the frame. The other three share
//! a single readback taken after it into a pre-allocated scratch buffer, so
//! grid lines are part of what they measure but zebra and peaking marks
//! never feed into each other or the histogram.

use camfx_core::{CamFxError, EffectParameterSet, FrameBuffer, GridType, PixelFormat, Result};
use rayon::prelude::*;
use tracing::trace;

const GRID_RGB: [f32; 3] = [255.0, 255.0, 255.0];
const GRID_ALPHA: f32 = 0.5;
const HISTOGRAM_BINS: usize = 256;

/// Normalized positions of the guide lines for a grid type.
pub fn grid_lines(grid: GridType) -> &'static [f32] {
    match grid {
        GridType::None => &[],
        GridType::RuleOfThirds => &[1.0 / 3.0, 2.0 / 3.0],
        GridType::GoldenRatio => &[0.381_966, 0.618_034],
        GridType::Center => &[0.5],
        GridType::Square4 => &[0.25, 0.5, 0.75],
    }
}

/// Which overlays ran on a frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverlayReport {
    pub grid: bool,
    pub histogram: bool,
    pub zebra: bool,
    pub focus_peaking: bool,
    /// The readback was refused; pixel overlays were skipped.
    pub readback_failed: bool,
}

#[derive(Debug)]
pub struct OverlayRenderer {
    readback: Option<FrameBuffer>,
    luma: Vec<u8>,
    histogram: [u32; HISTOGRAM_BINS],
    protected: bool,
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self {
            readback: None,
            luma: Vec::new(),
            histogram: [0; HISTOGRAM_BINS],
            protected: false,
        }
    }
}

impl OverlayRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the source as protected content; readbacks are refused.
    pub fn set_protected(&mut self, protected: bool) {
        self.protected = protected;
    }

    /// Luma histogram of the last readback.
    pub fn histogram(&self) -> &[u32; HISTOGRAM_BINS] {
        &self.histogram
    }

    pub fn apply(&mut self, frame: &mut FrameBuffer, params: &EffectParameterSet) -> OverlayReport {
        let mut report = OverlayReport::default();
        if frame.is_empty() {
            return report;
        }
        if params.grid != GridType::None {
            draw_grid(frame, params.grid);
            report.grid = true;
        }
        if !params.needs_pixel_readback() {
            return report;
        }
        if let Err(e) = self.read_pixels(frame) {
            trace!(error = %e, "Overlay readback refused; skipping pixel overlays");
            report.readback_failed = true;
            return report;
        }

        let (w, h) = (frame.width as usize, frame.height as usize);
        if params.zebra {
            let threshold = (params.zebra_threshold / 100.0 * 255.0).round() as u8;
            draw_zebra(frame, &self.luma, threshold);
            report.zebra = true;
        }
        if params.focus_peaking {
            let threshold = params.focus_peaking_threshold / 100.0 * 255.0;
            draw_peaking(frame, &self.luma, w, h, threshold, params.focus_peaking_color.rgba());
            report.focus_peaking = true;
        }
        if params.histogram {
            self.compute_histogram();
            draw_histogram(frame, &self.histogram);
            report.histogram = true;
        }
        report
    }

    /// Copy the frame into the scratch buffer and derive its luma plane.
    fn read_pixels(&mut self, frame: &FrameBuffer) -> Result<()> {
        if self.protected {
            return Err(CamFxError::Effect("surface holds protected content".into()));
        }
        if frame.format != PixelFormat::Rgba8 {
            return Err(CamFxError::UnsupportedFormat(format!("{:?}", frame.format)));
        }
        let reuse = self.readback.as_ref().is_some_and(|s| s.same_size(frame));
        if !reuse {
            self.readback = Some(frame.clone());
        }
        let Some(scratch) = self.readback.as_mut() else {
            return Err(CamFxError::Internal("readback buffer missing".into()));
        };
        if reuse {
            scratch.data.copy_from_slice(&frame.data);
        }

        self.luma.resize(frame.width as usize * frame.height as usize, 0);
        self.luma
            .par_iter_mut()
            .zip(scratch.data.par_chunks(4))
            .for_each(|(l, px)| *l = luma(px));
        Ok(())
    }

    fn compute_histogram(&mut self) {
        self.histogram = [0; HISTOGRAM_BINS];
        for &l in &self.luma {
            self.histogram[l as usize] += 1;
        }
    }
}

#[inline]
fn luma(px: &[u8]) -> u8 {
    ((px[0] as u32 * 54 + px[1] as u32 * 183 + px[2] as u32 * 19) >> 8) as u8
}

fn blend(px: &mut [u8], rgb: [f32; 3], alpha: f32) {
    for c in 0..3 {
        px[c] = (px[c] as f32 * (1.0 - alpha) + rgb[c] * alpha).round() as u8;
    }
}

fn draw_grid(frame: &mut FrameBuffer, grid: GridType) {
    let (w, h) = frame.dimensions();
    if w == 0 || h == 0 {
        return;
    }
    let thickness = (w.min(h) / 360).max(1);
    let lines = grid_lines(grid);
    let cols: Vec<u32> = lines.iter().map(|f| (f * w as f32) as u32).collect();
    let rows: Vec<u32> = lines.iter().map(|f| (f * h as f32) as u32).collect();
    let on_line = |v: u32, at: &[u32]| at.iter().any(|&l| v >= l && v < l + thickness);

    for y in 0..h {
        let full_row = on_line(y, &rows);
        let row = frame.row_mut(y);
        for (x, px) in row.chunks_exact_mut(4).enumerate() {
            if full_row || on_line(x as u32, &cols) {
                blend(px, GRID_RGB, GRID_ALPHA);
            }
        }
    }
}

fn draw_zebra(frame: &mut FrameBuffer, luma: &[u8], threshold: u8) {
    if frame.is_empty() {
        return;
    }
    let width = frame.width as usize;
    let stride = frame.stride();
    frame
        .data
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, px) in row.chunks_exact_mut(4).enumerate() {
                if luma[y * width + x] >= threshold {
                    let stripe = ((x + y) / 4) % 2 == 0;
                    let v = if stripe { 0 } else { 255 };
                    px[..3].copy_from_slice(&[v, v, v]);
                }
            }
        });
}

fn draw_peaking(
    frame: &mut FrameBuffer,
    luma: &[u8],
    w: usize,
    h: usize,
    threshold: f32,
    color: [u8; 4],
) {
    if w < 3 || h < 3 {
        return;
    }
    let stride = frame.stride();
    frame
        .data
        .par_chunks_mut(stride)
        .enumerate()
        .skip(1)
        .take(h - 2)
        .for_each(|(y, row)| {
            for x in 1..w - 1 {
                let l = |xx: usize, yy: usize| luma[yy * w + xx] as f32;
                let gx = l(x + 1, y) - l(x - 1, y);
                let gy = l(x, y + 1) - l(x, y - 1);
                if gx.abs() + gy.abs() > threshold {
                    row[x * 4..x * 4 + 3].copy_from_slice(&color[..3]);
                }
            }
        });
}

fn draw_histogram(frame: &mut FrameBuffer, histogram: &[u32; HISTOGRAM_BINS]) {
    let (w, h) = frame.dimensions();
    let box_w = (w / 4).clamp(1, HISTOGRAM_BINS as u32);
    let box_h = (h / 6).max(1);
    let margin = (w.min(h) / 40).max(1);
    if box_w + margin >= w || box_h + margin >= h {
        return;
    }
    let x0 = margin;
    let y0 = h - margin - box_h;

    // sqrt scale so midtones stay visible next to clipped spikes
    let peak = histogram.iter().copied().max().unwrap_or(0).max(1) as f32;
    let bins_per_col = HISTOGRAM_BINS as f32 / box_w as f32;
    for bx in 0..box_w {
        let start = (bx as f32 * bins_per_col) as usize;
        let end = (((bx + 1) as f32 * bins_per_col) as usize).clamp(start + 1, HISTOGRAM_BINS);
        let count = histogram[start..end].iter().copied().max().unwrap_or(0) as f32;
        let bar = ((count / peak).sqrt() * box_h as f32).round() as u32;
        for by in 0..box_h {
            let y = y0 + by;
            let i = ((x0 + bx) * 4) as usize;
            let px = &mut frame.row_mut(y)[i..i + 4];
            if box_h - by <= bar {
                blend(px, [235.0, 235.0, 235.0], 0.85);
            } else {
                blend(px, [0.0, 0.0, 0.0], 0.5);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camfx_core::PeakingColor;

    #[test]
    fn grid_only_touches_lines() {
        let mut frame = FrameBuffer::solid(90, 60, [0, 0, 0, 255]);
        let params = EffectParameterSet {
            grid: GridType::RuleOfThirds,
            ..Default::default()
        };
        let report = OverlayRenderer::new().apply(&mut frame, &params);
        assert!(report.grid && !report.histogram);
        assert_eq!(frame.pixel(30, 5)[0], 128);
        assert_eq!(frame.pixel(5, 20)[0], 128);
        assert_eq!(frame.pixel(5, 5)[0], 0);
    }

    #[test]
    fn zebra_marks_only_highlights() {
        let mut frame = FrameBuffer::solid(32, 8, [100, 100, 100, 255]);
        for y in 0..8 {
            for x in 16..32 {
                frame.set_pixel(x, y, [250, 250, 250, 255]);
            }
        }
        let params = EffectParameterSet {
            zebra: true,
            zebra_threshold: 90.0,
            ..Default::default()
        };
        let report = OverlayRenderer::new().apply(&mut frame, &params);
        assert!(report.zebra);
        assert_eq!(frame.pixel(2, 2), [100, 100, 100, 255]);
        let marked: Vec<u8> = (16..32).map(|x| frame.pixel(x, 0)[0]).collect();
        assert!(marked.contains(&0) && marked.contains(&255));
    }

    #[test]
    fn peaking_highlights_edges() {
        let mut frame = FrameBuffer::solid(20, 10, [0, 0, 0, 255]);
        for y in 0..10 {
            for x in 10..20 {
                frame.set_pixel(x, y, [255, 255, 255, 255]);
            }
        }
        let params = EffectParameterSet {
            focus_peaking: true,
            focus_peaking_color: PeakingColor::Green,
            focus_peaking_threshold: 50.0,
            ..Default::default()
        };
        OverlayRenderer::new().apply(&mut frame, &params);
        assert_eq!(frame.pixel(10, 5)[..3], PeakingColor::Green.rgba()[..3]);
        assert_eq!(frame.pixel(3, 5), [0, 0, 0, 255]);
    }

    #[test]
    fn protected_surface_skips_pixel_overlays() {
        let mut frame = FrameBuffer::solid(64, 48, [255, 255, 255, 255]);
        let original = frame.clone();
        let params = EffectParameterSet {
            zebra: true,
            histogram: true,
            ..Default::default()
        };
        let mut overlays = OverlayRenderer::new();
        overlays.set_protected(true);
        let report = overlays.apply(&mut frame, &params);
        assert!(report.readback_failed);
        assert!(!report.zebra && !report.histogram);
        assert_eq!(frame, original);
    }

    #[test]
    fn readback_sees_grid_lines() {
        let mut frame = FrameBuffer::solid(90, 60, [0, 0, 0, 255]);
        let params = EffectParameterSet {
            grid: GridType::Center,
            histogram: true,
            ..Default::default()
        };
        let mut overlays = OverlayRenderer::new();
        overlays.apply(&mut frame, &params);
        let hist = overlays.histogram();
        // one vertical and one horizontal line, one pixel thick, sharing a pixel
        assert_eq!(hist[128], 90 + 60 - 1);
        assert_eq!(hist[0], 90 * 60 - (90 + 60 - 1));
    }

    #[test]
    fn empty_frame_is_ignored() {
        let mut frame = FrameBuffer::new(0, 12, PixelFormat::Rgba8);
        let params = EffectParameterSet {
            grid: GridType::RuleOfThirds,
            zebra: true,
            focus_peaking: true,
            histogram: true,
            ..Default::default()
        };
        let report = OverlayRenderer::new().apply(&mut frame, &params);
        assert_eq!(report, OverlayReport::default());
        assert_eq!(frame.pixel(0, 0), [0; 4]);
    }

    #[test]
    fn histogram_counts_every_pixel() {
        let mut frame = FrameBuffer::checkerboard(64, 48, 4);
        let params = EffectParameterSet {
            histogram: true,
            ..Default::default()
        };
        let mut overlays = OverlayRenderer::new();
        let report = overlays.apply(&mut frame, &params);
        assert!(report.histogram);
        assert_eq!(overlays.histogram().iter().sum::<u32>(), 64 * 48);
    }
}
