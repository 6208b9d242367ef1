//! Seams to the outside world: the camera, the display refresh and the
//! output surface.
//!
//! The scheduler only talks to these traits. The small implementations here
//! drive the headless runner and the tests.

use std::fmt;

use camfx_core::{FrameBuffer, Vec2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Camera-side controls the device already applies in hardware. A control
/// reported here is neutralised in the software transform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareControls {
    pub zoom: bool,
    pub pan: bool,
    pub tilt: bool,
}

/// Live video input.
pub trait VideoSource {
    /// The newest frame, or `None` when nothing new is ready.
    fn next_frame(&mut self) -> Option<FrameBuffer>;

    fn hardware_controls(&self) -> HardwareControls {
        HardwareControls::default()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    /// The surface cannot be used again.
    #[error("surface lost: {0}")]
    Lost(String),
    /// This frame could not be shown; the next one may be.
    #[error("surface outdated")]
    Outdated,
}

/// Where composited frames go.
pub trait OutputSink {
    fn present(&mut self, frame: &FrameBuffer) -> Result<(), SurfaceError>;
}

/// Handle of one requested display refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameRequestId(pub u64);

impl fmt::Display for FrameRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vsync#{}", self.0)
    }
}

/// Display refresh callbacks. The owner calls `on_vsync` on the scheduler
/// when a requested refresh arrives.
pub trait DisplayLink {
    fn request_frame(&mut self) -> FrameRequestId;
    fn cancel_frame(&mut self, id: FrameRequestId);
}

/// Display link driven by hand: the caller decides when a refresh happens.
#[derive(Debug, Default)]
pub struct ManualDisplayLink {
    next_id: u64,
    pending: Option<FrameRequestId>,
    cancelled: u64,
}

impl ManualDisplayLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// The outstanding request, if any.
    pub fn pending(&self) -> Option<FrameRequestId> {
        self.pending
    }

    /// Take the outstanding request as if the refresh fired.
    pub fn fire(&mut self) -> Option<FrameRequestId> {
        self.pending.take()
    }

    pub fn cancelled(&self) -> u64 {
        self.cancelled
    }
}

impl DisplayLink for ManualDisplayLink {
    fn request_frame(&mut self) -> FrameRequestId {
        self.next_id += 1;
        let id = FrameRequestId(self.next_id);
        self.pending = Some(id);
        id
    }

    fn cancel_frame(&mut self, id: FrameRequestId) {
        if self.pending == Some(id) {
            self.pending = None;
            self.cancelled += 1;
        }
    }
}

/// Sink that counts frames and keeps the last one.
#[derive(Debug, Default)]
pub struct NullSink {
    pub presented: u64,
    pub last: Option<FrameBuffer>,
    keep_last: bool,
}

impl NullSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also keep a copy of the most recent frame.
    pub fn keeping_last() -> Self {
        Self {
            keep_last: true,
            ..Self::default()
        }
    }
}

impl OutputSink for NullSink {
    fn present(&mut self, frame: &FrameBuffer) -> Result<(), SurfaceError> {
        self.presented += 1;
        if !self.keep_last {
            return Ok(());
        }
        match self.last.as_mut() {
            Some(last) if last.same_size(frame) => last.data.copy_from_slice(&frame.data),
            _ => self.last = Some(frame.clone()),
        }
        Ok(())
    }
}

/// Camera stand-in: a textured subject drifting over a flat backdrop.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    width: u32,
    height: u32,
    frame_index: u64,
    backdrop: [u8; 4],
    hardware: HardwareControls,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frame_index: 0,
            backdrop: [40, 90, 60, 255],
            hardware: HardwareControls::default(),
        }
    }

    pub fn with_hardware_controls(mut self, hardware: HardwareControls) -> Self {
        self.hardware = hardware;
        self
    }

    pub fn frames_produced(&self) -> u64 {
        self.frame_index
    }

    /// Subject center in normalized coordinates for frame `index`.
    pub fn subject_center(index: u64) -> Vec2 {
        let t = index as f32 / 60.0;
        Vec2::new(0.5 + 0.15 * (t * 0.7).sin(), 0.55 + 0.05 * (t * 1.3).cos())
    }

    fn render(&self) -> FrameBuffer {
        let mut frame = FrameBuffer::solid(self.width, self.height, self.backdrop);
        let (w, h) = (self.width as f32, self.height as f32);
        let center = Self::subject_center(self.frame_index);
        let (cx, cy) = (center.x * w, center.y * h);
        let (rx, ry) = (w * 0.18, h * 0.35);
        let x0 = (cx - rx).max(0.0) as u32;
        let x1 = ((cx + rx) as u32).min(self.width);
        let y0 = (cy - ry).max(0.0) as u32;
        let y1 = ((cy + ry) as u32).min(self.height);
        for y in y0..y1 {
            for x in x0..x1 {
                let dx = (x as f32 + 0.5 - cx) / rx;
                let dy = (y as f32 + 0.5 - cy) / ry;
                if dx * dx + dy * dy > 1.0 {
                    continue;
                }
                let stripe = ((x / 6 + y / 6) % 2) as u8;
                let shade = 170 + stripe * 50 + (self.frame_index % 16) as u8;
                frame.set_pixel(x, y, [shade, shade.saturating_sub(30), shade.saturating_sub(50), 255]);
            }
        }
        frame
    }
}

impl VideoSource for SyntheticSource {
    fn next_frame(&mut self) -> Option<FrameBuffer> {
        let frame = self.render();
        self.frame_index += 1;
        Some(frame)
    }

    fn hardware_controls(&self) -> HardwareControls {
        self.hardware
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_link_tracks_one_request() {
        let mut link = ManualDisplayLink::new();
        let a = link.request_frame();
        let b = link.request_frame();
        assert_ne!(a, b);
        assert_eq!(link.pending(), Some(b));
        link.cancel_frame(a);
        assert_eq!(link.cancelled(), 0);
        link.cancel_frame(b);
        assert_eq!(link.cancelled(), 1);
        assert_eq!(link.fire(), None);
    }

    #[test]
    fn synthetic_subject_stands_out_from_backdrop() {
        let mut source = SyntheticSource::new(160, 90);
        let frame = source.next_frame().unwrap();
        assert_eq!(frame.pixel(0, 0), [40, 90, 60, 255]);
        let c = SyntheticSource::subject_center(0);
        let px = frame.pixel((c.x * 160.0) as u32, (c.y * 90.0) as u32);
        assert!(px[0] >= 170);
        assert_eq!(source.frames_produced(), 1);
    }

    #[test]
    fn null_sink_keeps_last_frame() {
        let mut sink = NullSink::keeping_last();
        sink.present(&FrameBuffer::solid(4, 4, [1, 2, 3, 255])).unwrap();
        sink.present(&FrameBuffer::solid(4, 4, [9, 9, 9, 255])).unwrap();
        assert_eq!(sink.presented, 2);
        assert_eq!(sink.last.as_ref().unwrap().pixel(0, 0), [9, 9, 9, 255]);
    }
}
