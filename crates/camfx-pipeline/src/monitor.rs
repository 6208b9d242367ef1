//! Rolling frame-rate sampling.

use std::time::Instant;

use camfx_core::timing::{SAMPLE_WINDOW, STRUGGLING_FPS};
use camfx_core::RollingWindow;
use tracing::debug;

/// Measures the interval between display refreshes over the last
/// [`SAMPLE_WINDOW`] refreshes.
///
/// Every refresh is recorded, skipped or not, so the rate reflects how fast
/// the display loop runs rather than how many frames were composited.
#[derive(Debug, Clone)]
pub struct PerformanceMonitor {
    intervals_ms: RollingWindow,
    last_frame: Option<Instant>,
    struggling_fps: f32,
    pinned_fps: Option<f32>,
    frames: u64,
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new(STRUGGLING_FPS)
    }
}

impl PerformanceMonitor {
    pub fn new(struggling_fps: f32) -> Self {
        Self {
            intervals_ms: RollingWindow::new(SAMPLE_WINDOW),
            last_frame: None,
            struggling_fps,
            pinned_fps: None,
            frames: 0,
        }
    }

    /// Record a display refresh.
    pub fn record_refresh(&mut self, now: Instant) {
        if let Some(prev) = self.last_frame {
            let ms = now.saturating_duration_since(prev).as_secs_f32() * 1000.0;
            self.intervals_ms.push(ms);
        }
        self.last_frame = Some(now);
        self.frames += 1;
    }

    /// Report `fps` regardless of measurements. `None` resumes measuring.
    pub fn pin_fps(&mut self, fps: Option<f32>) {
        self.pinned_fps = fps;
    }

    /// Frames per second over the window, if measurable.
    pub fn fps(&self) -> Option<f32> {
        if let Some(fps) = self.pinned_fps {
            return Some(fps);
        }
        let mean = self.intervals_ms.mean()?;
        (mean > 0.0).then(|| 1000.0 / mean)
    }

    pub fn mean_frame_time_ms(&self) -> Option<f32> {
        self.intervals_ms.mean()
    }

    pub fn worst_frame_time_ms(&self) -> Option<f32> {
        self.intervals_ms.max()
    }

    pub fn struggling_fps(&self) -> f32 {
        self.struggling_fps
    }

    /// Frame rate is known and below the struggling threshold.
    pub fn is_struggling(&self) -> bool {
        self.fps().is_some_and(|fps| fps < self.struggling_fps)
    }

    /// Struggling over a full window rather than a few slow frames.
    pub fn sustained_low_fps(&self) -> bool {
        let window_full = self.pinned_fps.is_some() || self.intervals_ms.is_full();
        window_full && self.is_struggling()
    }

    /// Refreshes recorded since the last reset.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn reset(&mut self) {
        debug!(frames = self.frames, "Performance monitor reset");
        self.intervals_ms.clear();
        self.last_frame = None;
        self.frames = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn feed(monitor: &mut PerformanceMonitor, start: Instant, frames: u32, interval_ms: u64) -> Instant {
        let mut now = start;
        for _ in 0..frames {
            monitor.record_refresh(now);
            now += Duration::from_millis(interval_ms);
        }
        now
    }

    #[test]
    fn unknown_rate_is_not_struggling() {
        let mut monitor = PerformanceMonitor::default();
        assert_eq!(monitor.fps(), None);
        monitor.record_refresh(Instant::now());
        assert_eq!(monitor.fps(), None);
        assert!(!monitor.is_struggling());
    }

    #[test]
    fn measures_frame_rate() {
        let mut monitor = PerformanceMonitor::default();
        feed(&mut monitor, Instant::now(), 11, 20);
        let fps = monitor.fps().unwrap();
        assert!((fps - 50.0).abs() < 0.5, "fps {fps}");
        assert!(!monitor.is_struggling());
    }

    #[test]
    fn low_rate_becomes_sustained_once_window_fills() {
        let mut monitor = PerformanceMonitor::default();
        let now = feed(&mut monitor, Instant::now(), 5, 50);
        assert!(monitor.is_struggling());
        assert!(!monitor.sustained_low_fps());
        feed(&mut monitor, now, SAMPLE_WINDOW as u32, 50);
        assert!(monitor.sustained_low_fps());
    }

    #[test]
    fn only_last_window_counts() {
        let mut monitor = PerformanceMonitor::default();
        let now = feed(&mut monitor, Instant::now(), 40, 100);
        assert!(monitor.is_struggling());
        feed(&mut monitor, now, SAMPLE_WINDOW as u32 + 1, 10);
        assert!(!monitor.is_struggling());
    }

    #[test]
    fn pinned_rate_overrides_measurement() {
        let mut monitor = PerformanceMonitor::default();
        feed(&mut monitor, Instant::now(), 10, 10);
        monitor.pin_fps(Some(12.0));
        assert!(monitor.sustained_low_fps());
        monitor.pin_fps(None);
        assert!(!monitor.is_struggling());
    }
}
