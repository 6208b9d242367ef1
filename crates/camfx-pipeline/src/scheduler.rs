//! The per-refresh compositing loop.
//!
//! [`FrameScheduler::on_vsync`] runs one tick to completion and only then
//! asks the display link for the next refresh. Under load it skips ticks
//! according to the performance mode. Segmentation runs on its own cycle:
//! the loop submits a frame when the manager is idle and otherwise renders
//! with the newest (possibly stale) mask.

use std::time::Instant;

use camfx_ai::{AutoFrameTransform, SegmentationEvent, SegmentationManager, SubmitError};
use camfx_core::{EffectParameterSet, FrameBuffer, Transform2D, Vec2};
use camfx_effects::{CompositeInput, CompositeReport, Compositor};
use tracing::{debug, info, trace, warn};

use crate::config::SchedulerConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::io::{DisplayLink, FrameRequestId, OutputSink, SurfaceError, VideoSource};
use crate::monitor::PerformanceMonitor;

/// Result of one refresh.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// A frame was composited and presented.
    Composited(CompositeReport),
    /// Skipped to shed load.
    Skipped,
    /// The source had no new frame.
    NoFrame,
    /// The scheduler has been stopped.
    Stopped,
}

/// Running totals since start.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickStats {
    pub ticks: u64,
    pub composited: u64,
    pub skipped: u64,
    pub no_frame: u64,
    /// Frames the surface declined to show.
    pub present_dropped: u64,
    pub segmentation_submitted: u64,
    pub segmentation_completed: u64,
    pub segmentation_timeouts: u64,
    pub segmentation_failures: u64,
    /// Frames on which at least one stage failed.
    pub stage_failures: u64,
}

pub struct FrameScheduler {
    config: SchedulerConfig,
    source: Box<dyn VideoSource>,
    sink: Option<Box<dyn OutputSink>>,
    display: Box<dyn DisplayLink>,
    pending_request: Option<FrameRequestId>,
    segmentation: SegmentationManager,
    compositor: Compositor,
    monitor: PerformanceMonitor,
    auto_frame: AutoFrameTransform,
    spare: Option<FrameBuffer>,
    dims: Option<(u32, u32)>,
    tick_index: u64,
    stats: TickStats,
    started: bool,
    stopped: bool,
}

impl FrameScheduler {
    pub fn new(
        config: SchedulerConfig,
        segmentation: SegmentationManager,
        compositor: Compositor,
        source: Box<dyn VideoSource>,
        sink: Box<dyn OutputSink>,
        display: Box<dyn DisplayLink>,
    ) -> Self {
        let monitor = PerformanceMonitor::new(config.struggling_fps);
        Self {
            config,
            source,
            sink: Some(sink),
            display,
            pending_request: None,
            segmentation,
            compositor,
            monitor,
            auto_frame: AutoFrameTransform::IDENTITY,
            spare: None,
            dims: None,
            tick_index: 0,
            stats: TickStats::default(),
            started: false,
            stopped: false,
        }
    }

    /// Start segmentation and request the first refresh.
    pub fn start(&mut self, now: Instant) {
        if self.started || self.stopped {
            return;
        }
        self.started = true;
        self.segmentation.initialize(now);
        self.request_next();
        info!("Frame scheduler started");
    }

    pub fn stats(&self) -> &TickStats {
        &self.stats
    }

    pub fn monitor(&self) -> &PerformanceMonitor {
        &self.monitor
    }

    pub fn monitor_mut(&mut self) -> &mut PerformanceMonitor {
        &mut self.monitor
    }

    pub fn segmentation(&self) -> &SegmentationManager {
        &self.segmentation
    }

    pub fn segmentation_mut(&mut self) -> &mut SegmentationManager {
        &mut self.segmentation
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    pub fn compositor_mut(&mut self) -> &mut Compositor {
        &mut self.compositor
    }

    /// Outstanding display request.
    pub fn pending_request(&self) -> Option<FrameRequestId> {
        self.pending_request
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Current (smoothed) auto-framing transform.
    pub fn auto_frame(&self) -> AutoFrameTransform {
        self.auto_frame
    }

    /// Handle one display refresh.
    ///
    /// A lost output surface stops the scheduler and is returned as
    /// [`PipelineError::SurfaceLost`].
    pub fn on_vsync(&mut self, now: Instant, params: &EffectParameterSet) -> PipelineResult<TickOutcome> {
        if self.stopped {
            return Ok(TickOutcome::Stopped);
        }
        self.pending_request = None;
        let outcome = self.tick(now, params);
        match outcome {
            Ok(outcome) => {
                self.request_next();
                Ok(outcome)
            }
            Err(e) => {
                warn!(error = %e, "Stopping frame scheduler");
                self.stop();
                Err(e)
            }
        }
    }

    /// Cancel the pending refresh, drop the output and shut segmentation
    /// down. Idempotent; nothing is presented afterwards.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        if let Some(id) = self.pending_request.take() {
            self.display.cancel_frame(id);
        }
        self.sink = None;
        self.segmentation.dispose();
        self.compositor.release();
        info!(
            ticks = self.stats.ticks,
            composited = self.stats.composited,
            "Frame scheduler stopped"
        );
    }

    fn request_next(&mut self) {
        if !self.stopped && self.pending_request.is_none() {
            self.pending_request = Some(self.display.request_frame());
        }
    }

    fn tick(&mut self, now: Instant, params: &EffectParameterSet) -> PipelineResult<TickOutcome> {
        let tick = self.tick_index;
        self.tick_index += 1;
        self.stats.ticks += 1;
        self.monitor.record_refresh(now);
        let params = params.clamped();

        let k = params.performance_mode.skip_factor();
        if self.monitor.is_struggling() && tick % k != 0 {
            self.stats.skipped += 1;
            trace!(tick, k, "Tick skipped");
            return Ok(TickOutcome::Skipped);
        }

        let Some(mut frame) = self.source.next_frame() else {
            self.stats.no_frame += 1;
            return Ok(TickOutcome::NoFrame);
        };
        let dims = frame.dimensions();
        if self.dims != Some(dims) {
            debug!(width = dims.0, height = dims.1, "Source dimensions changed");
            self.dims = Some(dims);
            self.spare = None;
            self.compositor.resize(dims.0, dims.1);
        }

        self.poll_segmentation(now);
        if params.needs_segmentation() || params.auto_frame || params.has_beauty_warp() {
            self.submit_segmentation(&frame, now);
        }

        let transform = self.view_transform(&params, dims.0, dims.1, now);
        let mask = params
            .needs_segmentation()
            .then(|| self.segmentation.latest_mask())
            .flatten();
        let landmarks = params
            .has_beauty_warp()
            .then(|| self.segmentation.latest_landmarks())
            .flatten();
        let input = CompositeInput {
            params: &params,
            transform,
            mask: mask.as_ref(),
            landmarks: landmarks.as_ref(),
            sustained_low_fps: self.monitor.sustained_low_fps(),
        };
        let report = self.compositor.composite(&mut frame, &input, now);
        if !report.failed.is_empty() {
            self.stats.stage_failures += 1;
        }

        let Some(sink) = self.sink.as_mut() else {
            return Ok(TickOutcome::Stopped);
        };
        match sink.present(&frame) {
            Ok(()) => {}
            Err(SurfaceError::Lost(reason)) => return Err(PipelineError::SurfaceLost(reason)),
            Err(e) => {
                self.stats.present_dropped += 1;
                debug!(error = %e, "Frame not presented");
            }
        }
        self.stats.composited += 1;
        if self.spare.is_none() {
            self.spare = Some(frame);
        }
        Ok(TickOutcome::Composited(report))
    }

    fn poll_segmentation(&mut self, now: Instant) {
        for event in self.segmentation.poll(now) {
            match event {
                SegmentationEvent::Ready(mode) => info!(?mode, "Segmentation ready"),
                SegmentationEvent::Completed { id, latency } => {
                    self.stats.segmentation_completed += 1;
                    trace!(%id, latency_ms = latency.as_millis() as u64, "Mask updated");
                }
                SegmentationEvent::Failed { id, error } => {
                    self.stats.segmentation_failures += 1;
                    debug!(%id, %error, "Segmentation request failed");
                }
                SegmentationEvent::TimedOut { id } => {
                    self.stats.segmentation_timeouts += 1;
                    debug!(%id, "Segmentation request timed out");
                }
                SegmentationEvent::Disabled { reason } => {
                    info!(%reason, "Continuing without segmentation");
                }
            }
        }
    }

    /// Hand a copy of `frame` to segmentation when it can take one.
    fn submit_segmentation(&mut self, frame: &FrameBuffer, now: Instant) {
        if !self.segmentation.is_active() || !self.segmentation.is_idle() {
            return;
        }
        let copy = match self.spare.take() {
            Some(mut spare) if spare.same_size(frame) && spare.format == frame.format => {
                spare.data.copy_from_slice(&frame.data);
                spare
            }
            _ => frame.clone(),
        };
        match self.segmentation.submit(copy, now) {
            Ok(id) => {
                self.stats.segmentation_submitted += 1;
                trace!(%id, "Submitted frame for segmentation");
            }
            Err(e) => {
                if matches!(e, SubmitError::Busy(_)) {
                    trace!("Segmentation busy; frame returned");
                }
                self.spare = Some(e.into_frame());
            }
        }
    }

    fn view_transform(
        &mut self,
        params: &EffectParameterSet,
        width: u32,
        height: u32,
        now: Instant,
    ) -> Transform2D {
        let (mut zoom, mut pan_x, mut pan_y) = (params.zoom, params.pan_x, params.pan_y);
        if params.auto_frame {
            let target = self.segmentation.auto_frame_target(now);
            self.auto_frame = self
                .auto_frame
                .lerp(target, self.config.auto_frame_smoothing);
            zoom = self.auto_frame.zoom;
            pan_x = self.auto_frame.pan_x;
            pan_y = self.auto_frame.pan_y;
            // Auto-frame pans are measured on the unmirrored source.
            if params.mirror {
                pan_x = -pan_x;
            }
        } else {
            self.auto_frame = AutoFrameTransform::IDENTITY;
        }

        let hardware = self.source.hardware_controls();
        if hardware.zoom {
            zoom = 1.0;
        }
        if hardware.pan {
            pan_x = 0.0;
        }
        if hardware.tilt {
            pan_y = 0.0;
        }

        Transform2D::view(
            width as f32,
            height as f32,
            zoom,
            params.rotation,
            Vec2::new(pan_x, pan_y),
            params.mirror,
        )
    }
}

impl Drop for FrameScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camfx_ai::{LumaKeyBackend, SegmentationConfig, SegmentationState};
    use camfx_core::{FrameBuffer, PerformanceMode};
    use camfx_effects::CompositorConfig;
    use camfx_gpu::GpuConfig;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    use crate::io::{HardwareControls, ManualDisplayLink, NullSink, SyntheticSource};

    /// Display link whose request log is visible from the test.
    #[derive(Clone, Default)]
    struct SharedLink(Rc<RefCell<ManualDisplayLink>>);

    impl DisplayLink for SharedLink {
        fn request_frame(&mut self) -> FrameRequestId {
            self.0.borrow_mut().request_frame()
        }

        fn cancel_frame(&mut self, id: FrameRequestId) {
            self.0.borrow_mut().cancel_frame(id)
        }
    }

    #[derive(Clone, Default)]
    struct SharedSink(Rc<RefCell<NullSink>>);

    impl OutputSink for SharedSink {
        fn present(&mut self, frame: &FrameBuffer) -> Result<(), SurfaceError> {
            self.0.borrow_mut().present(frame)
        }
    }

    struct LostSink;

    impl OutputSink for LostSink {
        fn present(&mut self, _frame: &FrameBuffer) -> Result<(), SurfaceError> {
            Err(SurfaceError::Lost("window closed".into()))
        }
    }

    struct Empty;

    impl VideoSource for Empty {
        fn next_frame(&mut self) -> Option<FrameBuffer> {
            None
        }
    }

    fn compositor() -> Compositor {
        Compositor::new(
            CompositorConfig::default(),
            &GpuConfig {
                enabled: false,
                ..GpuConfig::default()
            },
        )
    }

    fn no_segmentation() -> SegmentationManager {
        SegmentationManager::new(SegmentationConfig {
            enabled: false,
            ..SegmentationConfig::default()
        })
    }

    fn scheduler(
        source: Box<dyn VideoSource>,
        sink: Box<dyn OutputSink>,
        link: SharedLink,
    ) -> FrameScheduler {
        FrameScheduler::new(
            SchedulerConfig::default(),
            no_segmentation(),
            compositor(),
            source,
            sink,
            Box::new(link),
        )
    }

    #[test]
    fn each_tick_requests_the_next_refresh() {
        let link = SharedLink::default();
        let sink = SharedSink::default();
        let mut s = scheduler(
            Box::new(SyntheticSource::new(32, 18)),
            Box::new(sink.clone()),
            link.clone(),
        );
        let now = Instant::now();
        s.start(now);
        let first = link.0.borrow().pending().unwrap();
        let outcome = s.on_vsync(now, &EffectParameterSet::default()).unwrap();
        assert!(matches!(outcome, TickOutcome::Composited(_)));
        let second = link.0.borrow().pending().unwrap();
        assert_ne!(first, second);
        assert_eq!(sink.0.borrow().presented, 1);
    }

    #[test]
    fn performance_mode_composites_every_third_tick_when_struggling() {
        let mut s = scheduler(
            Box::new(SyntheticSource::new(16, 9)),
            Box::new(NullSink::new()),
            SharedLink::default(),
        );
        s.monitor_mut().pin_fps(Some(20.0));
        let params = EffectParameterSet {
            performance_mode: PerformanceMode::Performance,
            ..Default::default()
        };
        let start = Instant::now();
        s.start(start);
        for i in 0..300u64 {
            s.on_vsync(start + Duration::from_millis(i * 16), &params).unwrap();
        }
        assert_eq!(s.stats().composited, 100);
        assert_eq!(s.stats().skipped, 200);
    }

    #[test]
    fn healthy_rate_never_skips() {
        let mut s = scheduler(
            Box::new(SyntheticSource::new(16, 9)),
            Box::new(NullSink::new()),
            SharedLink::default(),
        );
        let params = EffectParameterSet {
            performance_mode: PerformanceMode::Performance,
            ..Default::default()
        };
        let start = Instant::now();
        for i in 0..60u64 {
            s.on_vsync(start + Duration::from_millis(i * 16), &params).unwrap();
        }
        assert_eq!(s.stats().composited, 60);
    }

    #[test]
    fn skipping_stops_once_the_display_recovers() {
        let mut s = scheduler(
            Box::new(SyntheticSource::new(16, 9)),
            Box::new(NullSink::new()),
            SharedLink::default(),
        );
        let params = EffectParameterSet {
            performance_mode: PerformanceMode::Performance,
            ..Default::default()
        };
        let mut now = Instant::now();
        for _ in 0..40 {
            s.on_vsync(now, &params).unwrap();
            now += Duration::from_millis(50);
        }
        assert!(s.stats().skipped > 0);
        assert!(s.monitor().is_struggling());

        // Let the slow intervals age out of the window.
        for _ in 0..camfx_core::timing::SAMPLE_WINDOW {
            s.on_vsync(now, &params).unwrap();
            now += Duration::from_millis(16);
        }
        let skipped = s.stats().skipped;
        for _ in 0..600 {
            s.on_vsync(now, &params).unwrap();
            now += Duration::from_millis(16);
        }
        assert_eq!(s.stats().skipped, skipped);
        assert!(s.monitor().fps().unwrap() > 60.0);
    }

    #[test]
    fn missing_frame_is_reported() {
        let mut s = scheduler(Box::new(Empty), Box::new(NullSink::new()), SharedLink::default());
        let outcome = s.on_vsync(Instant::now(), &EffectParameterSet::default()).unwrap();
        assert_eq!(outcome, TickOutcome::NoFrame);
        assert_eq!(s.stats().no_frame, 1);
    }

    #[test]
    fn lost_surface_stops_scheduler() {
        let link = SharedLink::default();
        let mut s = scheduler(Box::new(SyntheticSource::new(8, 8)), Box::new(LostSink), link.clone());
        let now = Instant::now();
        s.start(now);
        let err = s.on_vsync(now, &EffectParameterSet::default()).unwrap_err();
        assert!(matches!(err, PipelineError::SurfaceLost(_)));
        assert!(s.is_stopped());
        assert_eq!(s.pending_request(), None);
        assert_eq!(
            s.on_vsync(now, &EffectParameterSet::default()).unwrap(),
            TickOutcome::Stopped
        );
    }

    #[test]
    fn stop_cancels_pending_refresh_and_silences_output() {
        let link = SharedLink::default();
        let sink = SharedSink::default();
        let mut s = scheduler(
            Box::new(SyntheticSource::new(8, 8)),
            Box::new(sink.clone()),
            link.clone(),
        );
        let now = Instant::now();
        s.start(now);
        s.on_vsync(now, &EffectParameterSet::default()).unwrap();
        s.stop();
        s.stop();
        assert_eq!(link.0.borrow().cancelled(), 1);
        assert_eq!(link.0.borrow().pending(), None);
        s.on_vsync(now, &EffectParameterSet::default()).unwrap();
        assert_eq!(sink.0.borrow().presented, 1);
        assert_eq!(s.segmentation().state(), SegmentationState::Disabled);
    }

    #[test]
    fn hardware_zoom_is_not_applied_twice() {
        let hardware = HardwareControls {
            zoom: true,
            ..HardwareControls::default()
        };
        let sink = SharedSink(Rc::new(RefCell::new(NullSink::keeping_last())));
        let mut s = scheduler(
            Box::new(SyntheticSource::new(32, 18).with_hardware_controls(hardware)),
            Box::new(sink.clone()),
            SharedLink::default(),
        );
        let params = EffectParameterSet {
            zoom: 2.0,
            ..Default::default()
        };
        let outcome = s.on_vsync(Instant::now(), &params).unwrap();
        let TickOutcome::Composited(report) = outcome else {
            panic!("expected a composited frame");
        };
        assert!(report.ran.is_empty());
        let mut reference = SyntheticSource::new(32, 18);
        let expected = reference.next_frame().unwrap();
        assert_eq!(sink.0.borrow().last.as_ref(), Some(&expected));
    }

    #[test]
    fn main_thread_segmentation_feeds_the_mask() {
        let manager = SegmentationManager::new(SegmentationConfig::default())
            .with_fallback_backend(|| Box::new(LumaKeyBackend::new()));
        let mut s = FrameScheduler::new(
            SchedulerConfig::default(),
            manager,
            compositor(),
            Box::new(SyntheticSource::new(64, 36)),
            Box::new(NullSink::new()),
            Box::new(SharedLink::default()),
        );
        let params = EffectParameterSet {
            blur: 6.0,
            ..Default::default()
        };
        let start = Instant::now();
        s.start(start);
        let mut ai_ran = false;
        for i in 0..5u64 {
            if let TickOutcome::Composited(report) =
                s.on_vsync(start + Duration::from_millis(i * 16), &params).unwrap()
            {
                ai_ran |= report.ran.contains(camfx_effects::Stage::AiEffects);
            }
        }
        assert_eq!(s.segmentation().state(), SegmentationState::MainThreadMode);
        assert!(s.stats().segmentation_completed >= 1);
        assert!(ai_ran);
    }

    #[test]
    fn auto_frame_eases_toward_target() {
        let manager = SegmentationManager::new(SegmentationConfig::default())
            .with_fallback_backend(|| Box::new(LumaKeyBackend::new()));
        let mut s = FrameScheduler::new(
            SchedulerConfig::default(),
            manager,
            compositor(),
            Box::new(SyntheticSource::new(96, 54)),
            Box::new(NullSink::new()),
            Box::new(SharedLink::default()),
        );
        let params = EffectParameterSet {
            auto_frame: true,
            ..Default::default()
        };
        let start = Instant::now();
        s.start(start);
        let mut zooms = Vec::new();
        for i in 0..10u64 {
            s.on_vsync(start + Duration::from_millis(i * 16), &params).unwrap();
            zooms.push(s.auto_frame().zoom);
        }
        assert!(zooms.windows(2).all(|w| w[1] >= w[0]));
        assert!(*zooms.last().unwrap() > 1.0);
        assert!(*zooms.last().unwrap() < 2.0);
    }
}
