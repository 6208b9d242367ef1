//! The scheduler driving real segmentation and compositing.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use camfx_ai::{LumaKeyBackend, SegmentationState};
use camfx_core::{EffectParameterSet, FrameBuffer, PerformanceMode};
use camfx_pipeline::{
    ManualDisplayLink, OutputSink, PipelineBuilder, PipelineConfig, SurfaceError,
    SyntheticSource, TickOutcome,
};

/// Keeps the last presented frame where the test can see it.
#[derive(Clone, Default)]
struct Recorder(Rc<RefCell<Option<FrameBuffer>>>);

impl OutputSink for Recorder {
    fn present(&mut self, frame: &FrameBuffer) -> Result<(), SurfaceError> {
        *self.0.borrow_mut() = Some(frame.clone());
        Ok(())
    }
}

fn software_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.gpu.enabled = false;
    config
}

#[test]
fn performance_mode_composites_one_tick_in_three() {
    let mut scheduler = PipelineBuilder::new(software_config()).build(
        Box::new(SyntheticSource::new(64, 36)),
        Box::new(Recorder::default()),
        Box::new(ManualDisplayLink::new()),
    );
    scheduler.monitor_mut().pin_fps(Some(18.0));
    let params = EffectParameterSet {
        performance_mode: PerformanceMode::Performance,
        vignette: 20.0,
        ..Default::default()
    };
    let start = Instant::now();
    scheduler.start(start);
    let mut composited = 0;
    for i in 0..300u64 {
        let outcome = scheduler
            .on_vsync(start + Duration::from_millis(i * 16), &params)
            .unwrap();
        if matches!(outcome, TickOutcome::Composited(_)) {
            composited += 1;
        }
    }
    assert_eq!(composited, 100);
    assert_eq!(scheduler.stats().skipped, 200);
}

#[test]
fn balanced_mode_composites_every_other_tick() {
    let mut scheduler = PipelineBuilder::new(software_config()).build(
        Box::new(SyntheticSource::new(32, 18)),
        Box::new(Recorder::default()),
        Box::new(ManualDisplayLink::new()),
    );
    scheduler.monitor_mut().pin_fps(Some(25.0));
    let params = EffectParameterSet {
        performance_mode: PerformanceMode::Balanced,
        ..Default::default()
    };
    let start = Instant::now();
    for i in 0..100u64 {
        scheduler
            .on_vsync(start + Duration::from_millis(i * 16), &params)
            .unwrap();
    }
    assert_eq!(scheduler.stats().composited, 50);
}

#[test]
fn virtual_background_replaces_the_backdrop() {
    let recorder = Recorder::default();
    let mut scheduler = PipelineBuilder::new(software_config())
        .fallback_backend(|| Box::new(LumaKeyBackend::new()))
        .background_image(Some(FrameBuffer::solid(32, 18, [200, 10, 10, 255])))
        .build(
            Box::new(SyntheticSource::new(160, 90)),
            Box::new(recorder.clone()),
            Box::new(ManualDisplayLink::new()),
        );
    let params = EffectParameterSet {
        virtual_background: true,
        ..Default::default()
    };
    let start = Instant::now();
    scheduler.start(start);
    for i in 0..4u64 {
        scheduler
            .on_vsync(start + Duration::from_millis(i * 16), &params)
            .unwrap();
    }
    assert_eq!(
        scheduler.segmentation().state(),
        SegmentationState::MainThreadMode
    );
    let frame = recorder.0.borrow().clone().unwrap();
    assert_eq!(frame.pixel(2, 2), [200, 10, 10, 255]);
    let center = SyntheticSource::subject_center(3);
    let subject = frame.pixel((center.x * 160.0) as u32, (center.y * 90.0) as u32);
    assert_ne!(subject, [200, 10, 10, 255]);
}

#[test]
fn disabled_segmentation_still_renders() {
    let mut config = software_config();
    config.segmentation.enabled = false;
    let recorder = Recorder::default();
    let mut scheduler = PipelineBuilder::new(config).build(
        Box::new(SyntheticSource::new(48, 27)),
        Box::new(recorder.clone()),
        Box::new(ManualDisplayLink::new()),
    );
    let params = EffectParameterSet {
        blur: 10.0,
        ..Default::default()
    };
    let now = Instant::now();
    scheduler.start(now);
    let outcome = scheduler.on_vsync(now, &params).unwrap();
    let TickOutcome::Composited(report) = outcome else {
        panic!("expected a composited frame");
    };
    assert!(report.ran.is_empty());
    let mut reference = SyntheticSource::new(48, 27);
    let expected = camfx_pipeline::VideoSource::next_frame(&mut reference).unwrap();
    assert_eq!(recorder.0.borrow().as_ref(), Some(&expected));
}
