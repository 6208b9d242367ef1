//! Segmentation request protocol against real worker threads.

use std::time::{Duration, Instant};

use camfx_ai::{
    AiResult, InferenceOutput, MaskBuffer, SegmentationBackend, SegmentationConfig,
    SegmentationEvent, SegmentationManager, SegmentationState, SubmitError,
};
use camfx_core::FrameBuffer;

/// Backend that answers after a fixed delay.
struct Slow {
    delay: Duration,
}

impl SegmentationBackend for Slow {
    fn name(&self) -> &str {
        "slow"
    }

    fn initialize(&mut self) -> AiResult<()> {
        Ok(())
    }

    fn infer(&mut self, frame: &FrameBuffer) -> AiResult<InferenceOutput> {
        std::thread::sleep(self.delay);
        Ok(InferenceOutput {
            mask: MaskBuffer::centered_box(frame.width / 4, frame.height / 4, 0.4, 0.6),
            landmarks: None,
        })
    }

    fn dispose(&mut self) {}
}

fn ready_manager(delay: Duration, request_timeout_ms: u64) -> SegmentationManager {
    let mut manager = SegmentationManager::new(SegmentationConfig {
        request_timeout_ms,
        ..SegmentationConfig::default()
    })
    .with_worker_backend(move || Box::new(Slow { delay }));
    manager.initialize(Instant::now());
    let deadline = Instant::now() + Duration::from_secs(5);
    while manager.state() == SegmentationState::Initializing && Instant::now() < deadline {
        manager.poll(Instant::now());
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(manager.state(), SegmentationState::WorkerMode);
    manager
}

#[test]
fn silent_worker_times_out_within_deadline() {
    let timeout = Duration::from_millis(100);
    let mut manager = ready_manager(Duration::from_millis(800), timeout.as_millis() as u64);
    let started = Instant::now();
    let id = manager
        .submit(FrameBuffer::test_pattern(64, 36), started)
        .unwrap();
    let event = manager.wait_for(id);
    let elapsed = started.elapsed();
    assert_eq!(event, Some(SegmentationEvent::TimedOut { id }));
    assert!(elapsed < timeout + Duration::from_millis(150), "took {elapsed:?}");
    assert!(manager.is_idle());
    assert!(manager.latest_mask().is_none());
}

#[test]
fn second_frame_is_handed_back_while_busy() {
    let mut manager = ready_manager(Duration::from_millis(50), 1000);
    let now = Instant::now();
    let first = manager.submit(FrameBuffer::test_pattern(64, 36), now).unwrap();

    let second = FrameBuffer::test_pattern(64, 36);
    let ptr = second.data.as_ptr();
    let rejected = manager.submit(second, now).unwrap_err();
    assert!(matches!(rejected, SubmitError::Busy(_)));
    assert_eq!(rejected.into_frame().data.as_ptr(), ptr);
    assert_eq!(manager.pending_count(), 1);

    let event = manager.wait_for(first);
    assert!(matches!(event, Some(SegmentationEvent::Completed { id, .. }) if id == first));
    let mask = manager.latest_mask().unwrap();
    assert_eq!((mask.width, mask.height), (16, 9));
    assert_eq!(manager.stats().completed, 1);
}

#[test]
fn request_ids_increase() {
    let mut manager = ready_manager(Duration::ZERO, 1000);
    let mut last = None;
    for _ in 0..3 {
        let id = manager
            .submit(FrameBuffer::test_pattern(16, 16), Instant::now())
            .unwrap();
        if let Some(prev) = last {
            assert!(id > prev);
        }
        manager.wait_for(id);
        last = Some(id);
    }
    assert_eq!(manager.mask_generation(), 3);
}
