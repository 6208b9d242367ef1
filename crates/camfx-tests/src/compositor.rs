//! End-to-end compositor scenarios at camera resolution.

use std::sync::Arc;
use std::time::Instant;

use camfx_ai::MaskBuffer;
use camfx_core::{
    AspectLock, EffectParameterSet, FaceLandmarks, FrameBuffer, LandmarkKind, LutId, Rect,
};
use camfx_effects::{CompositeInput, Compositor, CompositorConfig, Stage};
use camfx_gpu::GpuConfig;

const W: u32 = 1280;
const H: u32 = 720;

fn software_compositor() -> Compositor {
    Compositor::new(
        CompositorConfig::default(),
        &GpuConfig {
            enabled: false,
            ..GpuConfig::default()
        },
    )
}

/// Mean absolute horizontal difference of the red channel inside `rect`.
fn edge_energy(frame: &FrameBuffer, rect: Rect) -> f32 {
    let (x0, y0) = (rect.x as u32, rect.y as u32);
    let (x1, y1) = ((rect.x + rect.width) as u32, (rect.y + rect.height) as u32);
    let mut sum = 0u64;
    let mut count = 0u64;
    for y in y0..y1 {
        for x in x0..x1 - 1 {
            let a = frame.pixel(x, y)[0] as i32;
            let b = frame.pixel(x + 1, y)[0] as i32;
            sum += (a - b).unsigned_abs() as u64;
            count += 1;
        }
    }
    sum as f32 / count.max(1) as f32
}

#[test]
fn background_blur_spares_the_subject() {
    let mut compositor = software_compositor();
    let mut frame = FrameBuffer::checkerboard(W, H, 2);
    let mask = Arc::new(MaskBuffer::centered_box(W, H, 0.4, 0.6));
    let params = EffectParameterSet {
        blur: 10.0,
        ..Default::default()
    }
    .clamped();
    let mut input = CompositeInput::new(&params, W, H);
    input.mask = Some(&mask);

    let report = compositor.composite(&mut frame, &input, Instant::now());
    assert!(report.ran.contains(Stage::AiEffects));
    assert!(report.failed.is_empty());

    let center = edge_energy(&frame, Rect::new(540.0, 260.0, 200.0, 200.0));
    let border = edge_energy(&frame, Rect::new(0.0, 0.0, 200.0, H as f32));
    assert!(center > 80.0, "center energy {center}");
    assert!(border < center * 0.05, "border {border} vs center {center}");
}

#[test]
fn low_resolution_mask_is_stretched_to_frame() {
    let mut compositor = software_compositor();
    let mut frame = FrameBuffer::checkerboard(W, H, 2);
    let mask = Arc::new(MaskBuffer::centered_box(256, 144, 0.4, 0.6));
    let params = EffectParameterSet {
        blur: 10.0,
        ..Default::default()
    };
    let mut input = CompositeInput::new(&params, W, H);
    input.mask = Some(&mask);
    compositor.composite(&mut frame, &input, Instant::now());

    let center = edge_energy(&frame, Rect::new(540.0, 260.0, 200.0, 200.0));
    let right = edge_energy(&frame, Rect::new(1080.0, 0.0, 200.0, H as f32));
    assert!(right < center * 0.05, "right {right} vs center {center}");
}

#[test]
fn identity_parameters_are_a_byte_exact_no_op() {
    let mut compositor = software_compositor();
    let mut frame = FrameBuffer::test_pattern(W, H);
    let original = frame.clone();
    let mask = Arc::new(MaskBuffer::centered_box(256, 144, 0.4, 0.6));
    let landmarks = LandmarkKind::ALL
        .iter()
        .fold(FaceLandmarks::default(), |lm, &kind| lm.with(kind, 0.5, 0.5));
    let params = EffectParameterSet::default().clamped();
    let mut input = CompositeInput::new(&params, W, H);
    input.mask = Some(&mask);
    input.landmarks = Some(&landmarks);

    for _ in 0..3 {
        let report = compositor.composite(&mut frame, &input, Instant::now());
        assert!(report.ran.is_empty());
    }
    assert_eq!(frame, original);
}

#[test]
fn full_stack_runs_every_stage_in_software() {
    let mut compositor = software_compositor();
    let mut frame = FrameBuffer::test_pattern(640, 360);
    let mask = Arc::new(MaskBuffer::centered_box(160, 90, 0.5, 0.7));
    let landmarks = FaceLandmarks::default()
        .with(LandmarkKind::LeftEye, 0.42, 0.38)
        .with(LandmarkKind::RightEye, 0.58, 0.38)
        .with(LandmarkKind::NoseTip, 0.5, 0.48)
        .with(LandmarkKind::JawLeft, 0.38, 0.6)
        .with(LandmarkKind::JawRight, 0.62, 0.6)
        .with(LandmarkKind::MouthLeft, 0.45, 0.58)
        .with(LandmarkKind::MouthRight, 0.55, 0.58);
    let params = EffectParameterSet {
        zoom: 1.2,
        contrast: 120.0,
        color_filter: camfx_core::ColorFilterId::Vintage,
        blur: 8.0,
        portrait_lighting: 30.0,
        face_smoothing: 40.0,
        aspect_lock: AspectLock::Cinema21x9,
        sharpness: 20.0,
        vignette: 40.0,
        cinematic_lut: LutId::TealOrange,
        lut_intensity: 80.0,
        eye_enlarge: 30.0,
        grid: camfx_core::GridType::RuleOfThirds,
        histogram: true,
        ..Default::default()
    }
    .clamped();
    let mut input = CompositeInput::new(&params, 640, 360);
    input.mask = Some(&mask);
    input.landmarks = Some(&landmarks);

    let report = compositor.composite(&mut frame, &input, Instant::now());
    let ran: Vec<Stage> = report.ran.iter().collect();
    assert_eq!(ran, Stage::ALL.to_vec());
    assert!(report.failed.is_empty());
    assert_eq!(compositor.histogram().iter().sum::<u32>(), 640 * 360);
}
