//! LUT grading across the color store and both grading backends.

use std::time::Instant;

use camfx_color::{blend_luts, generate_identity_lut, LutStore};
use camfx_core::{FrameBuffer, LutId};
use camfx_gpu::{GpuConfig, GpuContext, GpuRenderer, GradeBackend, GradeRequest, Grader};

fn max_channel_diff(a: &FrameBuffer, b: &FrameBuffer) -> u8 {
    a.data
        .iter()
        .zip(&b.data)
        .map(|(x, y)| x.abs_diff(*y))
        .max()
        .unwrap_or(0)
}

#[test]
fn identity_lut_is_transparent_in_software() {
    for size in [8, 16, 32] {
        let packed = generate_identity_lut(size).pack_2d();
        let mut grader = Grader::software_only();
        let mut frame = FrameBuffer::test_pattern(96, 64);
        let original = frame.clone();
        let request = GradeRequest {
            lut: Some(&packed),
            intensity: 1.0,
            warp: None,
        };
        let backend = grader.process(&mut frame, &request, Instant::now()).unwrap();
        assert_eq!(backend, GradeBackend::Software);
        let diff = max_channel_diff(&frame, &original);
        assert!(diff <= 1, "N={size}: max diff {diff}");
    }
}

#[test]
fn identity_lut_is_transparent_on_gpu_when_available() {
    if let Err(e) = GpuContext::new_blocking() {
        eprintln!("Skipping GPU grading test: {e}");
        return;
    }
    let mut renderer = GpuRenderer::new(&GpuConfig::default());
    for size in [8, 16, 32] {
        let packed = generate_identity_lut(size).pack_2d();
        let mut frame = FrameBuffer::test_pattern(96, 64);
        let original = frame.clone();
        let request = GradeRequest {
            lut: Some(&packed),
            intensity: 1.0,
            warp: None,
        };
        if let Err(e) = renderer.process(&mut frame, &request, Instant::now()) {
            eprintln!("Skipping GPU grading test: {e}");
            return;
        }
        let diff = max_channel_diff(&frame, &original);
        assert!(diff <= 2, "N={size}: max diff {diff}");
    }
    renderer.release();
}

#[test]
fn software_and_gpu_agree_on_presets_when_available() {
    if GpuContext::new_blocking().is_err() {
        return;
    }
    let mut store = LutStore::new();
    let packed = store.packed(LutId::TealOrange, 32);
    let request = GradeRequest {
        lut: Some(&*packed),
        intensity: 0.75,
        warp: None,
    };
    let mut gpu = GpuRenderer::new(&GpuConfig::default());
    let mut on_gpu = FrameBuffer::test_pattern(64, 48);
    if gpu.process(&mut on_gpu, &request, Instant::now()).is_err() {
        return;
    }
    let mut on_cpu = FrameBuffer::test_pattern(64, 48);
    Grader::software_only()
        .process(&mut on_cpu, &request, Instant::now())
        .unwrap();
    let diff = max_channel_diff(&on_gpu, &on_cpu);
    assert!(diff <= 3, "max diff {diff}");
}

#[test]
fn blended_preset_endpoints_are_exact() {
    let mut store = LutStore::new();
    let a = store.get(LutId::FilmNoir, 16);
    let b = store.get(LutId::GoldenHour, 16);
    assert_eq!(blend_luts(&a, &b, 0.0).unwrap().data, a.data);
    assert_eq!(blend_luts(&a, &b, 1.0).unwrap().data, b.data);
    let half = blend_luts(&a, &b, 0.5).unwrap();
    assert_ne!(half.data, a.data);
    assert_ne!(half.data, b.data);
}

#[test]
fn preset_cache_serves_same_instance() {
    let mut store = LutStore::new();
    let first = store.packed(LutId::CoolBlue, 16);
    let second = store.packed(LutId::CoolBlue, 16);
    assert!(std::sync::Arc::ptr_eq(&first, &second));
}
