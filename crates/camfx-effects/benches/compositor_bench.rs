//! Benchmarks for the camfx-effects compositor.
//!
//! Run with: cargo bench -p camfx-effects

use std::sync::Arc;
use std::time::Instant;

use camfx_ai::MaskBuffer;
use camfx_core::{ColorFilterId, EffectParameterSet, FrameBuffer};
use camfx_effects::{BoxBlur, CompositeInput, Compositor, CompositorConfig, VignetteCache};
use camfx_gpu::GpuConfig;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

const WIDTH: u32 = 1280;
const HEIGHT: u32 = 720;

fn software_compositor() -> Compositor {
    Compositor::new(
        CompositorConfig::default(),
        &GpuConfig {
            enabled: false,
            ..GpuConfig::default()
        },
    )
}

fn bench_identity(c: &mut Criterion) {
    let mut compositor = software_compositor();
    let params = EffectParameterSet::default();
    let source = FrameBuffer::test_pattern(WIDTH, HEIGHT);
    let mut frame = source.clone();

    c.bench_function("composite_identity_720p", |bencher| {
        bencher.iter(|| {
            frame.data.copy_from_slice(&source.data);
            let input = CompositeInput::new(&params, WIDTH, HEIGHT);
            black_box(compositor.composite(&mut frame, &input, Instant::now()))
        });
    });
}

fn bench_full_chain(c: &mut Criterion) {
    let mut compositor = software_compositor();
    let params = EffectParameterSet {
        zoom: 1.3,
        color_filter: ColorFilterId::Cyberpunk,
        blur: 10.0,
        portrait_lighting: 40.0,
        vignette: 50.0,
        sharpness: 30.0,
        ..Default::default()
    };
    let mask = Arc::new(MaskBuffer::centered_box(256, 256, 0.4, 0.6));
    let source = FrameBuffer::test_pattern(WIDTH, HEIGHT);
    let mut frame = source.clone();

    c.bench_function("composite_full_chain_720p", |bencher| {
        bencher.iter(|| {
            frame.data.copy_from_slice(&source.data);
            let mut input = CompositeInput::new(&params, WIDTH, HEIGHT);
            input.mask = Some(&mask);
            black_box(compositor.composite(&mut frame, &input, Instant::now()))
        });
    });
}

fn bench_stages(c: &mut Criterion) {
    let mut blur = BoxBlur::new();
    let mut frame = FrameBuffer::test_pattern(WIDTH, HEIGHT);
    c.bench_function("box_blur_sigma10_720p", |bencher| {
        bencher.iter(|| blur.apply(&mut frame, black_box(10.0)));
    });

    let mut vignette = VignetteCache::new();
    c.bench_function("vignette_cached_720p", |bencher| {
        bencher.iter(|| vignette.apply(&mut frame, black_box(60.0), 0.85));
    });
}

criterion_group!(benches, bench_identity, bench_full_chain, bench_stages);
criterion_main!(benches);
