//! CamFX - headless live effects runner
//!
//! Drives the pipeline with a synthetic camera at a fixed refresh rate and
//! logs frame-rate and segmentation statistics.

mod background;
mod cli;

use std::time::{Duration, Instant};

use anyhow::Result;
use camfx_ai::LumaKeyBackend;
use camfx_core::EffectParameterSet;
use camfx_pipeline::{
    load_params, FrameScheduler, ManualDisplayLink, NullSink, PipelineBuilder, PipelineConfig,
    SyntheticSource, TickOutcome,
};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::background::load_background;
use crate::cli::Options;

const STATS_INTERVAL: Duration = Duration::from_secs(2);

fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let opts = Options::parse();
    info!("CamFX starting...");

    let config = match &opts.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    let params = match &opts.params {
        Some(path) => load_params(path)?,
        None => EffectParameterSet::default(),
    };
    let background = opts.background.as_deref().map(load_background).transpose()?;

    let mut scheduler = build(config, background, &opts);
    run(&mut scheduler, &params, &opts)
}

#[cfg(feature = "onnx")]
fn build(
    config: PipelineConfig,
    background: Option<camfx_core::FrameBuffer>,
    opts: &Options,
) -> FrameScheduler {
    let models_dir = config.segmentation.resolved_models_dir();
    PipelineBuilder::new(config)
        .worker_backend(move || Box::new(camfx_ai::OnnxSegmenter::from_models_dir(&models_dir)))
        .fallback_backend(|| Box::new(LumaKeyBackend::new()))
        .background_image(background)
        .build(
            Box::new(SyntheticSource::new(opts.size.width, opts.size.height)),
            Box::new(NullSink::new()),
            Box::new(ManualDisplayLink::new()),
        )
}

#[cfg(not(feature = "onnx"))]
fn build(
    config: PipelineConfig,
    background: Option<camfx_core::FrameBuffer>,
    opts: &Options,
) -> FrameScheduler {
    PipelineBuilder::new(config)
        .worker_backend(|| Box::new(LumaKeyBackend::new()))
        .fallback_backend(|| Box::new(LumaKeyBackend::new()))
        .background_image(background)
        .build(
            Box::new(SyntheticSource::new(opts.size.width, opts.size.height)),
            Box::new(NullSink::new()),
            Box::new(ManualDisplayLink::new()),
        )
}

/// Pace refreshes at the requested rate until the frame budget runs out.
fn run(scheduler: &mut FrameScheduler, params: &EffectParameterSet, opts: &Options) -> Result<()> {
    let period = Duration::from_secs_f32(1.0 / opts.refresh_hz);
    let start = Instant::now();
    scheduler.start(start);

    let mut next_vsync = start;
    let mut last_stats = start;
    let mut refreshes = 0u64;
    while opts.frames.map_or(true, |n| refreshes < n) {
        let now = Instant::now();
        if now < next_vsync {
            std::thread::sleep(next_vsync - now);
        }
        let now = Instant::now();
        next_vsync += period;
        if next_vsync < now {
            // Fell behind; resynchronise instead of bursting.
            next_vsync = now + period;
        }

        if let TickOutcome::Stopped = scheduler.on_vsync(now, params)? {
            warn!("Scheduler stopped");
            break;
        }
        refreshes += 1;

        if now.duration_since(last_stats) >= STATS_INTERVAL {
            log_stats(scheduler);
            last_stats = now;
        }
    }

    log_stats(scheduler);
    scheduler.stop();
    info!(refreshes, elapsed_s = start.elapsed().as_secs_f32(), "CamFX finished");
    Ok(())
}

fn log_stats(scheduler: &FrameScheduler) {
    let stats = scheduler.stats();
    let monitor = scheduler.monitor();
    let segmentation = scheduler.segmentation();
    info!(
        fps = monitor.fps().unwrap_or(0.0),
        frame_ms = monitor.mean_frame_time_ms().unwrap_or(0.0),
        composited = stats.composited,
        skipped = stats.skipped,
        seg_state = ?segmentation.state(),
        seg_fps = segmentation.stats().fps(),
        seg_latency_ms = segmentation.stats().mean_latency_ms(),
        seg_timeouts = stats.segmentation_timeouts,
        renderer = ?scheduler.compositor().renderer_state(),
        "Pipeline stats"
    );
}
