//! Assembling a scheduler from configuration.

use camfx_ai::{SegmentationBackend, SegmentationManager};
use camfx_core::FrameBuffer;
use camfx_effects::Compositor;
use tracing::info;

use crate::config::PipelineConfig;
use crate::io::{DisplayLink, OutputSink, VideoSource};
use crate::scheduler::FrameScheduler;

/// Collects the pieces of a pipeline and wires them into a
/// [`FrameScheduler`], which then owns all of them.
pub struct PipelineBuilder {
    config: PipelineConfig,
    segmentation: SegmentationManager,
    background: Option<FrameBuffer>,
    protected: bool,
}

impl PipelineBuilder {
    pub fn new(config: PipelineConfig) -> Self {
        let segmentation = SegmentationManager::new(config.segmentation.clone());
        Self {
            config,
            segmentation,
            background: None,
            protected: false,
        }
    }

    /// Backend for the segmentation worker thread.
    pub fn worker_backend<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn SegmentationBackend> + Send + Sync + 'static,
    {
        self.segmentation = self.segmentation.with_worker_backend(factory);
        self
    }

    /// Synchronous backend used when the worker cannot start.
    pub fn fallback_backend<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn SegmentationBackend> + Send + Sync + 'static,
    {
        self.segmentation = self.segmentation.with_fallback_backend(factory);
        self
    }

    pub fn background_image(mut self, image: Option<FrameBuffer>) -> Self {
        self.background = image;
        self
    }

    /// Treat the source as protected content (no pixel readback).
    pub fn protected_content(mut self, protected: bool) -> Self {
        self.protected = protected;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn build(
        self,
        source: Box<dyn VideoSource>,
        sink: Box<dyn OutputSink>,
        display: Box<dyn DisplayLink>,
    ) -> FrameScheduler {
        let mut compositor = Compositor::new(self.config.compositor.clone(), &self.config.gpu);
        compositor.set_background_image(self.background);
        compositor.set_protected_content(self.protected);
        info!(
            gpu = self.config.gpu.enabled,
            segmentation = self.config.segmentation.enabled,
            "Pipeline assembled"
        );
        FrameScheduler::new(
            self.config.scheduler,
            self.segmentation,
            compositor,
            source,
            sink,
            display,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{ManualDisplayLink, NullSink, SyntheticSource};
    use camfx_ai::{LumaKeyBackend, SegmentationState};
    use camfx_core::EffectParameterSet;
    use std::time::Instant;

    #[test]
    fn builds_a_running_scheduler() {
        let mut config = PipelineConfig::default();
        config.gpu.enabled = false;
        let mut scheduler = PipelineBuilder::new(config)
            .fallback_backend(|| Box::new(LumaKeyBackend::new()))
            .build(
                Box::new(SyntheticSource::new(32, 18)),
                Box::new(NullSink::new()),
                Box::new(ManualDisplayLink::new()),
            );
        let now = Instant::now();
        scheduler.start(now);
        assert_eq!(
            scheduler.segmentation().state(),
            SegmentationState::MainThreadMode
        );
        assert!(scheduler.pending_request().is_some());
        scheduler.on_vsync(now, &EffectParameterSet::default()).unwrap();
        assert_eq!(scheduler.stats().composited, 1);
        assert!(scheduler.compositor().renderer_state().is_none());
    }
}
