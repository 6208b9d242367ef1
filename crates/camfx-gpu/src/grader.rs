//! Grading front end: GPU when available, software otherwise.

use std::time::Instant;

use camfx_color::{PackedLut, WarpUniforms};
use camfx_core::FrameBuffer;
use tracing::{debug, trace};

use crate::config::GpuConfig;
use crate::error::GpuError;
use crate::renderer::{GpuRenderer, RendererState};
use crate::software::SoftwareGrader;

/// What the grading stage should do to one frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct GradeRequest<'a> {
    /// Packed cinematic LUT, if grading is enabled.
    pub lut: Option<&'a PackedLut>,
    /// LUT mix in `[0, 1]`.
    pub intensity: f32,
    /// Face warp for this frame, if enough landmarks were found.
    pub warp: Option<WarpUniforms>,
}

impl GradeRequest<'_> {
    /// Nothing to render.
    pub fn is_noop(&self) -> bool {
        self.warp.is_none() && (self.lut.is_none() || self.intensity <= 0.0)
    }
}

/// Which path handled a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradeBackend {
    Gpu,
    Software,
    Skipped,
}

/// Routes grading work to the GPU renderer, falling back to the software
/// grader whenever the GPU is initializing, retrying, lost or disabled.
pub struct Grader {
    gpu: Option<GpuRenderer>,
    software: SoftwareGrader,
    software_frames: u64,
}

impl Grader {
    pub fn new(config: &GpuConfig) -> Self {
        Self {
            gpu: config.enabled.then(|| GpuRenderer::new(config)),
            software: SoftwareGrader::new(),
            software_frames: 0,
        }
    }

    /// Grader that never touches the GPU.
    pub fn software_only() -> Self {
        Self::new(&GpuConfig {
            enabled: false,
            ..GpuConfig::default()
        })
    }

    pub fn process(
        &mut self,
        frame: &mut FrameBuffer,
        request: &GradeRequest<'_>,
        now: Instant,
    ) -> Result<GradeBackend, GpuError> {
        if request.is_noop() {
            return Ok(GradeBackend::Skipped);
        }
        if let Some(gpu) = &mut self.gpu {
            match gpu.process(frame, request, now) {
                Ok(()) => return Ok(GradeBackend::Gpu),
                Err(GpuError::NotReady) | Err(GpuError::Disabled) => {
                    trace!("GPU unavailable; grading in software");
                }
                Err(e) => debug!(error = %e, "GPU grading failed; grading in software"),
            }
        }
        self.software.process(frame, request)?;
        self.software_frames += 1;
        Ok(GradeBackend::Software)
    }

    pub fn renderer_state(&self) -> Option<RendererState> {
        self.gpu.as_ref().map(GpuRenderer::state)
    }

    /// Frames graded on the CPU so far.
    pub fn software_frames(&self) -> u64 {
        self.software_frames
    }

    /// Release GPU resources. The software path keeps working.
    pub fn release(&mut self) {
        if let Some(gpu) = &mut self.gpu {
            gpu.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camfx_color::generate_identity_lut;

    #[test]
    fn noop_request_is_skipped() {
        let mut grader = Grader::software_only();
        let mut frame = FrameBuffer::test_pattern(8, 8);
        let backend = grader
            .process(&mut frame, &GradeRequest::default(), Instant::now())
            .unwrap();
        assert_eq!(backend, GradeBackend::Skipped);
        assert_eq!(grader.software_frames(), 0);
    }

    #[test]
    fn disabled_gpu_uses_software() {
        let packed = generate_identity_lut(8).pack_2d();
        let mut grader = Grader::software_only();
        assert!(grader.renderer_state().is_none());
        let mut frame = FrameBuffer::test_pattern(8, 8);
        let request = GradeRequest {
            lut: Some(&packed),
            intensity: 1.0,
            warp: None,
        };
        assert_eq!(
            grader.process(&mut frame, &request, Instant::now()).unwrap(),
            GradeBackend::Software
        );
        grader.release();
        grader.release();
    }
}
