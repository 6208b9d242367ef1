//! The ordered effect compositor.
//!
//! A frame passes through nine stages in a fixed order:
//!
//! 1. geometry (mirror, zoom, rotation, pan)
//! 2. base color filter
//! 3. segmentation effects (blur, virtual background, lighting, smoothing)
//! 4. preset tint
//! 5. letterbox / pillarbox bars
//! 6. sharpening
//! 7. vignette
//! 8. LUT grading and face warp
//! 9. monitoring overlays
//!
//! Every stage is skipped when its parameters are neutral, so the identity
//! parameter set leaves the frame untouched. A stage that errors or panics
//! is logged and marked failed; the frame still reaches the output.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use camfx_ai::MaskBuffer;
use camfx_color::{LutStore, WarpStrengths};
use camfx_core::{
    CamFxError, EffectParameterSet, FaceLandmarks, FrameBuffer, LutId, PixelFormat, Result,
    Transform2D,
};
use camfx_gpu::{GpuConfig, GradeBackend, GradeRequest, Grader, RendererState};
use tracing::{debug, trace, warn};

use crate::ai::{AiInput, AiStage};
use crate::config::CompositorConfig;
use crate::filter::{FilterCache, FilterSettings};
use crate::letterbox;
use crate::overlays::{OverlayRenderer, OverlayReport};
use crate::presets::FilterPreset;
use crate::sharpen::Sharpener;
use crate::transform::GeometryStage;
use crate::vignette::VignetteCache;

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// One compositor stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Geometry,
    ColorFilter,
    AiEffects,
    Tint,
    Letterbox,
    Sharpen,
    Vignette,
    Grade,
    Overlays,
}

impl Stage {
    pub const ALL: [Stage; 9] = [
        Self::Geometry,
        Self::ColorFilter,
        Self::AiEffects,
        Self::Tint,
        Self::Letterbox,
        Self::Sharpen,
        Self::Vignette,
        Self::Grade,
        Self::Overlays,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Geometry => "geometry",
            Self::ColorFilter => "color_filter",
            Self::AiEffects => "ai_effects",
            Self::Tint => "tint",
            Self::Letterbox => "letterbox",
            Self::Sharpen => "sharpen",
            Self::Vignette => "vignette",
            Self::Grade => "grade",
            Self::Overlays => "overlays",
        }
    }

    fn bit(self) -> u16 {
        1 << self as u16
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Small bitset of stages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageSet(u16);

impl StageSet {
    pub fn insert(&mut self, stage: Stage) {
        self.0 |= stage.bit();
    }

    pub fn contains(&self, stage: Stage) -> bool {
        self.0 & stage.bit() != 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Members in execution order.
    pub fn iter(&self) -> impl Iterator<Item = Stage> + '_ {
        Stage::ALL.into_iter().filter(|s| self.contains(*s))
    }
}

/// Everything the compositor needs besides the frame.
#[derive(Debug, Clone, Copy)]
pub struct CompositeInput<'a> {
    /// Clamped parameter snapshot.
    pub params: &'a EffectParameterSet,
    /// View transform, already merged with auto-framing.
    pub transform: Transform2D,
    /// Latest segmentation mask, possibly stale.
    pub mask: Option<&'a Arc<MaskBuffer>>,
    pub landmarks: Option<&'a FaceLandmarks>,
    /// The monitor reports sustained low frame rate.
    pub sustained_low_fps: bool,
}

impl<'a> CompositeInput<'a> {
    /// Input with the parameters' own view transform and no AI data.
    pub fn new(params: &'a EffectParameterSet, width: u32, height: u32) -> Self {
        Self {
            params,
            transform: crate::transform::view_transform(params, width, height),
            mask: None,
            landmarks: None,
            sustained_low_fps: false,
        }
    }
}

/// What happened to one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompositeReport {
    /// Stages that changed the frame.
    pub ran: StageSet,
    /// Stages that errored and were skipped.
    pub failed: StageSet,
    pub grade_backend: Option<GradeBackend>,
    pub overlays: OverlayReport,
    /// Face smoothing was requested but dropped for frame rate.
    pub smoothing_degraded: bool,
}

/// Runs the stage chain and owns every cache and scratch buffer it uses.
pub struct Compositor {
    config: CompositorConfig,
    lut_size: usize,
    filters: FilterCache,
    geometry: GeometryStage,
    ai: AiStage,
    sharpener: Sharpener,
    vignette: VignetteCache,
    luts: LutStore,
    grader: Grader,
    overlays: OverlayRenderer,
    dims: Option<(u32, u32)>,
    warned: StageSet,
    frames: u64,
}

impl Compositor {
    pub fn new(config: CompositorConfig, gpu: &GpuConfig) -> Self {
        Self {
            config,
            lut_size: gpu.lut_size,
            filters: FilterCache::new(),
            geometry: GeometryStage::new(),
            ai: AiStage::new(),
            sharpener: Sharpener::new(),
            vignette: VignetteCache::new(),
            luts: LutStore::new(),
            grader: Grader::new(gpu),
            overlays: OverlayRenderer::new(),
            dims: None,
            warned: StageSet::default(),
            frames: 0,
        }
    }

    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }

    /// Frames composited so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Track the surface size. Returns true when it changed, in which case
    /// size-keyed caches are dropped.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if self.dims == Some((width, height)) {
            return false;
        }
        if self.dims.is_some() {
            debug!(width, height, "Surface resized");
        }
        self.dims = Some((width, height));
        self.vignette.invalidate();
        self.ai.invalidate();
        true
    }

    /// Image used when `virtual_background` is on.
    pub fn set_background_image(&mut self, image: Option<FrameBuffer>) {
        self.ai.set_background_image(image);
    }

    /// Protected sources refuse pixel readback; overlays that need it skip.
    pub fn set_protected_content(&mut self, protected: bool) {
        self.overlays.set_protected(protected);
    }

    pub fn vignette_generations(&self) -> u64 {
        self.vignette.generations()
    }

    /// `(hits, misses)` of the color-matrix cache.
    pub fn filter_cache_stats(&self) -> (u64, u64) {
        (self.filters.hits(), self.filters.misses())
    }

    pub fn renderer_state(&self) -> Option<RendererState> {
        self.grader.renderer_state()
    }

    pub fn histogram(&self) -> &[u32; 256] {
        self.overlays.histogram()
    }

    /// Release GPU resources; grading continues in software.
    pub fn release(&mut self) {
        self.grader.release();
    }

    /// Run every enabled stage on `frame` in place.
    pub fn composite(
        &mut self,
        frame: &mut FrameBuffer,
        input: &CompositeInput<'_>,
        now: Instant,
    ) -> CompositeReport {
        let mut report = CompositeReport::default();
        if frame.format != PixelFormat::Rgba8 {
            trace!(format = ?frame.format, "Non-RGBA frame passed through");
            return report;
        }
        if frame.is_empty() {
            trace!("Empty frame passed through");
            return report;
        }
        self.resize(frame.width, frame.height);
        self.frames += 1;
        let params = input.params;

        // 1
        let transform = input.transform;
        if !transform.is_identity() {
            self.run_stage(&mut report, Stage::Geometry, |c| {
                c.geometry.apply(frame, transform);
                Ok(true)
            });
        }

        // 2
        let preset = FilterPreset::for_id(params.color_filter);
        let settings = FilterSettings::resolve(params, &preset);
        let matrix = self.filters.matrix(&settings);
        if !matrix.is_identity() {
            self.run_stage(&mut report, Stage::ColorFilter, |_| {
                matrix.apply_to_frame(frame);
                Ok(true)
            });
        }

        // 3
        let smoothing = !input.sustained_low_fps;
        if params.face_smoothing > 0.0 && input.mask.is_some() && !smoothing {
            report.smoothing_degraded = true;
            trace!("Face smoothing dropped for frame rate");
        }
        if let Some(mask) = input.mask {
            if self.ai.is_active(params, smoothing) {
                self.run_stage(&mut report, Stage::AiEffects, |c| {
                    if mask.width == 0 || mask.height == 0 {
                        return Err(CamFxError::Effect("segmentation mask is empty".into()));
                    }
                    let ai_input = AiInput {
                        mask,
                        filter: &matrix,
                        smoothing,
                    };
                    c.ai.apply(frame, params, &ai_input, &c.config);
                    Ok(true)
                });
            }
        }

        // 4
        if let Some(tint) = preset.tint {
            self.run_stage(&mut report, Stage::Tint, |_| {
                tint.apply(frame);
                Ok(true)
            });
        }

        // 5
        self.run_stage(&mut report, Stage::Letterbox, |_| {
            Ok(letterbox::apply(frame, params.aspect_lock))
        });

        // 6
        if params.sharpness > 0.0 {
            self.run_stage(&mut report, Stage::Sharpen, |c| {
                c.sharpener.apply(
                    frame,
                    params.sharpness,
                    c.config.sharpen_radius,
                    c.config.sharpen_amount,
                );
                Ok(true)
            });
        }

        // 7
        if params.vignette > 0.0 {
            self.run_stage(&mut report, Stage::Vignette, |c| {
                c.vignette
                    .apply(frame, params.vignette, c.config.vignette_darkening);
                Ok(true)
            });
        }

        // 8
        let mut backend = GradeBackend::Skipped;
        self.run_stage(&mut report, Stage::Grade, |c| {
            backend = c.grade(frame, input, now)?;
            Ok(backend != GradeBackend::Skipped)
        });
        report.grade_backend = (backend != GradeBackend::Skipped).then_some(backend);

        // 9
        let mut overlays = OverlayReport::default();
        self.run_stage(&mut report, Stage::Overlays, |c| {
            overlays = c.overlays.apply(frame, params);
            Ok(overlays.grid || overlays.zebra || overlays.focus_peaking || overlays.histogram)
        });
        report.overlays = overlays;

        report
    }

    /// Run one stage. `Ok(true)` means the frame changed. Errors and panics
    /// mark the stage failed; the chain carries on with the frame as the
    /// stage left it.
    fn run_stage<F>(&mut self, report: &mut CompositeReport, stage: Stage, run: F)
    where
        F: FnOnce(&mut Self) -> Result<bool>,
    {
        let result = panic::catch_unwind(AssertUnwindSafe(|| run(self))).unwrap_or_else(|p| {
            Err(CamFxError::Effect(format!(
                "stage panicked: {}",
                panic_message(p.as_ref())
            )))
        });
        match result {
            Ok(true) => report.ran.insert(stage),
            Ok(false) => {}
            Err(e) => {
                report.failed.insert(stage);
                if self.warned.contains(stage) {
                    debug!(%stage, error = %e, "Stage failed; skipped");
                } else {
                    self.warned.insert(stage);
                    warn!(%stage, error = %e, "Stage failed; skipped for this frame");
                }
            }
        }
    }

    fn grade(
        &mut self,
        frame: &mut FrameBuffer,
        input: &CompositeInput<'_>,
        now: Instant,
    ) -> Result<GradeBackend> {
        let params = input.params;
        let lut = (params.cinematic_lut != LutId::None && params.lut_intensity > 0.0)
            .then(|| self.luts.packed(params.cinematic_lut, self.lut_size));
        let warp = match input.landmarks {
            Some(landmarks) if params.has_beauty_warp() && frame.height > 0 => {
                let aspect = frame.width as f32 / frame.height as f32;
                self.luts
                    .warp_uniforms(landmarks, &WarpStrengths::from_params(params), aspect)
            }
            _ => None,
        };
        let request = GradeRequest {
            lut: lut.as_deref(),
            intensity: params.lut_intensity / 100.0,
            warp,
        };
        self.grader
            .process(frame, &request, now)
            .map_err(|e| CamFxError::Gpu(e.to_string()))
    }
}
