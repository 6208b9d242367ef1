//! Subject-following pan/zoom derived from the segmentation mask.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::mask::MaskBuffer;

/// Auto-framing tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoFrameConfig {
    /// Where in the subject box to aim, as a fraction of its height from the
    /// top. 0.25 keeps the head near the center.
    pub head_bias: f32,
    /// Minimum time between recomputations.
    pub recompute_interval_ms: u64,
    /// Row/column stride used when scanning the mask.
    pub stride: usize,
    /// Mask value counted as foreground.
    pub threshold: u8,
    /// Foreground coverage below which the mask is treated as noise and the
    /// view stays unframed.
    pub min_coverage: f32,
    /// Breathing room around the subject, as a fraction of its size.
    pub padding: f32,
    pub max_zoom: f32,
}

impl Default for AutoFrameConfig {
    fn default() -> Self {
        Self {
            head_bias: 0.25,
            recompute_interval_ms: 500,
            stride: 4,
            threshold: 128,
            min_coverage: 0.01,
            padding: 0.3,
            max_zoom: 2.0,
        }
    }
}

/// Pan/zoom target. Pan is in half-frame units, like the effect parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AutoFrameTransform {
    pub pan_x: f32,
    pub pan_y: f32,
    pub zoom: f32,
}

impl AutoFrameTransform {
    pub const IDENTITY: Self = Self {
        pan_x: 0.0,
        pan_y: 0.0,
        zoom: 1.0,
    };

    /// Move `t` of the way toward `target`.
    pub fn lerp(self, target: Self, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        Self {
            pan_x: self.pan_x + (target.pan_x - self.pan_x) * t,
            pan_y: self.pan_y + (target.pan_y - self.pan_y) * t,
            zoom: self.zoom + (target.zoom - self.zoom) * t,
        }
    }
}

impl Default for AutoFrameTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Framing that centers the subject's head and fills the frame with it.
///
/// Returns `None` when the mask has too little foreground to frame.
pub fn compute_auto_frame(mask: &MaskBuffer, config: &AutoFrameConfig) -> Option<AutoFrameTransform> {
    if mask.foreground_ratio(config.stride, config.threshold) < config.min_coverage {
        return None;
    }
    let bbox = mask.bounding_box(config.stride, config.threshold)?;
    let focus_x = bbox.x + bbox.width * 0.5;
    let focus_y = bbox.y + bbox.height * config.head_bias.clamp(0.0, 1.0);

    let padded_w = (bbox.width * (1.0 + config.padding)).max(1e-3);
    let padded_h = (bbox.height * (1.0 + config.padding)).max(1e-3);
    let zoom = (1.0 / padded_w)
        .min(1.0 / padded_h)
        .clamp(1.0, config.max_zoom.max(1.0));

    // Keep the zoomed view inside the frame.
    let limit = (zoom - 1.0).min(1.0);
    let pan_x = (-2.0 * zoom * (focus_x - 0.5)).clamp(-limit, limit);
    let pan_y = (-2.0 * zoom * (focus_y - 0.5)).clamp(-limit, limit);

    Some(AutoFrameTransform { pan_x, pan_y, zoom })
}

/// Rate-limited auto-framing: recomputes at most once per interval and
/// serves the cached target in between.
#[derive(Debug, Clone)]
pub struct AutoFramer {
    config: AutoFrameConfig,
    cached: AutoFrameTransform,
    last_computed: Option<Instant>,
    computations: u64,
}

impl AutoFramer {
    pub fn new(config: AutoFrameConfig) -> Self {
        Self {
            config,
            cached: AutoFrameTransform::IDENTITY,
            last_computed: None,
            computations: 0,
        }
    }

    /// Current target, recomputed from `mask` when the interval has elapsed.
    pub fn target(&mut self, mask: Option<&MaskBuffer>, now: Instant) -> AutoFrameTransform {
        let interval = Duration::from_millis(self.config.recompute_interval_ms);
        let due = self
            .last_computed
            .map_or(true, |at| now.saturating_duration_since(at) >= interval);
        if due {
            if let Some(mask) = mask {
                self.cached = compute_auto_frame(mask, &self.config)
                    .unwrap_or(AutoFrameTransform::IDENTITY);
                self.last_computed = Some(now);
                self.computations += 1;
            }
        }
        self.cached
    }

    /// Number of recomputations so far.
    pub fn computations(&self) -> u64 {
        self.computations
    }

    pub fn reset(&mut self) {
        self.cached = AutoFrameTransform::IDENTITY;
        self.last_computed = None;
    }
}
