//! Face-warp uniforms derived from facial landmarks.
//!
//! Each active landmark becomes a radial distortion centered on the point:
//! positive strength bulges (magnifies), negative strength pinches. The GPU
//! warp pass and the software grader both evaluate [`WarpUniforms::source_uv`].

use bytemuck::{Pod, Zeroable};
use camfx_core::{EffectParameterSet, FaceLandmarks, LandmarkKind, Vec2};

/// Fewer detected landmarks than this disables the warp for the frame.
pub const MIN_WARP_LANDMARKS: usize = 5;

/// Uniform slots; seven landmarks padded to a power of two.
pub const MAX_WARP_POINTS: usize = 8;

/// Fallback inter-eye distance (normalized) when an eye is missing.
const DEFAULT_EYE_DISTANCE: f32 = 0.15;

/// Beauty-warp strengths in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WarpStrengths {
    pub eye_enlarge: f32,
    pub face_slim: f32,
    pub nose_slim: f32,
    pub mouth_scale: f32,
}

impl WarpStrengths {
    /// Convert the 0–100 % parameter fields.
    pub fn from_params(params: &EffectParameterSet) -> Self {
        Self {
            eye_enlarge: (params.eye_enlarge / 100.0).clamp(0.0, 1.0),
            face_slim: (params.face_slim / 100.0).clamp(0.0, 1.0),
            nose_slim: (params.nose_slim / 100.0).clamp(0.0, 1.0),
            mouth_scale: (params.mouth_scale / 100.0).clamp(0.0, 1.0),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.eye_enlarge <= 0.0
            && self.face_slim <= 0.0
            && self.nose_slim <= 0.0
            && self.mouth_scale <= 0.0
    }
}

/// One distortion center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WarpPoint {
    pub center: Vec2,
    pub radius: f32,
    /// Positive bulges, negative pinches.
    pub strength: f32,
}

/// GPU uniform block for the warp pass. Matches `WarpParams` in `warp.wgsl`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct WarpUniforms {
    /// `[x, y, radius, strength]` per active point.
    pub points: [[f32; 4]; MAX_WARP_POINTS],
    pub count: u32,
    /// Frame width / height, used to keep the distortion circular.
    pub aspect: f32,
    pub _pad: [f32; 2],
}

impl WarpUniforms {
    /// Build uniforms for a frame of the given aspect ratio.
    ///
    /// Returns `None` when fewer than [`MIN_WARP_LANDMARKS`] landmarks are
    /// present or every strength is zero.
    pub fn from_landmarks(
        landmarks: &FaceLandmarks,
        strengths: &WarpStrengths,
        aspect: f32,
    ) -> Option<Self> {
        if landmarks.count() < MIN_WARP_LANDMARKS || strengths.is_zero() {
            return None;
        }

        let eye_distance = match (
            landmarks.get(LandmarkKind::LeftEye),
            landmarks.get(LandmarkKind::RightEye),
        ) {
            (Some(l), Some(r)) => {
                let d = Vec2::new((r.x - l.x) * aspect, r.y - l.y).length();
                if d > 1e-4 {
                    d
                } else {
                    DEFAULT_EYE_DISTANCE
                }
            }
            _ => DEFAULT_EYE_DISTANCE,
        };

        let mut uniforms = Self::zeroed();
        uniforms.aspect = aspect.max(1e-3);
        for (kind, center) in landmarks.iter() {
            let (radius, strength) = match kind {
                LandmarkKind::LeftEye | LandmarkKind::RightEye => {
                    (0.45 * eye_distance, 0.35 * strengths.eye_enlarge)
                }
                LandmarkKind::NoseTip => (0.35 * eye_distance, -0.30 * strengths.nose_slim),
                LandmarkKind::JawLeft | LandmarkKind::JawRight => {
                    (0.80 * eye_distance, -0.30 * strengths.face_slim)
                }
                LandmarkKind::MouthLeft | LandmarkKind::MouthRight => {
                    (0.35 * eye_distance, 0.25 * strengths.mouth_scale)
                }
            };
            if strength == 0.0 {
                continue;
            }
            let slot = uniforms.count as usize;
            uniforms.points[slot] = [center.x, center.y, radius, strength];
            uniforms.count += 1;
        }

        (uniforms.count > 0).then_some(uniforms)
    }

    /// Active points.
    pub fn points(&self) -> impl Iterator<Item = WarpPoint> + '_ {
        self.points[..self.count as usize]
            .iter()
            .map(|&[x, y, radius, strength]| WarpPoint {
                center: Vec2::new(x, y),
                radius,
                strength,
            })
    }

    /// Map an output UV to the source UV to sample.
    pub fn source_uv(&self, uv: Vec2) -> Vec2 {
        let mut p = uv;
        for point in self.points() {
            let delta = p - point.center;
            let dist = Vec2::new(delta.x * self.aspect, delta.y).length();
            if point.radius <= 0.0 || dist >= point.radius {
                continue;
            }
            let t = dist / point.radius;
            let falloff = 1.0 - t * t;
            p = point.center + delta * (1.0 - point.strength * falloff);
        }
        p
    }
}
