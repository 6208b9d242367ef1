//! Per-frame effect parameter snapshot.
//!
//! The parameter source (a settings UI, a preset loader) owns the live
//! settings; the pipeline receives a snapshot each tick and clamps it before
//! any stage reads it. Percentages use 0–100 (or 0–200 where 100 is neutral).

use serde::{Deserialize, Serialize};

/// Compositing quality vs. speed trade-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceMode {
    Quality,
    #[default]
    Balanced,
    Performance,
}

impl PerformanceMode {
    /// Frame-skip factor `k`: at most one in `k` ticks composites while the
    /// pipeline is struggling.
    pub fn skip_factor(self) -> u64 {
        match self {
            Self::Quality => 1,
            Self::Balanced => 2,
            Self::Performance => 3,
        }
    }
}

/// Composition guide drawn over the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridType {
    #[default]
    None,
    RuleOfThirds,
    GoldenRatio,
    Center,
    Square4,
}

/// Highlight color used by focus peaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeakingColor {
    #[default]
    Red,
    Green,
    Blue,
    Yellow,
    White,
}

impl PeakingColor {
    /// RGBA value of the highlight.
    pub fn rgba(self) -> [u8; 4] {
        match self {
            Self::Red => [255, 32, 32, 255],
            Self::Green => [32, 255, 32, 255],
            Self::Blue => [48, 96, 255, 255],
            Self::Yellow => [255, 230, 0, 255],
            Self::White => [255, 255, 255, 255],
        }
    }
}

/// Locked output aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AspectLock {
    #[default]
    Free,
    Wide16x9,
    Classic4x3,
    Square,
    Vertical9x16,
    Cinema21x9,
}

impl AspectLock {
    /// Target ratio (width / height), or `None` when unlocked.
    pub fn ratio(self) -> Option<f32> {
        match self {
            Self::Free => None,
            Self::Wide16x9 => Some(16.0 / 9.0),
            Self::Classic4x3 => Some(4.0 / 3.0),
            Self::Square => Some(1.0),
            Self::Vertical9x16 => Some(9.0 / 16.0),
            Self::Cinema21x9 => Some(21.0 / 9.0),
        }
    }
}

/// Named color-filter preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorFilterId {
    #[default]
    None,
    Vintage,
    Noir,
    Warm,
    Cool,
    Vivid,
    Dramatic,
    Fade,
    Cyberpunk,
    SepiaTone,
}

impl ColorFilterId {
    /// All presets in display order.
    pub const ALL: [ColorFilterId; 10] = [
        Self::None,
        Self::Vintage,
        Self::Noir,
        Self::Warm,
        Self::Cool,
        Self::Vivid,
        Self::Dramatic,
        Self::Fade,
        Self::Cyberpunk,
        Self::SepiaTone,
    ];
}

/// Cinematic 3D LUT preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LutId {
    #[default]
    None,
    TealOrange,
    FilmNoir,
    VintageWarm,
    CoolBlue,
    BleachBypass,
    GoldenHour,
    MatrixGreen,
}

impl LutId {
    /// All grading presets, excluding `None`.
    pub const PRESETS: [LutId; 7] = [
        Self::TealOrange,
        Self::FilmNoir,
        Self::VintageWarm,
        Self::CoolBlue,
        Self::BleachBypass,
        Self::GoldenHour,
        Self::MatrixGreen,
    ];

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            Self::None => "Identity",
            Self::TealOrange => "Teal & Orange",
            Self::FilmNoir => "Film Noir",
            Self::VintageWarm => "Vintage Warm",
            Self::CoolBlue => "Cool Blue",
            Self::BleachBypass => "Bleach Bypass",
            Self::GoldenHour => "Golden Hour",
            Self::MatrixGreen => "Matrix Green",
        }
    }
}

/// Snapshot of every user-tunable effect setting for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectParameterSet {
    // Geometry
    /// Digital zoom factor, 1.0–3.0.
    pub zoom: f32,
    /// Horizontal pan as a fraction of the half-frame, -1.0–1.0.
    pub pan_x: f32,
    /// Vertical pan as a fraction of the half-frame, -1.0–1.0.
    pub pan_y: f32,
    /// Rotation in degrees, -180–180.
    pub rotation: f32,
    pub mirror: bool,
    /// Follow the segmented subject with pan/zoom.
    pub auto_frame: bool,

    // Color adjustments
    /// 0–200 %, 100 neutral.
    pub brightness: f32,
    /// 0–200 %, 100 neutral.
    pub contrast: f32,
    /// 0–200 %, 100 neutral.
    pub saturation: f32,
    /// Hue rotation in degrees, -180–180.
    pub hue: f32,
    /// 0–100 %.
    pub sepia: f32,
    /// 0–100 %.
    pub grayscale: f32,

    // Segmentation-dependent effects
    /// Background blur radius in pixels, 0–20.
    pub blur: f32,
    pub virtual_background: bool,
    /// Background dimming, 0–100 %.
    pub portrait_lighting: f32,
    /// 0–100 %.
    pub face_smoothing: f32,

    // Finishing
    /// 0–100 %.
    pub vignette: f32,
    /// 0–100 %.
    pub sharpness: f32,
    pub color_filter: ColorFilterId,
    pub cinematic_lut: LutId,
    /// 0–100 %.
    pub lut_intensity: f32,

    // Beauty warp, 0–100 % each
    pub eye_enlarge: f32,
    pub face_slim: f32,
    pub nose_slim: f32,
    pub mouth_scale: f32,

    // Monitoring overlays
    pub grid: GridType,
    pub histogram: bool,
    pub zebra: bool,
    /// Luma percentage at or above which zebra stripes are drawn, 50–100.
    pub zebra_threshold: f32,
    pub focus_peaking: bool,
    pub focus_peaking_color: PeakingColor,
    /// Edge strength percentage above which peaking highlights, 0–100.
    pub focus_peaking_threshold: f32,

    // Output
    pub aspect_lock: AspectLock,
    pub performance_mode: PerformanceMode,
}

impl Default for EffectParameterSet {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan_x: 0.0,
            pan_y: 0.0,
            rotation: 0.0,
            mirror: false,
            auto_frame: false,
            brightness: 100.0,
            contrast: 100.0,
            saturation: 100.0,
            hue: 0.0,
            sepia: 0.0,
            grayscale: 0.0,
            blur: 0.0,
            virtual_background: false,
            portrait_lighting: 0.0,
            face_smoothing: 0.0,
            vignette: 0.0,
            sharpness: 0.0,
            color_filter: ColorFilterId::None,
            cinematic_lut: LutId::None,
            lut_intensity: 100.0,
            eye_enlarge: 0.0,
            face_slim: 0.0,
            nose_slim: 0.0,
            mouth_scale: 0.0,
            grid: GridType::None,
            histogram: false,
            zebra: false,
            zebra_threshold: 95.0,
            focus_peaking: false,
            focus_peaking_color: PeakingColor::Red,
            focus_peaking_threshold: 50.0,
            aspect_lock: AspectLock::Free,
            performance_mode: PerformanceMode::Balanced,
        }
    }
}

/// Clamp into `[min, max]`, mapping NaN to `fallback`.
#[inline]
fn clamp_or(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(min, max)
    }
}

impl EffectParameterSet {
    /// Copy with every numeric field clamped to its documented range.
    pub fn clamped(&self) -> Self {
        Self {
            zoom: clamp_or(self.zoom, 1.0, 3.0, 1.0),
            pan_x: clamp_or(self.pan_x, -1.0, 1.0, 0.0),
            pan_y: clamp_or(self.pan_y, -1.0, 1.0, 0.0),
            rotation: clamp_or(self.rotation, -180.0, 180.0, 0.0),
            brightness: clamp_or(self.brightness, 0.0, 200.0, 100.0),
            contrast: clamp_or(self.contrast, 0.0, 200.0, 100.0),
            saturation: clamp_or(self.saturation, 0.0, 200.0, 100.0),
            hue: clamp_or(self.hue, -180.0, 180.0, 0.0),
            sepia: clamp_or(self.sepia, 0.0, 100.0, 0.0),
            grayscale: clamp_or(self.grayscale, 0.0, 100.0, 0.0),
            blur: clamp_or(self.blur, 0.0, 20.0, 0.0),
            portrait_lighting: clamp_or(self.portrait_lighting, 0.0, 100.0, 0.0),
            face_smoothing: clamp_or(self.face_smoothing, 0.0, 100.0, 0.0),
            vignette: clamp_or(self.vignette, 0.0, 100.0, 0.0),
            sharpness: clamp_or(self.sharpness, 0.0, 100.0, 0.0),
            lut_intensity: clamp_or(self.lut_intensity, 0.0, 100.0, 100.0),
            eye_enlarge: clamp_or(self.eye_enlarge, 0.0, 100.0, 0.0),
            face_slim: clamp_or(self.face_slim, 0.0, 100.0, 0.0),
            nose_slim: clamp_or(self.nose_slim, 0.0, 100.0, 0.0),
            mouth_scale: clamp_or(self.mouth_scale, 0.0, 100.0, 0.0),
            zebra_threshold: clamp_or(self.zebra_threshold, 50.0, 100.0, 95.0),
            focus_peaking_threshold: clamp_or(self.focus_peaking_threshold, 0.0, 100.0, 50.0),
            ..self.clone()
        }
    }

    /// Any of mirror, zoom, rotation or pan deviates from identity.
    pub fn has_geometry(&self) -> bool {
        self.mirror
            || self.zoom != 1.0
            || self.rotation != 0.0
            || self.pan_x != 0.0
            || self.pan_y != 0.0
    }

    /// Any base color adjustment or color-filter preset is active.
    pub fn has_color_adjustments(&self) -> bool {
        self.brightness != 100.0
            || self.contrast != 100.0
            || self.saturation != 100.0
            || self.hue != 0.0
            || self.sepia != 0.0
            || self.grayscale != 0.0
            || self.color_filter != ColorFilterId::None
    }

    /// Any effect that needs a segmentation mask is requested.
    pub fn needs_segmentation(&self) -> bool {
        self.blur > 0.0
            || self.virtual_background
            || self.portrait_lighting > 0.0
            || self.face_smoothing > 0.0
    }

    /// Any facial-warp strength is non-zero.
    pub fn has_beauty_warp(&self) -> bool {
        self.eye_enlarge > 0.0 || self.face_slim > 0.0 || self.nose_slim > 0.0 || self.mouth_scale > 0.0
    }

    /// Cinematic grading is selected with non-zero intensity.
    pub fn has_grading(&self) -> bool {
        self.cinematic_lut != LutId::None && self.lut_intensity > 0.0
    }

    /// Histogram, zebra or focus peaking needs the rendered pixels.
    pub fn needs_pixel_readback(&self) -> bool {
        self.histogram || self.zebra || self.focus_peaking
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_neutral() {
        let p = EffectParameterSet::default();
        assert!(!p.has_geometry());
        assert!(!p.has_color_adjustments());
        assert!(!p.needs_segmentation());
        assert!(!p.has_beauty_warp());
        assert!(!p.has_grading());
        assert!(!p.needs_pixel_readback());
        assert_eq!(p.clamped(), p);
    }

    #[test]
    fn clamped_bounds_every_range() {
        let p = EffectParameterSet {
            zoom: 10.0,
            pan_x: -4.0,
            brightness: 900.0,
            hue: f32::NAN,
            blur: -3.0,
            zebra_threshold: 10.0,
            lut_intensity: 250.0,
            ..Default::default()
        }
        .clamped();
        assert_eq!(p.zoom, 3.0);
        assert_eq!(p.pan_x, -1.0);
        assert_eq!(p.brightness, 200.0);
        assert_eq!(p.hue, 0.0);
        assert_eq!(p.blur, 0.0);
        assert_eq!(p.zebra_threshold, 50.0);
        assert_eq!(p.lut_intensity, 100.0);
    }

    #[test]
    fn skip_factor_per_mode() {
        assert_eq!(PerformanceMode::Quality.skip_factor(), 1);
        assert_eq!(PerformanceMode::Balanced.skip_factor(), 2);
        assert_eq!(PerformanceMode::Performance.skip_factor(), 3);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let p: EffectParameterSet =
            serde_json::from_str(r#"{"blur": 10, "cinematic_lut": "teal_orange"}"#).unwrap();
        assert_eq!(p.blur, 10.0);
        assert_eq!(p.cinematic_lut, LutId::TealOrange);
        assert_eq!(p.zoom, 1.0);
        assert!(p.needs_segmentation());
        assert!(p.has_grading());
    }

    #[test]
    fn aspect_ratios() {
        assert_eq!(AspectLock::Free.ratio(), None);
        assert!((AspectLock::Wide16x9.ratio().unwrap() - 1.7778).abs() < 1e-3);
    }
}
