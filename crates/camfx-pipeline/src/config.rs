//! Pipeline configuration.
//!
//! One JSON document covers every subsystem. Missing sections and fields
//! take their defaults, so `{}` is a valid configuration.

use std::path::Path;

use camfx_ai::SegmentationConfig;
use camfx_core::timing::STRUGGLING_FPS;
use camfx_core::EffectParameterSet;
use camfx_effects::CompositorConfig;
use camfx_gpu::GpuConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PipelineError, PipelineResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Frame rate below which adaptive skipping kicks in.
    pub struggling_fps: f32,
    /// Fraction of the remaining distance to the auto-frame target covered
    /// each frame.
    pub auto_frame_smoothing: f32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            struggling_fps: STRUGGLING_FPS,
            auto_frame_smoothing: 0.08,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub scheduler: SchedulerConfig,
    pub segmentation: SegmentationConfig,
    pub gpu: GpuConfig,
    pub compositor: CompositorConfig,
}

impl PipelineConfig {
    pub fn from_json(data: &[u8]) -> PipelineResult<Self> {
        serde_json::from_slice(data)
            .map_err(|e| PipelineError::Config(format!("Invalid pipeline config: {}", e)))
    }

    pub fn to_json(&self) -> PipelineResult<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| PipelineError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Load from a JSON file.
    pub fn load(path: &Path) -> PipelineResult<Self> {
        let data = std::fs::read(path)?;
        let config = Self::from_json(&data)?;
        debug!(path = %path.display(), "Loaded pipeline config");
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> PipelineResult<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

/// Load an effect parameter snapshot from a JSON file.
pub fn load_params(path: &Path) -> PipelineResult<EffectParameterSet> {
    let data = std::fs::read(path)?;
    serde_json::from_slice(&data)
        .map_err(|e| PipelineError::Config(format!("Invalid effect parameters: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use camfx_core::LutId;
    use std::io::Write;

    #[test]
    fn empty_document_is_default() {
        let cfg = PipelineConfig::from_json(b"{}").unwrap();
        assert_eq!(cfg, PipelineConfig::default());
        assert_eq!(cfg.scheduler.struggling_fps, 30.0);
        assert_eq!(cfg.gpu.max_init_attempts, 3);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = PipelineConfig::from_json(
            br#"{"segmentation": {"request_timeout_ms": 250}, "gpu": {"enabled": false}}"#,
        )
        .unwrap();
        assert_eq!(cfg.segmentation.request_timeout_ms, 250);
        assert_eq!(cfg.segmentation.max_consecutive_failures, 3);
        assert!(!cfg.gpu.enabled);
        assert_eq!(cfg.gpu.lut_size, 32);
    }

    #[test]
    fn save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("camfx.json");
        let mut cfg = PipelineConfig::default();
        cfg.scheduler.struggling_fps = 24.0;
        cfg.compositor.mask_feather = 6;
        cfg.save(&path).unwrap();

        let loaded = PipelineConfig::load(&path).unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn malformed_file_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();
        let err = PipelineConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = PipelineConfig::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, PipelineError::Io(_)));
    }

    #[test]
    fn params_file_loads_partially() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{"blur": 10, "cinematic_lut": "golden_hour"}"#)
            .unwrap();
        let params = load_params(file.path()).unwrap();
        assert_eq!(params.blur, 10.0);
        assert_eq!(params.cinematic_lut, LutId::GoldenHour);
        assert_eq!(params.zoom, 1.0);
    }
}
