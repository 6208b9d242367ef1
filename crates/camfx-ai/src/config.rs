//! Segmentation settings.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::autoframe::AutoFrameConfig;

/// How long the worker may take to load its model before the manager gives
/// up on it.
pub const WORKER_INIT_TIMEOUT: Duration = Duration::from_secs(45);

/// Per-request deadline.
pub const REQUEST_TIMEOUT: Duration = Duration::from_millis(1000);

/// Consecutive failures after which segmentation is disabled.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    pub enabled: bool,
    pub init_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub max_consecutive_failures: u32,
    /// Directory searched for model files. Defaults to the per-user data dir.
    pub models_dir: Option<PathBuf>,
    pub auto_frame: AutoFrameConfig,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            init_timeout_ms: WORKER_INIT_TIMEOUT.as_millis() as u64,
            request_timeout_ms: REQUEST_TIMEOUT.as_millis() as u64,
            max_consecutive_failures: MAX_CONSECUTIVE_FAILURES,
            models_dir: None,
            auto_frame: AutoFrameConfig::default(),
        }
    }
}

impl SegmentationConfig {
    pub fn init_timeout(&self) -> Duration {
        Duration::from_millis(self.init_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Configured models directory, or `<data dir>/camfx/models`.
    pub fn resolved_models_dir(&self) -> PathBuf {
        self.models_dir.clone().unwrap_or_else(default_models_dir)
    }
}

/// Per-user model directory.
pub fn default_models_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("camfx")
        .join("models")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_constants() {
        let cfg = SegmentationConfig::default();
        assert_eq!(cfg.init_timeout(), WORKER_INIT_TIMEOUT);
        assert_eq!(cfg.request_timeout(), Duration::from_millis(1000));
        assert_eq!(cfg.max_consecutive_failures, 3);
        assert!(cfg.resolved_models_dir().ends_with("camfx/models"));
    }

    #[test]
    fn partial_json() {
        let cfg: SegmentationConfig =
            serde_json::from_str(r#"{"request_timeout_ms": 50, "auto_frame": {"head_bias": 0.4}}"#).unwrap();
        assert_eq!(cfg.request_timeout(), Duration::from_millis(50));
        assert_eq!(cfg.auto_frame.head_bias, 0.4);
        assert_eq!(cfg.auto_frame.recompute_interval_ms, 500);
    }
}
