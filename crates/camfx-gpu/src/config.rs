//! GPU renderer configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for the GPU grading renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpuConfig {
    /// Try the GPU at all. When false only the software grader runs.
    pub enabled: bool,
    /// Initialization attempts before the renderer is disabled for the session.
    pub max_init_attempts: u32,
    /// First retry delay; doubles after each failure.
    pub backoff_base_ms: u64,
    /// Edge length of generated LUTs.
    pub lut_size: usize,
}

impl Default for GpuConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_init_attempts: 3,
            backoff_base_ms: 100,
            lut_size: 32,
        }
    }
}

impl GpuConfig {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}
