//! Health reporting utilities.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Overall readiness of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Configuration loaded and every enabled package loaded.
    Ready,
    /// Configuration loaded but at least one enabled package failed.
    Degraded,
    /// Configuration itself failed to load.
    Unhealthy,
}

impl HealthStatus {
    /// Derives the overall status from the two facts that drive it.
    #[must_use]
    pub fn derive(config_loaded: bool, enabled_package_failed: bool) -> Self {
        if !config_loaded {
            Self::Unhealthy
        } else if enabled_package_failed {
            Self::Degraded
        } else {
            Self::Ready
        }
    }

    /// Lowercase label used in text output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
