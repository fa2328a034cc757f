//! Health report data model

use serde::{Deserialize, Serialize};

/// Outcome of a single named health check. Produced on demand, never
/// persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub name: String,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl HealthCheckResult {
    pub fn pass(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            healthy: true,
            message: None,
        }
    }

    pub fn fail(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            healthy: false,
            message: Some(message.into()),
        }
    }
}

/// Combined verdict over every registered check. `healthy` is true iff
/// every individual result is healthy; per-check results are always
/// included so partial failure is reported, not hidden.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedHealthReport {
    pub healthy: bool,
    pub checks: Vec<HealthCheckResult>,
}

impl AggregatedHealthReport {
    pub fn new(checks: Vec<HealthCheckResult>) -> Self {
        let healthy = checks.iter().all(|check| check.healthy);
        Self { healthy, checks }
    }
}
