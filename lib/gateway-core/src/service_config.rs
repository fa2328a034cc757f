//! Service-configuration document for outbound channels
//!
//! https://github.com/grpc/grpc/blob/master/doc/service_config.md

use crate::Result;
use serde::{Deserialize, Serialize};

/// The structured service-configuration document applied identically to
/// every outbound channel. It names the load-balancing policy and enables
/// passive health-check-based connection scoring so the transport can
/// route around failed connections.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    pub load_balancing_policy: String,
    pub health_check_config: HealthCheckConfig,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckConfig {
    /// Empty string subscribes to the server-wide health status.
    pub service_name: String,
}

impl ServiceConfig {
    pub fn for_policy(policy: impl Into<String>) -> Self {
        Self {
            load_balancing_policy: policy.into(),
            health_check_config: HealthCheckConfig::default(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
