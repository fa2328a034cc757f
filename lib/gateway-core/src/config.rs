//! Channel and edge-listener configuration

use crate::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default load-balancing policy applied to outbound channels.
pub const DEFAULT_LB_POLICY: &str = "round_robin";

/// File paths for one side of a mutually authenticated connection:
/// a certificate, its private key, and the trust-anchor bundle used to
/// verify the peer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustMaterial {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub ca_path: PathBuf,
}

/// Configuration for an outbound channel to a backend service.
///
/// The certificate, key, and trust-anchor paths are either all set
/// (mutually authenticated channel) or all empty (plaintext channel).
/// Partial combinations are rejected rather than silently downgraded.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Target network address, e.g. "tracker:8090".
    pub target: String,
    /// Load-balancing policy name embedded in the service configuration.
    pub lb_policy: String,
    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
    pub ca_path: Option<PathBuf>,
}

impl ChannelConfig {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            lb_policy: DEFAULT_LB_POLICY.to_string(),
            cert_path: None,
            key_path: None,
            ca_path: None,
        }
    }

    pub fn with_lb_policy(mut self, policy: impl Into<String>) -> Self {
        self.lb_policy = policy.into();
        self
    }

    pub fn with_trust_material(
        mut self,
        cert_path: impl Into<PathBuf>,
        key_path: impl Into<PathBuf>,
        ca_path: impl Into<PathBuf>,
    ) -> Self {
        self.cert_path = Some(cert_path.into());
        self.key_path = Some(key_path.into());
        self.ca_path = Some(ca_path.into());
        self
    }

    /// Resolve the trust-material triple for this channel.
    ///
    /// Returns `Ok(None)` for a plaintext channel, `Ok(Some(_))` for a
    /// mutually authenticated one, and a `Configuration` error for any
    /// partial combination of paths.
    pub fn trust_material(&self) -> Result<Option<TrustMaterial>> {
        resolve_trust_material(&self.cert_path, &self.key_path, &self.ca_path).map_err(|reason| {
            GatewayError::Configuration(format!("channel {}: {}", self.target, reason))
        })
    }
}

/// TLS material for the edge listener itself. Either fully present
/// (mutual-TLS listener) or fully absent (plaintext listener); there is no
/// server-TLS-only mode.
#[derive(Clone, Debug, Default)]
pub struct EdgeTlsConfig {
    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
    pub ca_path: Option<PathBuf>,
}

impl EdgeTlsConfig {
    pub fn material(&self) -> Result<Option<TrustMaterial>> {
        resolve_trust_material(&self.cert_path, &self.key_path, &self.ca_path)
            .map_err(|reason| GatewayError::Configuration(format!("edge listener: {}", reason)))
    }
}

/// Shared all-or-nothing rule. Empty path strings count as absent so that
/// flag defaults like `--tracker-cert ""` behave the same as omitting the
/// flag.
fn resolve_trust_material(
    cert_path: &Option<PathBuf>,
    key_path: &Option<PathBuf>,
    ca_path: &Option<PathBuf>,
) -> std::result::Result<Option<TrustMaterial>, String> {
    let present = |p: &Option<PathBuf>| p.as_ref().filter(|p| !p.as_os_str().is_empty()).cloned();

    match (present(cert_path), present(key_path), present(ca_path)) {
        (Some(cert_path), Some(key_path), Some(ca_path)) => Ok(Some(TrustMaterial {
            cert_path,
            key_path,
            ca_path,
        })),
        (None, None, None) => Ok(None),
        _ => Err(
            "certificate, key, and trust-anchor paths must be either all set or all empty"
                .to_string(),
        ),
    }
}
