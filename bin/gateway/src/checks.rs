//! Backend reachability checks

use async_trait::async_trait;
use gateway_proxy::HealthCheck;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Probes one backend capability by opening a TCP connection to its
/// target address.
pub struct ReachabilityCheck {
    name: String,
    target: String,
}

impl ReachabilityCheck {
    pub fn new(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
        }
    }
}

#[async_trait]
impl HealthCheck for ReachabilityCheck {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> Result<(), String> {
        match time::timeout(PROBE_TIMEOUT, TcpStream::connect(self.target.as_str())).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(format!("{} unreachable: {}", self.target, e)),
            Err(_) => Err(format!("{} unreachable: connection timed out", self.target)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_reachable_target_passes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let target = format!("127.0.0.1:{}", listener.local_addr().unwrap().port());

        let check = ReachabilityCheck::new("tracker", target.as_str());
        assert_eq!(check.name(), "tracker");
        assert!(check.check().await.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_target_fails_with_message() {
        let check = ReachabilityCheck::new("tracker", "127.0.0.1:1");
        let message = check.check().await.unwrap_err();
        assert!(message.contains("unreachable"));
    }
}
