//! Aggregated health reporting
//!
//! A fixed set of externally supplied checks, each probing one backend
//! capability, combined into a single verdict that both protocol surfaces
//! consume.

use crate::binding::ServiceBinding;
use crate::body::GatewayBody;
use crate::grpc;
use async_trait::async_trait;
use gateway_core::{AggregatedHealthReport, HealthCheckResult};
use hyper::body::Incoming;
use hyper::header::CONTENT_TYPE;
use hyper::{Request, Response, StatusCode};
use prost::Message;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// One backend-capability probe, e.g. "is the tracker reachable".
#[async_trait]
pub trait HealthCheck: Send + Sync {
    fn name(&self) -> &str;

    /// Pass, or fail with a diagnostic message. Implementations should not
    /// block past the aggregator's per-check timeout; if they do, the
    /// aggregate reports them as failing rather than waiting.
    async fn check(&self) -> std::result::Result<(), String>;
}

/// Runs every registered check and combines the results. The registry is
/// populated once at setup and only read afterwards.
pub struct HealthAggregator {
    checks: Vec<Arc<dyn HealthCheck>>,
    timeout: Duration,
}

impl HealthAggregator {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_CHECK_TIMEOUT)
    }

    /// Upper bound on any single check, so one unresponsive backend cannot
    /// stall the whole report.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            checks: Vec::new(),
            timeout,
        }
    }

    pub fn register<C: HealthCheck + 'static>(mut self, check: C) -> Self {
        self.checks.push(Arc::new(check));
        self
    }

    /// Execute every registered check concurrently and aggregate the
    /// results, in registration order. A check that fails, times out,
    /// panics, or is cancelled contributes a failing result; faults are
    /// recorded, never propagated to the caller. The report is built fresh
    /// on every invocation.
    pub async fn run_all(&self, cancel: &CancellationToken) -> AggregatedHealthReport {
        let mut handles = Vec::with_capacity(self.checks.len());

        for check in &self.checks {
            let check = check.clone();
            let cancel = cancel.clone();
            let timeout = self.timeout;

            handles.push((
                check.name().to_string(),
                tokio::task::spawn(async move {
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            HealthCheckResult::fail(check.name(), "health check cancelled")
                        }
                        outcome = tokio::time::timeout(timeout, check.check()) => match outcome {
                            Ok(Ok(())) => HealthCheckResult::pass(check.name()),
                            Ok(Err(message)) => HealthCheckResult::fail(check.name(), message),
                            Err(_) => HealthCheckResult::fail(check.name(), "health check timed out"),
                        },
                    }
                }),
            ));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (name, handle) in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => {
                    warn!("health check {} aborted: {}", name, e);
                    results.push(HealthCheckResult::fail(name, "health check aborted"));
                }
            }
        }

        AggregatedHealthReport::new(results)
    }
}

impl Default for HealthAggregator {
    fn default() -> Self {
        Self::new()
    }
}

/// Render a report as the HTTP health surface: 200 when healthy, 503
/// otherwise, the full per-check detail as JSON either way.
pub fn http_response(report: &AggregatedHealthReport) -> Response<GatewayBody> {
    let status = if report.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = serde_json::to_vec(report).unwrap_or_else(|_| b"{}".to_vec());

    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(GatewayBody::full(body))
        .unwrap()
}

/// grpc.health.v1 messages, declared by hand; the gateway implements only
/// the health-checking convention, no other RPC serialization.
#[derive(Clone, PartialEq, Message)]
pub struct HealthCheckRequest {
    #[prost(string, tag = "1")]
    pub service: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct HealthCheckResponse {
    #[prost(enumeration = "ServingStatus", tag = "1")]
    pub status: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, prost::Enumeration)]
#[repr(i32)]
pub enum ServingStatus {
    Unknown = 0,
    Serving = 1,
    NotServing = 2,
}

pub const HEALTH_SERVICE: &str = "grpc.health.v1.Health";

/// The binary-RPC health surface: answers `grpc.health.v1.Health/Check`
/// with the same aggregate the HTTP surface reports. Only the server-wide
/// status is tracked, so the request's service field is not consulted.
pub struct HealthBinding {
    aggregator: Arc<HealthAggregator>,
    cancel: CancellationToken,
}

impl HealthBinding {
    pub fn new(aggregator: Arc<HealthAggregator>, cancel: CancellationToken) -> Self {
        Self { aggregator, cancel }
    }
}

#[async_trait]
impl ServiceBinding for HealthBinding {
    fn service(&self) -> &str {
        HEALTH_SERVICE
    }

    async fn handle(&self, _req: Request<Incoming>) -> anyhow::Result<Response<GatewayBody>> {
        let report = self.aggregator.run_all(&self.cancel).await;

        let status = if report.healthy {
            ServingStatus::Serving
        } else {
            ServingStatus::NotServing
        };

        let response = HealthCheckResponse {
            status: status as i32,
        };

        Ok(grpc::unary_response(&response.encode_to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticCheck {
        name: &'static str,
        failure: Option<&'static str>,
    }

    impl StaticCheck {
        fn passing(name: &'static str) -> Self {
            Self {
                name,
                failure: None,
            }
        }

        fn failing(name: &'static str, message: &'static str) -> Self {
            Self {
                name,
                failure: Some(message),
            }
        }
    }

    #[async_trait]
    impl HealthCheck for StaticCheck {
        fn name(&self) -> &str {
            self.name
        }

        async fn check(&self) -> std::result::Result<(), String> {
            match self.failure {
                None => Ok(()),
                Some(message) => Err(message.to_string()),
            }
        }
    }

    struct HangingCheck;

    #[async_trait]
    impl HealthCheck for HangingCheck {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn check(&self) -> std::result::Result<(), String> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }
    }

    struct PanickingCheck;

    #[async_trait]
    impl HealthCheck for PanickingCheck {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn check(&self) -> std::result::Result<(), String> {
            panic!("check blew up");
        }
    }

    #[tokio::test]
    async fn test_all_passing() {
        let aggregator = HealthAggregator::new()
            .register(StaticCheck::passing("tracker"))
            .register(StaticCheck::passing("extractor"));

        let report = aggregator.run_all(&CancellationToken::new()).await;
        assert!(report.healthy);
        assert_eq!(report.checks.len(), 2);
    }

    #[tokio::test]
    async fn test_single_failure_with_message() {
        let aggregator = HealthAggregator::new()
            .register(StaticCheck::passing("extractor"))
            .register(StaticCheck::failing("tracker", "tracker unreachable"))
            .register(StaticCheck::passing("tracker/modules"));

        let report = aggregator.run_all(&CancellationToken::new()).await;

        assert!(!report.healthy);
        assert_eq!(report.checks.len(), 3);
        assert_eq!(report.checks[0].name, "extractor");
        assert!(report.checks[0].healthy);
        assert_eq!(report.checks[1].name, "tracker");
        assert!(!report.checks[1].healthy);
        assert_eq!(
            report.checks[1].message.as_deref(),
            Some("tracker unreachable")
        );
        assert!(report.checks[2].healthy);
    }

    #[tokio::test]
    async fn test_slow_check_times_out() {
        let aggregator = HealthAggregator::with_timeout(Duration::from_millis(50))
            .register(StaticCheck::passing("tracker"))
            .register(HangingCheck);

        let report = aggregator.run_all(&CancellationToken::new()).await;

        assert!(!report.healthy);
        assert!(report.checks[0].healthy);
        assert_eq!(
            report.checks[1].message.as_deref(),
            Some("health check timed out")
        );
    }

    #[tokio::test]
    async fn test_panicking_check_is_a_failing_result() {
        let aggregator = HealthAggregator::new()
            .register(PanickingCheck)
            .register(StaticCheck::passing("tracker"));

        let report = aggregator.run_all(&CancellationToken::new()).await;

        assert!(!report.healthy);
        assert_eq!(report.checks[0].name, "panicking");
        assert!(!report.checks[0].healthy);
        assert!(report.checks[1].healthy);
    }

    #[tokio::test]
    async fn test_cancellation_aborts_in_flight_checks() {
        let aggregator = HealthAggregator::new().register(HangingCheck);

        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = aggregator.run_all(&cancel).await;
        assert!(!report.healthy);
        assert_eq!(
            report.checks[0].message.as_deref(),
            Some("health check cancelled")
        );
    }

    #[tokio::test]
    async fn test_http_response_status_split() {
        let healthy = AggregatedHealthReport::new(vec![HealthCheckResult::pass("tracker")]);
        assert_eq!(http_response(&healthy).status(), StatusCode::OK);

        let unhealthy =
            AggregatedHealthReport::new(vec![HealthCheckResult::fail("tracker", "unreachable")]);
        assert_eq!(
            http_response(&unhealthy).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_health_message_round_trip() {
        let response = HealthCheckResponse {
            status: ServingStatus::Serving as i32,
        };

        let decoded = HealthCheckResponse::decode(&response.encode_to_vec()[..]).unwrap();
        assert_eq!(decoded.status, ServingStatus::Serving as i32);
    }
}
