//! Gateway context: the shared state behind the edge listener

use crate::assets::AssetCatalog;
use crate::body::GatewayBody;
use crate::health::{self, HealthAggregator};
use crate::router::ProtocolRouter;
use anyhow::Result;
use hyper::body::Incoming;
use hyper::header::CONTENT_TYPE;
use hyper::{Request, Response, StatusCode};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

const DOCS_PREFIX: &str = "/swagger/";
const HEALTH_PATH: &str = "/healthz";

/// Everything the edge listener needs to serve a request: the protocol
/// router, the health aggregator, and the documentation catalog.
/// Constructed once at startup and shared read-only across all
/// request-handling workers.
pub struct GatewayContext {
    router: ProtocolRouter,
    health: Arc<HealthAggregator>,
    assets: AssetCatalog,
    cancel: CancellationToken,
}

impl GatewayContext {
    pub fn new(
        router: ProtocolRouter,
        health: Arc<HealthAggregator>,
        assets: AssetCatalog,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            router,
            health,
            assets,
            cancel,
        }
    }

    /// Handle one inbound request on the shared listener: the
    /// documentation surface, the combined liveness surface, and the
    /// protocol-classified catch-all.
    pub async fn handle(&self, req: Request<Incoming>) -> Response<GatewayBody> {
        let path = req.uri().path().to_string();

        let result = if let Some(asset) = path.strip_prefix(DOCS_PREFIX) {
            self.serve_asset(asset)
        } else if path == HEALTH_PATH {
            Ok(health::http_response(
                &self.health.run_all(&self.cancel).await,
            ))
        } else {
            self.router.route(req).await
        };

        result.unwrap_or_else(|e| {
            warn!("error handling {}: {}", path, e);
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(GatewayBody::full("Internal Server Error\n"))
                .unwrap()
        })
    }

    /// Empty sub-path lists the known document names; a named sub-path
    /// serves that document or 404s.
    fn serve_asset(&self, name: &str) -> Result<Response<GatewayBody>> {
        if name.is_empty() {
            let listing = serde_json::to_vec(&self.assets.names())?;
            return Ok(Response::builder()
                .status(StatusCode::OK)
                .header(CONTENT_TYPE, "application/json")
                .body(GatewayBody::full(listing))
                .unwrap());
        }

        match self.assets.get(name) {
            Some(content) => Ok(Response::builder()
                .status(StatusCode::OK)
                .header(CONTENT_TYPE, "application/json")
                .body(GatewayBody::full(content))
                .unwrap()),
            None => Ok(Response::builder()
                .status(StatusCode::NOT_FOUND)
                .body(GatewayBody::empty())
                .unwrap()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::RpcServer;

    fn context() -> GatewayContext {
        let rpc = Arc::new(RpcServer::new());
        let rest = Arc::new(RpcServer::new());
        let assets = AssetCatalog::new()
            .insert("extractor.swagger.json", "{\"swagger\":\"2.0\"}")
            .insert("tracker.swagger.json", "{\"swagger\":\"2.0\"}");

        GatewayContext::new(
            ProtocolRouter::new(rpc, rest),
            Arc::new(HealthAggregator::new()),
            assets,
            CancellationToken::new(),
        )
    }

    #[test]
    fn test_asset_listing_on_empty_sub_path() {
        let response = context().serve_asset("").unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[test]
    fn test_named_asset_is_served() {
        let response = context().serve_asset("tracker.swagger.json").unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_unknown_asset_is_not_found() {
        let response = context().serve_asset("missing.swagger.json").unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
