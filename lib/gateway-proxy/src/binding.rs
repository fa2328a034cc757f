//! RPC server and service bindings

use crate::body::GatewayBody;
use crate::grpc;
use anyhow::Result;
use async_trait::async_trait;
use hyper::body::Incoming;
use hyper::{Request, Response};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// A handler for inbound requests on the shared listener. Implemented by
/// the RPC server and by the REST-translation handler; both must be safe
/// for concurrent use.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, req: Request<Incoming>) -> Result<Response<GatewayBody>>;
}

/// Adapts an RPC client for one service into an RPC server handler for
/// that service. Implemented once per concrete service and composed into
/// the [`RpcServer`], so the core never hard-codes service names.
#[async_trait]
pub trait ServiceBinding: Send + Sync {
    /// Fully qualified service name, e.g. "tracker.SourceService".
    fn service(&self) -> &str;

    async fn handle(&self, req: Request<Incoming>) -> Result<Response<GatewayBody>>;
}

/// The binary-RPC side of the gateway: dispatches each RPC-classified
/// request to the binding registered for the service named in its path.
/// Populated once at startup, read-only afterwards.
#[derive(Default)]
pub struct RpcServer {
    bindings: HashMap<String, Arc<dyn ServiceBinding>>,
}

impl RpcServer {
    pub fn new() -> Self {
        Self {
            bindings: HashMap::new(),
        }
    }

    pub fn register(mut self, binding: Arc<dyn ServiceBinding>) -> Self {
        self.bindings.insert(binding.service().to_string(), binding);
        self
    }

    pub fn services(&self) -> Vec<&str> {
        self.bindings.keys().map(|s| s.as_str()).collect()
    }
}

#[async_trait]
impl RequestHandler for RpcServer {
    async fn handle(&self, req: Request<Incoming>) -> Result<Response<GatewayBody>> {
        let path = req.uri().path();

        match service_of(path).and_then(|service| self.bindings.get(service)) {
            Some(binding) => binding.handle(req).await,
            None => {
                debug!("no binding registered for {}", path);
                Ok(grpc::status_response(
                    grpc::code::UNIMPLEMENTED,
                    "unknown service",
                ))
            }
        }
    }
}

/// Extract the service component of a binary-RPC request path, which has
/// the shape "/package.Service/Method".
fn service_of(path: &str) -> Option<&str> {
    let mut parts = path.strip_prefix('/')?.splitn(2, '/');
    let service = parts.next()?;
    let method = parts.next()?;

    if service.is_empty() || method.is_empty() {
        return None;
    }

    Some(service)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_of_valid_paths() {
        assert_eq!(
            service_of("/tracker.SourceService/List"),
            Some("tracker.SourceService")
        );
        assert_eq!(
            service_of("/grpc.health.v1.Health/Check"),
            Some("grpc.health.v1.Health")
        );
    }

    #[test]
    fn test_service_of_invalid_paths() {
        assert_eq!(service_of("/"), None);
        assert_eq!(service_of("/tracker.SourceService"), None);
        assert_eq!(service_of("/tracker.SourceService/"), None);
        assert_eq!(service_of("//Method"), None);
        assert_eq!(service_of("no-leading-slash/Method"), None);
    }

    #[test]
    fn test_register_and_list_services() {
        struct Noop(&'static str);

        #[async_trait]
        impl ServiceBinding for Noop {
            fn service(&self) -> &str {
                self.0
            }

            async fn handle(&self, _req: Request<Incoming>) -> Result<Response<GatewayBody>> {
                Ok(Response::new(GatewayBody::empty()))
            }
        }

        let server = RpcServer::new()
            .register(Arc::new(Noop("tracker.SourceService")))
            .register(Arc::new(Noop("extractor.DependencyExtractor")));

        let mut services = server.services();
        services.sort_unstable();
        assert_eq!(
            services,
            vec!["extractor.DependencyExtractor", "tracker.SourceService"]
        );
    }
}
