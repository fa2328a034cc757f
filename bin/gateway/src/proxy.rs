//! Pass-through service proxies
//!
//! Each binding adapts the RPC client side of one backend service into an
//! RPC server handler for that service: requests are relayed over the
//! backend channel with their framing intact, and responses stream back
//! without buffering.

use async_trait::async_trait;
use gateway_proxy::{grpc, Channel, GatewayBody, ServiceBinding};
use hyper::body::Incoming;
use hyper::{Request, Response};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct ProxyBinding {
    service: &'static str,
    channel: Arc<Channel>,
}

impl ProxyBinding {
    pub fn new(service: &'static str, channel: Arc<Channel>) -> Self {
        Self { service, channel }
    }
}

#[async_trait]
impl ServiceBinding for ProxyBinding {
    fn service(&self) -> &str {
        self.service
    }

    async fn handle(&self, req: Request<Incoming>) -> anyhow::Result<Response<GatewayBody>> {
        debug!("forwarding {} to {}", req.uri().path(), self.channel.target());

        match self.channel.request(req.map(GatewayBody::incoming)).await {
            Ok(response) => Ok(response.map(GatewayBody::incoming)),
            Err(e) => {
                warn!("backend {} call failed: {}", self.channel.target(), e);
                Ok(grpc::status_response(
                    grpc::code::UNAVAILABLE,
                    "backend unavailable",
                ))
            }
        }
    }
}
