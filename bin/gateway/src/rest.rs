//! REST translation handler
//!
//! The REST-to-RPC field mapping is generated from the service contracts
//! and lives outside this repository; this forwarder stands in for the
//! generated mux by relaying REST/JSON requests to the tracker backend,
//! which serves every REST-mapped service.

use async_trait::async_trait;
use gateway_proxy::{Channel, GatewayBody, RequestHandler};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct RestForwarder {
    channel: Arc<Channel>,
}

impl RestForwarder {
    pub fn new(channel: Arc<Channel>) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl RequestHandler for RestForwarder {
    async fn handle(&self, req: Request<Incoming>) -> anyhow::Result<Response<GatewayBody>> {
        debug!(
            "translating {} {} for {}",
            req.method(),
            req.uri().path(),
            self.channel.target()
        );

        match self.channel.request(req.map(GatewayBody::incoming)).await {
            Ok(response) => Ok(response.map(GatewayBody::incoming)),
            Err(e) => {
                warn!("backend {} call failed: {}", self.channel.target(), e);
                Ok(Response::builder()
                    .status(StatusCode::BAD_GATEWAY)
                    .body(GatewayBody::full("Bad Gateway\n"))
                    .unwrap())
            }
        }
    }
}
