//! Per-request protocol routing

use crate::binding::RequestHandler;
use crate::body::GatewayBody;
use crate::grpc;
use anyhow::Result;
use hyper::body::Incoming;
use hyper::header::CONTENT_TYPE;
use hyper::{Request, Response, Version};
use std::sync::Arc;
use tracing::trace;

/// The two kinds of traffic the shared listener carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Protocol {
    Rpc,
    Rest,
}

/// Classify an inbound request from its framing alone.
///
/// A request is binary-RPC traffic iff its transport is HTTP/2 and its
/// content-type begins with `application/grpc`. Everything else, including
/// HTTP/2 requests with a different content-type and any HTTP/1.1 request,
/// is REST/JSON traffic. There is no "unknown protocol" rejection path,
/// and the body is never inspected.
pub fn classify<B>(req: &Request<B>) -> Protocol {
    let grpc_content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.starts_with(grpc::CONTENT_TYPE_GRPC))
        .unwrap_or(false);

    if req.version() == Version::HTTP_2 && grpc_content_type {
        Protocol::Rpc
    } else {
        Protocol::Rest
    }
}

/// Dispatches every inbound request on the shared listener to the RPC
/// server or the REST-translation handler, both supplied at construction.
pub struct ProtocolRouter {
    rpc: Arc<dyn RequestHandler>,
    rest: Arc<dyn RequestHandler>,
}

impl ProtocolRouter {
    pub fn new(rpc: Arc<dyn RequestHandler>, rest: Arc<dyn RequestHandler>) -> Self {
        Self { rpc, rest }
    }

    pub async fn route(&self, req: Request<Incoming>) -> Result<Response<GatewayBody>> {
        match classify(&req) {
            Protocol::Rpc => {
                trace!("rpc: {} {}", req.method(), req.uri().path());
                self.rpc.handle(req).await
            }
            Protocol::Rest => {
                trace!("rest: {} {}", req.method(), req.uri().path());
                self.rest.handle(req).await
            }
        }
    }
}
