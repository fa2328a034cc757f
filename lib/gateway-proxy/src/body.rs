//! Response body type shared by every gateway handler

use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::HeaderMap;
use std::pin::Pin;
use std::task::{Context, Poll};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// One body type for everything the gateway produces or forwards: buffered
/// payloads, unary binary-RPC responses (a data frame followed by status
/// trailers), and streamed upstream bodies passed through unmodified.
///
/// Implements `Default` (an empty body) so the cross-origin middleware can
/// construct preflight responses.
pub enum GatewayBody {
    Full(Full<Bytes>),
    Grpc {
        data: Option<Bytes>,
        trailers: Option<HeaderMap>,
    },
    Incoming(Incoming),
}

impl GatewayBody {
    pub fn empty() -> Self {
        GatewayBody::Full(Full::new(Bytes::new()))
    }

    pub fn full(data: impl Into<Bytes>) -> Self {
        GatewayBody::Full(Full::new(data.into()))
    }

    /// A unary binary-RPC response body: one framed message, then trailers.
    pub fn grpc(message: Bytes, trailers: HeaderMap) -> Self {
        GatewayBody::Grpc {
            data: Some(message),
            trailers: Some(trailers),
        }
    }

    /// A trailers-only binary-RPC body (status without a message).
    pub fn grpc_trailers(trailers: HeaderMap) -> Self {
        GatewayBody::Grpc {
            data: None,
            trailers: Some(trailers),
        }
    }

    /// Pass an inbound or upstream body through without materializing it.
    pub fn incoming(body: Incoming) -> Self {
        GatewayBody::Incoming(body)
    }
}

impl Default for GatewayBody {
    fn default() -> Self {
        Self::empty()
    }
}

impl Body for GatewayBody {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, Self::Error>>> {
        match self.get_mut() {
            GatewayBody::Full(inner) => Pin::new(inner)
                .poll_frame(cx)
                .map(|frame| frame.map(|result| result.map_err(|never| match never {}))),
            GatewayBody::Grpc { data, trailers } => {
                if let Some(message) = data.take() {
                    return Poll::Ready(Some(Ok(Frame::data(message))));
                }
                match trailers.take() {
                    Some(trailers) => Poll::Ready(Some(Ok(Frame::trailers(trailers)))),
                    None => Poll::Ready(None),
                }
            }
            GatewayBody::Incoming(inner) => Pin::new(inner)
                .poll_frame(cx)
                .map(|frame| frame.map(|result| result.map_err(|e| Box::new(e) as BoxError))),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            GatewayBody::Full(inner) => inner.is_end_stream(),
            GatewayBody::Grpc { data, trailers } => data.is_none() && trailers.is_none(),
            GatewayBody::Incoming(inner) => inner.is_end_stream(),
        }
    }

    fn size_hint(&self) -> SizeHint {
        match self {
            GatewayBody::Full(inner) => inner.size_hint(),
            GatewayBody::Grpc { data, .. } => {
                SizeHint::with_exact(data.as_ref().map(|d| d.len() as u64).unwrap_or(0))
            }
            GatewayBody::Incoming(inner) => inner.size_hint(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use hyper::header::HeaderValue;

    #[tokio::test]
    async fn test_full_body_collects() {
        let body = GatewayBody::full("hello");
        let collected = body.collect().await.unwrap();
        assert_eq!(collected.to_bytes(), Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn test_empty_body_is_default() {
        let collected = GatewayBody::default().collect().await.unwrap();
        assert!(collected.to_bytes().is_empty());
    }

    #[tokio::test]
    async fn test_grpc_body_yields_data_then_trailers() {
        let mut trailers = HeaderMap::new();
        trailers.insert("grpc-status", HeaderValue::from_static("0"));

        let body = GatewayBody::grpc(Bytes::from_static(b"\x00\x00\x00\x00\x00"), trailers);
        assert!(!body.is_end_stream());

        let collected = body.collect().await.unwrap();
        let trailers = collected.trailers().cloned().expect("trailers present");
        assert_eq!(trailers.get("grpc-status").unwrap(), "0");
        assert_eq!(collected.to_bytes().len(), 5);
    }

    #[tokio::test]
    async fn test_trailers_only_body() {
        let mut trailers = HeaderMap::new();
        trailers.insert("grpc-status", HeaderValue::from_static("12"));

        let collected = GatewayBody::grpc_trailers(trailers).collect().await.unwrap();
        assert_eq!(
            collected.trailers().unwrap().get("grpc-status").unwrap(),
            "12"
        );
        assert!(collected.to_bytes().is_empty());
    }
}
