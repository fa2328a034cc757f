//! Binary-RPC wire helpers
//!
//! Covers only what the edge needs: recognizing binary-RPC traffic,
//! length-prefixed message framing, and status trailers. Message contents
//! stay opaque to the gateway.

use crate::body::GatewayBody;
use bytes::{BufMut, Bytes, BytesMut};
use hyper::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};

/// Content-type prefix reserved for binary-RPC traffic.
pub const CONTENT_TYPE_GRPC: &str = "application/grpc";

pub const HEADER_GRPC_STATUS: &str = "grpc-status";
pub const HEADER_GRPC_MESSAGE: &str = "grpc-message";

/// Status codes the gateway itself emits.
pub mod code {
    pub const OK: u32 = 0;
    pub const UNIMPLEMENTED: u32 = 12;
    pub const INTERNAL: u32 = 13;
    pub const UNAVAILABLE: u32 = 14;
}

/// Frame a message for the wire: a compression flag byte followed by a
/// four-byte big-endian length and the message itself.
pub fn encode_frame(message: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(5 + message.len());
    buf.put_u8(0);
    buf.put_u32(message.len() as u32);
    buf.put_slice(message);
    buf.freeze()
}

/// Strip the length prefix from a complete frame, returning the message.
/// Returns None for truncated or compressed frames.
pub fn decode_frame(frame: &[u8]) -> Option<&[u8]> {
    if frame.len() < 5 || frame[0] != 0 {
        return None;
    }
    let len = u32::from_be_bytes([frame[1], frame[2], frame[3], frame[4]]) as usize;
    frame.get(5..5 + len)
}

/// A successful unary response: one framed message, OK status in the
/// trailers.
pub fn unary_response(message: &[u8]) -> Response<GatewayBody> {
    let mut trailers = HeaderMap::new();
    trailers.insert(HEADER_GRPC_STATUS, HeaderValue::from_static("0"));

    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, CONTENT_TYPE_GRPC)
        .body(GatewayBody::grpc(encode_frame(message), trailers))
        .unwrap()
}

/// A trailers-only response carrying a non-OK status, e.g. UNIMPLEMENTED
/// for a service with no binding. The status travels in the response
/// headers, as the wire convention allows when there is no message.
pub fn status_response(status: u32, message: &str) -> Response<GatewayBody> {
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, CONTENT_TYPE_GRPC)
        .header(HEADER_GRPC_STATUS, status.to_string());

    if !message.is_empty() {
        if let Ok(value) = HeaderValue::from_str(message) {
            builder = builder.header(HEADER_GRPC_MESSAGE, value);
        }
    }

    builder.body(GatewayBody::empty()).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_frame_layout() {
        let frame = encode_frame(b"abc");
        assert_eq!(&frame[..], &[0, 0, 0, 0, 3, b'a', b'b', b'c']);
    }

    #[test]
    fn test_decode_frame_round_trip() {
        let frame = encode_frame(b"payload");
        assert_eq!(decode_frame(&frame), Some(&b"payload"[..]));
    }

    #[test]
    fn test_decode_frame_rejects_truncated() {
        assert_eq!(decode_frame(&[0, 0, 0]), None);
        assert_eq!(decode_frame(&[0, 0, 0, 0, 9, 1, 2]), None);
    }

    #[test]
    fn test_decode_frame_rejects_compressed() {
        let mut frame = encode_frame(b"abc").to_vec();
        frame[0] = 1;
        assert_eq!(decode_frame(&frame), None);
    }

    #[test]
    fn test_unary_response_shape() {
        let response = unary_response(b"\x08\x01");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            CONTENT_TYPE_GRPC
        );
    }

    #[test]
    fn test_status_response_carries_status_in_headers() {
        let response = status_response(code::UNIMPLEMENTED, "unknown service");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(HEADER_GRPC_STATUS).unwrap(), "12");
        assert_eq!(
            response.headers().get(HEADER_GRPC_MESSAGE).unwrap(),
            "unknown service"
        );
    }
}
