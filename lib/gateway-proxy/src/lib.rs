//! Protocol-multiplexing edge layer
//!
//! This library provides:
//! - Secure, load-balance-aware channels to backend services
//! - The per-request protocol router serving binary-RPC and REST/JSON
//!   traffic on one listener
//! - Aggregated health reporting over both protocol surfaces
//! - The edge listener with all-or-nothing mutual-TLS termination

pub mod assets;
pub mod binding;
pub mod body;
pub mod channel;
pub mod context;
pub mod grpc;
pub mod health;
pub mod listener;
pub mod router;
pub mod tls;

pub use assets::AssetCatalog;
pub use binding::{RequestHandler, RpcServer, ServiceBinding};
pub use body::GatewayBody;
pub use channel::Channel;
pub use context::GatewayContext;
pub use health::{HealthAggregator, HealthBinding, HealthCheck};
pub use listener::EdgeListener;
pub use router::{classify, Protocol, ProtocolRouter};
