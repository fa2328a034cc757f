use anyhow::Result;
use clap::Parser;
use gateway_core::{ChannelConfig, EdgeTlsConfig};
use gateway_proxy::{
    AssetCatalog, Channel, EdgeListener, GatewayContext, HealthAggregator, HealthBinding,
    ProtocolRouter, RpcServer,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod checks;
mod proxy;
mod rest;

use checks::ReachabilityCheck;
use proxy::ProxyBinding;
use rest::RestForwarder;

/// An HTTP/gRPC proxy to backend services.
#[derive(Parser, Debug)]
#[command(name = "gateway", about = "an HTTP/gRPC proxy to backend services")]
struct Flags {
    /// The port to run on.
    #[arg(long, env = "HTTP_PORT", default_value_t = 8080)]
    port: u16,

    /// Address to the extractor service.
    #[arg(long, env = "EXTRACTOR_ADDRESS", default_value = "extractor:8090")]
    extractor_address: String,

    /// Certificate used to enable TLS for the extractor.
    #[arg(long, env = "EXTRACTOR_CERT_PATH")]
    extractor_cert: Option<PathBuf>,

    /// Key used to enable TLS for the extractor.
    #[arg(long, env = "EXTRACTOR_KEY_PATH")]
    extractor_key: Option<PathBuf>,

    /// CA used to enable TLS for the extractor.
    #[arg(long, env = "EXTRACTOR_CA_PATH")]
    extractor_ca: Option<PathBuf>,

    /// The load balancer policy to use for the extractor.
    #[arg(long, env = "EXTRACTOR_LBPOLICY", default_value = "round_robin")]
    extractor_lb: String,

    /// Address to the tracker service.
    #[arg(long, env = "TRACKER_ADDRESS", default_value = "tracker:8090")]
    tracker_address: String,

    /// Certificate used to enable TLS for the tracker.
    #[arg(long, env = "TRACKER_CERT_PATH")]
    tracker_cert: Option<PathBuf>,

    /// Key used to enable TLS for the tracker.
    #[arg(long, env = "TRACKER_KEY_PATH")]
    tracker_key: Option<PathBuf>,

    /// CA used to enable TLS for the tracker.
    #[arg(long, env = "TRACKER_CA_PATH")]
    tracker_ca: Option<PathBuf>,

    /// The load balancer policy to use for the tracker.
    #[arg(long, env = "TRACKER_LBPOLICY", default_value = "round_robin")]
    tracker_lb: String,

    /// Path to the file containing the TLS certificate.
    #[arg(long, env = "TLS_CERT_PATH")]
    tls_cert: Option<PathBuf>,

    /// Path to the file containing the TLS private key.
    #[arg(long, env = "TLS_KEY_PATH")]
    tls_key: Option<PathBuf>,

    /// Path to the file containing the TLS certificate authority.
    #[arg(long, env = "TLS_CA_PATH")]
    tls_ca: Option<PathBuf>,
}

impl Flags {
    fn tracker_config(&self) -> ChannelConfig {
        let mut config = ChannelConfig::new(self.tracker_address.as_str())
            .with_lb_policy(self.tracker_lb.as_str());
        config.cert_path = self.tracker_cert.clone();
        config.key_path = self.tracker_key.clone();
        config.ca_path = self.tracker_ca.clone();
        config
    }

    fn extractor_config(&self) -> ChannelConfig {
        let mut config = ChannelConfig::new(self.extractor_address.as_str())
            .with_lb_policy(self.extractor_lb.as_str());
        config.cert_path = self.extractor_cert.clone();
        config.key_path = self.extractor_key.clone();
        config.ca_path = self.extractor_ca.clone();
        config
    }

    fn edge_tls(&self) -> EdgeTlsConfig {
        EdgeTlsConfig {
            cert_path: self.tls_cert.clone(),
            key_path: self.tls_key.clone(),
            ca_path: self.tls_ca.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let flags = Flags::parse();
    let cancel = CancellationToken::new();

    let tracker = Arc::new(Channel::open(&flags.tracker_config()).await?);
    let extractor = Arc::new(Channel::open(&flags.extractor_config()).await?);

    let health = Arc::new(
        HealthAggregator::new()
            .register(ReachabilityCheck::new("extractor", extractor.target()))
            .register(ReachabilityCheck::new("tracker/sources", tracker.target()))
            .register(ReachabilityCheck::new("tracker/modules", tracker.target())),
    );

    let rpc = RpcServer::new()
        .register(Arc::new(ProxyBinding::new(
            "tracker.SourceService",
            tracker.clone(),
        )))
        .register(Arc::new(ProxyBinding::new(
            "tracker.ModuleService",
            tracker.clone(),
        )))
        .register(Arc::new(ProxyBinding::new(
            "tracker.DependencyService",
            tracker.clone(),
        )))
        .register(Arc::new(ProxyBinding::new(
            "tracker.SearchService",
            tracker.clone(),
        )))
        .register(Arc::new(ProxyBinding::new(
            "extractor.DependencyExtractor",
            extractor.clone(),
        )))
        .register(Arc::new(HealthBinding::new(health.clone(), cancel.clone())));

    let rest = RestForwarder::new(tracker.clone());

    let assets = AssetCatalog::new()
        .insert(
            "extractor.swagger.json",
            &include_bytes!("../assets/extractor.swagger.json")[..],
        )
        .insert(
            "tracker.swagger.json",
            &include_bytes!("../assets/tracker.swagger.json")[..],
        );

    let context = Arc::new(GatewayContext::new(
        ProtocolRouter::new(Arc::new(rpc), Arc::new(rest)),
        health,
        assets,
        cancel.clone(),
    ));

    let shutdown = cancel.clone();
    tokio::task::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            shutdown.cancel();
        }
    });

    let addr: SocketAddr = ([0, 0, 0, 0], flags.port).into();
    EdgeListener::new(addr, flags.edge_tls())
        .serve(context, cancel)
        .await?;

    // tracker and extractor drop here, closing each backend connection
    // exactly once regardless of which shutdown path ran
    Ok(())
}
