//! Outbound channels to backend services

use crate::body::GatewayBody;
use crate::tls;
use gateway_core::{ChannelConfig, GatewayError, Result, ServiceConfig};
use hyper::body::Incoming;
use hyper::{Request, Response, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioIo};
use rustls::pki_types::ServerName;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, info};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// A live connection to one backend service, created once at startup and
/// shared read-only across request-handling workers. Closed exactly once,
/// when the owning process drops it on shutdown.
///
/// The channel carries the service-configuration document naming the
/// load-balancing policy and enabling passive health-check connection
/// scoring, so the transport can route around failed connections.
pub struct Channel {
    target: String,
    host: String,
    port: u16,
    service_config: String,
    tls: Option<TlsConnector>,
    server_name: Option<ServerName<'static>>,
    client: Client<HttpConnector, GatewayBody>,
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("target", &self.target)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("service_config", &self.service_config)
            .field("tls", &self.tls.is_some())
            .field("server_name", &self.server_name)
            .finish()
    }
}

impl Channel {
    /// Establish a channel to `config.target`, blocking until the initial
    /// connection attempt resolves or fails.
    ///
    /// All three trust-material paths present yields a mutually
    /// authenticated channel; all three absent yields a plaintext channel
    /// (a deliberate mode for trusted networks, not a fallback). Partial
    /// material or unusable trust anchors fail with a configuration error
    /// rather than silently downgrading, and an unreachable target aborts
    /// startup with a connectivity error.
    pub async fn open(config: &ChannelConfig) -> Result<Self> {
        let service_config = ServiceConfig::for_policy(&config.lb_policy).to_json()?;
        let (host, port) = split_target(&config.target)?;

        let tls = match config.trust_material()? {
            Some(material) => Some(TlsConnector::from(tls::client_config(&material)?)),
            None => None,
        };

        let server_name = match &tls {
            Some(_) => Some(ServerName::try_from(host.clone()).map_err(|_| {
                GatewayError::Configuration(format!("invalid server name: {}", host))
            })?),
            None => None,
        };

        probe(&config.target, &host, port, &tls, &server_name).await?;

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(CONNECT_TIMEOUT));
        connector.set_keepalive(Some(KEEPALIVE_INTERVAL));

        let client = Client::builder(TokioExecutor::new())
            .http2_only(true)
            .build(connector);

        info!(
            "channel to {} established (policy: {}, mutual tls: {})",
            config.target,
            config.lb_policy,
            tls.is_some()
        );

        Ok(Self {
            target: config.target.clone(),
            host,
            port,
            service_config,
            tls,
            server_name,
            client,
        })
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// The rendered service-configuration document applied to this channel.
    pub fn service_config_json(&self) -> &str {
        &self.service_config
    }

    pub fn is_secure(&self) -> bool {
        self.tls.is_some()
    }

    /// Forward a request over this channel. The path, headers, and body
    /// pass through unmodified; only scheme and authority are rewritten to
    /// the channel target.
    pub async fn request(&self, req: Request<GatewayBody>) -> anyhow::Result<Response<Incoming>> {
        let req = self.rewrite_uri(req)?;

        match (&self.tls, &self.server_name) {
            (Some(connector), Some(server_name)) => {
                let stream = TcpStream::connect((self.host.as_str(), self.port)).await?;
                let stream = connector.connect(server_name.clone(), stream).await?;

                let (mut sender, connection) =
                    hyper::client::conn::http2::handshake(TokioExecutor::new(), TokioIo::new(stream))
                        .await?;

                let target = self.target.clone();
                tokio::task::spawn(async move {
                    if let Err(e) = connection.await {
                        debug!("connection to {} closed: {}", target, e);
                    }
                });

                Ok(sender.send_request(req).await?)
            }
            _ => Ok(self.client.request(req).await?),
        }
    }

    fn rewrite_uri(&self, req: Request<GatewayBody>) -> anyhow::Result<Request<GatewayBody>> {
        let (mut parts, body) = req.into_parts();

        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/")
            .to_string();

        parts.uri = Uri::builder()
            .scheme(if self.tls.is_some() { "https" } else { "http" })
            .authority(self.target.as_str())
            .path_and_query(path_and_query)
            .build()?;

        Ok(Request::from_parts(parts, body))
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        debug!("closing channel to {}", self.target);
    }
}

/// One blocking connection attempt, including the TLS handshake for
/// authenticated channels. Failure is fatal to startup; this layer never
/// retries.
async fn probe(
    target: &str,
    host: &str,
    port: u16,
    tls: &Option<TlsConnector>,
    server_name: &Option<ServerName<'static>>,
) -> Result<()> {
    let connectivity = |source: std::io::Error| GatewayError::Connectivity {
        target: target.to_string(),
        source,
    };

    let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect((host, port)))
        .await
        .map_err(|_| {
            connectivity(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "connection attempt timed out",
            ))
        })?
        .map_err(|e| connectivity(e))?;

    if let (Some(connector), Some(server_name)) = (tls, server_name) {
        connector
            .connect(server_name.clone(), stream)
            .await
            .map_err(|e| connectivity(e))?;
    }

    debug!("probe of {} succeeded", target);
    Ok(())
}

fn split_target(target: &str) -> Result<(String, u16)> {
    let (host, port) = target
        .rsplit_once(':')
        .ok_or_else(|| GatewayError::Configuration(format!("invalid target address: {}", target)))?;

    let port = port
        .parse()
        .map_err(|_| GatewayError::Configuration(format!("invalid target port: {}", target)))?;

    Ok((host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tokio::net::TcpListener;

    fn testdata(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("testdata")
            .join(name)
    }

    #[test]
    fn test_split_target() {
        assert_eq!(
            split_target("tracker:8090").unwrap(),
            ("tracker".to_string(), 8090)
        );
        assert!(split_target("tracker").is_err());
        assert!(split_target("tracker:http").is_err());
    }

    #[tokio::test]
    async fn test_open_plaintext_channel() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let target = format!("127.0.0.1:{}", listener.local_addr().unwrap().port());

        let channel = Channel::open(&ChannelConfig::new(target.as_str()))
            .await
            .unwrap();
        assert!(!channel.is_secure());
        assert_eq!(channel.target(), target);
        assert!(channel
            .service_config_json()
            .contains("\"loadBalancingPolicy\":\"round_robin\""));
    }

    #[tokio::test]
    async fn test_policy_name_flows_into_service_config() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let target = format!("127.0.0.1:{}", listener.local_addr().unwrap().port());

        let config = ChannelConfig::new(target.as_str()).with_lb_policy("least_request");
        let channel = Channel::open(&config).await.unwrap();
        assert!(channel
            .service_config_json()
            .contains("\"loadBalancingPolicy\":\"least_request\""));
    }

    #[tokio::test]
    async fn test_open_fails_on_unreachable_target() {
        // port 1 is essentially never listening
        let err = Channel::open(&ChannelConfig::new("127.0.0.1:1"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Connectivity { .. }));
    }

    #[tokio::test]
    async fn test_partial_trust_material_fails_before_connecting() {
        let mut config = ChannelConfig::new("127.0.0.1:1");
        config.cert_path = Some(testdata("client.pem"));

        let err = Channel::open(&config).await.unwrap_err();
        assert!(matches!(err, GatewayError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_open_mutual_tls_channel() {
        let server_config = crate::tls::server_config(&gateway_core::TrustMaterial {
            cert_path: testdata("server.pem"),
            key_path: testdata("server-key.pem"),
            ca_path: testdata("ca.pem"),
        })
        .unwrap();
        let acceptor = tokio_rustls::TlsAcceptor::from(server_config);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let target = format!("localhost:{}", listener.local_addr().unwrap().port());

        tokio::task::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let _ = acceptor.accept(stream).await;
            }
        });

        let config = ChannelConfig::new(target.as_str()).with_trust_material(
            testdata("client.pem"),
            testdata("client-key.pem"),
            testdata("ca.pem"),
        );

        let channel = Channel::open(&config).await.unwrap();
        assert!(channel.is_secure());
    }
}
