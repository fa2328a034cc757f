//! The edge listener: one port, both protocols, all-or-nothing mutual TLS

use crate::body::GatewayBody;
use crate::context::GatewayContext;
use crate::tls;
use gateway_core::{EdgeTlsConfig, GatewayError, Result};
use hyper::body::Incoming;
use hyper::Request;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use hyper_util::service::TowerToHyperService;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tower::{Layer, Service};
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

/// Owns the network listener. Binds mutual TLS when the full
/// trust-material triple is configured and plaintext otherwise; there is
/// no server-TLS-only mode. The connection builder carries both HTTP/1.1
/// and HTTP/2 (including cleartext HTTP/2) on the one port, which is what
/// makes per-request protocol classification meaningful.
pub struct EdgeListener {
    addr: SocketAddr,
    tls: EdgeTlsConfig,
}

impl EdgeListener {
    pub fn new(addr: SocketAddr, tls: EdgeTlsConfig) -> Self {
        Self { addr, tls }
    }

    /// Resolve TLS material and bind the address. Invalid material or an
    /// unavailable address is fatal; there is no automatic retry.
    pub async fn bind(self) -> Result<BoundEdgeListener> {
        let acceptor = match self.tls.material()? {
            Some(material) => Some(TlsAcceptor::from(tls::server_config(&material)?)),
            None => None,
        };

        let listener = TcpListener::bind(self.addr)
            .await
            .map_err(|e| GatewayError::ListenerBind {
                address: self.addr.to_string(),
                source: e,
            })?;

        Ok(BoundEdgeListener { listener, acceptor })
    }

    /// Bind and serve until cancelled.
    pub async fn serve(self, context: Arc<GatewayContext>, cancel: CancellationToken) -> Result<()> {
        self.bind().await?.serve(context, cancel).await
    }
}

pub struct BoundEdgeListener {
    listener: TcpListener,
    acceptor: Option<TlsAcceptor>,
}

impl std::fmt::Debug for BoundEdgeListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundEdgeListener")
            .field("listener", &self.listener)
            .field("acceptor", &self.acceptor.is_some())
            .finish()
    }
}

impl BoundEdgeListener {
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn is_mutual_tls(&self) -> bool {
        self.acceptor.is_some()
    }

    /// Accept connections until the cancellation token fires, dispatching
    /// each to its own task. The routed handler is wrapped in a permissive
    /// cross-origin policy so browser-origin REST clients can call the
    /// gateway directly.
    pub async fn serve(self, context: Arc<GatewayContext>, cancel: CancellationToken) -> Result<()> {
        let addr = self.local_addr()?;
        match &self.acceptor {
            Some(_) => info!("starting TLS server on {}", addr),
            None => info!("starting plaintext server on {}", addr),
        }

        let service = CorsLayer::permissive().layer(tower::service_fn(
            move |req: Request<Incoming>| {
                let context = context.clone();
                async move { Ok::<_, Infallible>(context.handle(req).await) }
            },
        ));

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("edge listener on {} shutting down", addr);
                    return Ok(());
                }
                accepted = self.listener.accept() => {
                    let (stream, peer_addr) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            warn!("error accepting connection: {}", e);
                            continue;
                        }
                    };

                    let acceptor = self.acceptor.clone();
                    let service = service.clone();

                    tokio::task::spawn(async move {
                        match acceptor {
                            Some(acceptor) => match acceptor.accept(stream).await {
                                Ok(tls_stream) => {
                                    serve_connection(TokioIo::new(tls_stream), service, peer_addr)
                                        .await
                                }
                                Err(e) => debug!("TLS error from {}: {}", peer_addr, e),
                            },
                            None => serve_connection(TokioIo::new(stream), service, peer_addr).await,
                        }
                    });
                }
            }
        }
    }
}

async fn serve_connection<I, S>(io: I, service: S, peer_addr: SocketAddr)
where
    I: hyper::rt::Read + hyper::rt::Write + Unpin + Send + 'static,
    S: Service<Request<Incoming>, Response = hyper::Response<GatewayBody>, Error = Infallible>
        + Clone
        + Send
        + 'static,
    S::Future: Send,
{
    if let Err(e) = auto::Builder::new(TokioExecutor::new())
        .serve_connection_with_upgrades(io, TowerToHyperService::new(service))
        .await
    {
        debug!("error serving connection from {}: {}", peer_addr, e);
    }
}
