//! Trust-material loading for the edge listener and outbound channels

use gateway_core::{GatewayError, Result, TrustMaterial};
use rustls::crypto::ring;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{ClientConfig, RootCertStore, ServerConfig};
use std::fs;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Parse certificates from PEM-encoded data.
pub fn load_certificates(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>> {
    let mut reader = BufReader::new(pem);
    rustls_pemfile::certs(&mut reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| GatewayError::Configuration(format!("failed to parse certificates: {}", e)))
}

fn load_private_key(pem: &[u8]) -> Result<PrivateKeyDer<'static>> {
    let mut reader = BufReader::new(pem);
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| GatewayError::Configuration(format!("failed to parse private key: {}", e)))?
        .ok_or_else(|| GatewayError::Configuration("no private key found in PEM data".to_string()))
}

/// Build a trust-anchor pool from a PEM bundle. Fails unless the bundle
/// parses into at least one anchor.
fn load_trust_anchors(pem: &[u8]) -> Result<RootCertStore> {
    let anchors = load_certificates(pem)?;
    if anchors.is_empty() {
        return Err(GatewayError::Configuration(
            "no trust anchors found in CA bundle".to_string(),
        ));
    }

    let mut roots = RootCertStore::empty();
    for anchor in anchors {
        roots
            .add(anchor)
            .map_err(|e| GatewayError::Configuration(format!("failed to add trust anchor: {}", e)))?;
    }

    debug!("loaded {} trust anchor(s)", roots.len());
    Ok(roots)
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path)
        .map_err(|e| GatewayError::Configuration(format!("failed to read {}: {}", path.display(), e)))
}

struct LoadedMaterial {
    certs: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
    roots: RootCertStore,
}

fn read_material(material: &TrustMaterial) -> Result<LoadedMaterial> {
    let certs = load_certificates(&read_file(&material.cert_path)?)?;
    if certs.is_empty() {
        return Err(GatewayError::Configuration(format!(
            "no certificates found in {}",
            material.cert_path.display()
        )));
    }
    let key = load_private_key(&read_file(&material.key_path)?)?;
    let roots = load_trust_anchors(&read_file(&material.ca_path)?)?;

    Ok(LoadedMaterial { certs, key, roots })
}

/// Server configuration for the mutual-TLS edge listener: presents the
/// server certificate and requires-and-verifies a client certificate
/// against the trust-anchor bundle.
pub fn server_config(material: &TrustMaterial) -> Result<Arc<ServerConfig>> {
    let loaded = read_material(material)?;

    let verifier = WebPkiClientVerifier::builder_with_provider(
        Arc::new(loaded.roots),
        Arc::new(ring::default_provider()),
    )
    .build()
    .map_err(|e| GatewayError::Configuration(format!("failed to build client verifier: {}", e)))?;

    let mut config = ServerConfig::builder_with_provider(Arc::new(ring::default_provider()))
        .with_safe_default_protocol_versions()
        .map_err(|e| GatewayError::Configuration(format!("unsupported protocol versions: {}", e)))?
        .with_client_cert_verifier(verifier)
        .with_single_cert(loaded.certs, loaded.key)
        .map_err(|e| GatewayError::Configuration(format!("invalid server certificate: {}", e)))?;

    // one port carries both framed binary-RPC streams and HTTP/1.1
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(Arc::new(config))
}

/// Client configuration for a mutually authenticated outbound channel.
pub fn client_config(material: &TrustMaterial) -> Result<Arc<ClientConfig>> {
    let loaded = read_material(material)?;

    let mut config = ClientConfig::builder_with_provider(Arc::new(ring::default_provider()))
        .with_safe_default_protocol_versions()
        .map_err(|e| GatewayError::Configuration(format!("unsupported protocol versions: {}", e)))?
        .with_root_certificates(loaded.roots)
        .with_client_auth_cert(loaded.certs, loaded.key)
        .map_err(|e| GatewayError::Configuration(format!("invalid client certificate: {}", e)))?;

    config.alpn_protocols = vec![b"h2".to_vec()];

    Ok(Arc::new(config))
}
