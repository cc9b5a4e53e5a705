//! TLS/SSL infrastructure.
//!
//! Provides a trait-based abstraction for TLS client configuration.

use std::sync::Arc;
use tokio_rustls::TlsConnector;

/// Trait for TLS configuration providers.
///
/// This abstraction allows for different TLS configurations
/// and makes testing easier by allowing mock implementations.
pub trait TlsProvider: Send + Sync {
    /// Creates a new TLS client configuration.
    fn client_config(&self) -> Arc<rustls::ClientConfig>;

    /// Creates a TLS connector from this provider's configuration.
    fn connector(&self) -> TlsConnector {
        TlsConnector::from(self.client_config())
    }
}

/// Default TLS provider using rustls with Mozilla's root certificates.
#[derive(Default, Clone, Copy)]
pub struct RustlsTlsProvider;

impl RustlsTlsProvider {
    pub fn new() -> Self {
        Self
    }
}

impl TlsProvider for RustlsTlsProvider {
    fn client_config(&self) -> Arc<rustls::ClientConfig> {
        create_tls_config()
    }
}

/// Creates a TLS client configuration with Mozilla's root certificates.
///
/// Only HTTP/1.1 is advertised over ALPN since the executor speaks HTTP/1.1.
pub fn create_tls_config() -> Arc<rustls::ClientConfig> {
    let root_store =
        rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let mut config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Arc::new(config)
}
