//! Lifecycle hooks an HTTP client invokes while executing a request.
//!
//! Every method has a no-op default so implementors only override the
//! events they care about.

use crate::error::BoxError;
use std::net::SocketAddr;
use std::sync::Arc;

/// Information about an obtained connection.
#[derive(Debug, Clone, Default)]
pub struct GotConnInfo {
    /// Whether the connection was previously used for another request.
    pub reused: bool,
    pub remote_addr: Option<SocketAddr>,
}

/// Result of writing the request headers and body.
#[derive(Debug, Default)]
pub struct WroteRequestInfo {
    pub err: Option<BoxError>,
}

/// Hook set for tracing an outbound HTTP request.
///
/// Callers must honour the multiplicity noted on each method: hooks marked
/// "called once" must not be invoked concurrently with themselves.
pub trait ClientTrace: Send + Sync {
    /// Called before a connection is created or taken from a pool. Called once.
    fn get_conn(&self, _host_port: &str) {}

    /// Called when a dial begins. May be called several times when dialing
    /// multiple addresses.
    fn connect_start(&self, _network: &str, _addr: &str) {}

    /// Called when a dial completes. May be called several times.
    fn connect_done(&self, _network: &str, _addr: &str, _err: Option<BoxError>) {}

    /// Called when the TLS handshake starts. Called once, never for plaintext.
    fn tls_handshake_start(&self) {}

    /// Called when the TLS handshake completes. Called once, never for plaintext.
    fn tls_handshake_done(&self, _err: Option<BoxError>) {}

    /// Called once a connection, new or reused, is ready. Called once.
    fn got_conn(&self, _info: GotConnInfo) {}

    /// Called after the request has been written. May be called several times
    /// for retried writes.
    fn wrote_request(&self, _info: WroteRequestInfo) {}

    /// Called when the first byte of the response headers arrives. Called once.
    fn got_first_response_byte(&self) {}
}

impl<T: ClientTrace + ?Sized> ClientTrace for Arc<T> {
    fn get_conn(&self, host_port: &str) {
        (**self).get_conn(host_port)
    }

    fn connect_start(&self, network: &str, addr: &str) {
        (**self).connect_start(network, addr)
    }

    fn connect_done(&self, network: &str, addr: &str, err: Option<BoxError>) {
        (**self).connect_done(network, addr, err)
    }

    fn tls_handshake_start(&self) {
        (**self).tls_handshake_start()
    }

    fn tls_handshake_done(&self, err: Option<BoxError>) {
        (**self).tls_handshake_done(err)
    }

    fn got_conn(&self, info: GotConnInfo) {
        (**self).got_conn(info)
    }

    fn wrote_request(&self, info: WroteRequestInfo) {
        (**self).wrote_request(info)
    }

    fn got_first_response_byte(&self) {
        (**self).got_first_response_byte()
    }
}
