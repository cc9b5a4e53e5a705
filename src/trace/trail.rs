//! The per-request latency breakdown produced by [`Tracer::done`](super::Tracer::done).

use std::fmt;
use std::net::SocketAddr;
use std::time::{Duration, SystemTime};

/// Detailed timing information about a single HTTP request.
///
/// `duration` covers sending, waiting and receiving only. Time spent
/// acquiring a connection, dialing and handshaking is reported in its own
/// fields and is not part of the total.
#[derive(Debug, Clone, PartialEq)]
pub struct Trail {
    /// `end_time - duration`.
    pub start_time: SystemTime,
    /// When the trail was computed.
    pub end_time: SystemTime,

    /// `sending + waiting + receiving`.
    pub duration: Duration,

    /// Waiting to acquire a connection.
    pub blocked: Duration,
    /// Dialing the remote host.
    pub connecting: Duration,
    /// Executing the TLS handshake.
    pub tls_handshaking: Duration,
    /// Writing the request.
    pub sending: Duration,
    /// Waiting for the first response byte.
    pub waiting: Duration,
    /// Receiving the response.
    pub receiving: Duration,

    pub connection_reused: bool,
    pub remote_addr: Option<SocketAddr>,
}

impl fmt::Display for Trail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "duration={:?} blocked={:?} connecting={:?} tls={:?} sending={:?} waiting={:?} receiving={:?} reused={}",
            self.duration,
            self.blocked,
            self.connecting,
            self.tls_handshaking,
            self.sending,
            self.waiting,
            self.receiving,
            self.connection_reused,
        )?;
        if let Some(addr) = self.remote_addr {
            write!(f, " remote={}", addr)?;
        }
        Ok(())
    }
}
