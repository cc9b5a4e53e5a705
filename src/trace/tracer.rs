//! Event recorder for a single HTTP request attempt.
//!
//! A [`Tracer`] receives the lifecycle hooks of one request and, once the
//! request is finished, turns the recorded timestamps into a [`Trail`] via
//! [`Tracer::done`]. Tracers must not be reused between requests.

use super::clock::{AtomicTimestamp, Clock, SystemClock, Timestamp};
use super::hooks::{ClientTrace, GotConnInfo, WroteRequestInfo};
use super::trail::Trail;
use crate::error::{BoxError, ProtoError};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Collects granular timings for one HTTP request.
///
/// Hooks that may fire more than once (`connect_start`, `connect_done`,
/// `wrote_request`) keep the first timestamp. The remaining hooks are
/// single-call by contract and simply overwrite.
#[derive(Debug)]
pub struct Tracer<C: Clock = SystemClock> {
    clock: C,

    get_conn: AtomicTimestamp,
    connect_start: AtomicTimestamp,
    connect_done: AtomicTimestamp,
    tls_handshake_start: AtomicTimestamp,
    tls_handshake_done: AtomicTimestamp,
    got_conn: AtomicTimestamp,
    wrote_request: AtomicTimestamp,
    got_first_response_byte: AtomicTimestamp,

    conn_reused: AtomicBool,
    conn_remote_addr: Mutex<Option<SocketAddr>>,

    proto_errors: Mutex<Vec<ProtoError>>,
}

impl Tracer<SystemClock> {
    /// Creates a tracer reading the wall clock.
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for Tracer<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> Tracer<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            clock,
            get_conn: AtomicTimestamp::new(),
            connect_start: AtomicTimestamp::new(),
            connect_done: AtomicTimestamp::new(),
            tls_handshake_start: AtomicTimestamp::new(),
            tls_handshake_done: AtomicTimestamp::new(),
            got_conn: AtomicTimestamp::new(),
            wrote_request: AtomicTimestamp::new(),
            got_first_response_byte: AtomicTimestamp::new(),
            conn_reused: AtomicBool::new(false),
            conn_remote_addr: Mutex::new(None),
            proto_errors: Mutex::new(Vec::new()),
        }
    }

    fn add_error(&self, err: ProtoError) {
        tracing::trace!(error = %err, "recorded transport error");
        self.proto_errors.lock().push(err);
    }

    /// Number of transport errors recorded so far.
    pub fn errors_len(&self) -> usize {
        self.proto_errors.lock().len()
    }

    /// Removes and returns the recorded transport errors, oldest first.
    pub fn take_errors(&self) -> Vec<ProtoError> {
        std::mem::take(&mut *self.proto_errors.lock())
    }

    /// Computes the trail and should be called once the request is finished.
    ///
    /// Phases whose events were not observed are zero. Never fails.
    pub fn done(&self) -> Trail {
        let done = self.clock.now();

        let get_conn = self.get_conn.load();
        let got_conn = self.got_conn.load();
        let connect_start = self.connect_start.load();
        let connect_done = self.connect_done.load();
        let tls_start = self.tls_handshake_start.load();
        let tls_done = self.tls_handshake_done.load();
        let wrote_request = self.wrote_request.load();
        let first_byte = self.got_first_response_byte.load();

        let mut sending = Duration::ZERO;
        let mut waiting = Duration::ZERO;
        if let Some(wrote) = wrote_request {
            // Over TLS the write clock starts when the handshake ends.
            sending = since(tls_done.or(connect_done), Some(wrote));
            waiting = since(Some(wrote), first_byte);
        }
        let receiving = since(first_byte, Some(done));

        let duration = sending + waiting + receiving;
        let end_time = done.to_system_time();
        let start_time = end_time.checked_sub(duration).unwrap_or(end_time);

        Trail {
            start_time,
            end_time,
            duration,
            blocked: since(get_conn, got_conn),
            connecting: since(connect_start, connect_done),
            tls_handshaking: since(tls_start, tls_done),
            sending,
            waiting,
            receiving,
            connection_reused: self.conn_reused.load(Ordering::Acquire),
            remote_addr: *self.conn_remote_addr.lock(),
        }
    }
}

/// Span between two optional timestamps; zero unless both are set.
fn since(start: Option<Timestamp>, end: Option<Timestamp>) -> Duration {
    match (start, end) {
        (Some(s), Some(e)) => e.saturating_duration_since(s),
        _ => Duration::ZERO,
    }
}

impl<C: Clock> ClientTrace for Tracer<C> {
    fn get_conn(&self, _host_port: &str) {
        self.get_conn.store(self.clock.now());
    }

    fn connect_start(&self, _network: &str, addr: &str) {
        // Multi-address dialing can report several starts; keep the first.
        if !self.connect_start.set_once(self.clock.now()) {
            tracing::trace!(addr, "connect_start already recorded");
        }
    }

    fn connect_done(&self, network: &str, addr: &str, err: Option<BoxError>) {
        if !self.connect_done.set_once(self.clock.now()) {
            tracing::trace!(addr, "connect_done already recorded");
        }

        if let Some(source) = err {
            self.add_error(ProtoError::Connect {
                network: network.to_string(),
                addr: addr.to_string(),
                source,
            });
        }
    }

    fn tls_handshake_start(&self) {
        self.tls_handshake_start.store(self.clock.now());
    }

    fn tls_handshake_done(&self, err: Option<BoxError>) {
        self.tls_handshake_done.store(self.clock.now());

        if let Some(source) = err {
            self.add_error(ProtoError::TlsHandshake(source));
        }
    }

    fn got_conn(&self, info: GotConnInfo) {
        let now = self.clock.now();

        self.got_conn.store(now);
        self.conn_reused.store(info.reused, Ordering::Release);
        *self.conn_remote_addr.lock() = info.remote_addr;

        // A reused connection never dials, so collapse connecting to zero.
        if info.reused {
            self.connect_start.set_once(now);
            self.connect_done.set_once(now);
        }
    }

    fn wrote_request(&self, info: WroteRequestInfo) {
        self.wrote_request.set_once(self.clock.now());

        if let Some(source) = info.err {
            self.add_error(ProtoError::WriteRequest(source));
        }
    }

    fn got_first_response_byte(&self) {
        self.got_first_response_byte.store(self.clock.now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::clock::ManualClock;
    use std::io;
    use std::thread;

    const T0: u64 = 1_700_000_000_000_000_000;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn clock_at_t0() -> ManualClock {
        ManualClock::new(Timestamp::from_nanos(T0).unwrap())
    }

    fn at(clock: &ManualClock, offset: Duration) {
        clock.set(Timestamp::from_nanos(T0).unwrap());
        clock.advance(offset);
    }

    fn refused() -> BoxError {
        Box::new(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
    }

    fn assert_consistent(trail: &Trail) {
        assert_eq!(trail.duration, trail.sending + trail.waiting + trail.receiving);
        assert_eq!(trail.end_time.duration_since(trail.start_time).unwrap(), trail.duration);
    }

    #[test]
    fn test_plaintext_fresh_connection() {
        let clock = clock_at_t0();
        let tracer = Tracer::with_clock(&clock);
        let remote: SocketAddr = "10.0.0.1:80".parse().unwrap();

        tracer.get_conn("example.com:80");
        tracer.connect_start("tcp", "10.0.0.1:80");
        at(&clock, ms(10));
        tracer.connect_done("tcp", "10.0.0.1:80", None);
        tracer.got_conn(GotConnInfo {
            remote_addr: Some(remote),
            ..Default::default()
        });
        at(&clock, ms(11));
        tracer.wrote_request(WroteRequestInfo::default());
        at(&clock, ms(50));
        tracer.got_first_response_byte();
        at(&clock, ms(60));

        let trail = tracer.done();
        assert_eq!(trail.blocked, ms(10));
        assert_eq!(trail.connecting, ms(10));
        assert_eq!(trail.tls_handshaking, Duration::ZERO);
        assert_eq!(trail.sending, ms(1));
        assert_eq!(trail.waiting, ms(39));
        assert_eq!(trail.receiving, ms(10));
        assert_eq!(trail.duration, ms(50));
        assert!(!trail.connection_reused);
        assert_eq!(trail.remote_addr, Some(remote));
        assert_consistent(&trail);
        assert_eq!(tracer.errors_len(), 0);
    }

    #[test]
    fn test_tls_fresh_connection_sends_from_handshake_end() {
        let clock = clock_at_t0();
        let tracer = Tracer::with_clock(&clock);

        tracer.get_conn("example.com:443");
        tracer.connect_start("tcp", "10.0.0.1:443");
        at(&clock, ms(10));
        tracer.connect_done("tcp", "10.0.0.1:443", None);
        tracer.tls_handshake_start();
        at(&clock, ms(25));
        tracer.tls_handshake_done(None);
        tracer.got_conn(GotConnInfo::default());
        at(&clock, ms(26));
        tracer.wrote_request(WroteRequestInfo::default());
        at(&clock, ms(50));
        tracer.got_first_response_byte();
        at(&clock, ms(60));

        let trail = tracer.done();
        assert_eq!(trail.connecting, ms(10));
        assert_eq!(trail.tls_handshaking, ms(15));
        assert_eq!(trail.blocked, ms(25));
        assert_eq!(trail.sending, ms(1));
        assert_eq!(trail.waiting, ms(24));
        assert_eq!(trail.receiving, ms(10));
        assert_eq!(trail.duration, ms(35));
        assert_consistent(&trail);
    }

    #[test]
    fn test_reused_connection_has_no_connecting_time() {
        let clock = clock_at_t0();
        let tracer = Tracer::with_clock(&clock);

        tracer.get_conn("example.com:80");
        tracer.got_conn(GotConnInfo {
            reused: true,
            ..Default::default()
        });
        at(&clock, ms(2));
        tracer.wrote_request(WroteRequestInfo::default());
        at(&clock, ms(20));
        tracer.got_first_response_byte();
        at(&clock, ms(21));

        let trail = tracer.done();
        assert!(trail.connection_reused);
        assert_eq!(trail.blocked, Duration::ZERO);
        assert_eq!(trail.connecting, Duration::ZERO);
        assert_eq!(trail.tls_handshaking, Duration::ZERO);
        // The synthesized connect-done anchors the send phase.
        assert_eq!(trail.sending, ms(2));
        assert_eq!(trail.duration, ms(21));
        assert_consistent(&trail);
    }

    #[test]
    fn test_reuse_keeps_existing_connect_timestamps() {
        let clock = clock_at_t0();
        let tracer = Tracer::with_clock(&clock);

        tracer.connect_start("tcp", "10.0.0.1:80");
        at(&clock, ms(4));
        tracer.connect_done("tcp", "10.0.0.1:80", None);
        at(&clock, ms(9));
        tracer.got_conn(GotConnInfo {
            reused: true,
            ..Default::default()
        });

        assert_eq!(tracer.done().connecting, ms(4));
    }

    #[test]
    fn test_request_fails_before_write() {
        let clock = clock_at_t0();
        let tracer = Tracer::with_clock(&clock);

        tracer.get_conn("example.com:80");
        tracer.connect_done("tcp", "10.0.0.1:80", Some(refused()));
        tracer.got_conn(GotConnInfo::default());
        at(&clock, ms(30));

        let trail = tracer.done();
        assert_eq!(trail.duration, Duration::ZERO);
        assert_eq!(trail.blocked, Duration::ZERO);
        assert_eq!(trail.connecting, Duration::ZERO);
        assert_eq!(trail.tls_handshaking, Duration::ZERO);
        assert_eq!(trail.sending, Duration::ZERO);
        assert_eq!(trail.waiting, Duration::ZERO);
        assert_eq!(trail.receiving, Duration::ZERO);
        assert_eq!(trail.start_time, trail.end_time);
        assert_eq!(tracer.errors_len(), 1);
    }

    #[test]
    fn test_no_events_yields_zero_trail() {
        let clock = clock_at_t0();
        let trail = Tracer::with_clock(&clock).done();

        assert_eq!(trail.duration, Duration::ZERO);
        assert_eq!(trail.start_time, trail.end_time);
        assert_eq!(trail.remote_addr, None);
        assert_consistent(&trail);
    }

    #[test]
    fn test_connect_first_write_wins() {
        let clock = clock_at_t0();
        let tracer = Tracer::with_clock(&clock);

        tracer.connect_start("tcp", "[::1]:80");
        at(&clock, ms(3));
        tracer.connect_start("tcp", "127.0.0.1:80");
        at(&clock, ms(8));
        tracer.connect_done("tcp", "[::1]:80", Some(refused()));
        at(&clock, ms(12));
        tracer.connect_done("tcp", "127.0.0.1:80", None);

        assert_eq!(tracer.done().connecting, ms(8));
        // Errors are kept even from calls that lost the timestamp race.
        assert_eq!(tracer.errors_len(), 1);
    }

    #[test]
    fn test_errors_are_collected_in_order() {
        let clock = clock_at_t0();
        let tracer = Tracer::with_clock(&clock);

        tracer.connect_done("tcp", "10.0.0.1:443", Some(refused()));
        tracer.tls_handshake_done(Some("bad certificate".into()));
        tracer.wrote_request(WroteRequestInfo {
            err: Some("broken pipe".into()),
        });
        tracer.wrote_request(WroteRequestInfo {
            err: Some("broken pipe again".into()),
        });

        let errors = tracer.take_errors();
        assert_eq!(errors.len(), 4);
        assert!(matches!(errors[0], ProtoError::Connect { .. }));
        assert!(matches!(errors[1], ProtoError::TlsHandshake(_)));
        assert!(matches!(errors[2], ProtoError::WriteRequest(_)));
        // The retried write lost the timestamp but its error is still kept.
        assert!(matches!(errors[3], ProtoError::WriteRequest(_)));
        assert_eq!(tracer.errors_len(), 0);
    }

    #[test]
    fn test_sending_starts_at_tls_done_without_connect_events() {
        let clock = clock_at_t0();
        let tracer = Tracer::with_clock(&clock);

        tracer.tls_handshake_start();
        at(&clock, ms(5));
        tracer.tls_handshake_done(None);
        at(&clock, ms(7));
        tracer.wrote_request(WroteRequestInfo::default());
        at(&clock, ms(7));

        let trail = tracer.done();
        assert_eq!(trail.connecting, Duration::ZERO);
        assert_eq!(trail.tls_handshaking, ms(5));
        assert_eq!(trail.sending, ms(2));
        assert_eq!(trail.duration, ms(2));
        assert_consistent(&trail);
    }

    #[test]
    fn test_missing_connect_done_does_not_inflate_sending() {
        let clock = clock_at_t0();
        let tracer = Tracer::with_clock(&clock);

        at(&clock, ms(5));
        tracer.wrote_request(WroteRequestInfo::default());
        at(&clock, ms(9));
        tracer.got_first_response_byte();
        at(&clock, ms(10));

        let trail = tracer.done();
        assert_eq!(trail.sending, Duration::ZERO);
        assert_eq!(trail.waiting, ms(4));
        assert_eq!(trail.receiving, ms(1));
        assert_consistent(&trail);
    }

    #[test]
    fn test_first_byte_without_write_counts_only_receiving() {
        let clock = clock_at_t0();
        let tracer = Tracer::with_clock(&clock);

        tracer.got_first_response_byte();
        at(&clock, ms(7));

        let trail = tracer.done();
        assert_eq!(trail.waiting, Duration::ZERO);
        assert_eq!(trail.receiving, ms(7));
        assert_eq!(trail.duration, ms(7));
    }

    #[test]
    fn test_concurrent_dials_record_one_timestamp() {
        let clock = clock_at_t0();
        let tracer = Tracer::with_clock(&clock);
        let issued: Vec<Timestamp> = (1..=8)
            .map(|i| Timestamp::from_nanos(T0 + i * 1_000_000).unwrap())
            .collect();

        thread::scope(|scope| {
            for ts in &issued {
                let (clock, tracer) = (&clock, &tracer);
                scope.spawn(move || {
                    let addr = format!("10.0.0.{}:80", ts.as_nanos() % 256);
                    clock.set(*ts);
                    tracer.connect_start("tcp", &addr);
                    tracer.connect_done("tcp", &addr, Some(refused()));
                });
            }
        });

        assert_eq!(tracer.errors_len(), 8);

        let start = tracer.connect_start.load().unwrap();
        let done = tracer.connect_done.load().unwrap();
        assert!(issued.contains(&start));
        assert!(issued.contains(&done));

        // Both cells are already taken; a late dial changes nothing.
        clock.set(Timestamp::from_nanos(T0 + 99_000_000).unwrap());
        tracer.connect_start("tcp", "10.0.0.99:80");
        tracer.connect_done("tcp", "10.0.0.99:80", None);
        assert_eq!(tracer.connect_start.load(), Some(start));
        assert_eq!(tracer.connect_done.load(), Some(done));
    }
}
