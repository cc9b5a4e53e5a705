//! Traced HTTP/1.1 request execution.
//!
//! Drives a [`ClientTrace`] through the whole lifecycle of one request:
//! connection request, dialing every resolved address until one succeeds,
//! the TLS handshake for https, the request write, the first response byte
//! and the body download. The tracer's [`Trail`] is produced even when the
//! request fails part way.

use super::stream::TracedStream;
use super::target::RequestTarget;
use super::types::{ErrorData, TraceRequest, TraceResponse, TrailInfo};
use crate::error::{AppError, ProtoError};
use crate::infra::{DnsResolver, HickoryDnsResolver, RustlsTlsProvider, TlsProvider};
use crate::trace::{ClientTrace, Clock, GotConnInfo, Tracer, Trail};
use http_body_util::{BodyExt, Full};
use hyper::{body::Bytes, header::HeaderName, Method, Request, Version};
use hyper_util::rt::TokioIo;
use std::{
    collections::HashMap,
    net::{IpAddr, SocketAddr},
    str::FromStr,
    sync::Arc,
    time::Duration,
};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
    time::timeout,
};

/// Default request timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 30000;

/// What came back from the server.
#[derive(Debug)]
pub struct ResponseMeta {
    pub status: u16,
    pub version: Version,
    pub headers: HashMap<String, String>,
    pub body_size: usize,
}

/// Result of a traced request: the response (or why it failed), the timing
/// breakdown and the transport errors the tracer collected.
#[derive(Debug)]
pub struct TraceOutcome {
    pub response: Result<ResponseMeta, AppError>,
    pub trail: Trail,
    pub errors: Vec<ProtoError>,
}

impl TraceOutcome {
    /// Builds the API response, tagging samples with the request's tags plus
    /// `method`, `url` and, when known, `status`.
    pub fn into_trace_response(self, request: &TraceRequest) -> TraceResponse {
        let mut tags = request.tags.clone();
        tags.insert("method".to_string(), request.method.to_uppercase());
        tags.insert("url".to_string(), request.url.clone());
        if let Ok(meta) = &self.response {
            tags.insert("status".to_string(), meta.status.to_string());
        }

        let timing = TrailInfo::from(&self.trail);
        let samples = self.trail.samples(&tags);
        let transport_errors = self.errors.iter().map(|e| e.to_string()).collect();

        match self.response {
            Ok(meta) => TraceResponse {
                success: true,
                status: Some(meta.status),
                protocol: Some(version_to_string(meta.version)),
                headers: Some(meta.headers),
                body_size: Some(meta.body_size),
                timing,
                samples,
                transport_errors,
                error: None,
            },
            Err(e) => TraceResponse {
                success: false,
                status: None,
                protocol: None,
                headers: None,
                body_size: None,
                timing,
                samples,
                transport_errors,
                error: Some(ErrorData {
                    message: e.to_string(),
                    code: e.code().to_string(),
                }),
            },
        }
    }
}

/// Executes requests over fresh connections, reporting every lifecycle event.
#[derive(Clone)]
pub struct TracedExecutor<D = HickoryDnsResolver, P = RustlsTlsProvider> {
    dns: D,
    tls: P,
    default_timeout: Duration,
}

impl TracedExecutor {
    pub fn new(default_timeout: Duration) -> Self {
        Self::with_providers(HickoryDnsResolver::new(), RustlsTlsProvider::new(), default_timeout)
    }
}

impl Default for TracedExecutor {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_TIMEOUT_MS))
    }
}

impl<D: DnsResolver, P: TlsProvider> TracedExecutor<D, P> {
    pub fn with_providers(dns: D, tls: P, default_timeout: Duration) -> Self {
        Self {
            dns,
            tls,
            default_timeout,
        }
    }

    /// Runs `request`, feeding `tracer`, and returns the outcome with the
    /// tracer's trail. Consumes the tracer's collected errors.
    pub async fn execute<C: Clock + 'static>(
        &self,
        request: &TraceRequest,
        tracer: Arc<Tracer<C>>,
    ) -> TraceOutcome {
        let request_timeout = request
            .timeout
            .map(Duration::from_millis)
            .unwrap_or(self.default_timeout);

        let round_trip = self.round_trip(request, Arc::clone(&tracer));
        let response = match timeout(request_timeout, round_trip).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Timeout(format!(
                "request did not complete within {} ms",
                request_timeout.as_millis()
            ))),
        };

        let trail = tracer.done();
        let errors = tracer.take_errors();
        tracing::debug!(url = %request.url, %trail, errors = errors.len(), "request traced");

        TraceOutcome {
            response,
            trail,
            errors,
        }
    }

    async fn round_trip<T: ClientTrace + 'static>(
        &self,
        request: &TraceRequest,
        trace: Arc<T>,
    ) -> Result<ResponseMeta, AppError> {
        let target = RequestTarget::from_url(&request.url)?;
        let req = build_http_request(request, &target)?;

        trace.get_conn(&target.host_port());

        let ips = self.dns.resolve(&target.host).await?;
        let tcp_stream = dial(&ips, target.port, trace.as_ref()).await?;
        let remote_addr = tcp_stream.peer_addr().ok();
        let conn_info = GotConnInfo {
            remote_addr,
            ..Default::default()
        };

        if !target.is_https {
            trace.got_conn(conn_info);
            return exchange(TracedStream::new(tcp_stream, trace), req).await;
        }

        let server_name = rustls::pki_types::ServerName::try_from(target.server_name().to_string())
            .map_err(|e| AppError::Tls(format!("Invalid server name: {}", e)))?;

        trace.tls_handshake_start();
        match self.tls.connector().connect(server_name, tcp_stream).await {
            Ok(tls_stream) => {
                trace.tls_handshake_done(None);
                trace.got_conn(conn_info);
                exchange(TracedStream::new(tls_stream, trace), req).await
            }
            Err(e) => {
                let message = format!("TLS handshake failed: {}", e);
                trace.tls_handshake_done(Some(Box::new(e)));
                Err(AppError::Tls(message))
            }
        }
    }
}

/// Dials each address in order until one connects. Every attempt is
/// reported through `connect_start`/`connect_done`.
async fn dial<T: ClientTrace + ?Sized>(
    ips: &[IpAddr],
    port: u16,
    trace: &T,
) -> Result<TcpStream, AppError> {
    let mut last_error = None;

    for ip in ips {
        let addr = SocketAddr::new(*ip, port);
        let addr_str = addr.to_string();

        trace.connect_start("tcp", &addr_str);
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                trace.connect_done("tcp", &addr_str, None);
                return Ok(stream);
            }
            Err(e) => {
                tracing::debug!(%addr, error = %e, "dial failed");
                last_error = Some(format!("{}: {}", addr, e));
                trace.connect_done("tcp", &addr_str, Some(Box::new(e)));
            }
        }
    }

    Err(AppError::ConnectionFailed(
        last_error.unwrap_or_else(|| "no addresses to dial".to_string()),
    ))
}

/// Performs the HTTP/1.1 exchange over an established stream and drains the body.
async fn exchange<S>(io: S, req: Request<Full<Bytes>>) -> Result<ResponseMeta, AppError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(io)).await?;

    tokio::spawn(async move {
        if let Err(e) = conn.await {
            tracing::warn!("Connection error: {}", e);
        }
    });

    let response = sender.send_request(req).await?;

    let version = response.version();
    let status = response.status().as_u16();
    let headers: HashMap<String, String> = response
        .headers()
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
        .collect();

    let body = response.into_body().collect().await?.to_bytes();

    Ok(ResponseMeta {
        status,
        version,
        headers,
        body_size: body.len(),
    })
}

fn version_to_string(version: Version) -> String {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_11 => "HTTP/1.1",
        Version::HTTP_2 => "HTTP/2",
        Version::HTTP_3 => "HTTP/3",
        _ => "HTTP/1.1",
    }
    .to_string()
}

/// Builds an HTTP request for `target`.
fn build_http_request(
    request: &TraceRequest,
    target: &RequestTarget,
) -> Result<Request<Full<Bytes>>, AppError> {
    let method = Method::from_str(&request.method.to_uppercase())
        .map_err(|_| AppError::InvalidMethod(request.method.clone()))?;

    let mut req_builder = Request::builder()
        .method(method)
        .uri(target.path.as_str())
        .header("Host", target.host_header());

    for (key, value) in &request.headers {
        if let Ok(name) = HeaderName::from_str(key) {
            req_builder = req_builder.header(name, value);
        }
    }

    let body_content = request.body.clone().unwrap_or_default();
    req_builder
        .body(Full::new(Bytes::from(body_content)))
        .map_err(|e| AppError::Internal(format!("Failed to build request: {}", e)))
}

/// Executes `request` with a fresh wall-clock tracer and the default providers.
pub async fn execute_request(request: TraceRequest) -> TraceResponse {
    let outcome = TracedExecutor::default()
        .execute(&request, Arc::new(Tracer::new()))
        .await;
    outcome.into_trace_response(&request)
}
