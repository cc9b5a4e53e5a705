//! DNS resolution infrastructure.
//!
//! Provides a trait-based abstraction for DNS resolution so the executor can
//! dial every resolved address in turn.

use crate::error::AppError;
use hickory_resolver::{config::*, TokioAsyncResolver};
use std::{future::Future, net::IpAddr, pin::Pin, sync::Arc};
use tokio::sync::OnceCell;

/// Trait for DNS resolution.
///
/// This abstraction allows for different DNS resolver implementations
/// and makes testing easier by allowing mock implementations.
pub trait DnsResolver: Send + Sync {
    /// Resolves a hostname to its IP addresses, in the order they should be dialed.
    fn resolve<'a>(
        &'a self,
        host: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<IpAddr>, AppError>> + Send + 'a>>;
}

/// Global DNS resolver instance for connection reuse.
static DNS_RESOLVER: OnceCell<Arc<TokioAsyncResolver>> = OnceCell::const_new();

/// Gets or initializes the global DNS resolver.
async fn get_resolver() -> Arc<TokioAsyncResolver> {
    DNS_RESOLVER
        .get_or_init(|| async {
            Arc::new(TokioAsyncResolver::tokio(
                ResolverConfig::default(),
                ResolverOpts::default(),
            ))
        })
        .await
        .clone()
}

/// DNS resolver implementation using hickory-resolver.
#[derive(Default, Clone, Copy)]
pub struct HickoryDnsResolver;

impl HickoryDnsResolver {
    pub fn new() -> Self {
        Self
    }
}

impl DnsResolver for HickoryDnsResolver {
    fn resolve<'a>(
        &'a self,
        host: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<IpAddr>, AppError>> + Send + 'a>> {
        Box::pin(async move {
            // IP literals, including bracketed IPv6 hosts from URLs
            let literal = host.trim_start_matches('[').trim_end_matches(']');
            if let Ok(ip) = literal.parse::<IpAddr>() {
                return Ok(vec![ip]);
            }

            let resolver = get_resolver().await;
            let response = resolver
                .lookup_ip(host)
                .await
                .map_err(|e| AppError::Dns(e.to_string()))?;

            let ips: Vec<IpAddr> = response.iter().collect();
            if ips.is_empty() {
                return Err(AppError::Dns(format!("no addresses for {}", host)));
            }

            tracing::debug!(host, count = ips.len(), "resolved host");
            Ok(ips)
        })
    }
}
