//! Parsing of the request URL into what the executor needs to dial.

use crate::error::AppError;

/// Where a request goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTarget {
    pub url: String,
    pub host: String,
    pub port: u16,
    /// Path and query, never empty.
    pub path: String,
    pub is_https: bool,
}

impl RequestTarget {
    pub fn from_url(url: &str) -> Result<Self, AppError> {
        let parsed_url = url::Url::parse(url).map_err(|e| AppError::InvalidUrl(e.to_string()))?;

        let is_https = match parsed_url.scheme() {
            "https" => true,
            "http" => false,
            other => {
                return Err(AppError::InvalidUrl(format!(
                    "unsupported scheme: {}",
                    other
                )))
            }
        };

        let host = parsed_url
            .host_str()
            .ok_or_else(|| AppError::InvalidUrl("URL has no host".to_string()))?
            .to_string();

        let port = parsed_url.port().unwrap_or(if is_https { 443 } else { 80 });
        let path = match parsed_url.query() {
            Some(query) => format!("{}?{}", parsed_url.path(), query),
            None => parsed_url.path().to_string(),
        };
        let path = if path.is_empty() { "/".to_string() } else { path };

        Ok(Self {
            url: url.to_string(),
            host,
            port,
            path,
            is_https,
        })
    }

    fn default_port(&self) -> u16 {
        if self.is_https {
            443
        } else {
            80
        }
    }

    /// `host:port`, as reported to `get_conn`.
    pub fn host_port(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Value for the `Host` header; omits the port when it is the scheme default.
    pub fn host_header(&self) -> String {
        if self.port == self.default_port() {
            self.host.clone()
        } else {
            self.host_port()
        }
    }

    /// Host name without IPv6 brackets, for TLS server name indication.
    pub fn server_name(&self) -> &str {
        self.host.trim_start_matches('[').trim_end_matches(']')
    }
}
