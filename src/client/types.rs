use crate::trace::sample::duration_to_millis;
use crate::trace::{Sample, Tags, Trail};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::UNIX_EPOCH;

/// Incoming trace request
#[derive(Debug, Clone, Deserialize)]
pub struct TraceRequest {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
    /// Timeout in milliseconds
    pub timeout: Option<u64>,
    /// Extra tags attached to every emitted sample
    #[serde(default)]
    pub tags: Tags,
}

impl TraceRequest {
    pub fn get(url: &str) -> Self {
        Self {
            method: "GET".to_string(),
            url: url.to_string(),
            headers: HashMap::new(),
            body: None,
            timeout: None,
            tags: Tags::new(),
        }
    }
}

/// Latency breakdown in milliseconds
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrailInfo {
    /// Unix time in milliseconds
    pub start_time: u64,
    /// Unix time in milliseconds
    pub end_time: u64,
    /// Sending + waiting + receiving
    pub duration: f64,
    pub blocked: f64,
    pub connecting: f64,
    pub tls_handshaking: f64,
    pub sending: f64,
    pub waiting: f64,
    pub receiving: f64,
    pub connection_reused: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_addr: Option<String>,
}

impl From<&Trail> for TrailInfo {
    fn from(trail: &Trail) -> Self {
        let unix_millis = |t: std::time::SystemTime| {
            t.duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0)
        };

        Self {
            start_time: unix_millis(trail.start_time),
            end_time: unix_millis(trail.end_time),
            duration: duration_to_millis(trail.duration),
            blocked: duration_to_millis(trail.blocked),
            connecting: duration_to_millis(trail.connecting),
            tls_handshaking: duration_to_millis(trail.tls_handshaking),
            sending: duration_to_millis(trail.sending),
            waiting: duration_to_millis(trail.waiting),
            receiving: duration_to_millis(trail.receiving),
            connection_reused: trail.connection_reused,
            remote_addr: trail.remote_addr.map(|a| a.to_string()),
        }
    }
}

/// Error data
#[derive(Debug, Clone, Serialize)]
pub struct ErrorData {
    pub message: String,
    pub code: String,
}

/// Full trace response. Failed requests still carry their timing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_size: Option<usize>,
    pub timing: TrailInfo,
    pub samples: Vec<Sample>,
    /// Transport errors reported while connecting, handshaking or writing
    pub transport_errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorData>,
}
