//! Projection of a [`Trail`] into named, timestamped metric samples.

use super::trail::Trail;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Tag set attached to every sample of a request. Keys are unique.
pub type Tags = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Trend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Default,
    Time,
}

/// A metric a sample belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Metric {
    pub name: &'static str,
    pub kind: MetricKind,
    pub value_type: ValueType,
}

impl Metric {
    const fn trend_time(name: &'static str) -> Self {
        Self {
            name,
            kind: MetricKind::Trend,
            value_type: ValueType::Time,
        }
    }
}

pub const HTTP_REQS: Metric = Metric {
    name: "http_reqs",
    kind: MetricKind::Counter,
    value_type: ValueType::Default,
};
pub const HTTP_REQ_DURATION: Metric = Metric::trend_time("http_req_duration");
pub const HTTP_REQ_BLOCKED: Metric = Metric::trend_time("http_req_blocked");
pub const HTTP_REQ_CONNECTING: Metric = Metric::trend_time("http_req_connecting");
pub const HTTP_REQ_TLS_HANDSHAKING: Metric = Metric::trend_time("http_req_tls_handshaking");
pub const HTTP_REQ_SENDING: Metric = Metric::trend_time("http_req_sending");
pub const HTTP_REQ_WAITING: Metric = Metric::trend_time("http_req_waiting");
pub const HTTP_REQ_RECEIVING: Metric = Metric::trend_time("http_req_receiving");

/// A single measured value, ready for a metrics sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    #[serde(serialize_with = "serialize_metric_name")]
    pub metric: Metric,
    #[serde(serialize_with = "serialize_unix_millis")]
    pub time: SystemTime,
    pub tags: Tags,
    pub value: f64,
}

fn serialize_metric_name<S: Serializer>(metric: &Metric, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(metric.name)
}

fn serialize_unix_millis<S: Serializer>(time: &SystemTime, s: S) -> Result<S::Ok, S::Error> {
    let millis = time
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    s.serialize_u64(millis)
}

/// Converts a duration to fractional milliseconds.
pub fn duration_to_millis(d: Duration) -> f64 {
    d.as_nanos() as f64 / 1_000_000.0
}

impl Trail {
    /// Returns every pre-computed sample for the request, all stamped with
    /// `end_time` and tagged with `tags`.
    pub fn samples(&self, tags: &Tags) -> Vec<Sample> {
        let sample = |metric: Metric, value: f64| Sample {
            metric,
            time: self.end_time,
            tags: tags.clone(),
            value,
        };
        let timed = |metric: Metric, d: Duration| sample(metric, duration_to_millis(d));

        vec![
            sample(HTTP_REQS, 1.0),
            timed(HTTP_REQ_DURATION, self.duration),
            timed(HTTP_REQ_BLOCKED, self.blocked),
            timed(HTTP_REQ_CONNECTING, self.connecting),
            timed(HTTP_REQ_SENDING, self.sending),
            timed(HTTP_REQ_WAITING, self.waiting),
            timed(HTTP_REQ_RECEIVING, self.receiving),
            timed(HTTP_REQ_TLS_HANDSHAKING, self.tls_handshaking),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trail() -> Trail {
        let end_time = UNIX_EPOCH + Duration::from_millis(1_700_000_000_060);
        Trail {
            start_time: end_time - Duration::from_millis(50),
            end_time,
            duration: Duration::from_millis(50),
            blocked: Duration::from_millis(2),
            connecting: Duration::from_millis(10),
            tls_handshaking: Duration::from_millis(15),
            sending: Duration::from_millis(1),
            waiting: Duration::from_millis(39),
            receiving: Duration::from_millis(10),
            connection_reused: false,
            remote_addr: None,
        }
    }

    #[test]
    fn test_samples_order_and_values() {
        let mut tags = Tags::new();
        tags.insert("method".into(), "GET".into());

        let samples = trail().samples(&tags);
        let names: Vec<_> = samples.iter().map(|s| s.metric.name).collect();
        assert_eq!(
            names,
            [
                "http_reqs",
                "http_req_duration",
                "http_req_blocked",
                "http_req_connecting",
                "http_req_sending",
                "http_req_waiting",
                "http_req_receiving",
                "http_req_tls_handshaking",
            ]
        );

        let values: Vec<_> = samples.iter().map(|s| s.value).collect();
        assert_eq!(values, [1.0, 50.0, 2.0, 10.0, 1.0, 39.0, 10.0, 15.0]);

        for s in &samples {
            assert_eq!(s.time, trail().end_time);
            assert_eq!(s.tags, tags);
        }
    }

    #[test]
    fn test_metric_kinds() {
        assert_eq!(HTTP_REQS.kind, MetricKind::Counter);
        assert_eq!(HTTP_REQ_WAITING.kind, MetricKind::Trend);
        assert_eq!(HTTP_REQ_WAITING.value_type, ValueType::Time);
    }

    #[test]
    fn test_duration_to_millis() {
        assert_eq!(duration_to_millis(Duration::from_micros(1500)), 1.5);
        assert_eq!(duration_to_millis(Duration::ZERO), 0.0);
    }

    #[test]
    fn test_sample_serialization() {
        let samples = trail().samples(&Tags::new());
        let json = serde_json::to_value(&samples[0]).unwrap();
        assert_eq!(json["metric"], "http_reqs");
        assert_eq!(json["time"], 1_700_000_000_060u64);
        assert_eq!(json["value"], 1.0);
    }
}
