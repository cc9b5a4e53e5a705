//! Request lifecycle tracing.
//!
//! This module contains:
//! - the hook set an HTTP client calls while executing a request
//! - the [`Tracer`] that records those hooks
//! - the [`Trail`] breakdown and its projection into metric samples

pub mod clock;
pub mod hooks;
pub mod sample;
pub mod tracer;
pub mod trail;

pub use clock::{Clock, ManualClock, SystemClock, Timestamp};
pub use hooks::{ClientTrace, GotConnInfo, WroteRequestInfo};
pub use sample::{Metric, MetricKind, Sample, Tags, ValueType};
pub use tracer::Tracer;
pub use trail::Trail;
