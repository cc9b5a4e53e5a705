pub mod client;
pub mod config;
pub mod error;
pub mod infra;
pub mod routes;
pub mod trace;

pub use client::{execute_request, TraceOutcome, TraceRequest, TraceResponse, TracedExecutor};
pub use config::Config;
pub use error::{AppError, ProtoError};
pub use trace::{ClientTrace, Sample, Tags, Tracer, Trail};
