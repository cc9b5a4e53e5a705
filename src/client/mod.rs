pub mod executor;
pub mod stream;
pub mod target;
pub mod types;

pub use executor::{execute_request, ResponseMeta, TraceOutcome, TracedExecutor};
pub use stream::TracedStream;
pub use target::RequestTarget;
pub use types::*;
