use axum::{extract::State, Json};
use std::sync::Arc;

use crate::client::{TraceRequest, TraceResponse, TracedExecutor};
use crate::trace::Tracer;

pub async fn trace_request(
    State(executor): State<Arc<TracedExecutor>>,
    Json(request): Json<TraceRequest>,
) -> Json<TraceResponse> {
    tracing::debug!(
        method = %request.method,
        url = %request.url,
        "Tracing request"
    );

    let outcome = executor.execute(&request, Arc::new(Tracer::new())).await;
    let response = outcome.into_trace_response(&request);

    if response.success {
        tracing::debug!(duration_ms = response.timing.duration, "Request succeeded");
    } else if let Some(ref error) = response.error {
        tracing::warn!(code = %error.code, message = %error.message, "Request failed");
    }

    Json(response)
}
