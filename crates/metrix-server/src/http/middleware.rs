//! Request/response middleware.
//!
//! gzip in both directions comes from `tower-http` (see `router.rs`); this
//! module holds the request log and the body cap shared with it.

use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};

/// Upper bound on request bodies after inflation.
pub const MAX_BODY_BYTES: usize = 1 << 20;

pub async fn log_request(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_owned();

    let response = next.run(request).await;

    tracing::info!(
        %method,
        %path,
        status = response.status().as_u16(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "handled request"
    );
    response
}
