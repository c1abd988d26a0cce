//! Metrics middleware for API routes.

use axum::{
    body::Body, extract::OriginalUri, http::Request, middleware::Next, response::Response,
};
use std::time::Instant;

use crate::metrics::{normalize_path, HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION};

/// Record request duration and count by method, normalized path and status.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    // Nested routers see the path without the /api/v1 prefix
    let path = match request.extensions().get::<OriginalUri>() {
        Some(original) => normalize_path(original.0.path()),
        None => normalize_path(request.uri().path()),
    };

    let response = next.run(request).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUEST_DURATION
        .with_label_values(&[&method, &path, &status])
        .observe(duration);
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();

    response
}
