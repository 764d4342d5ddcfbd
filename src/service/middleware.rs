//! Request metrics middleware.
//!
//! Records request counts and latency via `tracing`, the same
//! log-now-aggregate-later approach the donor uses before it has a real
//! metrics backend wired up.

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use std::time::Instant;
use tracing::info;

/// Records request counts and latency via `tracing`. Apply with
/// `axum::middleware::from_fn(metrics_middleware)`.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = normalize_path(request.uri().path());

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status().as_u16();

    info!(
        target: "access_manager::metrics",
        metric_type = "request",
        path = %path,
        method = %method,
        status = status,
        latency_ms = latency.as_millis() as u64,
        "request_metric"
    );

    response
}

/// Collapse path segments that look like identifiers so request metrics
/// don't fan out into one series per principal.
fn normalize_path(path: &str) -> String {
    let uuid = regex_lite::Regex::new(
        r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}",
    )
    .unwrap();
    uuid.replace_all(path, ":id").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_path_collapses_uuids() {
        let path = "/users/3fa85f64-5717-4562-b3fc-2c963f66afa6/groups";
        assert_eq!(normalize_path(path), "/users/:id/groups");
    }

    #[test]
    fn normalize_path_leaves_static_segments_alone() {
        assert_eq!(normalize_path("/health"), "/health");
    }
}
