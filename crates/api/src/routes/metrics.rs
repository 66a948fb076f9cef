//! Prometheus scrape endpoint.
//!
//! Renders everything recorded through the `metrics` facade, including the
//! checkout counters (`orders_placed`, `orders_stock_conflicts`) and the
//! `checkout_duration_seconds` histogram.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;

/// GET /metrics — renders the Prometheus exposition format.
pub async fn get(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        handle.render(),
    )
}
