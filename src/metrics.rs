// src/metrics.rs
use anyhow::Context;
use axum::{extract::State, routing::get, Router};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub const ANALYZE_REQUESTS_TOTAL: &str = "trust_analyze_requests_total";
pub const ANALYZE_REJECTED_TOTAL: &str = "trust_analyze_rejected_total";
pub const ANALYZE_DURATION_MS: &str = "trust_analyze_duration_ms";
pub const RULES_SKIPPED_TOTAL: &str = "trust_rules_skipped_total";
pub const HISTORY_WRITES_TOTAL: &str = "trust_history_writes_total";

/// Path the exposition endpoint is mounted on.
pub const METRICS_PATH: &str = "/metrics";

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder. Call once per process (the binary does).
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;

        describe_counter!(ANALYZE_REQUESTS_TOTAL, "Analyze calls that produced a result.");
        describe_counter!(
            ANALYZE_REJECTED_TOTAL,
            "Analyze calls rejected, labelled by error kind."
        );
        describe_histogram!(ANALYZE_DURATION_MS, "Scoring time per text in milliseconds.");
        describe_counter!(RULES_SKIPPED_TOTAL, "Rules skipped because they could not be compiled.");
        describe_counter!(
            HISTORY_WRITES_TOTAL,
            "History writes, labelled by outcome (ok|error|anonymous)."
        );

        Ok(Self { handle })
    }

    /// Scrape endpoint at [`METRICS_PATH`]; the binary merges it next to the API.
    pub fn router(&self) -> Router {
        exposition_router(self.handle.clone())
    }
}

fn exposition_router(handle: PrometheusHandle) -> Router {
    Router::new()
        .route(METRICS_PATH, get(render_exposition))
        .with_state(handle)
}

async fn render_exposition(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{self, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt as _;

    #[tokio::test]
    async fn exposition_renders_recorded_counters() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            metrics::counter!(RULES_SKIPPED_TOTAL).increment(2);
        });

        let resp = exposition_router(handle)
            .oneshot(Request::get(METRICS_PATH).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = body::to_bytes(resp.into_body(), 64 * 1024).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("trust_rules_skipped_total 2"), "{text}");
    }
}
