//! Trust scoring service: binary entrypoint.
//! Boots the Axum HTTP server, wiring config, providers, and metrics.

use anyhow::Context;
use shuttle_axum::ShuttleAxum;
use tracing::info;

use trust_lens::api::{self, AppState};
use trust_lens::config::AppConfig;
use trust_lens::metrics::Metrics;
use trust_lens::telemetry;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    telemetry::init_tracing();

    let cfg = AppConfig::load().context("loading trust config")?;
    info!(
        rules = ?cfg.rules.source,
        history = ?cfg.history.backend,
        auth = ?cfg.auth.backend,
        "trust config loaded"
    );

    let state = AppState::from_config(&cfg).context("wiring providers")?;
    let metrics = Metrics::init()?;

    let router = api::router(state).merge(metrics.router());
    Ok(router.into())
}
