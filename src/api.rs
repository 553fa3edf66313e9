// src/api.rs
//! HTTP surface: analyze, compare, history.
//!
//! Handlers fetch one rule snapshot per request and score against it. History
//! writes happen in a detached task after the response is built; their outcome
//! never changes the response.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::{debug, warn};

use crate::analyze::{Analysis, AnalysisResult, Analyzer};
use crate::config::{AppConfig, AuthBackend, HistoryBackend, RulesSource};
use crate::error::AnalysisError;
use crate::history::{snippet, DynHistoryStore, HistoryEntry, HistoryStore, MemoryHistory, RestHistory};
use crate::identity::{
    bearer_token, DynIdentityVerifier, IdentityVerifier, RestIdentity, StaticTokens, UserId,
};
use crate::metrics::{
    ANALYZE_DURATION_MS, ANALYZE_REJECTED_TOTAL, ANALYZE_REQUESTS_TOTAL, HISTORY_WRITES_TOTAL,
};
use crate::rules::{fetch_snapshot, DynRuleProvider, FileRules, RestRules};
use crate::telemetry::anon_hash;

#[derive(Clone)]
pub struct AppState {
    rules: DynRuleProvider,
    history: Option<DynHistoryStore>,
    identity: Option<DynIdentityVerifier>,
}

impl AppState {
    /// Scoring only: no history, no identity.
    pub fn new(rules: DynRuleProvider) -> Self {
        Self {
            rules,
            history: None,
            identity: None,
        }
    }

    pub fn with_history(mut self, history: DynHistoryStore) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_identity(mut self, identity: DynIdentityVerifier) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Wire providers according to config.
    pub fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        let rules: DynRuleProvider = match cfg.rules.source {
            RulesSource::File => Arc::new(FileRules::new(Some(&cfg.rules.path))),
            RulesSource::Rest => Arc::new(RestRules::new(
                cfg.store_client()?,
                Some(&cfg.rules.table),
            )),
        };
        let mut state = Self::new(rules);

        match cfg.history.backend {
            HistoryBackend::Memory => {
                state = state.with_history(Arc::new(MemoryHistory::with_capacity(
                    cfg.history.capacity,
                )));
            }
            HistoryBackend::Rest => {
                state = state.with_history(Arc::new(RestHistory::new(
                    cfg.store_client()?,
                    Some(&cfg.history.table),
                )));
            }
            HistoryBackend::Off => {}
        }

        match cfg.auth.backend {
            AuthBackend::Static => {
                state = state.with_identity(Arc::new(StaticTokens::new(cfg.auth.tokens.clone())));
            }
            AuthBackend::Rest => {
                state = state.with_identity(Arc::new(RestIdentity::new(cfg.store_client()?)));
            }
            AuthBackend::Off => {}
        }

        Ok(state)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/analyze", post(analyze))
        .route("/analyze/details", post(analyze_details))
        .route("/compare", post(compare))
        .route("/history", get(history))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/* ----------------------------
Errors → responses
---------------------------- */

#[derive(Debug)]
pub enum ApiError {
    Analysis(AnalysisError),
    BadRequest(String),
    Unauthorized(&'static str),
    Unavailable(&'static str),
    Internal(&'static str),
}

impl From<AnalysisError> for ApiError {
    fn from(e: AnalysisError) -> Self {
        ApiError::Analysis(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, msg) = match self {
            ApiError::Analysis(AnalysisError::InvalidInput) => (
                StatusCode::BAD_REQUEST,
                AnalysisError::InvalidInput.to_string(),
            ),
            ApiError::Analysis(AnalysisError::RuleSetUnavailable(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch keywords".to_string(),
            ),
            ApiError::Analysis(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An error occurred during analysis".to_string(),
            ),
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m.to_string()),
            ApiError::Unavailable(m) => (StatusCode::NOT_IMPLEMENTED, m.to_string()),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m.to_string()),
        };
        (status, Json(json!({ "error": msg }))).into_response()
    }
}

fn body_or_400<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(v)| v)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}

/* ----------------------------
Scoring
---------------------------- */

#[derive(Debug, Deserialize)]
struct AnalyzeReq {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompareReq {
    #[serde(default)]
    left: Option<String>,
    #[serde(default)]
    right: Option<String>,
}

#[derive(Debug, Serialize)]
struct CompareResp {
    left: AnalysisResult,
    right: AnalysisResult,
}

/// Reject blank input before touching the rule store.
fn require_text(text: Option<String>) -> Result<String, AnalysisError> {
    match text {
        Some(t) if !t.trim().is_empty() => Ok(t),
        _ => Err(AnalysisError::InvalidInput),
    }
}

fn record_rejection(e: &AnalysisError) {
    counter!(ANALYZE_REJECTED_TOTAL, "reason" => e.kind()).increment(1);
}

async fn load_analyzer(state: &AppState) -> Result<Analyzer, AnalysisError> {
    let snapshot = fetch_snapshot(state.rules.as_ref()).await?;
    Ok(Analyzer::new(&snapshot))
}

fn timed_analysis(analyzer: &Analyzer, text: &str) -> Result<Analysis, AnalysisError> {
    let started = Instant::now();
    let out = analyzer.analyze_detailed(text);
    histogram!(ANALYZE_DURATION_MS).record(started.elapsed().as_secs_f64() * 1000.0);
    if out.is_ok() {
        counter!(ANALYZE_REQUESTS_TOTAL).increment(1);
    }
    out
}

async fn run_analysis(state: &AppState, text: Option<String>) -> Result<(String, Analysis), AnalysisError> {
    let text = require_text(text)?;
    let analyzer = load_analyzer(state).await?;
    let analysis = timed_analysis(&analyzer, &text)?;
    Ok((text, analysis))
}

async fn analyze(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<AnalyzeReq>, JsonRejection>,
) -> Result<Json<AnalysisResult>, ApiError> {
    let req = body_or_400(payload)?;
    let (text, analysis) = run_analysis(&state, req.text).await.inspect_err(record_rejection)?;
    spawn_history_write(&state, &headers, &text, analysis.result);
    Ok(Json(analysis.result))
}

async fn analyze_details(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeReq>, JsonRejection>,
) -> Result<Json<Analysis>, ApiError> {
    let req = body_or_400(payload)?;
    let (_, analysis) = run_analysis(&state, req.text).await.inspect_err(record_rejection)?;
    Ok(Json(analysis))
}

/// Side-by-side scoring of two texts against one shared snapshot.
async fn compare(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CompareReq>, JsonRejection>,
) -> Result<Json<CompareResp>, ApiError> {
    let req = body_or_400(payload)?;
    let left = require_text(req.left).inspect_err(record_rejection)?;
    let right = require_text(req.right).inspect_err(record_rejection)?;

    let analyzer = load_analyzer(&state).await.inspect_err(record_rejection)?;
    let l = timed_analysis(&analyzer, &left).inspect_err(record_rejection)?;
    let r = timed_analysis(&analyzer, &right).inspect_err(record_rejection)?;

    spawn_history_write(&state, &headers, &left, l.result);
    spawn_history_write(&state, &headers, &right, r.result);

    Ok(Json(CompareResp {
        left: l.result,
        right: r.result,
    }))
}

/* ----------------------------
History
---------------------------- */

/// Verify `token` and store the result for that user.
/// `Ok(None)`: anonymous (invalid token), nothing stored.
pub async fn persist_result(
    store: &dyn HistoryStore,
    verifier: &dyn IdentityVerifier,
    token: &str,
    text: &str,
    result: AnalysisResult,
) -> Result<Option<UserId>, AnalysisError> {
    let user = verifier
        .verify(token)
        .await
        .map_err(AnalysisError::PersistenceFailure)?;
    let Some(user) = user else {
        return Ok(None);
    };
    store
        .record(HistoryEntry::new(user.clone(), text, result))
        .await
        .map_err(AnalysisError::PersistenceFailure)?;
    Ok(Some(user))
}

fn header_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(bearer_token)
        .map(str::to_owned)
}

fn spawn_history_write(state: &AppState, headers: &HeaderMap, text: &str, result: AnalysisResult) {
    let (Some(store), Some(verifier)) = (state.history.clone(), state.identity.clone()) else {
        return;
    };
    let Some(token) = header_token(headers) else {
        return;
    };
    let id = anon_hash(text);
    let snip = snippet(text);

    tokio::spawn(async move {
        match persist_result(store.as_ref(), verifier.as_ref(), &token, &snip, result).await {
            Ok(Some(user)) => {
                counter!(HISTORY_WRITES_TOTAL, "outcome" => "ok").increment(1);
                debug!(target: "history", %id, %user, store = store.name(), "history recorded");
            }
            Ok(None) => {
                counter!(HISTORY_WRITES_TOTAL, "outcome" => "anonymous").increment(1);
                debug!(target: "history", %id, "token not accepted; history skipped");
            }
            Err(e) => {
                counter!(HISTORY_WRITES_TOTAL, "outcome" => "error").increment(1);
                warn!(target: "history", %id, error = %e, "history write failed (non-fatal)");
            }
        }
    });
}

#[derive(Debug, Serialize)]
struct HistoryResp {
    history: Vec<HistoryEntry>,
}

async fn history(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<HistoryResp>, ApiError> {
    let token = header_token(&headers).ok_or(ApiError::Unauthorized("Authorization required"))?;
    let store = state
        .history
        .clone()
        .ok_or(ApiError::Unavailable("History is disabled"))?;
    let verifier = state
        .identity
        .clone()
        .ok_or(ApiError::Unauthorized("Invalid token"))?;

    let user = match verifier.verify(&token).await {
        Ok(Some(u)) => u,
        Ok(None) => return Err(ApiError::Unauthorized("Invalid token")),
        Err(e) => {
            warn!(target: "history", error = %format!("{e:#}"), "token verification failed");
            return Err(ApiError::Unauthorized("Invalid token"));
        }
    };

    let rows = store.list_for(&user).await.map_err(|e| {
        warn!(target: "history", %user, error = %format!("{e:#}"), "history fetch failed");
        ApiError::Internal("Failed to fetch history")
    })?;
    Ok(Json(HistoryResp { history: rows }))
}
