// tests/history_flow.rs
//
// Optional history hand-off: authenticated analyses are stored after the
// response, anonymous ones are not, and a failing store never changes the
// response.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value as Json};
use tower::ServiceExt as _;

use trust_lens::analyze::{AnalysisResult, Level, SourceVerification};
use trust_lens::api::{self, persist_result, AppState};
use trust_lens::history::{HistoryEntry, HistoryStore, MemoryHistory, SNIPPET_CHARS};
use trust_lens::identity::{StaticTokens, UserId};
use trust_lens::rules::StaticRules;
use trust_lens::{AnalysisError, Category, Rule, RuleSet};

const BODY_LIMIT: usize = 1024 * 1024;

struct BrokenStore;

#[async_trait::async_trait]
impl HistoryStore for BrokenStore {
    async fn record(&self, _entry: HistoryEntry) -> anyhow::Result<()> {
        anyhow::bail!("disk full")
    }
    async fn list_for(&self, _user: &UserId) -> anyhow::Result<Vec<HistoryEntry>> {
        anyhow::bail!("disk full")
    }
    fn name(&self) -> &'static str {
        "broken"
    }
}

fn rules() -> Arc<StaticRules> {
    Arc::new(StaticRules::new(RuleSet::new(vec![Rule::new(
        "alleged",
        5.0,
        Category::Biased,
    )])))
}

fn tokens() -> Arc<StaticTokens> {
    Arc::new(StaticTokens::new(HashMap::from([(
        "tok-alice".to_string(),
        "alice".to_string(),
    )])))
}

fn app_with(history: Arc<dyn HistoryStore>) -> Router {
    let state = AppState::new(rules())
        .with_history(history)
        .with_identity(tokens());
    api::router(state)
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Json) {
    let resp = app.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Json::Null))
}

fn analyze_req(text: &str, token: Option<&str>) -> Request<Body> {
    let mut b = Request::builder()
        .method("POST")
        .uri("/analyze")
        .header("content-type", "application/json");
    if let Some(t) = token {
        b = b.header("authorization", format!("Bearer {t}"));
    }
    b.body(Body::from(json!({ "text": text }).to_string())).unwrap()
}

fn history_req(token: Option<&str>) -> Request<Body> {
    let mut b = Request::builder().method("GET").uri("/history");
    if let Some(t) = token {
        b = b.header("authorization", format!("Bearer {t}"));
    }
    b.body(Body::empty()).unwrap()
}

/// The write is detached from the response; poll briefly for it.
async fn wait_for_len(store: &MemoryHistory, n: usize) {
    for _ in 0..50 {
        if store.len() >= n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn authenticated_analysis_is_recorded_with_snippet() {
    let store = Arc::new(MemoryHistory::with_capacity(10));
    let app = app_with(store.clone());

    let long_text = format!("It is alleged {}", "x".repeat(400));
    let (status, _) = send(app.clone(), analyze_req(&long_text, Some("tok-alice"))).await;
    assert_eq!(status, StatusCode::OK);

    wait_for_len(&store, 1).await;
    let rows = store.list_for(&UserId::new("alice")).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].text_snippet.chars().count(), SNIPPET_CHARS);
    assert_eq!(rows[0].trust_score, 95);
    assert_eq!(rows[0].analysis_details.biased_language, Level::Medium);

    let (status, v) = send(app, history_req(Some("tok-alice"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["history"].as_array().map(Vec::len), Some(1));
    assert_eq!(v["history"][0]["user_id"], "alice");
}

#[tokio::test]
async fn anonymous_and_invalid_tokens_are_not_recorded() {
    let store = Arc::new(MemoryHistory::with_capacity(10));
    let app = app_with(store.clone());

    let (s1, _) = send(app.clone(), analyze_req("alleged", None)).await;
    let (s2, _) = send(app, analyze_req("alleged", Some("bogus"))).await;
    assert_eq!(s1, StatusCode::OK);
    assert_eq!(s2, StatusCode::OK);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(store.is_empty());
}

#[tokio::test]
async fn failing_store_does_not_affect_response() {
    let app = app_with(Arc::new(BrokenStore));
    let (status, v) = send(app, analyze_req("It is alleged.", Some("tok-alice"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["trustScore"], 95);
}

#[tokio::test]
async fn persist_result_reports_failure_kinds() {
    let result = AnalysisResult {
        trust_score: 70,
        sensationalism: Level::High,
        biased_language: Level::Low,
        source_verification: SourceVerification::MultipleUnverifiedClaims,
    };

    let err = persist_result(&BrokenStore, tokens().as_ref(), "tok-alice", "t", result)
        .await
        .unwrap_err();
    assert!(matches!(err, AnalysisError::PersistenceFailure(_)));

    let mem = MemoryHistory::default();
    let who = persist_result(&mem, tokens().as_ref(), "nope", "t", result)
        .await
        .unwrap();
    assert!(who.is_none());
    assert!(mem.is_empty());
}

#[tokio::test]
async fn history_requires_valid_token() {
    let app = app_with(Arc::new(MemoryHistory::default()));

    let (status, v) = send(app.clone(), history_req(None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(v["error"], "Authorization required");

    let (status, v) = send(app, history_req(Some("bogus"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(v["error"], "Invalid token");
}

#[tokio::test]
async fn history_store_failure_is_500() {
    let app = app_with(Arc::new(BrokenStore));
    let (status, v) = send(app, history_req(Some("tok-alice"))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(v["error"], "Failed to fetch history");
}
