//! history.rs: per-user record of past analyses.
//!
//! The engine never writes here. The HTTP layer hands a finished
//! [`AnalysisResult`] to a [`HistoryStore`] after responding, and a failed
//! write is logged and otherwise ignored.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analyze::AnalysisResult;
use crate::identity::UserId;
use crate::store::StoreClient;

/// Characters of input text kept with a history entry.
pub const SNIPPET_CHARS: usize = 200;
pub const DEFAULT_HISTORY_TABLE: &str = "analysis_history";
pub const DEFAULT_HISTORY_CAPACITY: usize = 2000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user_id: UserId,
    pub text_snippet: String,
    pub trust_score: u8,
    pub analysis_details: AnalysisResult,
    pub analyzed_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(user_id: UserId, text: &str, result: AnalysisResult) -> Self {
        Self {
            id: None,
            user_id,
            text_snippet: snippet(text),
            trust_score: result.trust_score,
            analysis_details: result,
            analyzed_at: Utc::now(),
        }
    }
}

/// First [`SNIPPET_CHARS`] characters (not bytes) of `text`.
pub fn snippet(text: &str) -> String {
    text.chars().take(SNIPPET_CHARS).collect()
}

#[async_trait::async_trait]
pub trait HistoryStore: Send + Sync {
    async fn record(&self, entry: HistoryEntry) -> anyhow::Result<()>;
    /// Entries for one user, newest first.
    async fn list_for(&self, user: &UserId) -> anyhow::Result<Vec<HistoryEntry>>;
    fn name(&self) -> &'static str;
}

pub type DynHistoryStore = Arc<dyn HistoryStore>;

/// Bounded in-process store; the oldest entries are evicted past `cap`.
#[derive(Debug)]
pub struct MemoryHistory {
    inner: Mutex<VecDeque<HistoryEntry>>,
    cap: usize,
    next_id: Mutex<u64>,
}

impl MemoryHistory {
    pub fn with_capacity(cap: usize) -> Self {
        let cap = cap.clamp(1, 100_000);
        Self {
            inner: Mutex::new(VecDeque::with_capacity(cap.min(10_000))),
            cap,
            next_id: Mutex::new(1),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryHistory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}

#[async_trait::async_trait]
impl HistoryStore for MemoryHistory {
    async fn record(&self, mut entry: HistoryEntry) -> anyhow::Result<()> {
        {
            let mut id = self
                .next_id
                .lock()
                .map_err(|_| anyhow!("history id lock poisoned"))?;
            entry.id = Some(id.to_string());
            *id += 1;
        }

        let mut v = self
            .inner
            .lock()
            .map_err(|_| anyhow!("history lock poisoned"))?;
        v.push_back(entry);
        while v.len() > self.cap {
            v.pop_front();
        }
        Ok(())
    }

    async fn list_for(&self, user: &UserId) -> anyhow::Result<Vec<HistoryEntry>> {
        let v = self
            .inner
            .lock()
            .map_err(|_| anyhow!("history lock poisoned"))?;
        let mut out: Vec<HistoryEntry> = v.iter().filter(|e| &e.user_id == user).cloned().collect();
        out.sort_by(|a, b| b.analyzed_at.cmp(&a.analyzed_at));
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Store backed by the external `analysis_history` table.
pub struct RestHistory {
    store: StoreClient,
    table: String,
}

impl RestHistory {
    pub fn new(store: StoreClient, table: Option<&str>) -> Self {
        Self {
            store,
            table: table.unwrap_or(DEFAULT_HISTORY_TABLE).to_string(),
        }
    }

    fn list_request(&self, user: &UserId) -> reqwest::RequestBuilder {
        self.store
            .get(&self.store.table_url(&self.table))
            .query(&list_query(user))
    }
}

/// PostgREST filter for one user's rows, newest first. Values are
/// form-encoded by the request builder.
fn list_query(user: &UserId) -> [(&'static str, String); 3] {
    [
        ("select", "*".to_string()),
        ("user_id", format!("eq.{user}")),
        ("order", "analyzed_at.desc".to_string()),
    ]
}

#[async_trait::async_trait]
impl HistoryStore for RestHistory {
    async fn record(&self, entry: HistoryEntry) -> anyhow::Result<()> {
        self.store
            .post(&self.store.table_url(&self.table))
            .json(&entry)
            .send()
            .await
            .context("history insert")?
            .error_for_status()
            .context("history insert non-2xx")?;
        Ok(())
    }

    async fn list_for(&self, user: &UserId) -> anyhow::Result<Vec<HistoryEntry>> {
        let rows: Vec<HistoryEntry> = self
            .list_request(user)
            .send()
            .await
            .context("history select")?
            .error_for_status()
            .context("history select non-2xx")?
            .json()
            .await
            .context("history body")?;
        Ok(rows)
    }

    fn name(&self) -> &'static str {
        "rest"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::{Level, SourceVerification};
    use chrono::Duration;

    fn result(score: u8) -> AnalysisResult {
        AnalysisResult {
            trust_score: score,
            sensationalism: Level::Low,
            biased_language: Level::Low,
            source_verification: SourceVerification::AppearsSourced,
        }
    }

    #[test]
    fn snippet_counts_chars_not_bytes() {
        let text = "é".repeat(300);
        let s = snippet(&text);
        assert_eq!(s.chars().count(), SNIPPET_CHARS);
        assert_eq!(snippet("short"), "short");
    }

    #[tokio::test]
    async fn lists_per_user_newest_first() {
        let h = MemoryHistory::with_capacity(10);
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");

        let mut old = HistoryEntry::new(alice.clone(), "old text", result(80));
        old.analyzed_at = Utc::now() - Duration::minutes(5);
        h.record(old).await.unwrap();
        h.record(HistoryEntry::new(bob.clone(), "bob text", result(50)))
            .await
            .unwrap();
        h.record(HistoryEntry::new(alice.clone(), "new text", result(90)))
            .await
            .unwrap();

        let rows = h.list_for(&alice).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].text_snippet, "new text");
        assert_eq!(rows[1].trust_score, 80);
        assert!(rows.iter().all(|r| r.id.is_some()));
    }

    #[tokio::test]
    async fn evicts_oldest_beyond_capacity() {
        let h = MemoryHistory::with_capacity(2);
        let u = UserId::new("u");
        for i in 0..3u8 {
            h.record(HistoryEntry::new(u.clone(), &format!("t{i}"), result(i)))
                .await
                .unwrap();
        }
        assert_eq!(h.len(), 2);
        let rows = h.list_for(&u).await.unwrap();
        assert!(rows.iter().all(|r| r.text_snippet != "t0"));
    }

    #[test]
    fn list_filter_encodes_user_id() {
        let store = StoreClient::new("https://store.example.org", "k").unwrap();
        let h = RestHistory::new(store, None);
        let req = h
            .list_request(&UserId::new("a&order=x,b"))
            .build()
            .unwrap();

        let url = req.url();
        assert_eq!(url.path(), "/rest/v1/analysis_history");
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("select".to_string(), "*".to_string()),
                ("user_id".to_string(), "eq.a&order=x,b".to_string()),
                ("order".to_string(), "analyzed_at.desc".to_string()),
            ]
        );
        assert!(url.query().unwrap().contains("user_id=eq.a%26order%3Dx%2Cb"));
    }

    #[test]
    fn entry_wire_shape() {
        let e = HistoryEntry::new(UserId::new("u1"), "hello", result(77));
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v["user_id"], "u1");
        assert_eq!(v["text_snippet"], "hello");
        assert_eq!(v["trust_score"], 77);
        assert_eq!(v["analysis_details"]["trustScore"], 77);
        assert!(v.get("id").is_none());
    }
}
