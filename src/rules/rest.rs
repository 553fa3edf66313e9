//! Rule provider backed by the external `keywords` table.

use anyhow::Context;
use serde_json::Value;
use tracing::debug;

use super::{RuleProvider, RuleSet};
use crate::store::StoreClient;

pub const DEFAULT_RULES_TABLE: &str = "keywords";

pub struct RestRules {
    store: StoreClient,
    table: String,
}

impl RestRules {
    pub fn new(store: StoreClient, table: Option<&str>) -> Self {
        Self {
            store,
            table: table.unwrap_or(DEFAULT_RULES_TABLE).to_string(),
        }
    }
}

#[async_trait::async_trait]
impl RuleProvider for RestRules {
    async fn snapshot(&self) -> anyhow::Result<RuleSet> {
        let url = format!("{}?select=*", self.store.table_url(&self.table));
        let rows: Vec<Value> = self
            .store
            .get(&url)
            .send()
            .await
            .context("keywords fetch")?
            .error_for_status()
            .context("keywords non-2xx")?
            .json()
            .await
            .context("keywords body")?;

        let (rules, skipped) = RuleSet::from_rows(&rows);
        debug!(target: "rules", table = %self.table, rules = rules.len(), skipped, "keywords fetched");
        Ok(rules)
    }

    fn name(&self) -> &'static str {
        "rest"
    }
}
