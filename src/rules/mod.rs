// src/rules/mod.rs
//! Weighted lexical rules and the providers that supply rule-set snapshots.
//!
//! Rows arrive from an external store as untyped JSON. They are coerced into
//! typed [`Rule`]s here, at the boundary; rows that do not coerce are skipped
//! with a warning so that nothing untyped reaches the matcher.
//!
//! Providers:
//! - [`StaticRules`]: fixed in-memory snapshot (tests, embedding)
//! - [`FileRules`]:   JSON/TOML file, re-read when its mtime changes
//! - [`RestRules`]:   PostgREST-style table over HTTP

pub mod file;
pub mod rest;

use std::fmt;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::AnalysisError;

pub use file::FileRules;
pub use rest::RestRules;

/// Why a rule match is penalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Sensational,
    Biased,
    Source,
}

impl Category {
    /// Case-insensitive parse of the store's `type` column.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "sensational" => Some(Category::Sensational),
            "biased" => Some(Category::Biased),
            "source" => Some(Category::Source),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Category::Sensational => "sensational",
            Category::Biased => "biased",
            Category::Source => "source",
        };
        f.write_str(s)
    }
}

/// A weighted lexical pattern. `weight` is the deduction per occurrence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rule {
    pub term: String,
    pub weight: f64,
    pub category: Category,
}

impl Rule {
    pub fn new(term: impl Into<String>, weight: f64, category: Category) -> Self {
        Self {
            term: term.into(),
            weight,
            category,
        }
    }
}

/// Read-only snapshot of all active rules for one or more analyses.
/// Cloning is cheap; concurrent analyses share the same backing slice.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Arc<[Rule]>,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self {
            rules: rules.into(),
        }
    }

    /// Coerce raw store rows. Returns the snapshot plus the number of skipped rows.
    pub fn from_rows(rows: &[Value]) -> (Self, usize) {
        let mut rules = Vec::with_capacity(rows.len());
        let mut skipped = 0usize;
        for (idx, row) in rows.iter().enumerate() {
            match coerce_row(row) {
                Ok(rule) => rules.push(rule),
                Err(e) => {
                    skipped += 1;
                    warn!(target: "rules", row = idx, error = %e, "skipping malformed rule row");
                }
            }
        }
        (Self::new(rules), skipped)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Coerce one untyped row (`term`, `weight`, `type` | `category`) into a [`Rule`].
pub fn coerce_row(row: &Value) -> anyhow::Result<Rule> {
    let obj = row
        .as_object()
        .ok_or_else(|| anyhow!("row is not an object"))?;

    let term = match obj.get("term") {
        Some(Value::String(s)) => s.clone(),
        Some(_) => bail!("`term` is not a string"),
        None => bail!("missing `term`"),
    };

    let weight = match obj.get("weight") {
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| anyhow!("`weight` is not representable as f64"))?,
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .with_context(|| format!("`weight` {s:?} is not numeric"))?,
        Some(_) => bail!("`weight` is not a number"),
        None => bail!("missing `weight`"),
    };
    if !weight.is_finite() || weight <= 0.0 {
        bail!("`weight` must be a positive finite number, got {weight}");
    }

    let raw_cat = obj
        .get("type")
        .or_else(|| obj.get("category"))
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("missing `type`"))?;
    let category =
        Category::parse(raw_cat).ok_or_else(|| anyhow!("unknown rule type {raw_cat:?}"))?;

    Ok(Rule {
        term,
        weight,
        category,
    })
}

/// Parse a rule document. JSON accepts a bare array of rows or `{ "keywords": [...] }`;
/// TOML expects `[[keywords]]` tables.
pub fn parse_rule_document(content: &str, hint_ext: &str) -> anyhow::Result<Vec<Value>> {
    let doc: Value = if hint_ext.eq_ignore_ascii_case("toml") {
        toml::from_str(content).context("parsing TOML rule document")?
    } else {
        serde_json::from_str(content).context("parsing JSON rule document")?
    };

    match doc {
        Value::Array(rows) => Ok(rows),
        Value::Object(mut map) => match map.remove("keywords") {
            Some(Value::Array(rows)) => Ok(rows),
            Some(_) => bail!("`keywords` is not a list"),
            None => bail!("rule document has no `keywords` list"),
        },
        _ => bail!("unsupported rule document shape"),
    }
}

/// Source of rule-set snapshots, injected into the service.
#[async_trait::async_trait]
pub trait RuleProvider: Send + Sync {
    /// Full current collection of rules. Any failure is fatal to the request.
    async fn snapshot(&self) -> anyhow::Result<RuleSet>;
    fn name(&self) -> &'static str;
}

pub type DynRuleProvider = Arc<dyn RuleProvider>;

/// Fetch a snapshot and map failures to [`AnalysisError::RuleSetUnavailable`].
pub async fn fetch_snapshot(provider: &dyn RuleProvider) -> Result<RuleSet, AnalysisError> {
    provider.snapshot().await.map_err(|e| {
        warn!(target: "rules", provider = provider.name(), error = %format!("{e:#}"), "rule set fetch failed");
        AnalysisError::RuleSetUnavailable(e)
    })
}

/// Fixed in-memory snapshot.
#[derive(Debug, Clone, Default)]
pub struct StaticRules {
    rules: RuleSet,
}

impl StaticRules {
    pub fn new(rules: RuleSet) -> Self {
        Self { rules }
    }
}

#[async_trait::async_trait]
impl RuleProvider for StaticRules {
    async fn snapshot(&self) -> anyhow::Result<RuleSet> {
        Ok(self.rules.clone())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn coerces_well_formed_rows() {
        let rule = coerce_row(&json!({ "term": "alleged", "weight": 5, "type": "Biased" })).unwrap();
        assert_eq!(rule, Rule::new("alleged", 5.0, Category::Biased));

        let rule = coerce_row(&json!({ "term": "!!!", "weight": "2.5", "category": "sensational" }))
            .unwrap();
        assert_eq!(rule.category, Category::Sensational);
        assert!((rule.weight - 2.5).abs() < 1e-9);
    }

    #[test]
    fn rejects_bad_rows() {
        assert!(coerce_row(&json!("alleged")).is_err());
        assert!(coerce_row(&json!({ "term": 3, "weight": 1, "type": "biased" })).is_err());
        assert!(coerce_row(&json!({ "term": "x", "weight": 0, "type": "biased" })).is_err());
        assert!(coerce_row(&json!({ "term": "x", "weight": -2, "type": "biased" })).is_err());
        assert!(coerce_row(&json!({ "term": "x", "weight": "lots", "type": "biased" })).is_err());
        assert!(coerce_row(&json!({ "term": "x", "weight": 1, "type": "opinion" })).is_err());
        assert!(coerce_row(&json!({ "term": "x", "weight": 1 })).is_err());
    }

    #[test]
    fn from_rows_skips_and_counts() {
        let rows = vec![
            json!({ "term": "shocking", "weight": 4, "type": "sensational" }),
            json!({ "term": "oops" }),
            json!({ "term": "reportedly", "weight": 3, "type": "source" }),
        ];
        let (set, skipped) = RuleSet::from_rows(&rows);
        assert_eq!(set.len(), 2);
        assert_eq!(skipped, 1);
    }

    #[test]
    fn parses_json_and_toml_documents() {
        let json_doc = r#"[{"term":"a","weight":1,"type":"biased"}]"#;
        assert_eq!(parse_rule_document(json_doc, "json").unwrap().len(), 1);

        let wrapped = r#"{"keywords":[{"term":"a","weight":1,"type":"biased"}]}"#;
        assert_eq!(parse_rule_document(wrapped, "json").unwrap().len(), 1);

        let toml_doc = r#"
[[keywords]]
term = "so-called"
weight = 4
type = "biased"

[[keywords]]
term = "sources say"
weight = 3.5
type = "source"
"#;
        let rows = parse_rule_document(toml_doc, "toml").unwrap();
        let (set, skipped) = RuleSet::from_rows(&rows);
        assert_eq!(set.len(), 2);
        assert_eq!(skipped, 0);

        assert!(parse_rule_document(r#"{"rules":[]}"#, "json").is_err());
        assert!(parse_rule_document("not json", "json").is_err());
    }

    #[tokio::test]
    async fn static_provider_returns_shared_snapshot() {
        let provider = StaticRules::new(RuleSet::new(vec![Rule::new(
            "spin",
            2.0,
            Category::Biased,
        )]));
        let a = provider.snapshot().await.unwrap();
        let b = provider.snapshot().await.unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(b.iter().next().map(|r| r.term.as_str()), Some("spin"));
    }
}
