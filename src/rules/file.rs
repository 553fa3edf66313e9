//! File-backed rule provider (`config/keywords.json` by default).
//!
//! The file is re-read whenever its mtime or length changes. A read or parse
//! failure is returned to the caller; the provider never falls back to an empty
//! set. A rewrite that keeps both the mtime and the byte length is not noticed.

use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::SystemTime;

use anyhow::{anyhow, Context};
use tracing::info;

use super::{parse_rule_document, RuleProvider, RuleSet};

pub const DEFAULT_RULES_PATH: &str = "config/keywords.json";

#[derive(Debug)]
pub struct FileRules {
    path: PathBuf,
    inner: RwLock<State>,
}

#[derive(Debug, Default)]
struct State {
    rules: Option<RuleSet>,
    stamp: Option<FileStamp>,
}

/// What the cache is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: SystemTime,
    len: u64,
}

impl FileRules {
    /// Create with a path (defaults to `config/keywords.json` if `None`).
    pub fn new(path: Option<&Path>) -> Self {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_RULES_PATH));
        Self {
            path,
            inner: RwLock::new(State::default()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn cached(&self, stamp: FileStamp) -> anyhow::Result<Option<RuleSet>> {
        let guard = self
            .inner
            .read()
            .map_err(|_| anyhow!("rule cache lock poisoned"))?;
        if guard.stamp == Some(stamp) {
            return Ok(guard.rules.clone());
        }
        Ok(None)
    }
}

/// Load and coerce a rule file; the extension selects TOML or JSON.
pub async fn load_rules_file(path: &Path) -> anyhow::Result<(RuleSet, usize)> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading rules from {}", path.display()))?;
    parse_rules_content(path, &content)
}

fn parse_rules_content(path: &Path, content: &str) -> anyhow::Result<(RuleSet, usize)> {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let rows = parse_rule_document(content, &ext)
        .with_context(|| format!("parsing rules from {}", path.display()))?;
    Ok(RuleSet::from_rows(&rows))
}

#[async_trait::async_trait]
impl RuleProvider for FileRules {
    async fn snapshot(&self) -> anyhow::Result<RuleSet> {
        let stamp = tokio::fs::metadata(&self.path)
            .await
            .and_then(|m| {
                Ok(FileStamp {
                    modified: m.modified()?,
                    len: m.len(),
                })
            })
            .with_context(|| format!("stat rules file {}", self.path.display()))?;

        if let Some(rules) = self.cached(stamp)? {
            return Ok(rules);
        }

        let (rules, skipped) = load_rules_file(&self.path).await?;
        info!(
            target: "rules",
            path = %self.path.display(),
            rules = rules.len(),
            skipped,
            "rule file (re)loaded"
        );

        let mut guard = self
            .inner
            .write()
            .map_err(|_| anyhow!("rule cache lock poisoned"))?;
        guard.rules = Some(rules.clone());
        guard.stamp = Some(stamp);
        Ok(rules)
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
