// src/config.rs
//! Service configuration: TOML file + env overrides.
//!
//! Resolution:
//! 1) `$TRUST_CONFIG_PATH` (must exist if set)
//! 2) `config/trust.toml` if present
//! 3) built-in defaults (file rules, in-memory history, static auth with no tokens)
//!
//! Env overrides applied last: `TRUST_RULES_PATH`, `TRUST_STORE_URL`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;

use crate::history::{DEFAULT_HISTORY_CAPACITY, DEFAULT_HISTORY_TABLE};
use crate::rules::file::DEFAULT_RULES_PATH;
use crate::rules::rest::DEFAULT_RULES_TABLE;
use crate::store::StoreClient;

pub const DEFAULT_CONFIG_PATH: &str = "config/trust.toml";
pub const ENV_CONFIG_PATH: &str = "TRUST_CONFIG_PATH";
pub const ENV_RULES_PATH: &str = "TRUST_RULES_PATH";
pub const ENV_STORE_URL: &str = "TRUST_STORE_URL";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub rules: RulesConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RulesSource {
    #[default]
    File,
    Rest,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RulesConfig {
    #[serde(default)]
    pub source: RulesSource,
    #[serde(default = "default_rules_path")]
    pub path: PathBuf,
    #[serde(default = "default_rules_table")]
    pub table: String,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            source: RulesSource::File,
            path: default_rules_path(),
            table: default_rules_table(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub url: Option<String>,
    /// Name of the env var holding the service key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key_env: default_api_key_env(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryBackend {
    #[default]
    Memory,
    Rest,
    Off,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    #[serde(default)]
    pub backend: HistoryBackend,
    #[serde(default = "default_history_capacity")]
    pub capacity: usize,
    #[serde(default = "default_history_table")]
    pub table: String,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            backend: HistoryBackend::Memory,
            capacity: default_history_capacity(),
            table: default_history_table(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthBackend {
    #[default]
    Static,
    Rest,
    Off,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub backend: AuthBackend,
    /// token → user id, for the `static` backend.
    #[serde(default)]
    pub tokens: HashMap<String, String>,
}

fn default_rules_path() -> PathBuf {
    PathBuf::from(DEFAULT_RULES_PATH)
}
fn default_rules_table() -> String {
    DEFAULT_RULES_TABLE.to_string()
}
fn default_api_key_env() -> String {
    "TRUST_STORE_API_KEY".to_string()
}
fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}
fn default_history_table() -> String {
    DEFAULT_HISTORY_TABLE.to_string()
}

impl AppConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("parsing trust config TOML")
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading trust config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Load using env var + fallbacks, then apply env overrides.
    pub fn load() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                bail!("{ENV_CONFIG_PATH} points to non-existent path {}", pb.display());
            }
            Self::load_from(&pb)?
        } else {
            let default = PathBuf::from(DEFAULT_CONFIG_PATH);
            if default.exists() {
                Self::load_from(&default)?
            } else {
                Self::default()
            }
        };
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(p) = non_empty_env(ENV_RULES_PATH) {
            self.rules.path = PathBuf::from(p);
        }
        if let Some(u) = non_empty_env(ENV_STORE_URL) {
            self.store.url = Some(u);
        }
    }

    /// Build the store client required by any `rest` backend.
    pub fn store_client(&self) -> Result<StoreClient> {
        let url = self
            .store
            .url
            .as_deref()
            .ok_or_else(|| anyhow!("[store] url is required for rest backends"))?;
        let key = std::env::var(&self.store.api_key_env)
            .map_err(|_| anyhow!("missing {} env var", self.store.api_key_env))?;
        StoreClient::new(url, key)
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
