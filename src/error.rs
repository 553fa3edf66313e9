// src/error.rs
//! Error kinds surfaced by the scoring engine and its collaborators.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Text missing or blank after trimming. No result is produced.
    #[error("Text is required for analysis")]
    InvalidInput,

    /// The rule-set provider failed. Never replaced by an empty set.
    #[error("rule set unavailable: {0:#}")]
    RuleSetUnavailable(anyhow::Error),

    /// A single rule could not be turned into a matcher; the rule is skipped.
    #[error("malformed rule `{term}`: {reason}")]
    MalformedRule { term: String, reason: String },

    /// Optional history write failed. Never reaches the caller of `/analyze`.
    #[error("history write failed: {0:#}")]
    PersistenceFailure(anyhow::Error),
}

impl AnalysisError {
    /// Short stable label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::InvalidInput => "invalid_input",
            AnalysisError::RuleSetUnavailable(_) => "rule_set_unavailable",
            AnalysisError::MalformedRule { .. } => "malformed_rule",
            AnalysisError::PersistenceFailure(_) => "persistence_failure",
        }
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
