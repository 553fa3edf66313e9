//! Per-rule matcher: counts non-overlapping, case-insensitive occurrences of a term.
//!
//! Terms with at least one alphanumeric character are word-bounded on both
//! sides (`spin` does not hit `spindle`). Terms made only of punctuation are
//! searched literally, since word boundaries are undefined for them.
//! Matching uses the `regex` crate, so time is linear in the text length.

use regex::{Regex, RegexBuilder};

use crate::error::AnalysisError;
use crate::rules::Rule;

/// Upper bound for one compiled term; larger terms are rejected as malformed.
const TERM_REGEX_SIZE_LIMIT: usize = 1 << 20;

#[derive(Debug, Clone)]
pub struct CompiledRule {
    rule: Rule,
    re: Regex,
}

impl CompiledRule {
    pub fn compile(rule: &Rule) -> Result<Self, AnalysisError> {
        if rule.term.trim().is_empty() {
            return Err(AnalysisError::MalformedRule {
                term: rule.term.clone(),
                reason: "empty term".into(),
            });
        }
        if !rule.weight.is_finite() || rule.weight <= 0.0 {
            return Err(AnalysisError::MalformedRule {
                term: rule.term.clone(),
                reason: "weight must be a positive finite number".into(),
            });
        }

        let escaped = regex::escape(&rule.term);
        let pattern = if is_punctuation_only(&rule.term) {
            escaped
        } else {
            format!(r"\b{escaped}\b")
        };

        let re = RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .size_limit(TERM_REGEX_SIZE_LIMIT)
            .build()
            .map_err(|e| AnalysisError::MalformedRule {
                term: rule.term.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            rule: rule.clone(),
            re,
        })
    }

    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    /// Non-overlapping occurrences of the term in `text`. Zero is common.
    pub fn count(&self, text: &str) -> usize {
        self.re.find_iter(text).count()
    }
}

/// True if the term contains no alphanumeric character at all.
pub fn is_punctuation_only(term: &str) -> bool {
    !term.chars().any(char::is_alphanumeric)
}
