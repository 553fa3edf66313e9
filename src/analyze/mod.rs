// src/analyze/mod.rs
//! Trust-scoring pipeline: matcher (per rule) → heuristics → tally → classify → result.
//!
//! Pure and synchronous. Each call owns its [`MatchTally`]; the rule snapshot is
//! only read, so one [`Analyzer`] can serve concurrent calls.

pub mod classify;
pub mod heuristics;
pub mod matcher;
pub mod tally;

use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{AnalysisError, Result};
use crate::metrics::RULES_SKIPPED_TOTAL;
use crate::rules::{Category, RuleSet};
use crate::telemetry::{anon_hash, dev_logging_enabled};

pub use classify::{Level, SourceVerification};
pub use heuristics::HeuristicSignals;
pub use matcher::CompiledRule;
pub use tally::{CategoryCounts, MatchTally};

/// Output record of one analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub trust_score: u8,
    pub sensationalism: Level,
    pub biased_language: Level,
    pub source_verification: SourceVerification,
}

/// One rule that matched at least once.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleHit {
    pub term: String,
    pub category: Category,
    pub count: usize,
    pub penalty: f64,
}

/// Result plus the intermediate numbers, for logs and diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub result: AnalysisResult,
    pub counts: CategoryCounts,
    pub raw_score: f64,
    pub word_count: usize,
    pub heuristics: HeuristicSignals,
    pub hits: Vec<RuleHit>,
    pub issues: Vec<String>,
}

/// Compiled matchers for one rule-set snapshot.
#[derive(Debug, Clone)]
pub struct Analyzer {
    rules: Vec<CompiledRule>,
    skipped: usize,
}

impl Analyzer {
    /// Compile every rule; malformed ones are logged and skipped.
    pub fn new(rules: &RuleSet) -> Self {
        let mut compiled = Vec::with_capacity(rules.len());
        let mut skipped = 0usize;
        for rule in rules.iter() {
            match CompiledRule::compile(rule) {
                Ok(c) => compiled.push(c),
                Err(e) => {
                    skipped += 1;
                    warn!(target: "analysis", error = %e, "skipping rule");
                }
            }
        }
        if skipped > 0 {
            counter!(RULES_SKIPPED_TOTAL).increment(skipped as u64);
        }
        Self {
            rules: compiled,
            skipped,
        }
    }

    /// Number of rules dropped at compile time.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn analyze(&self, text: &str) -> Result<AnalysisResult> {
        self.analyze_detailed(text).map(|a| a.result)
    }

    pub fn analyze_detailed(&self, text: &str) -> Result<Analysis> {
        if text.trim().is_empty() {
            return Err(AnalysisError::InvalidInput);
        }

        let mut tally = MatchTally::new();
        let mut hits = Vec::new();
        let mut issues = Vec::new();

        for c in &self.rules {
            let count = c.count(text);
            if count == 0 {
                continue;
            }
            let rule = c.rule();
            tally.apply_rule(rule, count);
            issues.push(format!("\"{}\" ({}x)", rule.term, count));
            hits.push(RuleHit {
                term: rule.term.clone(),
                category: rule.category,
                count,
                penalty: rule.weight * count as f64,
            });
        }

        let heuristics = HeuristicSignals::detect(text);
        tally.apply_penalty(heuristics.penalty());
        issues.extend(heuristics.issues());

        let counts = tally.counts();
        let (sensationalism, biased_language, source_verification) = classify::classify(&counts);
        let result = AnalysisResult {
            trust_score: tally.final_score(),
            sensationalism,
            biased_language,
            source_verification,
        };

        let analysis = Analysis {
            result,
            counts,
            raw_score: tally.raw_score(),
            word_count: text.split_whitespace().count(),
            heuristics,
            hits,
            issues,
        };
        log_analysis(text, &analysis);
        Ok(analysis)
    }
}

/// One-shot convenience: compile `rules` and score `text`.
pub fn analyze_text(text: &str, rules: &RuleSet) -> Result<AnalysisResult> {
    Analyzer::new(rules).analyze(text)
}

// Never logs raw text; only a hashed id.
fn log_analysis(text: &str, a: &Analysis) {
    let id = anon_hash(text);
    debug!(
        target: "analysis",
        %id,
        score = a.result.trust_score,
        raw = a.raw_score,
        sensational = a.counts.sensational,
        biased = a.counts.biased,
        source = a.counts.source,
        words = a.word_count,
        issues = ?a.issues,
        "analysis complete"
    );
    if dev_logging_enabled() {
        info!(target: "analysis", %id, score = a.result.trust_score, issues = ?a.issues);
    }
}
