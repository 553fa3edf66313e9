//! Structural signals scored independently of the rule set.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

pub const ALL_CAPS_PENALTY: f64 = 5.0;
pub const PUNCTUATION_RUN_PENALTY: f64 = 3.0;
pub const CLICKBAIT_PENALTY: f64 = 15.0;

/// Known clickbait constructions, matched as lowercase substrings.
pub const CLICKBAIT_PHRASES: &[&str] = &[
    "you won't believe",
    "what happened next",
    "this will shock you",
];

static RE_ALL_CAPS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Z]{4,}").expect("all-caps regex"));
static RE_PUNCT_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[!?]{2,}").expect("punctuation-run regex"));

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HeuristicSignals {
    /// Four or more consecutive uppercase ASCII letters somewhere in the text.
    pub all_caps: bool,
    /// Number of runs of two or more `!`/`?` characters.
    pub punctuation_runs: usize,
    /// At least one clickbait phrase present.
    pub clickbait: bool,
}

impl HeuristicSignals {
    pub fn detect(text: &str) -> Self {
        Self {
            all_caps: RE_ALL_CAPS.is_match(text),
            punctuation_runs: RE_PUNCT_RUN.find_iter(text).count(),
            clickbait: has_clickbait(text),
        }
    }

    /// Total deduction. Clickbait is charged once no matter how many phrases hit.
    pub fn penalty(&self) -> f64 {
        let mut p = 0.0;
        if self.all_caps {
            p += ALL_CAPS_PENALTY;
        }
        p += self.punctuation_runs as f64 * PUNCTUATION_RUN_PENALTY;
        if self.clickbait {
            p += CLICKBAIT_PENALTY;
        }
        p
    }

    /// Human-readable issue names, in penalty order.
    pub fn issues(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.all_caps {
            out.push("Excessive capitalization".to_string());
        }
        if self.punctuation_runs > 0 {
            out.push("Excessive punctuation".to_string());
        }
        if self.clickbait {
            out.push("Clickbait phrases".to_string());
        }
        out
    }
}

fn has_clickbait(text: &str) -> bool {
    // Fold typographic apostrophes so "won’t" reads as "won't".
    let lower = text.to_lowercase().replace(['\u{2018}', '\u{2019}'], "'");
    CLICKBAIT_PHRASES.iter().any(|p| lower.contains(p))
}
