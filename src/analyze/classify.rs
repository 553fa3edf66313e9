//! Ordinal labels derived from category counters (never from the score).

use std::fmt;

use serde::{Deserialize, Serialize};

use super::tally::CategoryCounts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Level {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceVerification {
    #[serde(rename = "Appears Sourced")]
    AppearsSourced,
    #[serde(rename = "Unverified Claims Found")]
    UnverifiedClaimsFound,
    #[serde(rename = "Multiple Unverified Claims")]
    MultipleUnverifiedClaims,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::Low => "Low",
            Level::Medium => "Medium",
            Level::High => "High",
        })
    }
}

impl fmt::Display for SourceVerification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SourceVerification::AppearsSourced => "Appears Sourced",
            SourceVerification::UnverifiedClaimsFound => "Unverified Claims Found",
            SourceVerification::MultipleUnverifiedClaims => "Multiple Unverified Claims",
        })
    }
}

/// ≥3 High, ≥1 Medium, else Low.
pub fn sensationalism(count: usize) -> Level {
    match count {
        0 => Level::Low,
        1..=2 => Level::Medium,
        _ => Level::High,
    }
}

/// ≥2 High, ≥1 Medium, else Low.
pub fn biased_language(count: usize) -> Level {
    match count {
        0 => Level::Low,
        1 => Level::Medium,
        _ => Level::High,
    }
}

/// ≥2 multiple, ≥1 found, else sourced.
pub fn source_verification(count: usize) -> SourceVerification {
    match count {
        0 => SourceVerification::AppearsSourced,
        1 => SourceVerification::UnverifiedClaimsFound,
        _ => SourceVerification::MultipleUnverifiedClaims,
    }
}

pub fn classify(counts: &CategoryCounts) -> (Level, Level, SourceVerification) {
    (
        sensationalism(counts.sensational),
        biased_language(counts.biased),
        source_verification(counts.source),
    )
}
