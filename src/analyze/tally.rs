//! Per-call accumulator: running score plus one counter per category.
//!
//! The score starts at 100 and may go negative while penalties are applied;
//! it is clamped to [0, 100] and rounded only in [`MatchTally::final_score`].

use serde::Serialize;

use crate::rules::{Category, Rule};

pub const START_SCORE: f64 = 100.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryCounts {
    pub sensational: usize,
    pub biased: usize,
    pub source: usize,
}

impl CategoryCounts {
    pub fn get(&self, cat: Category) -> usize {
        match cat {
            Category::Sensational => self.sensational,
            Category::Biased => self.biased,
            Category::Source => self.source,
        }
    }

    fn bump(&mut self, cat: Category, n: usize) {
        let slot = match cat {
            Category::Sensational => &mut self.sensational,
            Category::Biased => &mut self.biased,
            Category::Source => &mut self.source,
        };
        *slot += n;
    }
}

#[derive(Debug, Clone)]
pub struct MatchTally {
    score: f64,
    counts: CategoryCounts,
}

impl Default for MatchTally {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchTally {
    pub fn new() -> Self {
        Self {
            score: START_SCORE,
            counts: CategoryCounts::default(),
        }
    }

    /// Charge `count × weight` and credit the rule's category. No-op for zero.
    pub fn apply_rule(&mut self, rule: &Rule, count: usize) {
        if count == 0 {
            return;
        }
        self.score -= rule.weight * count as f64;
        self.counts.bump(rule.category, count);
    }

    /// Flat deduction that does not touch any category counter.
    pub fn apply_penalty(&mut self, points: f64) {
        self.score -= points;
    }

    pub fn raw_score(&self) -> f64 {
        self.score
    }

    pub fn counts(&self) -> CategoryCounts {
        self.counts
    }

    pub fn final_score(&self) -> u8 {
        // Weights reach here only through `CompiledRule::compile`, which rejects
        // non-finite and non-positive values.
        self.score.clamp(0.0, 100.0).round() as u8
    }
}
