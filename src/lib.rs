// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod analyze;
pub mod api;
pub mod config;
pub mod error;
pub mod history;
pub mod identity;
pub mod metrics;
pub mod rules;
pub mod store;
pub mod telemetry;

// ---- Re-exports for stable public API ----
pub use crate::analyze::{analyze_text, Analysis, AnalysisResult, Analyzer, Level, SourceVerification};
pub use crate::api::{router, AppState};
pub use crate::error::AnalysisError;
pub use crate::rules::{Category, Rule, RuleProvider, RuleSet};
