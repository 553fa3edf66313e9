// src/telemetry.rs
//! Tracing setup and log hygiene helpers.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const ENV_DEV_LOG: &str = "TRUST_DEV_LOG";

/// Install the global subscriber. Safe to call more than once; later calls are no-ops.
/// Filter comes from `RUST_LOG`, defaulting to `info` for this crate and `warn` elsewhere.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("trust_lens=info,analysis=info,rules=info,warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

/// `SHUTTLE_ENV` values that count as a development deployment.
const DEV_ENVS: &[&str] = &["local", "development", "dev"];

/// Bytes of the SHA-256 digest kept in a short id; the hex form is twice as wide.
pub const SHORT_ID_BYTES: usize = 6;

/// Scored-text summaries at `info` are opt-in: `TRUST_DEV_LOG=1`, and only in a
/// debug build or a `SHUTTLE_ENV` listed in [`DEV_ENVS`].
pub fn dev_logging_enabled() -> bool {
    if std::env::var(ENV_DEV_LOG).is_ok_and(|v| v == "1") {
        cfg!(debug_assertions) || deployed_in_dev()
    } else {
        false
    }
}

fn deployed_in_dev() -> bool {
    std::env::var("SHUTTLE_ENV")
        .map(|env| DEV_ENVS.iter().any(|d| env.eq_ignore_ascii_case(d)))
        .unwrap_or(false)
}

/// Log-safe id for a text: the leading [`SHORT_ID_BYTES`] of its SHA-256, in hex.
pub fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    use std::fmt::Write as _;

    Sha256::digest(text.as_bytes())
        .iter()
        .take(SHORT_ID_BYTES)
        .fold(String::with_capacity(SHORT_ID_BYTES * 2), |mut out, b| {
            let _ = write!(out, "{b:02x}");
            out
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anon_hash_is_short_and_stable() {
        let a = anon_hash("It is alleged that...");
        assert_eq!(a.len(), SHORT_ID_BYTES * 2);
        assert_eq!(a, anon_hash("It is alleged that..."));
        assert_ne!(a, anon_hash("something else"));
    }

    #[test]
    fn short_id_is_lowercase_hex_prefix_of_the_digest() {
        use sha2::{Digest, Sha256};

        // SHA-256("abc") = ba7816bf8f01cfea...
        let id = anon_hash("abc");
        assert_eq!(id, "ba7816bf8f01");
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

        let full: String = Sha256::digest(b"abc").iter().map(|b| format!("{b:02x}")).collect();
        assert!(full.starts_with(&id));
    }

    #[test]
    #[serial_test::serial]
    fn dev_logging_needs_the_opt_in_flag() {
        std::env::remove_var(ENV_DEV_LOG);
        assert!(!dev_logging_enabled());

        std::env::set_var(ENV_DEV_LOG, "yes");
        assert!(!dev_logging_enabled());

        std::env::set_var(ENV_DEV_LOG, "1");
        std::env::set_var("SHUTTLE_ENV", "Local");
        assert!(dev_logging_enabled());

        std::env::remove_var(ENV_DEV_LOG);
        std::env::remove_var("SHUTTLE_ENV");
    }
}
