//! Tracing initialization (§10).
//!
//! A single entry point, called once from `main`, choosing `pretty` or
//! `json` formatting from configuration — the same split the teacher's own
//! startup path makes.

use crate::config::LogFormat;

/// Initialize the global `tracing` subscriber. `RUST_LOG` overrides the
/// default `info` level.
pub fn init(format: LogFormat) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(true)
                .json()
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(true)
                .init();
        }
    }
}
