//! Tracing setup for the `ironsieve` binary.
//!
//! Reports (verdicts, listings, validation results) are written to stdout by
//! [`crate::output::OutputWriter`]; diagnostics from the filter engine go to
//! stderr, so `ironsieve eval --output json events.jsonl > report.json` stays
//! clean even at `--log-level debug`.

use anyhow::{Result, bail};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use ironsieve_core::config::GeneralConfig;

/// Install the global subscriber from `[general]` (`log_level`, `log_format`).
///
/// `RUST_LOG` overrides `log_level` when set. `log_format` is `json` or `pretty`.
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let registry = tracing_subscriber::registry().with(filter);
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let installed = match config.log_format.as_str() {
        "json" => registry.with(stderr_layer.json()).try_init(),
        "pretty" => registry.with(stderr_layer.pretty()).try_init(),
        other => bail!("unknown log format '{other}', expected 'json' or 'pretty'"),
    };
    installed.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_format_is_rejected() {
        let config = GeneralConfig {
            log_level: "info".to_owned(),
            log_format: "xml".to_owned(),
        };
        let err = init_tracing(&config).unwrap_err();
        assert!(err.to_string().contains("unknown log format 'xml'"));
    }
}
