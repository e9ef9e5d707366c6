//! Logging initialisation via tracing-subscriber.
//!
//! Call [`init`] once at startup. `RUST_LOG` takes precedence; otherwise
//! the `[logging].level` from config applies. Output goes to stderr so
//! that stdout stays clean for results (`--json`).

use anyhow::{bail, Result};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Initialise the global tracing subscriber.
pub fn init(level: &str) -> Result<()> {
    parse_level(level)?;
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| anyhow::anyhow!("invalid log level '{level}': {e}"))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to set subscriber: {e}"))?;

    Ok(())
}

/// Parse a log level string, rejecting unrecognised values.
pub fn parse_level(level: &str) -> Result<LevelFilter> {
    if level.is_empty() {
        bail!("log level must not be empty");
    }
    level
        .parse::<LevelFilter>()
        .map_err(|_| anyhow::anyhow!("unrecognised log level: '{level}'"))
}
