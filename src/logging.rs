use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_DIRECTIVE: &str = "dataset_insights=info";

/// Installs the global subscriber. Fails if one is already installed.
pub fn init_logging() -> Result<()> {
    init_logging_with(DEFAULT_DIRECTIVE)
}

pub fn init_logging_with(default_directive: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .with_context(|| format!("Invalid log directive: {}", default_directive))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}
