//! Diagnostic logging through `tracing`.
//!
//! Logs go to stderr and are separate from the warnings commands print for the user. `RUST_LOG`
//! takes precedence over the command line verbosity when it is set.

use crate::config::OutputConfig;
use anyhow::Context;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const CRATES: &[&str] = &["shareshell", "common", "remote"];

/// Filter directives enabling `level` for the crates of this workspace.
#[must_use]
pub fn directives(level: &str) -> String {
    CRATES
        .iter()
        .map(|name| format!("{name}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

fn filter(config: &OutputConfig) -> EnvFilter {
    if config.quiet {
        return EnvFilter::new("off");
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives(config.level())))
}

/// Installs the global subscriber.
pub fn init(config: &OutputConfig) -> anyhow::Result<()> {
    config.validate().map_err(anyhow::Error::msg)?;
    tracing_subscriber::registry()
        .with(filter(config))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(config.verbose >= 2)
                .with_file(config.verbose >= 3)
                .with_line_number(config.verbose >= 3),
        )
        .try_init()
        .context("failed to initialize logging")?;
    tracing::debug!("logging at {}", config.level());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_cover_workspace_crates() {
        assert_eq!(
            directives("debug"),
            "shareshell=debug,common=debug,remote=debug"
        );
    }

    #[test]
    fn conflicting_flags_are_rejected() {
        let config = OutputConfig {
            quiet: true,
            verbose: 2,
        };
        assert!(init(&config).is_err());
    }
}
