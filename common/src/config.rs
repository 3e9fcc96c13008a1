//! Configuration types for output and transfer settings

use crate::transfer::OnExist;

/// Output and logging configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputConfig {
    /// Turn logging off entirely
    pub quiet: bool,
    /// Verbosity level: 0=ERROR, 1=INFO, 2=DEBUG, 3=TRACE
    pub verbose: u8,
}

impl OutputConfig {
    /// Validate configuration and return errors if invalid
    pub fn validate(&self) -> Result<(), String> {
        if self.quiet && self.verbose > 0 {
            return Err("--quiet and --verbose cannot be used together".to_string());
        }
        Ok(())
    }

    /// Log level directive for the verbosity, `off` when quiet.
    #[must_use]
    pub fn level(&self) -> &'static str {
        if self.quiet {
            return "off";
        }
        match self.verbose {
            0 => "error",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

/// Initial values of the session variables
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// What to do when a transfer destination exists
    pub on_exist: OnExist,
    /// Program used by `page`
    pub pager: String,
    /// Draw progress bars during transfers
    pub show_progress: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            on_exist: OnExist::default(),
            pager: default_pager(),
            show_progress: true,
        }
    }
}

impl SessionConfig {
    /// Validate configuration and return errors if invalid
    pub fn validate(&self) -> Result<(), String> {
        if self.pager.trim().is_empty() {
            return Err("pager must not be empty".to_string());
        }
        Ok(())
    }
}

/// `$PAGER` when set and not empty, `less` otherwise.
#[must_use]
pub fn default_pager() -> String {
    std::env::var("PAGER")
        .ok()
        .filter(|pager| !pager.trim().is_empty())
        .unwrap_or_else(|| "less".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_levels() {
        let level = |verbose| OutputConfig { quiet: false, verbose }.level();
        assert_eq!(level(0), "error");
        assert_eq!(level(1), "info");
        assert_eq!(level(2), "debug");
        assert_eq!(level(3), "trace");
        assert_eq!(level(7), "trace");
        let quiet = OutputConfig {
            quiet: true,
            verbose: 0,
        };
        assert_eq!(quiet.level(), "off");
    }

    #[test]
    fn quiet_and_verbose_conflict() {
        let config = OutputConfig {
            quiet: true,
            verbose: 1,
        };
        assert!(config.validate().is_err());
        assert!(OutputConfig::default().validate().is_ok());
    }

    #[test]
    fn session_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.on_exist, OnExist::Ask);
        assert!(config.show_progress);
        assert!(config.validate().is_ok());
        let config = SessionConfig {
            pager: " ".to_string(),
            ..SessionConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
