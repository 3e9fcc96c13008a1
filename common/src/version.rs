// build information printed by `version` and `--version`

/// Version information
///
/// The semantic version comes from Cargo.toml, git information is captured by build.rs and may be
/// absent when building outside a git checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    /// Semantic version from Cargo.toml (e.g., "0.1.0")
    pub semantic: String,

    /// Git describe output (e.g., "v0.1.0-3-g1a2b3c4")
    pub git_describe: Option<String>,

    /// Full git commit hash
    pub git_hash: Option<String>,
}

impl Version {
    /// Get the version this binary was built as
    pub fn current() -> Self {
        Self {
            semantic: env!("CARGO_PKG_VERSION").to_string(),
            git_describe: option_env!("SHARESHELL_GIT_DESCRIBE").map(String::from),
            git_hash: option_env!("SHARESHELL_GIT_HASH").map(String::from),
        }
    }

    /// Get a human-readable version string
    ///
    /// # Examples
    ///
    /// ```
    /// use common::version::Version;
    ///
    /// let v = Version {
    ///     semantic: "0.1.0".to_string(),
    ///     git_describe: Some("v0.1.0-3-g1a2b3c4".to_string()),
    ///     git_hash: None,
    /// };
    ///
    /// assert_eq!(v.display(), "0.1.0 (v0.1.0-3-g1a2b3c4)");
    /// ```
    pub fn display(&self) -> String {
        if let Some(ref git_describe) = self.git_describe {
            format!("{} ({})", self.semantic, git_describe)
        } else {
            self.semantic.clone()
        }
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_version() {
        let version = Version::current();
        assert_eq!(version.semantic, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_display() {
        let v1 = Version {
            semantic: "0.1.0".to_string(),
            git_describe: None,
            git_hash: Some("1a2b3c4".to_string()),
        };
        assert_eq!(v1.display(), "0.1.0");
        assert_eq!(v1.to_string(), "0.1.0");

        let v2 = Version {
            semantic: "0.1.0".to_string(),
            git_describe: Some("v0.1.0-3-g1a2b3c4".to_string()),
            git_hash: None,
        };
        assert_eq!(v2.display(), "0.1.0 (v0.1.0-3-g1a2b3c4)");
    }
}
