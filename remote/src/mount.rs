//! Finding the local directory a share is mounted on.

use crate::Location;

/// Where gvfs mounts SMB shares for the current user.
pub const DEFAULT_TEMPLATE: &str = "/run/user/{uid}/gvfs/smb-share:server={host},share={share}";

/// Environment variable overriding [`DEFAULT_TEMPLATE`].
pub const TEMPLATE_ENV: &str = "SHARESHELL_MOUNT_TEMPLATE";

/// Turns a [`Location`] into a mount point by filling in a path template.
///
/// The template may use `{uid}`, `{user}`, `{host}` and `{share}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountResolver {
    template: String,
}

impl Default for MountResolver {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE)
    }
}

impl MountResolver {
    #[must_use]
    pub fn new(template: &str) -> Self {
        Self {
            template: template.to_string(),
        }
    }

    /// Picks the template from the command line, then the environment, then the default.
    #[must_use]
    pub fn from_env(template: Option<&str>) -> Self {
        match template {
            Some(template) => Self::new(template),
            None => match std::env::var(TEMPLATE_ENV) {
                Ok(template) if !template.is_empty() => Self::new(&template),
                _ => Self::default(),
            },
        }
    }

    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    #[must_use]
    pub fn resolve(&self, location: &Location) -> std::path::PathBuf {
        let uid = nix::unistd::getuid();
        let path = self
            .template
            .replace("{uid}", &uid.to_string())
            .replace("{user}", location.user.as_deref().unwrap_or(""))
            .replace("{host}", &location.host)
            .replace("{share}", &location.share);
        tracing::debug!("{location} is expected at {path}");
        std::path::PathBuf::from(path)
    }
}
