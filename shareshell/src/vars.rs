//! Session variables changed with `set`.

use common::OnExist;
use common::config::SessionConfig;

/// Longest value accepted for a string variable.
const STRING_MAX: usize = 512;

/// Every variable name, sorted.
pub const NAMES: &[&str] = &["onexist", "pager", "showprogress"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("no such variable")]
    NoSuchVariable,
    #[error("invalid value, must be yes or no")]
    NotBoolean,
    #[error("{0}")]
    InvalidOnExist(String),
    #[error("value too long")]
    TooLong,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variables {
    pub on_exist: OnExist,
    pub pager: String,
    pub show_progress: bool,
}

impl From<&SessionConfig> for Variables {
    fn from(config: &SessionConfig) -> Self {
        Self {
            on_exist: config.on_exist,
            pager: config.pager.clone(),
            show_progress: config.show_progress,
        }
    }
}

impl Default for Variables {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

impl Variables {
    /// Value of `name` as `set` prints it.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<String> {
        match name {
            "onexist" => Some(self.on_exist.to_string()),
            "pager" => Some(self.pager.clone()),
            "showprogress" => Some(yes_no(self.show_progress).to_string()),
            _ => None,
        }
    }

    /// Sets `name` from its textual form; the old value stays on error.
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), Error> {
        match name {
            "onexist" => {
                self.on_exist = value.parse().map_err(Error::InvalidOnExist)?;
            }
            "pager" => {
                if value.len() > STRING_MAX {
                    return Err(Error::TooLong);
                }
                self.pager = value.to_string();
            }
            "showprogress" => {
                self.show_progress = match value {
                    "yes" => true,
                    "no" => false,
                    _ => return Err(Error::NotBoolean),
                };
            }
            _ => return Err(Error::NoSuchVariable),
        }
        tracing::debug!("{name} set to {value:?}");
        Ok(())
    }

    /// `(name, value)` for every variable.
    #[must_use]
    pub fn list(&self) -> Vec<(&'static str, String)> {
        NAMES
            .iter()
            .filter_map(|&name| self.get(name).map(|value| (name, value)))
            .collect()
    }
}
