//! Named shortcuts for share locations, used as `open <alias>`.

use remote::Location;

/// Longest accepted alias name.
const NAME_MAX: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("invalid alias")]
    Invalid,
    #[error("alias already exists")]
    Exists,
}

#[derive(Debug, Clone, Default)]
pub struct Aliases {
    entries: Vec<(String, Location)>,
}

impl Aliases {
    /// Defines `name`; aliases cannot be redefined.
    pub fn define(&mut self, name: &str, location: Location) -> Result<(), Error> {
        if name.is_empty() || name.len() > NAME_MAX || !location.is_valid() {
            return Err(Error::Invalid);
        }
        if self.get(name).is_some() {
            return Err(Error::Exists);
        }
        tracing::debug!("alias {name} -> {location}");
        self.entries.push((name.to_string(), location));
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Location> {
        self.entries
            .iter()
            .find(|(alias, _)| alias == name)
            .map(|(_, location)| location)
    }

    /// Aliases in definition order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Location)> {
        self.entries
            .iter()
            .map(|(name, location)| (name.as_str(), location))
    }
}
