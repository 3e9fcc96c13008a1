//! The remote side of a session: a share on a host, reached through the directory where it is
//! mounted on this machine.
//!
//! Network transport and authentication belong to whatever mounted the share (gvfs, `mount.cifs`,
//! an automounter). This crate validates where to connect, finds the mount and exposes it as a
//! [`common::fs::Filesystem`] with its own working directory.

pub mod location;
pub mod mount;
pub mod share;

pub use location::Location;
pub use mount::MountResolver;
pub use share::ShareFs;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{uri}: invalid destination parameters")]
    InvalidParameters { uri: String },
    #[error("{uri}: no such host or share")]
    NoSuchShare { uri: String },
    #[error("{uri}: {error}")]
    Io { uri: String, error: std::io::Error },
}
