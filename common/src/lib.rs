//! Core of the share shell: tokenizing command lines, glob expansion and file transfers over two
//! symmetric filesystems (the local machine and a remote share), plus tab completion.
//!
//! The command layer lives in the `shareshell` crate; the remote filesystem in the `remote`
//! crate. Everything here works against the [`fs::Filesystem`] trait and reports problems
//! through a [`context::Context`].

pub mod columns;
pub mod complete;
pub mod config;
pub mod context;
pub mod fs;
pub mod glob;
pub mod logging;
pub mod progress;
pub mod testutils;
pub mod tokenize;
pub mod transfer;
pub mod version;

pub use context::Context;
pub use fs::{Side, Sides};
pub use transfer::{OnExist, Summary};
