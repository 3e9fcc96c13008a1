//! Command layer of shareshell, an interactive shell for moving files between this machine and a
//! mounted SMB share.
//!
//! Input lines go through [`dispatch::execute`], which looks the command up in
//! [`commands::COMMANDS`], expands globs on the right side and runs the matching function in
//! [`ops`] against a [`session::Session`].

pub mod alias;
pub mod commands;
pub mod dispatch;
pub mod interface;
pub mod ls;
pub mod ops;
pub mod session;
pub mod vars;

pub use session::Session;
