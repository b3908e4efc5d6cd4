//! Core types shared across the dotkit workspace.
//!
//! This crate holds the pieces every other crate agrees on:
//!
//! - [`Platform`], [`Os`], [`Arch`] - platform identification types
//! - [`InstallRoot`] - the on-disk layout (`bin/`, `keyrings/`, download cache)
//! - [`Redacted`] - error wrapper that sanitizes user-visible messages

mod paths;
mod platform;
mod redact;

pub use paths::{InstallRoot, default_install_root};
pub use platform::{Arch, Os, Platform};
pub use redact::Redacted;
