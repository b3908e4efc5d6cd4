//! Sanitized error wrapping.
//!
//! Some errors carry paths or tool internals that should not reach the
//! terminal verbatim (home-directory user names, wrapped-tool invocations).
//! [`Redacted`] shows a sanitized message while keeping the original cause
//! reachable through `source()` for `Error::source`-chain inspection.

use std::error::Error as StdError;
use thiserror::Error;

/// An error with a sanitized display message and the original cause.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct Redacted {
    message: String,
    #[source]
    cause: Box<dyn StdError + Send + Sync>,
}

impl Redacted {
    /// Wrap `cause` behind a sanitized `message`.
    #[must_use]
    pub fn wrap(
        message: impl Into<String>,
        cause: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into(),
            cause: cause.into(),
        }
    }

    /// The sanitized message shown to users.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}
