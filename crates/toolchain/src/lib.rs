//! Binary acquisition and verification pipeline for the tools dotkit wraps.
//!
//! dotkit never trusts a tool binary it did not verify. This crate owns the
//! path from release URL to executable on disk:
//!
//! - [`resolve`] - maps (tool, pinned version, platform) to vendor URLs
//! - [`Downloader`] - retrying, cancellable, cache-backed fetches with
//!   atomic writes
//! - [`Verifier`] - per-tool verification policy (OpenPGP signature,
//!   sigstore bundle, checksum fallback)
//! - [`extract`] - tar.gz extraction hardened against path traversal and
//!   symlink escapes
//! - [`ToolManager`] - the sequencing facade everything else calls
//!
//! Stages run strictly in order per install: nothing is extracted before it
//! verifies, and nothing lands in `bin/` before it is extracted.

mod download;
mod error;
pub mod extract;
pub mod keys;
mod manager;
mod resolve;
mod tool;
mod verify;

pub use download::{DownloadConfig, Downloader};
pub use error::{Error, Result};
pub use manager::{
    DEFAULT_RELEASE_BASE_URL, InstallOptions, ManagerConfig, ToolManager,
};
pub use resolve::{DownloadDescriptor, resolve};
pub use tool::{CHEZMOI_VERSION, MISE_VERSION, Tool, VerifyPolicy};
pub use verify::{Artifacts, VerificationOutcome, Verifier, VerifyMethod, verify_sha256};
