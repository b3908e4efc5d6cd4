//! Embedded verification keys.
//!
//! The public key material used to verify releases is compiled into the
//! binary and written out to `<install-root>/keyrings/` at setup time, so
//! verification never depends on fetching keys over the network.

use std::path::PathBuf;

use dotkit_core::InstallRoot;
use tracing::debug;

use crate::error::Result;
use crate::tool::Tool;

/// OpenPGP public keyring used to verify mise release signatures.
pub const MISE_KEYRING: &[u8] = include_bytes!("../keyrings/mise.gpg");

/// Public key published by the chezmoi project for its release signing.
pub const CHEZMOI_PUBKEY: &[u8] = include_bytes!("../keyrings/chezmoi.pub");

/// Embedded key bytes for a tool.
#[must_use]
pub fn embedded_key(tool: Tool) -> &'static [u8] {
    match tool {
        Tool::Mise => MISE_KEYRING,
        Tool::Chezmoi => CHEZMOI_PUBKEY,
    }
}

/// On-disk path of a tool's extracted key material.
#[must_use]
pub fn keyring_path(root: &InstallRoot, tool: Tool) -> PathBuf {
    root.keyrings_dir().join(tool.keyring_file())
}

/// Write the embedded key material for every tool to the keyring directory.
///
/// Always rewrites, so a damaged or stale keyring file is repaired by
/// running setup again.
pub fn ensure_keyrings(root: &InstallRoot) -> Result<()> {
    std::fs::create_dir_all(root.keyrings_dir())?;
    for tool in Tool::ALL {
        let path = keyring_path(root, tool);
        std::fs::write(&path, embedded_key(tool))?;
        debug!(tool = %tool, path = %path.display(), "Wrote keyring");
    }
    Ok(())
}
