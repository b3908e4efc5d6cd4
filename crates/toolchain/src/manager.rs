//! Tool installation orchestration.
//!
//! [`ToolManager`] is the only entry point other subsystems use. Per tool,
//! an install moves strictly forward through download, verification, and
//! extraction; a failure in any stage aborts the call without touching
//! `bin/`, and the only retries are the Downloader's own HTTP retries.
//! Verified and unverified downloads alike stay in the cache for the next
//! attempt.

use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use dotkit_core::{InstallRoot, Platform};

use crate::download::{DownloadConfig, Downloader};
use crate::error::{Error, Result};
use crate::extract;
use crate::keys;
use crate::resolve::resolve;
use crate::tool::Tool;
use crate::verify::{Artifacts, Verifier, VerifyMethod};

/// Default release host.
pub const DEFAULT_RELEASE_BASE_URL: &str = "https://github.com";

/// Manager configuration.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Install root to operate on.
    pub root: InstallRoot,
    /// Target platform for release resolution.
    pub platform: Platform,
    /// Downloader settings.
    pub download: DownloadConfig,
    /// Release host prefix; tests point this at a local server.
    pub release_base_url: String,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            root: InstallRoot::default(),
            platform: Platform::current(),
            download: DownloadConfig::default(),
            release_base_url: DEFAULT_RELEASE_BASE_URL.to_string(),
        }
    }
}

impl ManagerConfig {
    /// Use a specific install root.
    #[must_use]
    pub fn with_root(mut self, root: InstallRoot) -> Self {
        self.root = root;
        self
    }

    /// Use a specific release host.
    #[must_use]
    pub fn with_release_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.release_base_url = base_url.into();
        self
    }
}

/// Per-install options.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstallOptions {
    /// Test-only: skip fetching the detached signature. For a tool whose
    /// policy requires one this does not relax verification - the install
    /// fails instead.
    pub skip_signature: bool,
}

/// Installs and inspects the wrapped tool binaries.
pub struct ToolManager {
    root: InstallRoot,
    platform: Platform,
    base_url: String,
    downloader: Downloader,
    verifier: Verifier,
}

impl ToolManager {
    /// Create a manager from configuration.
    pub fn new(config: ManagerConfig) -> Result<Self> {
        let downloader = Downloader::new(config.root.clone(), config.download)?;
        let verifier = Verifier::new(&config.root);
        Ok(Self {
            root: config.root,
            platform: config.platform,
            base_url: config.release_base_url,
            downloader,
            verifier,
        })
    }

    /// The install root this manager operates on.
    #[must_use]
    pub fn root(&self) -> &InstallRoot {
        &self.root
    }

    /// Path the tool's executable is installed to.
    #[must_use]
    pub fn binary_path(&self, tool: Tool) -> PathBuf {
        self.root.binary_path(tool.binary_name())
    }

    /// Whether a tool is installed: its binary exists, is a regular file,
    /// and has at least one execute bit set. No metadata file is consulted.
    #[must_use]
    pub fn is_installed(&self, tool: Tool) -> bool {
        std::fs::metadata(self.binary_path(tool))
            .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }

    /// The pinned version of an installed tool.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInstalled`] when the tool is not installed.
    pub fn installed_version(&self, tool: Tool) -> Result<&'static str> {
        if self.is_installed(tool) {
            Ok(tool.version())
        } else {
            Err(Error::NotInstalled {
                tool: tool.to_string(),
            })
        }
    }

    /// Write the embedded verification keys to the keyring directory.
    pub fn ensure_keyrings(&self) -> Result<()> {
        keys::ensure_keyrings(&self.root)
    }

    /// Install one tool at its pinned version.
    ///
    /// Idempotent: an already-installed tool returns immediately with zero
    /// network requests. Otherwise the pinned release is downloaded (or
    /// taken from the cache), verified per the tool's policy, and only then
    /// extracted into `bin/`.
    pub async fn install(
        &self,
        tool: Tool,
        options: InstallOptions,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if self.is_installed(tool) {
            debug!(tool = %tool, "Already installed");
            return Ok(());
        }

        let version = tool.version();
        info!(tool = %tool, version, platform = %self.platform, "Installing");

        let descriptor = resolve(tool, self.platform, &self.base_url);
        let archive = self.downloader.fetch_archive(&descriptor, cancel).await?;

        let signature = if options.skip_signature {
            None
        } else {
            match self.downloader.fetch_signature(&descriptor, cancel).await {
                Ok(path) => path,
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(err) => {
                    warn!(tool = %tool, %err, "Signature fetch failed, continuing without it");
                    None
                }
            }
        };

        // A published checksum file that cannot be fetched is a hard
        // failure; losing it silently would widen what a network attacker
        // can do.
        let checksums = self.downloader.fetch_checksums(&descriptor, cancel).await?;

        let bundle = match self.downloader.fetch_bundle(&descriptor, cancel).await {
            Ok(path) => path,
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(err) => {
                warn!(tool = %tool, %err, "Bundle fetch failed, falling back to checksum verification");
                None
            }
        };

        self.ensure_keyrings()?;

        let artifacts = Artifacts {
            archive: &archive,
            signature: signature.as_deref(),
            checksums: checksums.as_deref(),
            bundle: bundle.as_deref(),
        };
        let outcome = self
            .verifier
            .verify_artifact(tool, &artifacts, options.skip_signature)
            .await?;
        if outcome.method() == VerifyMethod::Checksum {
            warn!(tool = %tool, "Release verified by checksum only (no signed bundle published)");
        }
        info!(tool = %tool, method = %outcome.method(), "Release artifact verified");

        std::fs::create_dir_all(self.root.bin_dir())?;
        let dest = self.binary_path(tool);
        extract::extract_one(&archive, &dest, tool.binary_name())?;
        extract::set_executable(&dest)?;

        info!(tool = %tool, version, path = %dest.display(), "Installed");
        Ok(())
    }

    /// Install both tools, in fixed order.
    ///
    /// The first failure aborts the call; a tool already installed by an
    /// earlier iteration stays installed.
    pub async fn install_all(
        &self,
        options: InstallOptions,
        cancel: &CancellationToken,
    ) -> Result<()> {
        for tool in Tool::ALL {
            self.install(tool, options, cancel).await?;
        }
        Ok(())
    }
}
