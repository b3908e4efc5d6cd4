//! Release URL resolution.
//!
//! Maps (tool, pinned version, platform) to the concrete artifact URLs each
//! vendor publishes, using that vendor's own naming convention. Resolution is
//! pure: no network, no filesystem.

use crate::tool::Tool;
use dotkit_core::{Arch, Os, Platform};

/// Everything needed to fetch one tool release.
///
/// Constructed once per install attempt and immutable afterwards. A `None`
/// URL means the vendor does not publish that artifact type for this tool -
/// a policy fact the verifier routes on, not an error.
#[derive(Debug, Clone)]
pub struct DownloadDescriptor {
    /// The tool this descriptor resolves.
    pub tool: Tool,
    /// Pinned release version.
    pub version: &'static str,
    /// Target platform.
    pub platform: Platform,
    /// URL of the release archive (tar.gz).
    pub archive_url: String,
    /// URL of the detached signature over the archive, if published.
    pub signature_url: Option<String>,
    /// URL of the checksum file, if published.
    pub checksums_url: Option<String>,
    /// URL of the sigstore bundle over the checksum file, if published.
    pub bundle_url: Option<String>,
}

impl DownloadDescriptor {
    /// File name portion of a URL.
    #[must_use]
    pub fn file_name(url: &str) -> &str {
        url.rsplit('/').next().unwrap_or(url)
    }

    /// File name of the release archive.
    #[must_use]
    pub fn archive_file_name(&self) -> &str {
        Self::file_name(&self.archive_url)
    }
}

/// Resolve the download descriptor for a tool at its pinned version.
///
/// `base_url` is the release host prefix, normally `https://github.com`;
/// tests point it at a local server.
#[must_use]
pub fn resolve(tool: Tool, platform: Platform, base_url: &str) -> DownloadDescriptor {
    let base = base_url.trim_end_matches('/');
    let version = tool.version();
    let release = format!("{base}/{}/releases/download/v{version}", tool.repo());

    match tool {
        Tool::Mise => {
            // mise names archives mise-v{V}-{os}-{arch}.tar.gz with its own
            // platform vocabulary (macos, x64).
            let os = match platform.os {
                Os::Linux => "linux",
                Os::Darwin => "macos",
            };
            let arch = match platform.arch {
                Arch::X86_64 => "x64",
                Arch::Arm64 => "arm64",
            };
            let archive_url = format!("{release}/mise-v{version}-{os}-{arch}.tar.gz");
            let signature_url = Some(format!("{archive_url}.sig"));
            DownloadDescriptor {
                tool,
                version,
                platform,
                archive_url,
                signature_url,
                checksums_url: None,
                bundle_url: None,
            }
        }
        Tool::Chezmoi => {
            // chezmoi names archives chezmoi_{V}_{os}_{arch}.tar.gz and signs
            // a single checksum file per release.
            let os = match platform.os {
                Os::Linux => "linux",
                Os::Darwin => "darwin",
            };
            let arch = match platform.arch {
                Arch::X86_64 => "amd64",
                Arch::Arm64 => "arm64",
            };
            let checksums = format!("chezmoi_{version}_checksums.txt");
            DownloadDescriptor {
                tool,
                version,
                platform,
                archive_url: format!("{release}/chezmoi_{version}_{os}_{arch}.tar.gz"),
                signature_url: None,
                checksums_url: Some(format!("{release}/{checksums}")),
                bundle_url: Some(format!("{release}/{checksums}.sigstore.json")),
            }
        }
    }
}
