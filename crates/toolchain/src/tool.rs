//! The two tools dotkit wraps.
//!
//! Tool identity is a closed sum type: every per-tool policy in the pipeline
//! (pinned version, archive naming, verification requirements, keyring file)
//! is a pure function over the variant, so the full policy surface for a tool
//! is readable from this one module.

/// Pinned mise release. Every dotkit build installs exactly this version.
pub const MISE_VERSION: &str = "2025.7.1";

/// Pinned chezmoi release. Every dotkit build installs exactly this version.
pub const CHEZMOI_VERSION: &str = "2.63.1";

/// One of the wrapped tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    /// The wrapped version manager.
    Mise,
    /// The wrapped dotfiles manager.
    Chezmoi,
}

/// How a tool's release artifacts must be verified before use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyPolicy {
    /// A detached OpenPGP signature against the embedded keyring is
    /// mandatory. There is no fallback.
    RequireSignature,
    /// A sigstore bundle over the checksum file is preferred; plain checksum
    /// verification is the fallback when no bundle is published.
    PreferBundle,
}

impl Tool {
    /// All wrapped tools, in install order.
    pub const ALL: [Self; 2] = [Self::Mise, Self::Chezmoi];

    /// The executable name inside release archives and under `bin/`.
    #[must_use]
    pub fn binary_name(self) -> &'static str {
        match self {
            Self::Mise => "mise",
            Self::Chezmoi => "chezmoi",
        }
    }

    /// The pinned upstream release version.
    #[must_use]
    pub fn version(self) -> &'static str {
        match self {
            Self::Mise => MISE_VERSION,
            Self::Chezmoi => CHEZMOI_VERSION,
        }
    }

    /// The upstream GitHub repository (`owner/name`).
    #[must_use]
    pub fn repo(self) -> &'static str {
        match self {
            Self::Mise => "jdx/mise",
            Self::Chezmoi => "twpayne/chezmoi",
        }
    }

    /// How this tool's artifacts are verified.
    #[must_use]
    pub fn verify_policy(self) -> VerifyPolicy {
        match self {
            Self::Mise => VerifyPolicy::RequireSignature,
            Self::Chezmoi => VerifyPolicy::PreferBundle,
        }
    }

    /// File name of the embedded key material under `keyrings/`.
    #[must_use]
    pub fn keyring_file(self) -> &'static str {
        match self {
            Self::Mise => "mise.gpg",
            Self::Chezmoi => "chezmoi.pub",
        }
    }

    /// Certificate identity expected in a release bundle, if this tool
    /// publishes one: the upstream release workflow plus the OIDC issuer.
    #[must_use]
    pub fn bundle_identity(self) -> Option<(String, &'static str)> {
        match self {
            Self::Mise => None,
            Self::Chezmoi => Some((
                format!(
                    "https://github.com/{}/.github/workflows/main.yml@refs/tags/v{}",
                    self.repo(),
                    self.version()
                ),
                "https://token.actions.githubusercontent.com",
            )),
        }
    }
}

impl std::fmt::Display for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.binary_name())
    }
}

impl std::str::FromStr for Tool {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mise" => Ok(Self::Mise),
            "chezmoi" => Ok(Self::Chezmoi),
            other => Err(format!("unknown tool '{other}' (expected mise or chezmoi)")),
        }
    }
}
