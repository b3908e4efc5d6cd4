//! The dotkit install layout.
//!
//! Everything dotkit writes lives under one root:
//!
//! ```text
//! <install-root>/
//! ├── bin/                         # installed tool executables
//! ├── keyrings/                    # extracted verification keys
//! └── cache/
//!     └── downloads/
//!         └── <tool>/<version>/    # cached archives, signatures, checksums
//! ```

use std::path::{Path, PathBuf};

/// Rooted view of the dotkit install layout.
#[derive(Debug, Clone)]
pub struct InstallRoot {
    root: PathBuf,
}

impl Default for InstallRoot {
    fn default() -> Self {
        Self::new(default_install_root())
    }
}

impl InstallRoot {
    /// Create an install root at the given directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory itself.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding installed executables.
    #[must_use]
    pub fn bin_dir(&self) -> PathBuf {
        self.root.join("bin")
    }

    /// Path of an installed executable by name.
    #[must_use]
    pub fn binary_path(&self, name: &str) -> PathBuf {
        self.bin_dir().join(name)
    }

    /// Directory holding extracted verification keys.
    #[must_use]
    pub fn keyrings_dir(&self) -> PathBuf {
        self.root.join("keyrings")
    }

    /// Root of the download cache.
    #[must_use]
    pub fn downloads_dir(&self) -> PathBuf {
        self.root.join("cache").join("downloads")
    }

    /// Cache path for a downloaded artifact, keyed on tool, version, and
    /// file name. A non-empty file at this path means "already downloaded".
    #[must_use]
    pub fn download_path(&self, tool: &str, version: &str, file_name: &str) -> PathBuf {
        self.downloads_dir().join(tool).join(version).join(file_name)
    }

    /// Ensure the top-level directories exist.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.bin_dir())?;
        std::fs::create_dir_all(self.keyrings_dir())?;
        std::fs::create_dir_all(self.downloads_dir())?;
        Ok(())
    }
}

/// Default install root: `~/.local/share/dotkit` (platform equivalent).
#[must_use]
pub fn default_install_root() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from(".local/share"))
        .join("dotkit")
}
