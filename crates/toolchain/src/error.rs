//! Error types for the toolchain pipeline.

use crate::verify::VerifyMethod;
use thiserror::Error;

/// Result type for toolchain operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while acquiring and installing a tool binary.
#[derive(Error, Debug)]
pub enum Error {
    /// All download attempts for a URL were exhausted.
    #[error("Failed to download {url} after {attempts} attempts: {message}")]
    DownloadFailed {
        /// The requested URL.
        url: String,
        /// Total attempts made.
        attempts: u32,
        /// Last failure seen.
        message: String,
    },

    /// The server answered with a non-success status.
    #[error("Unexpected HTTP status {status} for {url}")]
    HttpStatus {
        /// The requested URL.
        url: String,
        /// The response status code.
        status: u16,
    },

    /// The caller cancelled the operation.
    #[error("Operation cancelled")]
    Cancelled,

    /// Artifact verification failed.
    ///
    /// The message is deliberately coarse: individual cryptographic failure
    /// modes are not distinguished beyond the recorded method.
    #[error("Verification failed for {tool} ({method}): {detail}")]
    VerificationFailed {
        /// The tool being verified.
        tool: String,
        /// The verification method that was attempted.
        method: VerifyMethod,
        /// Short failure description.
        detail: String,
    },

    /// A required signature artifact is missing.
    #[error("No signature available for {tool}; signature verification is required")]
    SignatureMissing {
        /// The tool being verified.
        tool: String,
    },

    /// The checksum file has no entry for the artifact.
    #[error("Checksum not found for '{file_name}'")]
    ChecksumNotFound {
        /// File name that was looked up.
        file_name: String,
    },

    /// The artifact's hash does not match the checksum file.
    #[error("Checksum mismatch for '{file_name}'")]
    ChecksumMismatch {
        /// File name of the mismatching artifact.
        file_name: String,
    },

    /// The tool is not installed.
    #[error("Tool '{tool}' is not installed")]
    NotInstalled {
        /// The missing tool.
        tool: String,
    },

    /// An archive entry would escape the extraction directory.
    #[error("Refusing to extract unsafe archive entry '{name}'")]
    UnsafeArchiveEntry {
        /// The offending entry name.
        name: String,
    },

    /// Binary not found in archive.
    #[error("Binary '{0}' not found in archive")]
    BinaryNotFound(String),

    /// Failed to extract from an archive.
    #[error("Failed to extract '{binary}' from archive: {message}")]
    ExtractionFailed {
        /// The binary name.
        binary: String,
        /// Error message.
        message: String,
    },

    /// Keyring material could not be read or parsed.
    #[error("Keyring error: {0}")]
    Keyring(String),

    /// HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a download-failed error.
    #[must_use]
    pub fn download_failed(url: impl Into<String>, attempts: u32, message: impl Into<String>) -> Self {
        Self::DownloadFailed {
            url: url.into(),
            attempts,
            message: message.into(),
        }
    }

    /// Create a verification-failed error.
    #[must_use]
    pub fn verification_failed(
        tool: impl Into<String>,
        method: VerifyMethod,
        detail: impl Into<String>,
    ) -> Self {
        Self::VerificationFailed {
            tool: tool.into(),
            method,
            detail: detail.into(),
        }
    }

    /// Create an unsafe-archive-entry error.
    #[must_use]
    pub fn unsafe_entry(name: impl Into<String>) -> Self {
        Self::UnsafeArchiveEntry { name: name.into() }
    }

    /// Create an extraction-failed error.
    #[must_use]
    pub fn extraction_failed(binary: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExtractionFailed {
            binary: binary.into(),
            message: message.into(),
        }
    }
}
