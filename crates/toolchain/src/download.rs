//! HTTP artifact downloads with retry, caching, and atomic writes.
//!
//! Downloads are keyed into the install root's cache by
//! `(tool, version, file name)`; a non-empty cached file short-circuits the
//! network entirely. Writes go to a sibling `.tmp` file that is renamed onto
//! the final path only once complete, so a cached artifact is always either
//! absent or whole.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use dotkit_core::InstallRoot;

use crate::error::{Error, Result};
use crate::resolve::DownloadDescriptor;

/// Maximum redirect hops before a request is failed.
const MAX_REDIRECTS: usize = 10;

/// Downloader configuration.
///
/// Passed into [`Downloader::new`] so tests can inject shorter backoffs and
/// timeouts; there is no global retry state.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Extra attempts after the first failed one.
    pub retries: u32,
    /// Backoff before the first retry; doubles per retry.
    pub base_backoff: Duration,
    /// User agent sent with every request.
    pub user_agent: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            retries: 3,
            base_backoff: Duration::from_secs(1),
            user_agent: format!("dotkit/{}", env!("CARGO_PKG_VERSION")),
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// Fetches release artifacts into the download cache.
pub struct Downloader {
    client: reqwest::Client,
    config: DownloadConfig,
    root: InstallRoot,
}

impl Downloader {
    /// Create a downloader writing into `root`'s cache.
    pub fn new(root: InstallRoot, config: DownloadConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;
        Ok(Self { client, config, root })
    }

    /// Fetch `url` to `dest`, retrying with exponential backoff.
    ///
    /// The cancellation token is checked before every attempt and during the
    /// inter-retry backoff; cancellation wins immediately over the sleep.
    pub async fn fetch_to_file(
        &self,
        url: &str,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let attempts = self.config.retries + 1;
        let mut last_error = String::new();

        for attempt in 0..attempts {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            if attempt > 0 {
                let backoff = self.config.base_backoff * 2_u32.pow(attempt - 1);
                debug!(url, attempt, ?backoff, "Retrying download after backoff");
                tokio::select! {
                    () = cancel.cancelled() => return Err(Error::Cancelled),
                    () = tokio::time::sleep(backoff) => {}
                }
            }

            let result = tokio::select! {
                () = cancel.cancelled() => Err(Error::Cancelled),
                res = self.try_fetch(url, dest) => res,
            };
            match result {
                Ok(()) => return Ok(()),
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(err) => {
                    warn!(url, attempt, %err, "Download attempt failed");
                    last_error = err.to_string();
                }
            }
        }

        Err(Error::download_failed(url, attempts, last_error))
    }

    /// Single download attempt: stream the body to `dest + ".tmp"`, then
    /// rename onto `dest`. The temp file is removed on any failure.
    async fn try_fetch(&self, url: &str, dest: &Path) -> Result<()> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = temp_path(dest);
        let write_result = Self::write_body(response, &tmp).await;
        if let Err(err) = write_result {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(err);
        }
        if let Err(err) = tokio::fs::rename(&tmp, dest).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(err.into());
        }
        Ok(())
    }

    async fn write_body(response: reqwest::Response, tmp: &Path) -> Result<()> {
        let mut file = tokio::fs::File::create(tmp).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        Ok(())
    }

    /// Fetch the release archive, or return its cached path.
    pub async fn fetch_archive(
        &self,
        descriptor: &DownloadDescriptor,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        self.fetch_cached(descriptor, &descriptor.archive_url, cancel)
            .await
    }

    /// Fetch the detached signature if the vendor offers one.
    pub async fn fetch_signature(
        &self,
        descriptor: &DownloadDescriptor,
        cancel: &CancellationToken,
    ) -> Result<Option<PathBuf>> {
        self.fetch_optional(descriptor, descriptor.signature_url.as_deref(), cancel)
            .await
    }

    /// Fetch the checksum file if the vendor offers one.
    pub async fn fetch_checksums(
        &self,
        descriptor: &DownloadDescriptor,
        cancel: &CancellationToken,
    ) -> Result<Option<PathBuf>> {
        self.fetch_optional(descriptor, descriptor.checksums_url.as_deref(), cancel)
            .await
    }

    /// Fetch the sigstore bundle if the vendor offers one.
    pub async fn fetch_bundle(
        &self,
        descriptor: &DownloadDescriptor,
        cancel: &CancellationToken,
    ) -> Result<Option<PathBuf>> {
        self.fetch_optional(descriptor, descriptor.bundle_url.as_deref(), cancel)
            .await
    }

    async fn fetch_optional(
        &self,
        descriptor: &DownloadDescriptor,
        url: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Option<PathBuf>> {
        match url {
            // Not published for this tool: a policy fact, not an error.
            None => Ok(None),
            Some(url) => self.fetch_cached(descriptor, url, cancel).await.map(Some),
        }
    }

    async fn fetch_cached(
        &self,
        descriptor: &DownloadDescriptor,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        let file_name = DownloadDescriptor::file_name(url);
        let cache_path = self.root.download_path(
            descriptor.tool.binary_name(),
            descriptor.version,
            file_name,
        );

        if is_cached(&cache_path) {
            debug!(path = %cache_path.display(), "Using cached download");
            return Ok(cache_path);
        }

        self.fetch_to_file(url, &cache_path, cancel).await?;
        Ok(cache_path)
    }
}

fn temp_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

fn is_cached(path: &Path) -> bool {
    path.metadata().is_ok_and(|m| m.is_file() && m.len() > 0)
}
