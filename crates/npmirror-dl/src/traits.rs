use std::sync::Arc;

use crate::error::DownloadError;

/// Byte-level access to remote resources.
///
/// Implementations are blocking; async callers run them on a blocking
/// thread.
pub trait Downloader: Send + Sync {
    /// Fetches the full body at `url`. Non-success statuses are errors.
    fn fetch(&self, url: &str) -> Result<Vec<u8>, DownloadError>;

    /// Reports whether `url` currently resolves to a retrievable resource.
    ///
    /// A definite "no" (any non-success status) is `Ok(false)`; only
    /// transport failures are errors.
    fn exists(&self, url: &str) -> Result<bool, DownloadError>;
}

pub type SharedDownloader = Arc<dyn Downloader>;
