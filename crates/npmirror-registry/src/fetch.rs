//! Retrieval of packuments through a pluggable transport.

use std::sync::Arc;

use npmirror_dl::{Downloader, SharedDownloader};
use tracing::debug;

use crate::{error::FetchError, packument::Packument};

/// Fetches and parses packuments.
///
/// The fetcher holds no cache and never retries; both belong to its
/// callers or to the transport. Cloning is cheap and shares the transport.
#[derive(Clone)]
pub struct PackumentFetcher {
    downloader: SharedDownloader,
}

impl PackumentFetcher {
    pub fn new(downloader: Arc<dyn Downloader>) -> Self {
        Self { downloader }
    }

    /// Retrieves the document at `url` and parses it as a packument.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Network`] if the transport fails or the registry
    ///   answers with a non-success status
    /// - [`FetchError::Parse`] if the body is not a packument in either
    ///   wire shape
    pub fn fetch(&self, url: &str) -> Result<Packument, FetchError> {
        debug!(url, "fetching packument");

        let body = self.downloader.fetch(url).map_err(|source| FetchError::Network {
            url: url.to_string(),
            source,
        })?;

        let packument = Packument::from_slice(&body).map_err(|source| FetchError::Parse {
            url: url.to_string(),
            source,
        })?;

        debug!(
            url,
            name = packument.name.as_str(),
            versions = packument.len(),
            "parsed packument"
        );
        Ok(packument)
    }
}
