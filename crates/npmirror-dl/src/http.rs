use tracing::trace;
use url::Url;

use crate::{error::DownloadError, http_client::SHARED_AGENT, traits::Downloader};

/// Upper bound on a single response body. Packuments of heavily published
/// packages run to tens of megabytes, so the agent's default cap is too low.
const MAX_BODY_SIZE: u64 = 512 * 1024 * 1024;

/// [`Downloader`] backed by the shared `ureq` agent.
#[derive(Clone, Copy, Debug, Default)]
pub struct HttpDownloader;

impl HttpDownloader {
    pub fn new() -> Self {
        Self
    }
}

fn validate(url: &str) -> Result<(), DownloadError> {
    Url::parse(url)
        .map(|_| ())
        .map_err(|source| DownloadError::InvalidUrl {
            url: url.to_string(),
            source,
        })
}

fn map_status(err: ureq::Error, url: &str) -> DownloadError {
    match err {
        ureq::Error::StatusCode(status) => DownloadError::HttpError {
            status,
            url: url.to_string(),
        },
        other => DownloadError::from(other),
    }
}

impl Downloader for HttpDownloader {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
        validate(url)?;
        trace!(url, "GET");

        let mut resp = SHARED_AGENT
            .get(url)
            .call()
            .map_err(|err| map_status(err, url))?;

        resp.body_mut()
            .with_config()
            .limit(MAX_BODY_SIZE)
            .read_to_vec()
            .map_err(DownloadError::from)
    }

    fn exists(&self, url: &str) -> Result<bool, DownloadError> {
        validate(url)?;
        trace!(url, "HEAD");

        match SHARED_AGENT.head(url).call() {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(ureq::Error::StatusCode(_)) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_url_is_rejected_before_request() {
        let dl = HttpDownloader::new();
        assert!(matches!(
            dl.fetch("registry/left-pad"),
            Err(DownloadError::InvalidUrl { .. })
        ));
        assert!(matches!(
            dl.exists("::"),
            Err(DownloadError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_map_status() {
        let err = map_status(ureq::Error::StatusCode(503), "https://r/x");
        assert_eq!(err.status(), Some(503));

        let err = map_status(ureq::Error::ConnectionFailed, "https://r/x");
        assert!(matches!(err, DownloadError::Network(_)));
    }
}
