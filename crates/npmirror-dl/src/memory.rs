use std::{
    collections::HashMap,
    sync::{Mutex, RwLock},
};

use crate::{error::DownloadError, traits::Downloader};

#[derive(Clone, Debug)]
enum Canned {
    Body(Vec<u8>),
    Status(u16),
    Unreachable,
}

/// In-memory [`Downloader`] serving canned responses keyed by exact URL.
///
/// Unknown URLs answer `404`. Every `fetch` and `exists` call is counted so
/// callers can assert how often a URL was requested.
#[derive(Default)]
pub struct MemoryDownloader {
    responses: RwLock<HashMap<String, Canned>>,
    fetches: Mutex<HashMap<String, usize>>,
    probes: Mutex<HashMap<String, usize>>,
}

impl MemoryDownloader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(self, url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.insert(url.into(), Canned::Body(body.into()));
        self
    }

    pub fn with_json(self, url: impl Into<String>, value: &serde_json::Value) -> Self {
        self.with_body(url, value.to_string())
    }

    pub fn with_status(self, url: impl Into<String>, status: u16) -> Self {
        self.insert(url.into(), Canned::Status(status));
        self
    }

    /// Makes `url` fail at the transport level rather than with a status.
    pub fn with_unreachable(self, url: impl Into<String>) -> Self {
        self.insert(url.into(), Canned::Unreachable);
        self
    }

    pub fn fetch_count(&self, url: &str) -> usize {
        self.fetches.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total_fetches(&self) -> usize {
        self.fetches.lock().unwrap().values().sum()
    }

    pub fn probe_count(&self, url: &str) -> usize {
        self.probes.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    fn insert(&self, url: String, canned: Canned) {
        self.responses.write().unwrap().insert(url, canned);
    }

    fn lookup(&self, url: &str) -> Option<Canned> {
        self.responses.read().unwrap().get(url).cloned()
    }
}

fn bump(counter: &Mutex<HashMap<String, usize>>, url: &str) {
    *counter.lock().unwrap().entry(url.to_string()).or_default() += 1;
}

impl Downloader for MemoryDownloader {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
        bump(&self.fetches, url);
        match self.lookup(url) {
            Some(Canned::Body(body)) => Ok(body),
            Some(Canned::Status(status)) => Err(DownloadError::HttpError {
                status,
                url: url.to_string(),
            }),
            Some(Canned::Unreachable) => Err(ureq::Error::ConnectionFailed.into()),
            None => Err(DownloadError::HttpError {
                status: 404,
                url: url.to_string(),
            }),
        }
    }

    fn exists(&self, url: &str) -> Result<bool, DownloadError> {
        bump(&self.probes, url);
        match self.lookup(url) {
            Some(Canned::Body(_)) => Ok(true),
            Some(Canned::Status(status)) => Ok((200..300).contains(&status)),
            Some(Canned::Unreachable) => Err(ureq::Error::ConnectionFailed.into()),
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canned_responses() {
        let dl = MemoryDownloader::new()
            .with_body("https://r/a", "body")
            .with_status("https://r/gone", 410)
            .with_unreachable("https://r/down");

        assert_eq!(dl.fetch("https://r/a").unwrap(), b"body");
        assert_eq!(dl.fetch("https://r/gone").unwrap_err().status(), Some(410));
        assert!(matches!(
            dl.fetch("https://r/down"),
            Err(DownloadError::Network(_))
        ));
        assert_eq!(dl.fetch("https://r/missing").unwrap_err().status(), Some(404));

        assert_eq!(dl.fetch_count("https://r/a"), 1);
        assert_eq!(dl.total_fetches(), 4);
    }

    #[test]
    fn test_exists() {
        let dl = MemoryDownloader::new()
            .with_body("https://r/a.tgz", "x")
            .with_status("https://r/b.tgz", 404)
            .with_unreachable("https://r/c.tgz");

        assert!(dl.exists("https://r/a.tgz").unwrap());
        assert!(!dl.exists("https://r/b.tgz").unwrap());
        assert!(dl.exists("https://r/c.tgz").is_err());
        assert!(!dl.exists("https://r/unknown.tgz").unwrap());
        assert_eq!(dl.probe_count("https://r/a.tgz"), 1);
        assert_eq!(dl.fetch_count("https://r/a.tgz"), 0);
    }
}
