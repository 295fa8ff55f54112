//! Transport layer for npmirror.
//!
//! Everything above this crate talks to the network through the
//! [`Downloader`] trait. [`HttpDownloader`] is the production implementation
//! backed by a process-wide `ureq` agent; [`MemoryDownloader`] serves canned
//! responses for offline fixtures and tests.

pub mod error;
pub mod http;
pub mod http_client;
pub mod memory;
pub mod traits;

pub use error::DownloadError;
pub use http::HttpDownloader;
pub use memory::MemoryDownloader;
pub use traits::{Downloader, SharedDownloader};
