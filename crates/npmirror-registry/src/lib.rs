//! npm registry metadata for the npmirror sync engine.
//!
//! This crate knows how an npm-compatible registry describes packages and
//! nothing about what a mirror does with them:
//!
//! - [`Packument`] and [`VersionRecord`] model the metadata document, in
//!   both its multi-version and single-version wire shapes.
//! - [`PackumentFetcher`] retrieves and parses a packument through any
//!   [`Downloader`](npmirror_dl::Downloader).
//! - [`DependencyUrlResolver`] maps a dependency name to the URL of its
//!   packument; [`RegistryUrlResolver`] is the standard implementation.
//! - [`relative_path`] and [`parse_relative_path`] define the storage path
//!   of a tarball, shared by every writer and reader of mirrored content.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use npmirror_dl::HttpDownloader;
//! use npmirror_registry::{DependencyUrlResolver, PackumentFetcher, RegistryUrlResolver};
//!
//! let fetcher = PackumentFetcher::new(Arc::new(HttpDownloader::new()));
//! let resolver = RegistryUrlResolver::parse("https://registry.npmjs.org").unwrap();
//!
//! let url = resolver.resolve("left-pad").unwrap();
//! let packument = fetcher.fetch(&url).unwrap();
//! for record in packument.into_records() {
//!     println!("{}", record.dist.tarball);
//! }
//! ```

pub mod error;
pub mod fetch;
pub mod packument;
pub mod path;
pub mod resolver;

pub use error::{FetchError, FetchErrorKind, RegistryError, Result};
pub use fetch::PackumentFetcher;
pub use packument::{Dist, PackageId, Packument, VersionRecord};
pub use path::{parse_relative_path, relative_path};
pub use resolver::{package_url, DependencyUrlResolver, RegistryUrlResolver};
