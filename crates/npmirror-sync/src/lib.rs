//! Sync engine for npmirror.
//!
//! A run starts from the packument URL of a root package, walks its
//! dependency graph breadth-first, turns every visited version into a
//! [`ContentDeclaration`] and hands the declarations to a [`ContentSink`]
//! one at a time:
//!
//! ```text
//! PackumentFetcher -> Walker -> ContentEmitter -> ContentSink
//! ```
//!
//! The walker is lazy, so a sink that is slow to accept holds back the
//! traversal rather than letting it race ahead.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use npmirror_dl::HttpDownloader;
//! use npmirror_registry::RegistryUrlResolver;
//! use npmirror_sync::{CollectingSink, SyncOptions, SyncPipeline};
//!
//! # async fn run() -> npmirror_sync::Result<()> {
//! let resolver = RegistryUrlResolver::parse("https://registry.npmjs.org/")?;
//! let pipeline = SyncPipeline::new(
//!     Arc::new(HttpDownloader::new()),
//!     Arc::new(resolver),
//!     SyncOptions::default(),
//! );
//!
//! let mut sink = CollectingSink::new();
//! let report = pipeline
//!     .run("https://registry.npmjs.org/left-pad", &mut sink)
//!     .await?;
//! println!("{} versions declared", report.declared.len());
//! # Ok(())
//! # }
//! ```

pub mod emitter;
pub mod error;
pub mod pipeline;
pub mod sink;
pub mod types;
pub mod walker;

pub use emitter::{ArtifactProbe, ContentEmitter, DownloaderProbe, Emission};
pub use error::{Result, SyncError};
pub use pipeline::{SyncOptions, SyncPipeline};
pub use sink::{BoundedSink, CollectingSink, ContentSink, SinkError};
pub use types::{ContentDeclaration, ProbeFailure, SkippedDependency, SyncReport};
pub use walker::Walker;
