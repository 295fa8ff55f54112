//! Error types for sync runs.

use miette::Diagnostic;
use npmirror_config::error::ConfigError;
use npmirror_registry::{FetchError, RegistryError};
use thiserror::Error;

use crate::sink::SinkError;

/// Failure that ends a sync run.
///
/// Dependency fetch failures and probe failures never show up here; they
/// are recovered from and listed in the [`SyncReport`](crate::SyncReport).
#[derive(Error, Diagnostic, Debug)]
pub enum SyncError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error("No root URL to synchronize from")]
    #[diagnostic(
        code(npmirror_sync::missing_root),
        help("Pass --url or set `url` on the remote")
    )]
    MissingRootUrl,

    #[error("Failed to fetch the root packument")]
    #[diagnostic(code(npmirror_sync::root_fetch))]
    RootFetch(#[source] FetchError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Resolve(#[from] RegistryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Sink(#[from] SinkError),

    #[error("Sync cancelled")]
    #[diagnostic(code(npmirror_sync::cancelled))]
    Cancelled,

    #[error("{0}")]
    #[diagnostic(code(npmirror_sync::custom))]
    Custom(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;
