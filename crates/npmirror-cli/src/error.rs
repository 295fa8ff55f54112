use miette::Diagnostic;
use npmirror_config::error::ConfigError;
use npmirror_dl::DownloadError;
use npmirror_sync::SyncError;
use npmirror_utils::error::{FileSystemError, HashError, PathError};
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum CliError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    FileSystem(#[from] FileSystemError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Hash(#[from] HashError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Path(#[from] PathError),

    #[error("Error while {action}")]
    #[diagnostic(code(npmirror::io), help("Check file permissions and disk space"))]
    IoError {
        action: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid store index: {0}")]
    #[diagnostic(
        code(npmirror::index),
        help("Remove index.json from the store and run a full sync")
    )]
    Index(#[from] serde_json::Error),

    #[error("Invalid header '{0}'")]
    #[diagnostic(code(npmirror::header), help("Headers are passed as 'Name: value'"))]
    InvalidHeader(String),

    #[error("Invalid proxy '{0}'")]
    #[diagnostic(code(npmirror::proxy))]
    InvalidProxy(String),

    #[error("No remote selected")]
    #[diagnostic(
        code(npmirror::no_remote),
        help("Name a configured remote or pass --url")
    )]
    NoRemote,

    #[error("{0}")]
    #[diagnostic(code(npmirror::custom))]
    Custom(String),
}

pub type CliResult<T> = std::result::Result<T, CliError>;

/// Trait for adding context to IO errors.
pub trait ErrorContext<T> {
    fn with_context<C>(self, context: C) -> CliResult<T>
    where
        C: FnOnce() -> String;
}

impl<T> ErrorContext<T> for std::io::Result<T> {
    fn with_context<C>(self, context: C) -> CliResult<T>
    where
        C: FnOnce() -> String,
    {
        self.map_err(|err| CliError::IoError {
            action: context(),
            source: err,
        })
    }
}
