use miette::Diagnostic;
use npmirror_utils::error::{FileSystemError, PathError};
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("TOML serialization error: {0}")]
    #[diagnostic(
        code(npmirror_config::toml_serialize),
        help("Check your configuration structure for invalid values")
    )]
    TomlSerError(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    #[diagnostic(
        code(npmirror_config::toml_deserialize),
        help("Check your config.toml syntax and structure")
    )]
    TomlDeError(#[from] toml::de::Error),

    #[error("Failed to parse TOML: {0}")]
    #[diagnostic(code(npmirror_config::toml))]
    Toml(#[from] toml_edit::TomlError),

    #[error("Configuration file already exists")]
    #[diagnostic(
        code(npmirror_config::already_exists),
        help("Remove the existing config file or use a different location")
    )]
    ConfigAlreadyExists,

    #[error("Remote '{0}' has no URL to synchronize from")]
    #[diagnostic(
        code(npmirror_config::missing_remote_url),
        help("Set `url` on the remote to the packument URL of the root package")
    )]
    MissingRemoteUrl(String),

    #[error("Invalid URL for remote '{name}': {reason}")]
    #[diagnostic(code(npmirror_config::invalid_remote_url))]
    InvalidRemoteUrl { name: String, reason: String },

    #[error("Remote name cannot be empty")]
    #[diagnostic(code(npmirror_config::empty_remote_name))]
    EmptyRemoteName,

    #[error("Duplicate remote name: {0}")]
    #[diagnostic(
        code(npmirror_config::duplicate_remote),
        help("Each remote must have a unique name")
    )]
    DuplicateRemoteName(String),

    #[error("Unknown remote: {0}")]
    #[diagnostic(
        code(npmirror_config::unknown_remote),
        help("List configured remotes with `npmirror config`")
    )]
    UnknownRemote(String),

    #[error("`{0}` must be greater than zero")]
    #[diagnostic(code(npmirror_config::zero_limit))]
    ZeroLimit(&'static str),

    #[error("IO error: {0}")]
    #[diagnostic(code(npmirror_config::io))]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    #[diagnostic(code(npmirror_config::path))]
    Path(#[from] PathError),

    #[error(transparent)]
    #[diagnostic(code(npmirror_config::fs))]
    FileSystem(#[from] FileSystemError),

    #[error("Encountered unexpected TOML item: {0}")]
    #[diagnostic(code(npmirror_config::unexpected_toml_item))]
    UnexpectedTomlItem(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            ConfigError::MissingRemoteUrl("npmjs".into()).to_string(),
            "Remote 'npmjs' has no URL to synchronize from"
        );
        assert_eq!(
            ConfigError::ZeroLimit("concurrency").to_string(),
            "`concurrency` must be greater than zero"
        );
    }
}
