//! Error types for the registry crate.

use miette::Diagnostic;
use npmirror_dl::DownloadError;
use thiserror::Error;

/// Broad cause of a failed packument fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// The transport failed or the registry answered with an error status.
    Network,
    /// The registry answered but the body is not a usable packument.
    Parse,
}

/// Failure to obtain a packument from a registry.
#[derive(Error, Diagnostic, Debug)]
pub enum FetchError {
    #[error("Failed to fetch packument from {url}: {source}")]
    #[diagnostic(
        code(npmirror_registry::fetch::network),
        help("Check your network connection and the registry URL")
    )]
    Network {
        url: String,
        #[source]
        source: DownloadError,
    },

    #[error("Malformed packument at {url}: {source}")]
    #[diagnostic(
        code(npmirror_registry::fetch::parse),
        help("The registry returned something other than a package metadata document")
    )]
    Parse {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            Self::Network { .. } => FetchErrorKind::Network,
            Self::Parse { .. } => FetchErrorKind::Parse,
        }
    }

    pub fn request_url(&self) -> &str {
        match self {
            Self::Network { url, .. } | Self::Parse { url, .. } => url,
        }
    }
}

#[derive(Error, Diagnostic, Debug)]
pub enum RegistryError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Fetch(#[from] FetchError),

    #[error("Invalid URL: {0}")]
    #[diagnostic(
        code(npmirror_registry::invalid_url),
        help("Ensure the URL is valid and properly formatted")
    )]
    InvalidUrl(String),

    #[error("Invalid package name: {0:?}")]
    #[diagnostic(
        code(npmirror_registry::invalid_package_name),
        help("Package names are non-empty and scoped names look like @scope/name")
    )]
    InvalidPackageName(String),
}

/// A specialized Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_kind_and_url() {
        let err = FetchError::Network {
            url: "https://registry.example/a".to_string(),
            source: DownloadError::HttpError {
                status: 500,
                url: "https://registry.example/a".to_string(),
            },
        };
        assert_eq!(err.kind(), FetchErrorKind::Network);
        assert_eq!(err.request_url(), "https://registry.example/a");

        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = FetchError::Parse {
            url: "https://registry.example/b".to_string(),
            source,
        };
        assert_eq!(err.kind(), FetchErrorKind::Parse);
        assert!(err.to_string().starts_with("Malformed packument"));
    }

    #[test]
    fn test_registry_error_forwards_fetch_diagnostic() {
        let err = RegistryError::from(FetchError::Network {
            url: "https://registry.example/a".to_string(),
            source: DownloadError::HttpError {
                status: 503,
                url: "https://registry.example/a".to_string(),
            },
        });

        let code = err.code().map(|code| code.to_string());
        assert_eq!(code.as_deref(), Some("npmirror_registry::fetch::network"));
        assert!(err.url().is_none());
        assert!(err.help().is_some());
    }

    #[test]
    fn test_registry_error_display() {
        let err = RegistryError::InvalidPackageName(String::new());
        assert_eq!(err.to_string(), "Invalid package name: \"\"");

        let err = RegistryError::InvalidUrl("bad-url".to_string());
        assert_eq!(err.to_string(), "Invalid URL: bad-url");
    }
}
