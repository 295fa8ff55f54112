use documented::{Documented, DocumentedFields};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ConfigError, Result};

/// How tarball content is made available for a remote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    /// Tarballs are downloaded into the store during sync.
    #[default]
    Immediate,
    /// Only the declaration is recorded; the tarball is fetched on first access.
    OnDemand,
    /// Same as `on_demand`, but the tarball is never persisted once served.
    Streamed,
}

impl Policy {
    /// Whether declarations for this policy carry the deferred-artifact flag.
    pub fn defers_artifact(self) -> bool {
        !matches!(self, Policy::Immediate)
    }
}

/// A package tree to mirror, rooted at one package's packument URL.
#[derive(Debug, Clone, Deserialize, Serialize, Documented, DocumentedFields)]
pub struct Remote {
    /// Unique name of the remote.
    pub name: String,

    /// Packument URL of the root package, e.g. https://registry.npmjs.org/left-pad
    pub url: String,

    /// Registry base URL used to resolve dependency names.
    /// Default: derived from `url` by dropping the package path
    pub registry: Option<String>,

    /// Content policy: "immediate", "on_demand" or "streamed".
    /// Default: "immediate"
    pub policy: Option<Policy>,

    /// Follow dependencies of every mirrored version.
    /// Default: true
    pub sync_deps: Option<bool>,

    /// Replace the previously mirrored set instead of adding to it.
    /// Default: false
    pub mirror: Option<bool>,

    /// Check that each tarball exists before declaring it.
    /// Default: false
    pub probe: Option<bool>,
}

impl Remote {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            registry: None,
            policy: None,
            sync_deps: None,
            mirror: None,
            probe: None,
        }
    }

    pub fn policy(&self) -> Policy {
        self.policy.unwrap_or_default()
    }

    pub fn defer_artifact(&self) -> bool {
        self.policy().defers_artifact()
    }

    pub fn follow_dependencies(&self) -> bool {
        self.sync_deps.unwrap_or(true)
    }

    pub fn is_mirror(&self) -> bool {
        self.mirror.unwrap_or(false)
    }

    pub fn probe(&self) -> bool {
        self.probe.unwrap_or(false)
    }

    /// Explicit registry base, if one is configured.
    pub fn registry_base(&self) -> Result<Option<Url>> {
        self.registry
            .as_deref()
            .map(|registry| self.parse_url(registry))
            .transpose()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyRemoteName);
        }
        if self.url.trim().is_empty() {
            return Err(ConfigError::MissingRemoteUrl(self.name.clone()));
        }
        self.parse_url(&self.url)?;
        self.registry_base()?;
        Ok(())
    }

    fn parse_url(&self, value: &str) -> Result<Url> {
        let url = Url::parse(value).map_err(|err| ConfigError::InvalidRemoteUrl {
            name: self.name.clone(),
            reason: format!("{value}: {err}"),
        })?;

        if !matches!(url.scheme(), "http" | "https" | "file") {
            return Err(ConfigError::InvalidRemoteUrl {
                name: self.name.clone(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }
        Ok(url)
    }
}
