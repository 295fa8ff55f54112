//! Turning visited version records into content declarations.

use std::sync::Arc;

use npmirror_dl::{DownloadError, SharedDownloader};
use npmirror_registry::VersionRecord;
use tracing::{trace, warn};

use crate::types::{ContentDeclaration, ProbeFailure};

/// Existence check for a tarball URL.
///
/// `Ok(false)` is a definite "not there"; `Err` means the check itself
/// could not be carried out.
pub trait ArtifactProbe: Send + Sync {
    fn probe(&self, url: &str) -> Result<bool, DownloadError>;
}

/// Probes with a `HEAD` request through a [`Downloader`](npmirror_dl::Downloader).
pub struct DownloaderProbe {
    downloader: SharedDownloader,
}

impl DownloaderProbe {
    pub fn new(downloader: SharedDownloader) -> Self {
        Self { downloader }
    }
}

impl ArtifactProbe for DownloaderProbe {
    fn probe(&self, url: &str) -> Result<bool, DownloadError> {
        self.downloader.exists(url)
    }
}

/// Result of emitting one record.
#[derive(Debug)]
pub enum Emission {
    Declared(ContentDeclaration),
    /// The record was dropped by the probe.
    Skipped(ProbeFailure),
}

#[derive(Clone)]
pub struct ContentEmitter {
    defer_artifact: bool,
    probe: Option<Arc<dyn ArtifactProbe>>,
}

impl ContentEmitter {
    pub fn new(defer_artifact: bool) -> Self {
        Self {
            defer_artifact,
            probe: None,
        }
    }

    pub fn with_probe(mut self, probe: Arc<dyn ArtifactProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn defer_artifact(&self) -> bool {
        self.defer_artifact
    }

    /// Builds the declaration for `record` without probing.
    pub fn declare(&self, record: VersionRecord) -> ContentDeclaration {
        ContentDeclaration::from_record(record, self.defer_artifact)
    }

    /// Builds the declaration for `record`, first asking the probe (if
    /// any) whether its tarball is reachable. The probe runs on a blocking
    /// thread.
    pub async fn emit(&self, record: VersionRecord) -> Emission {
        let Some(probe) = self.probe.clone() else {
            return Emission::Declared(self.declare(record));
        };

        let url = record.dist.tarball.clone();
        let outcome = tokio::task::spawn_blocking(move || probe.probe(&url))
            .await
            .unwrap_or_else(|err| Err(DownloadError::Io(std::io::Error::other(err.to_string()))));

        match outcome {
            Ok(true) => {
                trace!(id = %record.id(), "probe accepted");
                Emission::Declared(self.declare(record))
            }
            Ok(false) => {
                warn!(id = %record.id(), tarball = record.dist.tarball.as_str(), "tarball not found, skipping");
                Emission::Skipped(ProbeFailure {
                    id: record.id(),
                    tarball_url: record.dist.tarball,
                    error: None,
                })
            }
            Err(err) => {
                warn!(id = %record.id(), "probe failed: {err}");
                Emission::Skipped(ProbeFailure {
                    id: record.id(),
                    tarball_url: record.dist.tarball,
                    error: Some(err.to_string()),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use npmirror_dl::MemoryDownloader;
    use npmirror_registry::Dist;

    use super::*;

    fn record(name: &str, version: &str) -> VersionRecord {
        VersionRecord {
            name: name.to_string(),
            version: version.to_string(),
            dependencies: Default::default(),
            dist: Dist {
                tarball: format!("https://reg/{name}/-/{name}-{version}.tgz"),
                shasum: None,
                integrity: None,
            },
        }
    }

    #[tokio::test]
    async fn test_emit_without_probe_passes_defer_through() {
        for defer in [true, false] {
            let emitter = ContentEmitter::new(defer);
            match emitter.emit(record("a", "1.0.0")).await {
                Emission::Declared(d) => {
                    assert_eq!(d.defer_artifact, defer);
                    assert_eq!(d.relative_path, "a/-/a-1.0.0.tgz");
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_emit_with_probe() {
        let dl = Arc::new(
            MemoryDownloader::new()
                .with_body("https://reg/a/-/a-1.0.0.tgz", "tgz")
                .with_unreachable("https://reg/c/-/c-1.0.0.tgz"),
        );
        let emitter =
            ContentEmitter::new(false).with_probe(Arc::new(DownloaderProbe::new(dl.clone())));

        assert!(matches!(
            emitter.emit(record("a", "1.0.0")).await,
            Emission::Declared(_)
        ));

        match emitter.emit(record("b", "1.0.0")).await {
            Emission::Skipped(failure) => {
                assert_eq!(failure.id.name, "b");
                assert!(failure.error.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }

        match emitter.emit(record("c", "1.0.0")).await {
            Emission::Skipped(failure) => assert!(failure.error.is_some()),
            other => panic!("unexpected {other:?}"),
        }

        assert_eq!(dl.probe_count("https://reg/a/-/a-1.0.0.tgz"), 1);
        assert_eq!(dl.total_fetches(), 0);
    }
}
