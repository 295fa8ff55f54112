//! One sync run: walk, emit, hand over.

use std::sync::Arc;

use npmirror_config::{config::Config, remote::Remote};
use npmirror_dl::SharedDownloader;
use npmirror_events::{EventSinkHandle, NullSink, SyncEvent};
use npmirror_registry::{
    DependencyUrlResolver, PackumentFetcher, RegistryError, RegistryUrlResolver,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

use crate::{
    emitter::{ContentEmitter, DownloaderProbe, Emission},
    error::{Result, SyncError},
    sink::ContentSink,
    types::SyncReport,
    walker::{fetch_root_packument, Walker, DEFAULT_CONCURRENCY},
};

/// Per-run parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    pub follow_dependencies: bool,
    pub defer_artifact: bool,
    /// Check each tarball before declaring it.
    pub probe: bool,
    pub concurrency: usize,
    /// Passed through to the report; the sink decides what replacing means.
    pub mirror: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            follow_dependencies: true,
            defer_artifact: false,
            probe: false,
            concurrency: DEFAULT_CONCURRENCY,
            mirror: false,
        }
    }
}

impl SyncOptions {
    pub fn from_remote(remote: &Remote, config: &Config) -> Self {
        Self {
            follow_dependencies: remote.follow_dependencies(),
            defer_artifact: remote.defer_artifact(),
            probe: remote.probe(),
            concurrency: config.concurrency(),
            mirror: remote.is_mirror(),
        }
    }
}

pub struct SyncPipeline {
    downloader: SharedDownloader,
    /// `None` derives the registry base from the root URL and the name of
    /// the root packument once it has been fetched.
    resolver: Option<Arc<dyn DependencyUrlResolver>>,
    options: SyncOptions,
    events: EventSinkHandle,
    cancel: CancellationToken,
}

impl SyncPipeline {
    pub fn new(
        downloader: SharedDownloader,
        resolver: Arc<dyn DependencyUrlResolver>,
        options: SyncOptions,
    ) -> Self {
        Self {
            downloader,
            resolver: Some(resolver),
            options,
            events: Arc::new(NullSink),
            cancel: CancellationToken::new(),
        }
    }

    /// Pipeline for a configured remote. Returns it with the root URL to
    /// pass to [`run`](Self::run).
    ///
    /// Dependencies resolve under the remote's `registry` when set;
    /// otherwise under the root URL with the root package's path removed.
    pub fn for_remote(
        downloader: SharedDownloader,
        remote: &Remote,
        config: &Config,
    ) -> Result<(Self, String)> {
        let root_url = remote.url.trim();
        if root_url.is_empty() {
            return Err(SyncError::MissingRootUrl);
        }

        Url::parse(root_url)
            .map_err(|err| RegistryError::InvalidUrl(format!("{root_url}: {err}")))?;

        let resolver = remote.registry_base()?.map(|base| {
            debug!(remote = remote.name.as_str(), registry = %base, "using configured registry");
            Arc::new(RegistryUrlResolver::new(base)) as Arc<dyn DependencyUrlResolver>
        });

        let pipeline = Self {
            resolver,
            ..Self::new_deriving(downloader, SyncOptions::from_remote(remote, config))
        };
        Ok((pipeline, root_url.to_string()))
    }

    /// Pipeline whose registry base is derived from the root URL and the
    /// root packument's name.
    pub fn new_deriving(downloader: SharedDownloader, options: SyncOptions) -> Self {
        Self {
            downloader,
            resolver: None,
            options,
            events: Arc::new(NullSink),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_events(mut self, events: EventSinkHandle) -> Self {
        self.events = events;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Walks the graph rooted at `root_url` and hands every declaration to
    /// `sink`, one at a time, in traversal order.
    ///
    /// # Errors
    ///
    /// Returns an error if the root URL is empty, the root packument cannot
    /// be fetched, the sink fails, or the run is cancelled. Declarations
    /// accepted before the error stay accepted.
    pub async fn run<S: ContentSink>(&self, root_url: &str, sink: &mut S) -> Result<SyncReport> {
        if root_url.trim().is_empty() {
            return Err(SyncError::MissingRootUrl);
        }

        let fetcher = PackumentFetcher::new(self.downloader.clone());
        let root = fetch_root_packument(&fetcher, root_url, &self.cancel).await?;

        let resolver = match &self.resolver {
            Some(resolver) => resolver.clone(),
            None => {
                let derived = RegistryUrlResolver::for_package(root_url, &root.name)?;
                debug!(registry = %derived.base(), "derived registry base from root URL");
                Arc::new(derived)
            }
        };

        let mut walker = Walker::new(fetcher, resolver)
            .follow_dependencies(self.options.follow_dependencies)
            .concurrency(self.options.concurrency)
            .events(self.events.clone())
            .cancel_token(self.cancel.clone());
        walker.seed_root(root_url, root);

        let mut emitter = ContentEmitter::new(self.options.defer_artifact);
        if self.options.probe {
            emitter = emitter.with_probe(Arc::new(DownloaderProbe::new(self.downloader.clone())));
        }

        let mut report = SyncReport {
            mirror: self.options.mirror,
            ..Default::default()
        };

        while let Some(record) = walker.next_record().await? {
            let emission = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(SyncError::Cancelled),
                emission = emitter.emit(record) => emission,
            };

            let declaration = match emission {
                Emission::Declared(declaration) => declaration,
                Emission::Skipped(failure) => {
                    self.events.emit(SyncEvent::ProbeRejected {
                        name: failure.id.name.clone(),
                        version: failure.id.version.clone(),
                        reason: failure.error.clone(),
                    });
                    report.probe_failures.push(failure);
                    continue;
                }
            };

            let id = declaration.id();
            let event = SyncEvent::Declared {
                name: declaration.name.clone(),
                version: declaration.version.clone(),
                relative_path: declaration.relative_path.clone(),
                deferred: declaration.defer_artifact,
            };

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(SyncError::Cancelled),
                accepted = sink.accept(declaration) => accepted?,
            }

            self.events.emit(event);
            report.declared.push(id);
        }

        report.skipped_dependencies = walker.into_skipped();

        info!(
            declared = report.declared.len(),
            skipped = report.skipped_dependencies.len(),
            probe_failures = report.probe_failures.len(),
            "sync finished"
        );
        self.events.emit(SyncEvent::Completed {
            declared: report.declared.len(),
            skipped_dependencies: report.skipped_dependencies.len(),
        });

        Ok(report)
    }
}
