//! Breadth-first traversal of a package's dependency graph.
//!
//! The walker is pull-based: [`Walker::next_record`] yields one version
//! record at a time and only expands that record's dependencies when the
//! next record is requested. A consumer that stops pulling stops the
//! traversal, so a slow sink bounds how far ahead the walk runs.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::Arc,
};

use npmirror_events::{EventSinkHandle, NullSink, SyncEvent};
use npmirror_registry::{
    DependencyUrlResolver, FetchError, PackageId, Packument, PackumentFetcher, VersionRecord,
};
use tokio::{sync::Semaphore, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::{
    error::{Result, SyncError},
    types::SkippedDependency,
};

pub const DEFAULT_CONCURRENCY: usize = 4;

/// Fetches a root packument on a blocking thread, giving up when `cancel`
/// fires first.
pub async fn fetch_root_packument(
    fetcher: &PackumentFetcher,
    url: &str,
    cancel: &CancellationToken,
) -> Result<Packument> {
    let fetcher = fetcher.clone();
    let owned_url = url.to_string();
    let handle = tokio::task::spawn_blocking(move || fetcher.fetch(&owned_url));

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SyncError::Cancelled),
        joined = handle => joined
            .map_err(|err| SyncError::Custom(format!("Join handle error: {err}")))?
            .map_err(SyncError::RootFetch),
    }
}

/// BFS walker over version records.
///
/// One walker serves one run. It owns the pending queue, the visited sets
/// and the record of which packuments were already requested; nothing is
/// shared between runs.
pub struct Walker {
    fetcher: PackumentFetcher,
    resolver: Arc<dyn DependencyUrlResolver>,
    follow_dependencies: bool,
    concurrency: usize,
    events: EventSinkHandle,
    cancel: CancellationToken,

    queue: VecDeque<VersionRecord>,
    /// Number of queued records per package name.
    queued_names: HashMap<String, usize>,
    visited: HashSet<PackageId>,
    visited_names: HashSet<String>,
    /// Names whose packument was requested, successfully or not.
    requested: HashSet<String>,
    /// Dependencies of the last yielded record, expanded on the next pull.
    pending_expansion: Option<Vec<String>>,
    skipped: Vec<SkippedDependency>,
}

impl Walker {
    pub fn new(fetcher: PackumentFetcher, resolver: Arc<dyn DependencyUrlResolver>) -> Self {
        Self {
            fetcher,
            resolver,
            follow_dependencies: true,
            concurrency: DEFAULT_CONCURRENCY,
            events: Arc::new(NullSink),
            cancel: CancellationToken::new(),
            queue: VecDeque::new(),
            queued_names: HashMap::new(),
            visited: HashSet::new(),
            visited_names: HashSet::new(),
            requested: HashSet::new(),
            pending_expansion: None,
            skipped: Vec::new(),
        }
    }

    pub fn follow_dependencies(mut self, follow: bool) -> Self {
        self.follow_dependencies = follow;
        self
    }

    /// Upper bound on dependency packuments fetched at the same time.
    pub fn concurrency(mut self, limit: usize) -> Self {
        self.concurrency = limit.max(1);
        self
    }

    pub fn events(mut self, events: EventSinkHandle) -> Self {
        self.events = events;
        self
    }

    pub fn cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Fetches the root packument and seeds the queue with all of its
    /// versions. Returns the number of versions seeded.
    ///
    /// # Errors
    ///
    /// A failed root fetch is fatal and returned as [`SyncError::RootFetch`].
    pub async fn fetch_root(&mut self, url: &str) -> Result<usize> {
        let packument = fetch_root_packument(&self.fetcher, url, &self.cancel).await?;
        Ok(self.seed_root(url, packument))
    }

    /// Seeds the queue from a root packument fetched from `url` by the
    /// caller. Returns the number of versions seeded.
    pub fn seed_root(&mut self, url: &str, packument: Packument) -> usize {
        let versions = packument.len();
        debug!(url, name = packument.name.as_str(), versions, "fetched root packument");
        self.events.emit(SyncEvent::RootFetched {
            url: url.to_string(),
            versions,
        });
        self.seed(packument);
        versions
    }

    /// Queues every version of an already fetched packument.
    pub fn seed(&mut self, packument: Packument) {
        self.requested.insert(packument.name.clone());
        for record in packument.into_records() {
            self.enqueue(record);
        }
    }

    /// Yields the next unvisited version record, or `None` when the
    /// traversal is exhausted.
    ///
    /// Dependencies of the record returned by the previous call are
    /// expanded first, so the record itself always reaches the caller
    /// before any of its dependency packuments are requested.
    pub async fn next_record(&mut self) -> Result<Option<VersionRecord>> {
        loop {
            if self.cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }

            if let Some(names) = self.pending_expansion.take() {
                self.expand(names).await?;
            }

            let Some(record) = self.queue.pop_front() else {
                return Ok(None);
            };
            self.unqueue(&record.name);

            if !self.visited.insert(record.id()) {
                trace!(id = %record.id(), "already visited");
                continue;
            }
            self.visited_names.insert(record.name.clone());

            if self.follow_dependencies && !record.dependencies.is_empty() {
                self.pending_expansion = Some(record.dependencies.keys().cloned().collect());
            }

            return Ok(Some(record));
        }
    }

    /// Drains the walker into a vector.
    pub async fn walk(&mut self) -> Result<Vec<VersionRecord>> {
        let mut records = Vec::new();
        while let Some(record) = self.next_record().await? {
            records.push(record);
        }
        Ok(records)
    }

    pub fn skipped(&self) -> &[SkippedDependency] {
        &self.skipped
    }

    pub fn into_skipped(self) -> Vec<SkippedDependency> {
        self.skipped
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    fn enqueue(&mut self, record: VersionRecord) {
        *self.queued_names.entry(record.name.clone()).or_default() += 1;
        self.queue.push_back(record);
    }

    fn unqueue(&mut self, name: &str) {
        if let Some(count) = self.queued_names.get_mut(name) {
            *count -= 1;
            if *count == 0 {
                self.queued_names.remove(name);
            }
        }
    }

    fn is_known(&self, name: &str) -> bool {
        self.visited_names.contains(name)
            || self.queued_names.contains_key(name)
            || self.requested.contains(name)
    }

    /// Fetches the packuments of all names not seen yet, at most
    /// `concurrency` at a time, and queues their records in name order.
    async fn expand(&mut self, names: Vec<String>) -> Result<()> {
        let mut jobs = Vec::new();
        for name in names {
            if self.is_known(&name) {
                continue;
            }
            self.requested.insert(name.clone());

            match self.resolver.resolve(&name) {
                Ok(url) => jobs.push((name, url)),
                Err(err) => self.skip(name, None, err.to_string()),
            }
        }

        if jobs.is_empty() {
            return Ok(());
        }
        trace!(count = jobs.len(), "fetching dependency packuments");

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut handles: Vec<(String, JoinHandle<std::result::Result<Packument, FetchError>>)> =
            Vec::with_capacity(jobs.len());

        for (name, url) in jobs {
            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(SyncError::Cancelled),
                permit = semaphore.clone().acquire_owned() => permit
                    .map_err(|err| SyncError::Custom(format!("Semaphore closed: {err}")))?,
            };
            let fetcher = self.fetcher.clone();

            let handle = tokio::task::spawn_blocking(move || {
                let result = fetcher.fetch(&url);
                drop(permit);
                result
            });
            handles.push((name, handle));
        }

        for (name, handle) in handles {
            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(SyncError::Cancelled),
                joined = handle => joined
                    .map_err(|err| SyncError::Custom(format!("Join handle error: {err}")))?,
            };

            match result {
                Ok(packument) => {
                    let versions = packument.len();
                    debug!(name = name.as_str(), versions, "fetched dependency packument");
                    self.events.emit(SyncEvent::DependencyFetched {
                        name: name.clone(),
                        versions,
                    });
                    self.requested.insert(packument.name.clone());
                    for record in packument.into_records() {
                        self.enqueue(record);
                    }
                }
                Err(err) => {
                    let url = err.request_url().to_string();
                    self.skip(name, Some(url), err.to_string());
                }
            }
        }

        Ok(())
    }

    fn skip(&mut self, name: String, url: Option<String>, reason: String) {
        warn!("Skipping dependency {name}: {reason}");
        self.events.emit(SyncEvent::DependencySkipped {
            name: name.clone(),
            reason: reason.clone(),
        });
        self.skipped.push(SkippedDependency { name, url, reason });
    }
}
