/// Events emitted while a sync run makes progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// The root packument was fetched and parsed.
    RootFetched { url: String, versions: usize },
    /// A dependency packument was fetched and its versions queued.
    DependencyFetched { name: String, versions: usize },
    /// A dependency could not be fetched; its subtree is left out of the run.
    DependencySkipped { name: String, reason: String },
    /// A declaration was accepted by the sink.
    Declared {
        name: String,
        version: String,
        relative_path: String,
        deferred: bool,
    },
    /// The artifact probe rejected a version, or failed while checking it.
    ProbeRejected {
        name: String,
        version: String,
        reason: Option<String>,
    },
    /// The run finished.
    Completed {
        declared: usize,
        skipped_dependencies: usize,
    },
}
