use std::sync::Arc;

use npmirror_config::{
    config::{get_config, Config},
    remote::Remote,
};
use npmirror_dl::{HttpDownloader, SharedDownloader};
use npmirror_events::{ChannelSink, EventSinkHandle, NullSink};
use npmirror_sync::{BoundedSink, ContentDeclaration, SyncError, SyncPipeline, SyncReport};
use npmirror_utils::path::resolve_path;
use nu_ansi_term::Color::{Cyan, Green, Red, Yellow};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    cli::{PolicyArg, Selection},
    error::{CliError, CliResult},
    progress::{spawn_event_handler, ProgressGuard},
    store::{DirectoryStore, StoreStats},
    utils::{progress_enabled, Colored},
};

/// Run-specific overrides from the `sync` command line.
pub struct SyncArgs {
    pub selection: Selection,
    pub policy: Option<PolicyArg>,
    pub mirror: bool,
    pub probe: bool,
    pub store: Option<String>,
}

fn create_event_sink(json: bool) -> (EventSinkHandle, Option<ProgressGuard>) {
    if progress_enabled() && !json {
        let (sink, receiver) = ChannelSink::new();
        let guard = spawn_event_handler(receiver);
        (Arc::new(sink), Some(guard))
    } else {
        (Arc::new(NullSink), None)
    }
}

/// Picks the remote to walk and applies the command-line overrides.
///
/// A named remote must exist. Without a name, `--url` defines an ad-hoc
/// remote; otherwise the first configured remote is used.
pub fn select_remote(config: &Config, selection: &Selection) -> CliResult<Remote> {
    let mut remote = match (&selection.remote, &selection.url) {
        (Some(name), _) => config.get_remote(name)?.clone(),
        (None, Some(url)) => Remote::new("cli", url.clone()),
        (None, None) => config.remotes.first().cloned().ok_or(CliError::NoRemote)?,
    };

    if let Some(url) = &selection.url {
        remote.url = url.clone();
    }
    if let Some(registry) = &selection.registry {
        remote.registry = Some(registry.clone());
    }
    if selection.no_deps {
        remote.sync_deps = Some(false);
    }
    Ok(remote)
}

fn effective_config(selection: &Selection) -> Config {
    let mut config = get_config();
    if let Some(limit) = selection.concurrency {
        config.concurrency = Some(limit.max(1));
    }
    config
}

#[derive(Serialize)]
struct SyncSummary<'a> {
    remote: &'a str,
    store: String,
    report: &'a SyncReport,
    stats: &'a StoreStats,
}

pub async fn sync_remote(args: SyncArgs, cancel: CancellationToken, json: bool) -> CliResult<()> {
    let config = effective_config(&args.selection);
    let mut remote = select_remote(&config, &args.selection)?;
    if let Some(policy) = args.policy {
        remote.policy = Some(policy.into());
    }
    if args.mirror {
        remote.mirror = Some(true);
    }
    if args.probe {
        remote.probe = Some(true);
    }

    let store_root = match &args.store {
        Some(path) => resolve_path(path)?,
        None => config.get_store_path()?,
    };

    let downloader: SharedDownloader = Arc::new(HttpDownloader::new());
    let (pipeline, root_url) = SyncPipeline::for_remote(downloader.clone(), &remote, &config)?;
    let mut store = DirectoryStore::open(&store_root, downloader, config.verify_existing())?;

    info!(
        "Syncing {} from {} into {}",
        Colored(Cyan, &remote.name),
        root_url,
        store_root.display()
    );

    let (events, progress) = create_event_sink(json);
    let pipeline = pipeline.with_events(events).with_cancel_token(cancel);
    let result = pipeline.run(&root_url, &mut store).await;
    drop(pipeline);
    if let Some(progress) = progress {
        progress.finish();
    }

    let report = match result {
        Ok(report) => report,
        Err(err) => return Err(abandon_store(store, err)),
    };

    let stats = finish_store(store, &report)?;

    if json {
        let summary = SyncSummary {
            remote: &remote.name,
            store: store_root.display().to_string(),
            report: &report,
            stats: &stats,
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    print_summary(&report, &stats);
    Ok(())
}

/// Records what a failed run already accepted and hands back the run's
/// error. A failure to write the index is only logged.
fn abandon_store(store: DirectoryStore, err: SyncError) -> CliError {
    if store.has_declarations() {
        if let Err(finish_err) = store.finish(false) {
            warn!("Failed to record accepted declarations: {finish_err}");
        }
    }
    err.into()
}

/// Writes the index for a finished run. Old tarballs are pruned only when
/// a mirror run reached every dependency and probed every tarball; after a
/// partial run the store is merged additively instead.
fn finish_store(store: DirectoryStore, report: &SyncReport) -> CliResult<StoreStats> {
    let prune = report.mirror && report.is_complete();
    if report.mirror && !prune {
        warn!(
            "{} run was incomplete, keeping previously mirrored tarballs",
            Colored(Yellow, "!")
        );
    }
    store.finish(prune)
}

fn print_summary(report: &SyncReport, stats: &StoreStats) {
    info!(
        "{} {} versions declared ({} written, {} already stored, {} verified, {} deferred)",
        Colored(Green, "✓"),
        report.declared.len(),
        stats.written,
        stats.existing,
        stats.verified,
        stats.deferred
    );

    if report.mirror {
        info!("Pruned {} tarballs no longer mirrored", stats.pruned);
    }

    for skipped in &report.skipped_dependencies {
        warn!(
            "{} dependency {} skipped: {}",
            Colored(Yellow, "!"),
            Colored(Cyan, &skipped.name),
            skipped.reason
        );
    }

    for failure in &report.probe_failures {
        let reason = failure.error.as_deref().unwrap_or("tarball not found");
        warn!(
            "{} {} dropped: {}",
            Colored(Red, "✗"),
            Colored(Cyan, &failure.id),
            reason
        );
    }
}

fn print_declaration(declaration: &ContentDeclaration, json: bool) -> CliResult<()> {
    if json {
        println!("{}", serde_json::to_string(declaration)?);
    } else {
        println!("{}", declaration.relative_path);
    }
    Ok(())
}

/// Walks the remote and prints each declaration instead of storing it.
///
/// Declarations travel through a bounded channel of `sink_capacity`
/// entries, so a slow terminal holds back the walk.
pub async fn plan_remote(
    selection: Selection,
    cancel: CancellationToken,
    json: bool,
) -> CliResult<()> {
    let config = effective_config(&selection);
    let mut remote = select_remote(&config, &selection)?;
    remote.probe = Some(false);

    let downloader: SharedDownloader = Arc::new(HttpDownloader::new());
    let (pipeline, root_url) = SyncPipeline::for_remote(downloader, &remote, &config)?;

    let (mut sink, mut receiver) = BoundedSink::bounded(config.sink_capacity());
    let printer = tokio::spawn(async move {
        while let Some(declaration) = receiver.recv().await {
            print_declaration(&declaration, json)?;
        }
        CliResult::Ok(())
    });

    let result = pipeline
        .with_cancel_token(cancel)
        .run(&root_url, &mut sink)
        .await;
    drop(sink);

    printer
        .await
        .map_err(|err| CliError::Custom(format!("Join handle error: {err}")))??;
    let report = result?;

    for skipped in &report.skipped_dependencies {
        warn!("dependency {} skipped: {}", skipped.name, skipped.reason);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use npmirror_dl::MemoryDownloader;
    use npmirror_registry::RegistryUrlResolver;
    use npmirror_sync::{ContentSink, SyncOptions};
    use serde_json::{json, Value};
    use tempfile::tempdir;

    use super::*;

    fn tarball(name: &str) -> String {
        format!("https://reg/{name}/-/{name}-1.0.0.tgz")
    }

    fn packument(name: &str, deps: &[&str]) -> Value {
        let deps: serde_json::Map<String, Value> =
            deps.iter().map(|d| (d.to_string(), json!("^1.0.0"))).collect();
        json!({
            "name": name,
            "versions": {
                "1.0.0": {
                    "name": name,
                    "version": "1.0.0",
                    "dependencies": deps,
                    "dist": {"tarball": tarball(name)}
                }
            }
        })
    }

    async fn mirror_into(dl: Arc<MemoryDownloader>, root: &Path) -> (SyncReport, StoreStats) {
        let resolver = RegistryUrlResolver::parse("https://reg/").unwrap();
        let options = SyncOptions {
            mirror: true,
            ..Default::default()
        };
        let pipeline = SyncPipeline::new(dl.clone(), Arc::new(resolver), options);
        let mut store = DirectoryStore::open(root, dl, false).unwrap();

        let report = pipeline.run("https://reg/a", &mut store).await.unwrap();
        let stats = finish_store(store, &report).unwrap();
        (report, stats)
    }

    fn selection() -> Selection {
        Selection {
            remote: None,
            url: None,
            registry: None,
            no_deps: false,
            concurrency: None,
        }
    }

    #[test]
    fn test_select_remote() {
        let mut config = Config::default_config();
        config
            .remotes
            .push(Remote::new("pad", "https://registry.example/left-pad"));

        let remote = select_remote(&config, &selection()).unwrap();
        assert_eq!(remote.name, "npmjs");

        let mut named = selection();
        named.remote = Some("pad".to_string());
        named.no_deps = true;
        let remote = select_remote(&config, &named).unwrap();
        assert_eq!(remote.url, "https://registry.example/left-pad");
        assert!(!remote.follow_dependencies());

        let mut adhoc = selection();
        adhoc.url = Some("https://registry.example/right-pad".to_string());
        adhoc.registry = Some("https://mirror.example/".to_string());
        let remote = select_remote(&config, &adhoc).unwrap();
        assert_eq!(remote.name, "cli");
        assert_eq!(remote.registry.as_deref(), Some("https://mirror.example/"));

        let mut unknown = selection();
        unknown.remote = Some("nope".to_string());
        assert!(matches!(
            select_remote(&config, &unknown),
            Err(CliError::Config(_))
        ));

        config.remotes.clear();
        assert!(matches!(
            select_remote(&config, &selection()),
            Err(CliError::NoRemote)
        ));
    }

    #[tokio::test]
    async fn test_incomplete_mirror_run_keeps_stored_tarballs() {
        let dir = tempdir().unwrap();
        let b_path = dir.path().join("b/-/b-1.0.0.tgz");

        let healthy = Arc::new(
            MemoryDownloader::new()
                .with_json("https://reg/a", &packument("a", &["b"]))
                .with_json("https://reg/b", &packument("b", &[]))
                .with_body(tarball("a"), "tarball a")
                .with_body(tarball("b"), "tarball b"),
        );
        let (report, stats) = mirror_into(healthy, dir.path()).await;
        assert!(report.is_complete());
        assert_eq!(stats.written, 2);

        let flaky = Arc::new(
            MemoryDownloader::new()
                .with_json("https://reg/a", &packument("a", &["b"]))
                .with_status("https://reg/b", 503)
                .with_body(tarball("a"), "tarball a"),
        );
        let (report, stats) = mirror_into(flaky, dir.path()).await;
        assert_eq!(report.skipped_names(), ["b"]);
        assert_eq!(stats.pruned, 0);
        assert_eq!(stats.indexed, 2);
        assert!(b_path.exists());

        let without_b = Arc::new(
            MemoryDownloader::new()
                .with_json("https://reg/a", &packument("a", &[]))
                .with_body(tarball("a"), "tarball a"),
        );
        let (report, stats) = mirror_into(without_b, dir.path()).await;
        assert!(report.is_complete());
        assert_eq!(stats.pruned, 1);
        assert_eq!(stats.indexed, 1);
        assert!(!b_path.exists());
    }

    #[tokio::test]
    async fn test_failed_run_reports_its_own_error() {
        let dir = tempdir().unwrap();
        let dl = Arc::new(MemoryDownloader::new().with_body(tarball("a"), "tarball a"));
        let mut store = DirectoryStore::open(dir.path(), dl, false).unwrap();
        let declaration = ContentDeclaration {
            name: "a".to_string(),
            version: "1.0.0".to_string(),
            dependencies: Default::default(),
            tarball_url: tarball("a"),
            relative_path: npmirror_registry::relative_path("a", "1.0.0"),
            defer_artifact: false,
            shasum: None,
            integrity: None,
        };
        store.accept(declaration).await.unwrap();
        std::fs::create_dir(dir.path().join(crate::store::INDEX_FILE)).unwrap();

        let err = abandon_store(store, SyncError::Cancelled);
        assert!(matches!(err, CliError::Sync(SyncError::Cancelled)));
    }
}
