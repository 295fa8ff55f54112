//! Directory-backed content sink.
//!
//! Layout under the store root:
//!
//! ```text
//! index.json                      every declaration, keyed by relative path
//! left-pad/-/left-pad-1.3.0.tgz   tarballs of immediate-policy declarations
//! ```

use std::{
    collections::BTreeMap,
    path::{Component, Path, PathBuf},
};

use npmirror_dl::SharedDownloader;
use npmirror_registry::parse_relative_path;
use npmirror_sync::{ContentDeclaration, ContentSink, SinkError};
use npmirror_utils::{
    fs::{ensure_dir_exists, safe_remove, write_atomic},
    hash::{calculate_checksum, checksum_bytes},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::error::{CliError, CliResult, ErrorContext};

pub const INDEX_FILE: &str = "index.json";

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StoreIndex {
    pub packages: BTreeMap<String, ContentDeclaration>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Tarballs downloaded and written by this run.
    pub written: usize,
    /// Tarballs already present and left alone.
    pub existing: usize,
    /// Tarballs already present and confirmed against the registry.
    pub verified: usize,
    /// Declarations recorded without fetching their tarball.
    pub deferred: usize,
    /// Tarballs removed because the run no longer declares them.
    pub pruned: usize,
    /// Entries in the index after the run.
    pub indexed: usize,
}

pub struct DirectoryStore {
    root: PathBuf,
    downloader: SharedDownloader,
    verify_existing: bool,
    declared: BTreeMap<String, ContentDeclaration>,
    stats: StoreStats,
}

impl DirectoryStore {
    pub fn open(
        root: impl Into<PathBuf>,
        downloader: SharedDownloader,
        verify_existing: bool,
    ) -> CliResult<Self> {
        let root = root.into();
        ensure_dir_exists(&root)?;

        Ok(Self {
            root,
            downloader,
            verify_existing,
            declared: BTreeMap::new(),
            stats: StoreStats::default(),
        })
    }

    pub fn has_declarations(&self) -> bool {
        !self.declared.is_empty()
    }

    /// Absolute location of `relative_path`, or `None` if the path could
    /// escape the store.
    pub fn tarball_path(&self, relative_path: &str) -> Option<PathBuf> {
        let relative = Path::new(relative_path);
        let mut components = relative.components().peekable();
        components.peek()?;

        components
            .all(|c| matches!(c, Component::Normal(_)))
            .then(|| self.root.join(relative))
    }

    pub fn load_index(&self) -> CliResult<StoreIndex> {
        let path = self.root.join(INDEX_FILE);
        match std::fs::read(&path) {
            Ok(content) => Ok(serde_json::from_slice(&content)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(StoreIndex::default()),
            Err(err) => Err(err).with_context(|| format!("reading {}", path.display())),
        }
    }

    /// Writes the index and returns the run statistics.
    ///
    /// Without `mirror` the run's declarations are merged into the existing
    /// index. With `mirror` the index is replaced, and tarballs listed in
    /// the old index but not declared by this run are deleted. Index keys
    /// that are not tarball paths are dropped from the index but their
    /// files are left alone.
    pub fn finish(self, mirror: bool) -> CliResult<StoreStats> {
        let previous = self.load_index()?;
        let mut stats = self.stats.clone();

        let packages = if mirror {
            for relative_path in previous.packages.keys() {
                if self.declared.contains_key(relative_path) {
                    continue;
                }
                if parse_relative_path(relative_path).is_none() {
                    warn!("not pruning {relative_path}: not a tarball path");
                    continue;
                }
                if let Some(path) = self.tarball_path(relative_path).filter(|p| p.is_file()) {
                    debug!("pruning {}", path.display());
                    safe_remove(&path)?;
                    stats.pruned += 1;
                }
            }
            self.declared
        } else {
            let mut merged = previous.packages;
            merged.extend(self.declared);
            merged
        };

        stats.indexed = packages.len();
        let content = serde_json::to_vec_pretty(&StoreIndex { packages })?;
        write_atomic(self.root.join(INDEX_FILE), &content)?;

        Ok(stats)
    }

    async fn download(&self, url: &str) -> CliResult<Vec<u8>> {
        let downloader = self.downloader.clone();
        let url = url.to_string();
        let bytes = tokio::task::spawn_blocking(move || downloader.fetch(&url))
            .await
            .map_err(|err| CliError::Custom(format!("Join handle error: {err}")))??;
        Ok(bytes)
    }

    async fn materialize(&mut self, declaration: &ContentDeclaration) -> CliResult<()> {
        let path = self
            .tarball_path(&declaration.relative_path)
            .ok_or_else(|| CliError::Custom("path escapes the store".to_string()))?;

        if path.is_file() {
            if !self.verify_existing {
                trace!("{} already stored", declaration.relative_path);
                self.stats.existing += 1;
                return Ok(());
            }

            let fresh = self.download(&declaration.tarball_url).await?;
            if checksum_bytes(&fresh) != calculate_checksum(&path)? {
                return Err(CliError::Custom(
                    "stored tarball differs from the registry copy".to_string(),
                ));
            }
            self.stats.verified += 1;
            return Ok(());
        }

        let bytes = self.download(&declaration.tarball_url).await?;
        write_atomic(&path, &bytes)?;
        debug!("stored {} ({} bytes)", declaration.relative_path, bytes.len());
        self.stats.written += 1;
        Ok(())
    }
}

impl ContentSink for DirectoryStore {
    async fn accept(&mut self, declaration: ContentDeclaration) -> Result<(), SinkError> {
        if declaration.defer_artifact {
            self.stats.deferred += 1;
        } else {
            self.materialize(&declaration)
                .await
                .map_err(|err| SinkError::rejected(&declaration, err.to_string()))?;
        }

        self.declared
            .insert(declaration.relative_path.clone(), declaration);
        Ok(())
    }
}
