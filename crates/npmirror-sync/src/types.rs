use std::collections::BTreeMap;

use npmirror_registry::{relative_path, PackageId, VersionRecord};
use serde::{Deserialize, Serialize};

/// What a sink must make available for one package version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentDeclaration {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, String>,
    #[serde(rename = "tarballURL")]
    pub tarball_url: String,
    pub relative_path: String,
    /// When set, the tarball is fetched on first access instead of now.
    pub defer_artifact: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shasum: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrity: Option<String>,
}

impl ContentDeclaration {
    pub fn from_record(record: VersionRecord, defer_artifact: bool) -> Self {
        Self {
            relative_path: relative_path(&record.name, &record.version),
            name: record.name,
            version: record.version,
            dependencies: record.dependencies,
            tarball_url: record.dist.tarball,
            defer_artifact,
            shasum: record.dist.shasum,
            integrity: record.dist.integrity,
        }
    }

    pub fn id(&self) -> PackageId {
        PackageId::new(&self.name, &self.version)
    }
}

/// A dependency whose packument could not be obtained. Its subtree is
/// missing from the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedDependency {
    pub name: String,
    /// Packument URL, when resolution got that far.
    pub url: Option<String>,
    pub reason: String,
}

/// A version dropped because the artifact probe rejected it or failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeFailure {
    pub id: PackageId,
    pub tarball_url: String,
    /// `None` when the probe answered that the tarball does not exist.
    pub error: Option<String>,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Declarations accepted by the sink, in acceptance order.
    pub declared: Vec<PackageId>,
    pub probe_failures: Vec<ProbeFailure>,
    pub skipped_dependencies: Vec<SkippedDependency>,
    /// Whether the run asked its sink to replace previous content.
    pub mirror: bool,
}

impl SyncReport {
    pub fn is_complete(&self) -> bool {
        self.probe_failures.is_empty() && self.skipped_dependencies.is_empty()
    }

    pub fn skipped_names(&self) -> Vec<&str> {
        self.skipped_dependencies
            .iter()
            .map(|s| s.name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use npmirror_registry::Dist;

    use super::*;

    #[test]
    fn test_declaration_from_record() {
        let record = VersionRecord {
            name: "@types/node".to_string(),
            version: "20.0.0".to_string(),
            dependencies: BTreeMap::from([("undici-types".to_string(), "~5".to_string())]),
            dist: Dist {
                tarball: "https://reg/@types/node/-/node-20.0.0.tgz".to_string(),
                shasum: Some("abc".to_string()),
                integrity: None,
            },
        };

        let declaration = ContentDeclaration::from_record(record, true);
        assert_eq!(
            declaration.relative_path,
            "@types/node/-/@types/node-20.0.0.tgz"
        );
        assert_eq!(declaration.tarball_url, "https://reg/@types/node/-/node-20.0.0.tgz");
        assert!(declaration.defer_artifact);
        assert_eq!(declaration.id(), PackageId::new("@types/node", "20.0.0"));

        let value = serde_json::to_value(&declaration).unwrap();
        assert_eq!(value["relativePath"], "@types/node/-/@types/node-20.0.0.tgz");
        assert_eq!(value["tarballURL"], "https://reg/@types/node/-/node-20.0.0.tgz");
        assert_eq!(value["deferArtifact"], true);
        assert!(value.get("integrity").is_none());
    }
}
