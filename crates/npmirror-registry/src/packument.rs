//! Package metadata as published by an npm-compatible registry.
//!
//! A registry answers `GET <registry>/<name>` with a *packument*. Two wire
//! shapes are accepted:
//!
//! - a multi-version document with a `versions` map (the normal case), and
//! - a single-version document whose whole body is one version record, as
//!   returned by `GET <registry>/<name>/<version>`.
//!
//! Maps are ordered (`BTreeMap`) so that iterating versions and dependency
//! names is deterministic for a given document.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// The dedup key of the whole system: one published version of one package.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageId {
    pub name: String,
    pub version: String,
}

impl PackageId {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// Internal enum for dependency fields in the shapes seen in the wild.
///
/// Old packages occasionally publish `"dependencies": []` or a list of bare
/// names, and ranges are not always strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum FlexiDependencies {
    Map(BTreeMap<String, Value>),
    List(Vec<String>),
}

fn flexible_dependencies<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let deps = match Option::<FlexiDependencies>::deserialize(deserializer)? {
        Some(FlexiDependencies::Map(map)) => map
            .into_iter()
            .map(|(name, range)| {
                let range = match range {
                    Value::String(s) => s,
                    _ => "*".to_string(),
                };
                (name, range)
            })
            .collect(),
        Some(FlexiDependencies::List(names)) => names
            .into_iter()
            .map(|name| (name, "*".to_string()))
            .collect(),
        None => BTreeMap::new(),
    };
    Ok(deps)
}

fn empty_is_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    Ok(s.filter(|s| !s.is_empty()))
}

/// Distribution block of a version record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dist {
    /// Absolute URL of the package tarball.
    pub tarball: String,

    /// Hex SHA-1 of the tarball, when the registry publishes one.
    #[serde(
        default,
        deserialize_with = "empty_is_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub shasum: Option<String>,

    /// Subresource-integrity string (`sha512-...`), when published.
    #[serde(
        default,
        deserialize_with = "empty_is_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub integrity: Option<String>,
}

/// Metadata for a single published version. Unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub name: String,
    pub version: String,

    /// Dependency name to version range. Only the names drive traversal.
    #[serde(
        default,
        deserialize_with = "flexible_dependencies",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub dependencies: BTreeMap<String, String>,

    pub dist: Dist,
}

impl VersionRecord {
    pub fn id(&self) -> PackageId {
        PackageId::new(&self.name, &self.version)
    }
}

/// One package's metadata document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Packument {
    pub name: String,
    pub versions: BTreeMap<String, VersionRecord>,
    #[serde(rename = "dist-tags")]
    pub dist_tags: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct MultiVersionDocument {
    #[serde(default)]
    name: String,
    versions: BTreeMap<String, VersionRecord>,
    #[serde(default, rename = "dist-tags")]
    dist_tags: BTreeMap<String, String>,
}

impl Packument {
    /// Parses either wire shape from raw bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        Self::from_value(serde_json::from_slice(bytes)?)
    }

    /// Parses either wire shape from an already decoded JSON value.
    ///
    /// The presence of a top-level `versions` key selects the multi-version
    /// shape; anything else must be a single version record.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        if value.get("versions").is_none() {
            let record: VersionRecord = serde_json::from_value(value)?;
            return Ok(Self::single(record));
        }

        let doc: MultiVersionDocument = serde_json::from_value(value)?;
        let name = if doc.name.is_empty() {
            doc.versions
                .values()
                .next()
                .map(|record| record.name.clone())
                .unwrap_or_default()
        } else {
            doc.name
        };

        Ok(Self {
            name,
            versions: doc.versions,
            dist_tags: doc.dist_tags,
        })
    }

    /// Wraps a lone version record as a one-entry packument.
    pub fn single(record: VersionRecord) -> Self {
        Self {
            name: record.name.clone(),
            versions: BTreeMap::from([(record.version.clone(), record)]),
            dist_tags: BTreeMap::new(),
        }
    }

    pub fn into_records(self) -> Vec<VersionRecord> {
        self.versions.into_values().collect()
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_multi_version_document() {
        let doc = json!({
            "name": "a",
            "dist-tags": {"latest": "1.1.0"},
            "versions": {
                "1.0.0": {
                    "name": "a",
                    "version": "1.0.0",
                    "dependencies": {"b": "^1.0.0"},
                    "dist": {"tarball": "https://reg/a/-/a-1.0.0.tgz"}
                },
                "1.1.0": {
                    "name": "a",
                    "version": "1.1.0",
                    "description": "ignored",
                    "dist": {
                        "tarball": "https://reg/a/-/a-1.1.0.tgz",
                        "shasum": "abc",
                        "integrity": ""
                    }
                }
            }
        });

        let packument = Packument::from_value(doc).unwrap();
        assert_eq!(packument.name, "a");
        assert_eq!(packument.len(), 2);
        assert_eq!(packument.dist_tags["latest"], "1.1.0");

        let first = &packument.versions["1.0.0"];
        assert_eq!(first.dependencies.get("b").map(String::as_str), Some("^1.0.0"));
        assert_eq!(first.id(), PackageId::new("a", "1.0.0"));

        let second = &packument.versions["1.1.0"];
        assert!(second.dependencies.is_empty());
        assert_eq!(second.dist.shasum.as_deref(), Some("abc"));
        assert_eq!(second.dist.integrity, None);
    }

    #[test]
    fn test_single_version_document() {
        let body = br#"{"name":"b","version":"2.0.0","dist":{"tarball":"https://reg/b/-/b-2.0.0.tgz"}}"#;

        let packument = Packument::from_slice(body).unwrap();
        assert_eq!(packument.name, "b");
        assert_eq!(packument.len(), 1);
        assert!(packument.dist_tags.is_empty());
        assert_eq!(packument.into_records()[0].version, "2.0.0");
    }

    #[test]
    fn test_name_falls_back_to_records() {
        let doc = json!({
            "versions": {
                "0.1.0": {"name": "c", "version": "0.1.0", "dist": {"tarball": "https://reg/c.tgz"}}
            }
        });
        assert_eq!(Packument::from_value(doc).unwrap().name, "c");
    }

    #[test]
    fn test_flexible_dependencies() {
        let record: VersionRecord = serde_json::from_value(json!({
            "name": "old",
            "version": "0.0.1",
            "dependencies": ["x", "y"],
            "dist": {"tarball": "https://reg/old.tgz"}
        }))
        .unwrap();
        assert_eq!(record.dependencies.len(), 2);
        assert_eq!(record.dependencies["x"], "*");

        let record: VersionRecord = serde_json::from_value(json!({
            "name": "odd",
            "version": "0.0.1",
            "dependencies": null,
            "dist": {"tarball": "https://reg/odd.tgz"}
        }))
        .unwrap();
        assert!(record.dependencies.is_empty());

        let record: VersionRecord = serde_json::from_value(json!({
            "name": "weird",
            "version": "0.0.1",
            "dependencies": {"z": {"version": "1"}},
            "dist": {"tarball": "https://reg/weird.tgz"}
        }))
        .unwrap();
        assert_eq!(record.dependencies["z"], "*");
    }

    #[test]
    fn test_missing_dist_is_an_error() {
        assert!(Packument::from_value(json!({"name": "a", "version": "1.0.0"})).is_err());
        assert!(Packument::from_slice(b"not json").is_err());
        assert!(Packument::from_value(json!({"versions": "nope"})).is_err());
    }

    #[test]
    fn test_record_serialization_omits_empty_fields() {
        let record = VersionRecord {
            name: "a".to_string(),
            version: "1.0.0".to_string(),
            dependencies: BTreeMap::new(),
            dist: Dist {
                tarball: "https://reg/a/-/a-1.0.0.tgz".to_string(),
                shasum: None,
                integrity: None,
            },
        };
        let value = serde_json::to_value(&record).unwrap();
        assert!(value.get("dependencies").is_none());
        assert!(value["dist"].get("shasum").is_none());
        assert_eq!(PackageId::new("a", "1.0.0").to_string(), "a@1.0.0");
    }
}
