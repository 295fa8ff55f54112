//! Storage path convention for mirrored tarballs.
//!
//! Every tarball lives at `{name}/-/{name}-{version}.tgz` relative to the
//! store root. The same function is used by whatever writes content and
//! whatever serves it back, so the layout never diverges between them.

/// Separator between the package name and the tarball filename.
const TARBALL_SEGMENT: &str = "/-/";
const TARBALL_EXTENSION: &str = ".tgz";

/// Storage path of the tarball for `name@version`.
///
/// ```
/// use npmirror_registry::relative_path;
///
/// assert_eq!(relative_path("left-pad", "1.0.0"), "left-pad/-/left-pad-1.0.0.tgz");
/// ```
pub fn relative_path(name: &str, version: &str) -> String {
    format!("{name}{TARBALL_SEGMENT}{name}-{version}{TARBALL_EXTENSION}")
}

/// Recovers `(name, version)` from a tarball storage path.
///
/// Besides the canonical form this accepts the registry's own filename for
/// scoped packages, where the scope is dropped from the file name
/// (`@scope/pkg/-/pkg-1.0.0.tgz`). Anything that is not a tarball path,
/// such as a bare package name, yields `None`.
pub fn parse_relative_path(path: &str) -> Option<(String, String)> {
    let path = path.trim_start_matches('/');
    let (name, filename) = path.split_once(TARBALL_SEGMENT)?;
    if name.is_empty() || (filename.contains('/') && !name.starts_with('@')) {
        return None;
    }

    let stem = filename.strip_suffix(TARBALL_EXTENSION)?;
    let basename = name.rsplit('/').next().unwrap_or(name);

    let version = stem
        .strip_prefix(name)
        .or_else(|| stem.strip_prefix(basename))
        .and_then(|rest| rest.strip_prefix('-'))?;

    if version.is_empty() {
        return None;
    }

    Some((name.to_string(), version.to_string()))
}
