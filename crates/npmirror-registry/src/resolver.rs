//! Mapping dependency names to packument URLs.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use url::Url;

use crate::error::{RegistryError, Result};

/// Characters escaped in a package-name path segment. `/` is included so a
/// scoped name stays one segment (`@scope%2fname`), as npm registries expect.
const PACKAGE_NAME: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Produces the packument URL for a dependency name.
pub trait DependencyUrlResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Result<String>;
}

impl<F> DependencyUrlResolver for F
where
    F: Fn(&str) -> Result<String> + Send + Sync,
{
    fn resolve(&self, name: &str) -> Result<String> {
        self(name)
    }
}

fn validate_name(name: &str) -> Result<()> {
    let valid = match name.strip_prefix('@') {
        Some(scoped) => scoped
            .split_once('/')
            .is_some_and(|(scope, pkg)| !scope.is_empty() && !pkg.is_empty() && !pkg.contains('/')),
        None => !name.is_empty() && !name.contains('/'),
    };

    if valid {
        Ok(())
    } else {
        Err(RegistryError::InvalidPackageName(name.to_string()))
    }
}

/// Packument URL for `name` under the registry rooted at `base`.
///
/// The base may carry a path prefix and a query string; both are kept.
///
/// ```
/// use npmirror_registry::package_url;
/// use url::Url;
///
/// let base = Url::parse("https://registry.npmjs.org/").unwrap();
/// assert_eq!(package_url(&base, "left-pad").unwrap(), "https://registry.npmjs.org/left-pad");
/// assert_eq!(package_url(&base, "@types/node").unwrap(), "https://registry.npmjs.org/@types%2Fnode");
/// ```
pub fn package_url(base: &Url, name: &str) -> Result<String> {
    validate_name(name)?;

    let encoded = utf8_percent_encode(name, PACKAGE_NAME);
    let path = format!("{}/{encoded}", base.path().trim_end_matches('/'));

    let mut url = base.clone();
    url.set_path(&path);
    Ok(url.to_string())
}

/// Resolver that places every dependency under one registry base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryUrlResolver {
    base: Url,
}

impl RegistryUrlResolver {
    pub fn new(base: Url) -> Self {
        Self { base }
    }

    pub fn parse(base: &str) -> Result<Self> {
        Url::parse(base)
            .map(Self::new)
            .map_err(|err| RegistryError::InvalidUrl(format!("{base}: {err}")))
    }

    /// Derives the registry base from the URL of a package's packument by
    /// dropping the package path segments.
    ///
    /// Handles `<base>/<name>`, `<base>/@scope%2fname`, `<base>/@scope/name`
    /// and the single-version form `<base>/<name>/<version>`. Without the
    /// package name at hand, a trailing segment is taken to be a version
    /// only when it starts with a digit and contains a dot, so a dist-tag
    /// such as `/left-pad/latest` is misread. Prefer
    /// [`for_package`](Self::for_package) once the packument is known.
    pub fn from_package_url(package_url: &str) -> Result<Self> {
        let (mut url, mut segments) = split_segments(package_url)?;

        let looks_like_version =
            |s: &str| s.starts_with(|c: char| c.is_ascii_digit()) && s.contains('.');

        if segments.len() >= 2 && segments.last().is_some_and(|s| looks_like_version(s)) {
            segments.pop();
        }
        if segments.pop().is_none() {
            return Err(RegistryError::InvalidUrl(format!(
                "{package_url}: no package name in path"
            )));
        }
        if segments.last().is_some_and(|s| s.starts_with('@')) {
            segments.pop();
        }

        url.set_path(&format!("/{}", segments.join("/")));
        Ok(Self::new(url))
    }

    /// Derives the registry base from the URL a packument named `name` was
    /// fetched from: everything before the last occurrence of the name in
    /// the path, whether it appears as one segment (`left-pad`,
    /// `@scope%2Fname`) or two (`@scope/name`). Whatever follows the name,
    /// a version or a dist-tag, is dropped with it.
    ///
    /// Falls back to [`from_package_url`](Self::from_package_url) when the
    /// name does not appear in the path.
    pub fn for_package(package_url: &str, name: &str) -> Result<Self> {
        let (mut url, segments) = split_segments(package_url)?;
        let decoded: Vec<String> = segments
            .iter()
            .map(|s| percent_decode_str(s).decode_utf8_lossy().into_owned())
            .collect();

        let single = decoded.iter().rposition(|s| s == name);
        let split = name.split_once('/').and_then(|(scope, pkg)| {
            (1..decoded.len())
                .rev()
                .find(|&i| decoded[i - 1] == scope && decoded[i] == pkg)
                .map(|i| i - 1)
        });

        let Some(cut) = single.into_iter().chain(split).max() else {
            return Self::from_package_url(package_url);
        };

        url.set_path(&format!("/{}", segments[..cut].join("/")));
        Ok(Self::new(url))
    }

    pub fn base(&self) -> &Url {
        &self.base
    }
}

fn split_segments(package_url: &str) -> Result<(Url, Vec<String>)> {
    let url = Url::parse(package_url)
        .map_err(|err| RegistryError::InvalidUrl(format!("{package_url}: {err}")))?;

    let segments = url
        .path_segments()
        .map(|segments| {
            segments
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();
    Ok((url, segments))
}

impl DependencyUrlResolver for RegistryUrlResolver {
    fn resolve(&self, name: &str) -> Result<String> {
        package_url(&self.base, name)
    }
}
