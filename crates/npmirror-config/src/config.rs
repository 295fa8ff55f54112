use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    sync::{LazyLock, RwLock},
};

use documented::{Documented, DocumentedFields};
use npmirror_utils::path::{resolve_path, xdg_config_home, xdg_data_home};
use serde::{Deserialize, Serialize};
use toml_edit::DocumentMut;
use tracing::{debug, info};

use crate::{
    annotations::{annotate_toml_array_of_tables, annotate_toml_table},
    error::{ConfigError, Result},
    remote::{Policy, Remote},
};

pub const DEFAULT_CONCURRENCY: usize = 4;
pub const DEFAULT_SINK_CAPACITY: usize = 16;

/// npmirror configuration
#[derive(Debug, Clone, Deserialize, Serialize, Documented, DocumentedFields)]
pub struct Config {
    /// Directory that receives mirrored tarballs and the index.
    /// Default: $XDG_DATA_HOME/npmirror/store
    pub store_path: Option<String>,

    /// Maximum number of packuments fetched at the same time.
    /// Default: 4
    pub concurrency: Option<usize>,

    /// Number of declarations buffered between the walker and the store.
    /// Default: 16
    pub sink_capacity: Option<usize>,

    /// Re-download tarballs already in the store and compare their checksums.
    /// Default: false
    pub verify_existing: Option<bool>,

    /// Package trees to mirror.
    #[serde(default)]
    pub remotes: Vec<Remote>,
}

pub static CONFIG: LazyLock<RwLock<Option<Config>>> = LazyLock::new(|| RwLock::new(None));

pub static CONFIG_PATH: LazyLock<RwLock<PathBuf>> = LazyLock::new(|| {
    RwLock::new(match std::env::var("NPMIRROR_CONFIG") {
        Ok(path_str) => PathBuf::from(path_str),
        Err(_) => xdg_config_home().join("npmirror").join("config.toml"),
    })
});

pub fn init() -> Result<()> {
    let config = Config::new()?;
    let mut global_config = CONFIG.write().unwrap();
    *global_config = Some(config);
    Ok(())
}

/// Points the loader at `path` instead of the default location.
pub fn set_config_path(path: impl Into<PathBuf>) {
    *CONFIG_PATH.write().unwrap() = path.into();
}

pub fn config_path() -> PathBuf {
    CONFIG_PATH.read().unwrap().to_path_buf()
}

pub fn get_config() -> Config {
    {
        let config_guard = CONFIG.read().unwrap();
        if let Some(config) = config_guard.as_ref() {
            return config.clone();
        }
    }

    let mut config_guard = CONFIG.write().unwrap();
    config_guard.get_or_insert_with(Config::default_config).clone()
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

impl Config {
    pub fn default_config() -> Self {
        let store_path = std::env::var("NPMIRROR_ROOT")
            .map(|root| format!("{root}/store"))
            .unwrap_or_else(|_| format!("{}/npmirror/store", xdg_data_home().display()));

        let mut npmjs = Remote::new("npmjs", "https://registry.npmjs.org/left-pad");
        npmjs.registry = Some("https://registry.npmjs.org/".to_string());
        npmjs.policy = Some(Policy::OnDemand);
        npmjs.sync_deps = Some(true);
        npmjs.mirror = Some(false);
        npmjs.probe = Some(false);

        Self {
            store_path: Some(store_path),
            concurrency: Some(DEFAULT_CONCURRENCY),
            sink_capacity: Some(DEFAULT_SINK_CAPACITY),
            verify_existing: Some(false),
            remotes: vec![npmjs],
        }
    }

    /// Loads the configuration from [`CONFIG_PATH`], falling back to the
    /// defaults when no file exists.
    pub fn new() -> Result<Self> {
        Self::load_from(&config_path())
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        let mut config = match fs::read_to_string(config_path) {
            Ok(content) => {
                debug!(path = %config_path.display(), "loading configuration");
                toml::from_str(&content)?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %config_path.display(), "no configuration file, using defaults");
                Self::default_config()
            }
            Err(err) => return Err(ConfigError::IoError(err)),
        };

        config.resolve()?;

        Ok(config)
    }

    /// Fills unset fields with their defaults and validates the remotes.
    pub fn resolve(&mut self) -> Result<()> {
        if self.concurrency == Some(0) {
            return Err(ConfigError::ZeroLimit("concurrency"));
        }
        if self.sink_capacity == Some(0) {
            return Err(ConfigError::ZeroLimit("sink_capacity"));
        }

        self.concurrency.get_or_insert(DEFAULT_CONCURRENCY);
        self.sink_capacity.get_or_insert(DEFAULT_SINK_CAPACITY);
        self.verify_existing.get_or_insert(false);

        let mut seen = HashSet::new();
        for remote in &self.remotes {
            remote.validate()?;
            if !seen.insert(remote.name.as_str()) {
                return Err(ConfigError::DuplicateRemoteName(remote.name.clone()));
            }
        }

        Ok(())
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency.unwrap_or(DEFAULT_CONCURRENCY)
    }

    pub fn sink_capacity(&self) -> usize {
        self.sink_capacity.unwrap_or(DEFAULT_SINK_CAPACITY)
    }

    pub fn verify_existing(&self) -> bool {
        self.verify_existing.unwrap_or(false)
    }

    pub fn get_store_path(&self) -> Result<PathBuf> {
        if let Ok(env_path) = std::env::var("NPMIRROR_STORE") {
            return Ok(resolve_path(&env_path)?);
        }
        if let Some(store_path) = &self.store_path {
            return Ok(resolve_path(store_path)?);
        }
        Ok(xdg_data_home().join("npmirror").join("store"))
    }

    pub fn get_remote(&self, name: &str) -> Result<&Remote> {
        self.remotes
            .iter()
            .find(|remote| remote.name == name)
            .ok_or_else(|| ConfigError::UnknownRemote(name.to_string()))
    }

    pub fn to_annotated_document(&self) -> Result<DocumentMut> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut doc = toml_string.parse::<DocumentMut>()?;

        annotate_toml_table::<Config>(doc.as_table_mut(), true)?;

        if let Some(remotes_item) = doc.get_mut("remotes") {
            if let Some(remotes_array) = remotes_item.as_array_of_tables_mut() {
                annotate_toml_array_of_tables::<Remote>(remotes_array)?;
            }
        }

        Ok(doc)
    }
}

pub fn generate_default_config() -> Result<PathBuf> {
    let config_path = config_path();

    if config_path.exists() {
        return Err(ConfigError::ConfigAlreadyExists);
    }

    let annotated_doc = Config::default_config().to_annotated_document()?;

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(&config_path, annotated_doc.to_string())?;
    info!(
        "Default configuration file generated with documentation at: {}",
        config_path.display()
    );
    Ok(config_path)
}

#[cfg(test)]
mod tests {
    use serial_test::serial;
    use tempfile::tempdir;

    use super::*;
    use crate::test_utils::with_env;

    #[test]
    fn test_default_config_creation() {
        let config = Config::default_config();

        assert_eq!(config.concurrency(), 4);
        assert_eq!(config.sink_capacity(), 16);
        assert!(!config.verify_existing());
        assert_eq!(config.remotes.len(), 1);
        assert_eq!(config.remotes[0].name, "npmjs");
        assert!(config.remotes[0].defer_artifact());
    }

    #[test]
    fn test_load_minimal_file_sets_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[[remotes]]
name = "pad"
url = "https://registry.example/left-pad"
"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.concurrency, Some(4));
        assert_eq!(config.sink_capacity, Some(16));
        assert_eq!(config.verify_existing, Some(false));

        let remote = config.get_remote("pad").unwrap();
        assert_eq!(remote.policy(), Policy::Immediate);
        assert!(remote.follow_dependencies());
        assert!(matches!(
            config.get_remote("missing"),
            Err(ConfigError::UnknownRemote(_))
        ));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.remotes[0].name, "npmjs");
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "concurrency = \"four\"").unwrap();

        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::TomlDeError(_))
        ));
    }

    #[test]
    fn test_resolve_rejects_duplicates_and_zero_limits() {
        let mut config = Config::default_config();
        config
            .remotes
            .push(Remote::new("npmjs", "https://registry.example/other"));
        assert!(matches!(
            config.resolve(),
            Err(ConfigError::DuplicateRemoteName(_))
        ));

        let mut config = Config::default_config();
        config.concurrency = Some(0);
        assert!(matches!(
            config.resolve(),
            Err(ConfigError::ZeroLimit("concurrency"))
        ));

        let mut config = Config::default_config();
        config.sink_capacity = Some(0);
        assert!(matches!(
            config.resolve(),
            Err(ConfigError::ZeroLimit("sink_capacity"))
        ));
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default_config();
        let serialized = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();

        assert_eq!(deserialized.remotes.len(), config.remotes.len());
        assert_eq!(deserialized.remotes[0].policy, Some(Policy::OnDemand));
    }

    #[test]
    fn test_annotated_document_carries_field_docs() {
        let doc = Config::default_config().to_annotated_document().unwrap();
        let rendered = doc.to_string();

        assert!(rendered.contains("# Maximum number of packuments fetched at the same time."));
        assert!(rendered.contains("# Content policy"));
        assert!(rendered.contains("[[remotes]]"));

        let reparsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(reparsed.remotes[0].name, "npmjs");
    }

    #[test]
    #[serial]
    fn test_store_path_env_override() {
        with_env(&[("NPMIRROR_STORE", Some("/custom/store"))], || {
            let config = Config::default_config();
            assert_eq!(
                config.get_store_path().unwrap(),
                PathBuf::from("/custom/store")
            );
        });

        with_env(&[("NPMIRROR_STORE", None)], || {
            let mut config = Config::default_config();
            config.store_path = Some("/srv/npm".to_string());
            assert_eq!(config.get_store_path().unwrap(), PathBuf::from("/srv/npm"));
        });
    }

    #[test]
    #[serial]
    fn test_generate_default_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let previous = config_path();
        set_config_path(&path);

        let written = generate_default_config().unwrap();
        assert_eq!(written, path);
        assert!(path.exists());
        assert!(matches!(
            generate_default_config(),
            Err(ConfigError::ConfigAlreadyExists)
        ));

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.concurrency(), 4);

        set_config_path(previous);
    }
}
