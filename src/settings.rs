use alloc::{
    collections::BTreeMap,
    string::{String, ToString as _},
    sync::Arc,
    vec,
    vec::Vec,
};
use config::{FileFormat, FileSourceFile, Value};
use core::fmt::{self, Debug, Formatter};
use serde::de::DeserializeOwned;
use std::{env, path::Path};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::{
    errors::{BootstrapErrorKind, ConfigErrorKind},
    provider::{ProviderEntry, ServiceProvider},
    Container, Key,
};

pub const ENV_VAR_PREFIX: &str = "BINDERY";
pub const ENV_VAR_DELIM: &str = "__";
/// Variable holding the config file or directory read by [`Config::from_env`]
pub const CONFIG_PATH_VAR: &str = "BINDERY_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config";

/// Key aliased to [`Config`] in every bootstrapped container.
pub const CONFIG_KEY: &str = "config";

const DEPENDENCIES: &str = "dependencies";
const PROVIDERS: &str = "providers";

/// Read access to configuration values by key.
pub trait ConfigRepository: Send + Sync + 'static {
    fn get(&self, key: &str) -> Option<Value>;
}

impl ConfigRepository for config::Config {
    fn get(&self, key: &str) -> Option<Value> {
        config::Config::get::<Value>(self, key).ok()
    }
}

impl ConfigRepository for BTreeMap<String, Value> {
    fn get(&self, key: &str) -> Option<Value> {
        BTreeMap::get(self, key).cloned()
    }
}

/// Configuration the container is bootstrapped with, available from it as [`Config`] once built.
///
/// Two keys drive bootstrap:
/// - `dependencies`: table of alias to concrete key,
/// - `providers`: list of provider names.
#[derive(Clone)]
pub struct Config {
    repository: Arc<dyn ConfigRepository>,
}

impl Config {
    #[must_use]
    pub fn new(repository: impl ConfigRepository) -> Self {
        Self {
            repository: Arc::new(repository),
        }
    }

    /// Loads TOML files (a directory is walked for `*.toml` files in name order),
    /// then `BINDERY__*` environment variables on top of them.
    ///
    /// # Errors
    /// Returns an error if a file is missing or malformed.
    pub fn load<P: AsRef<Path>>(paths: &[P]) -> Result<Self, ConfigErrorKind> {
        Self::build(paths, true)
    }

    /// Same as [`Config::load`] with the path from `BINDERY_CONFIG_PATH` (`config` when unset).
    /// A missing file is not an error here.
    ///
    /// # Errors
    /// Returns an error if a file is malformed.
    pub fn from_env() -> Result<Self, ConfigErrorKind> {
        let path = env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        debug!(%path, "Loading config");
        Self::build(&[path], false)
    }

    fn build<P: AsRef<Path>>(paths: &[P], required: bool) -> Result<Self, ConfigErrorKind> {
        let mut builder = config::Config::builder();

        for path in paths {
            for file in config_files(path.as_ref(), required) {
                builder = builder.add_source(file);
            }
        }

        let env_source = config::Environment::with_prefix(ENV_VAR_PREFIX)
            .separator(ENV_VAR_DELIM)
            .list_separator(",")
            .with_list_parse_key(PROVIDERS)
            .try_parsing(true);

        Ok(Self::new(builder.add_source(env_source).build()?))
    }

    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.repository.get(key)
    }

    /// # Errors
    /// Returns [`ConfigErrorKind::InvalidShape`] if the value can't be read as `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigErrorKind> {
        let Some(value) = self.get(key) else {
            return Ok(None);
        };
        value.try_deserialize().map(Some).map_err(|err| ConfigErrorKind::InvalidShape {
            key: key.to_string(),
            reason: err.to_string(),
        })
    }

    pub(crate) fn dependencies(&self) -> Result<Vec<(Key, Key)>, ConfigErrorKind> {
        Ok(self
            .get_as::<BTreeMap<String, String>>(DEPENDENCIES)?
            .unwrap_or_default()
            .into_iter()
            .map(|(from, to)| (Key::from(from), Key::from(to)))
            .collect())
    }

    pub(crate) fn providers(&self) -> Result<Vec<Key>, ConfigErrorKind> {
        Ok(self
            .get_as::<Vec<String>>(PROVIDERS)?
            .unwrap_or_default()
            .into_iter()
            .map(Key::from)
            .collect())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(BTreeMap::<String, Value>::new())
    }
}

impl Debug for Config {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config").finish_non_exhaustive()
    }
}

fn config_files(path: &Path, required: bool) -> Vec<config::File<FileSourceFile, FileFormat>> {
    if !path.is_dir() {
        return vec![config::File::from(path).required(required)];
    }

    WalkDir::new(path)
        .sort_by_file_name()
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(%err, "Skipping unreadable config entry");
                    return None;
                }
            };
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "toml") {
                Some(config::File::from(path).required(required))
            } else {
                None
            }
        })
        .collect()
}

/// Core provider: binds the bootstrap [`Config`] into the container.
pub struct ConfigProvider {
    container: Container,
    config: Config,
}

impl ConfigProvider {
    pub(crate) fn entry(config: Config) -> ProviderEntry {
        ProviderEntry::new(Key::of::<Self>(), move |container| Self {
            container,
            config: config.clone(),
        })
    }
}

impl ServiceProvider for ConfigProvider {
    fn register(&self) -> Result<(), BootstrapErrorKind> {
        self.container.instance(Key::of::<Config>(), self.config.clone());
        Ok(())
    }
}
