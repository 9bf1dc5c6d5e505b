//! Resolves which ignore and package override rules apply to a scan target.
//!
//! Precedence is override config, then the `osv-scanner.toml` next to the target, then the
//! default config.

#![warn(
    clippy::clone_on_ref_ptr,
    clippy::map_err_ignore,
    clippy::redundant_closure_for_method_calls,
    clippy::semicolon_if_nothing_returned,
    clippy::str_to_string,
    clippy::uninlined_format_args,
    clippy::unwrap_in_result,
    clippy::use_self
)]
#![deny(
    clippy::derive_partial_eq_without_eq,
    clippy::match_bool,
    clippy::mem_forget,
    clippy::mutex_atomic,
    clippy::mutex_integer,
    clippy::nonstandard_macro_braces,
    clippy::path_buf_push_overwrite,
    clippy::rc_mutex,
    clippy::wildcard_dependencies
)]

use std::{
    fmt::Debug,
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use dashmap::DashMap;
use log::{debug, warn};

use crate::error::{Error, Result};
pub use crate::{
    config::{Config, IgnoreEntry, License, PackageOverrideEntry},
    filter::filter_results,
    reporter::{LogReporter, Reporter, VoidReporter},
};

pub mod config;
pub mod error;
pub mod expiry;
pub mod filter;
pub mod models;
pub mod reporter;

pub const OSV_SCANNER_CONFIG_NAME: &str = "osv-scanner.toml";

/// Reads a config document from disk.
pub trait ConfigLoader: Debug + Send + Sync {
    fn load(&self, path: &Path) -> Result<Config>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TomlFileLoader;

impl ConfigLoader for TomlFileLoader {
    fn load(&self, path: &Path) -> Result<Config> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_owned(),
            source,
        })?;
        Config::from_toml_str(&content).map_err(|source| Error::Decode {
            path: path.to_owned(),
            source,
        })
    }
}

#[derive(Debug)]
pub struct ConfigManager {
    override_config: Option<Arc<Config>>,
    default_config: Arc<Config>,
    // Never evicted; a scan touches one entry per directory.
    cache: DashMap<PathBuf, Arc<Config>>,
    loader: Box<dyn ConfigLoader>,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl ConfigManager {
    #[must_use]
    pub fn new(default_config: Config) -> Self {
        Self {
            override_config: None,
            default_config: Arc::new(default_config),
            cache: DashMap::new(),
            loader: Box::new(TomlFileLoader),
        }
    }

    #[must_use]
    pub fn with_loader<L: ConfigLoader + 'static>(mut self, loader: L) -> Self {
        self.loader = Box::new(loader);
        self
    }

    /// Loads the config at `path` and uses it for every target from now on.
    ///
    /// On error the previous override, if any, stays in place.
    pub fn set_override(&mut self, path: &Path) -> Result<()> {
        let mut config = self.loader.load(path)?;
        config.load_path = Some(path.to_owned());
        debug!("Using override config {path:?}");
        self.override_config = Some(Arc::new(config));
        Ok(())
    }

    /// Returns the config that applies to `target`.
    #[must_use]
    pub fn get(&self, reporter: &dyn Reporter, target: &Path) -> Arc<Config> {
        if let Some(config) = &self.override_config {
            return Arc::clone(config);
        }

        let config_path = match normalize_config_load_path(target) {
            Ok(config_path) => config_path,
            Err(e) => {
                // Targets that are not files (container images, commits) end up here.
                debug!("{e}, using default config");
                return Arc::clone(&self.default_config);
            }
        };

        if let Some(config) = self.cache.get(&config_path) {
            debug!("Config cache hit for {config_path:?}");
            return Arc::clone(config.value());
        }

        let config = match self.loader.load(&config_path) {
            Ok(mut config) => {
                config.load_path = Some(config_path.clone());
                reporter.info(&format!("Loaded filter from: {}", config_path.display()));
                Arc::new(config)
            }
            Err(e) => {
                if e.is_not_found() {
                    debug!("{e}, using default config");
                } else {
                    warn!("{e}, using default config");
                }
                Arc::clone(&self.default_config)
            }
        };
        Arc::clone(self.cache.entry(config_path).or_insert(config).value())
    }

    #[must_use]
    pub fn override_config(&self) -> Option<&Arc<Config>> {
        self.override_config.as_ref()
    }

    #[must_use]
    pub const fn default_config(&self) -> &Arc<Config> {
        &self.default_config
    }

    /// Number of distinct config locations resolved so far.
    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}

/// Finds the containing folder of `target`, then appends [`OSV_SCANNER_CONFIG_NAME`].
pub fn normalize_config_load_path(target: &Path) -> Result<PathBuf> {
    let metadata = std::fs::metadata(target).map_err(|source| Error::Discovery {
        path: target.to_owned(),
        source,
    })?;
    let containing_folder = if metadata.is_dir() {
        target
    } else {
        match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    };
    Ok(clean_path(&containing_folder.join(OSV_SCANNER_CONFIG_NAME)))
}

/// Lexically removes `.` and `..` segments so every spelling of a location maps to one key.
fn clean_path(path: &Path) -> PathBuf {
    let mut parts: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                // `..` at the root is the root itself.
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            _ => parts.push(component),
        }
    }
    if parts.is_empty() {
        return PathBuf::from(".");
    }
    parts.iter().collect()
}
