//! Where a session reads persisted settings from.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::debug;

use outlinelens_shared::{AppConfig, OutlineError, Result, load_config, load_config_from};

/// Source of the persisted configuration, consulted at session start and on
/// every `configUpdated` request.
pub trait ConfigStore: Send + Sync {
    fn load(&self) -> Result<AppConfig>;
}

impl<T: ConfigStore + ?Sized> ConfigStore for Arc<T> {
    fn load(&self) -> Result<AppConfig> {
        (**self).load()
    }
}

/// Reads `outlinelens.toml`, from an explicit path or the default location.
#[derive(Debug, Clone, Default)]
pub struct FileConfigStore {
    path: Option<PathBuf>,
}

impl FileConfigStore {
    /// The default `~/.outlinelens/outlinelens.toml`.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Result<AppConfig> {
        match &self.path {
            Some(path) => {
                debug!(?path, "loading config");
                load_config_from(path)
            }
            None => load_config(),
        }
    }
}

/// In-memory settings that can be swapped at runtime.
#[derive(Debug, Default)]
pub struct StaticConfig(Mutex<AppConfig>);

impl StaticConfig {
    pub fn new(config: AppConfig) -> Self {
        Self(Mutex::new(config))
    }

    /// Replace the stored settings; the next `load` returns them.
    pub fn replace(&self, config: AppConfig) {
        if let Ok(mut current) = self.0.lock() {
            *current = config;
        }
    }
}

impl ConfigStore for StaticConfig {
    fn load(&self) -> Result<AppConfig> {
        self.0
            .lock()
            .map(|config| config.clone())
            .map_err(|_| OutlineError::config("config store poisoned"))
    }
}
