use crate::{
    domain::DEFAULT_COLUMN_TITLES,
    error::{KanbanError, Result},
    storage::{MemoryStorage, Storage},
};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::Arc,
};

/// Storage technology backing the boards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    File,
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Data directory for `file`, database file for `sqlite`
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::File,
            path: PathBuf::from("."),
        }
    }
}

/// Runtime configuration, read from `config.toml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KanbanConfig {
    /// Column titles of lazily created boards, left to right
    pub default_columns: Vec<String>,
    pub storage: StorageConfig,
    /// `tracing` filter directive used when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for KanbanConfig {
    fn default() -> Self {
        Self {
            default_columns: DEFAULT_COLUMN_TITLES.iter().map(|t| t.to_string()).collect(),
            storage: StorageConfig::default(),
            log_filter: "info".to_string(),
        }
    }
}

impl KanbanConfig {
    pub const CONFIG_FILE: &'static str = "config.toml";

    /// Parses and validates a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(contents).map_err(|e| KanbanError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the config file, falling back to defaults when it does not exist
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let contents = tokio::fs::read_to_string(path).await?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_columns.is_empty() {
            return Err(KanbanError::ConfigError(
                "default_columns must name at least one column".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for title in &self.default_columns {
            if title.trim().is_empty() {
                return Err(KanbanError::ConfigError(
                    "default_columns contains a blank title".to_string(),
                ));
            }
            if !seen.insert(title.as_str()) {
                return Err(KanbanError::ConfigError(format!(
                    "default_columns lists {:?} twice",
                    title
                )));
            }
        }
        Ok(())
    }

    /// Builds the configured storage backend
    pub fn open_storage(&self) -> Result<Arc<dyn Storage>> {
        let titles = self.default_columns.clone();
        match self.storage.backend {
            StorageBackend::Memory => Ok(Arc::new(MemoryStorage::with_default_columns(titles))),

            #[cfg(feature = "file-storage")]
            StorageBackend::File => Ok(Arc::new(
                crate::storage::FileStorage::with_default_columns(&self.storage.path, titles),
            )),

            #[cfg(feature = "sqlite-storage")]
            StorageBackend::Sqlite => {
                let path = self.storage.path.to_str().ok_or_else(|| {
                    KanbanError::ConfigError(format!(
                        "database path {} is not valid UTF-8",
                        self.storage.path.display()
                    ))
                })?;
                Ok(Arc::new(
                    crate::storage::SqliteStorage::new(path)?.with_default_columns(titles),
                ))
            }

            #[allow(unreachable_patterns)]
            backend => Err(KanbanError::ConfigError(format!(
                "storage backend {:?} is not compiled in",
                backend
            ))),
        }
    }
}
