use crate::errors::{DbError, DbResult, DbResultExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for a store and its bulk loader
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding one subdirectory per entity kind
    pub root: PathBuf,
    /// Root of the backup namespace
    #[serde(default)]
    pub backup_root: Option<PathBuf>,
    /// Mapping attributes stored as one shard instead of one per leaf
    #[serde(default = "default_opaque")]
    pub opaque: Vec<String>,
    /// Bulk loader settings
    #[serde(default)]
    pub loader: LoaderConfig,
}

/// Bulk iteration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Width of the loader pool
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Entities handed to the pool at once; bounds how far loading runs
    /// ahead of the consumer
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_opaque() -> Vec<String> {
    vec!["interface_features".to_string()]
}

fn default_workers() -> usize {
    50
}

fn default_batch_size() -> usize {
    256
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self { workers: default_workers(), batch_size: default_batch_size() }
    }
}

impl StoreConfig {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            backup_root: None,
            opaque: default_opaque(),
            loader: LoaderConfig::default(),
        }
    }

    /// Load a configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_field_context("path", &format!("cannot read {}", path.display()))?;
        let config: StoreConfig = toml::from_str(&text).map_err(|e| DbError::ConfigurationError {
            field: "toml".to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> DbResult<()> {
        if self.root.as_os_str().is_empty() {
            return Err(DbError::ConfigurationError {
                field: "root".to_string(),
                message: "Store root must not be empty".to_string(),
            });
        }

        if self.backup_root.as_deref() == Some(self.root.as_path()) {
            return Err(DbError::ConfigurationError {
                field: "backup_root".to_string(),
                message: "Backup root must differ from the store root".to_string(),
            });
        }

        if self.loader.workers == 0 {
            return Err(DbError::ConfigurationError {
                field: "workers".to_string(),
                message: "Worker count must be greater than 0".to_string(),
            });
        }

        if self.loader.batch_size == 0 {
            return Err(DbError::ConfigurationError {
                field: "batch_size".to_string(),
                message: "Batch size must be greater than 0".to_string(),
            });
        }

        if let Some(name) = self.opaque.iter().find(|n| n.is_empty() || n.contains(['.', '/'])) {
            return Err(DbError::ConfigurationError {
                field: "opaque".to_string(),
                message: format!("{:?} is not a top-level attribute name", name),
            });
        }

        Ok(())
    }

    /// Backup root, defaulting to `<root>.backup` next to the store
    pub fn effective_backup_root(&self) -> PathBuf {
        match &self.backup_root {
            Some(root) => root.clone(),
            None => {
                let mut name = self.root.file_name().map(|n| n.to_os_string()).unwrap_or_default();
                name.push(".backup");
                self.root.with_file_name(name)
            }
        }
    }
}

/// Configuration builder
pub struct StoreConfigBuilder {
    config: StoreConfig,
}

impl StoreConfigBuilder {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { config: StoreConfig::new(root) }
    }

    pub fn backup_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.config.backup_root = Some(root.into());
        self
    }

    /// Replace the opaque attribute list
    pub fn opaque<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.opaque = names.into_iter().map(Into::into).collect();
        self
    }

    /// Set the loader pool width
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.loader.workers = workers;
        self
    }

    /// Set the batch size
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.loader.batch_size = size;
        self
    }

    /// Build the final configuration
    pub fn build(self) -> DbResult<StoreConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
