//! Configuration types and loading
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `COMMESSE__<SECTION>__<KEY>` environment variables.

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "COMMESSE";

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct AppConfig {
    /// Persistence configuration
    pub storage: StorageConfig,

    /// Document attachment rules
    pub documents: DocumentsConfig,

    /// Progress calculation weights
    pub progress: ProgressConfig,

    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct StorageConfig {
    /// Directory holding one file per storage key
    pub data_dir: PathBuf,
    /// Layout used when writing records
    pub layout: StorageLayout,
    /// Total byte budget for all stored values (None = unlimited)
    pub quota_bytes: Option<u64>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageLayout {
    /// Index blob plus one blob per record
    #[default]
    Sharded,
    /// Single blob holding the whole record set
    Monolithic,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct DocumentsConfig {
    /// Maximum accepted file size in bytes
    pub max_file_size: u64,
    /// Accepted extensions (lowercase, no dot)
    pub allowed_extensions: Vec<String>,
    /// Accepted MIME types
    pub allowed_mime_types: Vec<String>,
    /// What happens to files over the size ceiling
    pub oversize: OversizePolicy,
    /// Categories offered on a work order
    pub work_order_categories: Vec<CategoryConfig>,
    /// Categories offered on a furniture item
    pub item_categories: Vec<CategoryConfig>,
    /// Where opened documents are materialized (None = system cache dir)
    pub open_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OversizePolicy {
    /// Store a note-only entry in place of the payload
    #[default]
    Placeholder,
    /// Refuse the file like an unsupported type
    Reject,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct CategoryConfig {
    pub key: String,
    pub label: String,
}

impl CategoryConfig {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ProgressConfig {
    /// Weight of the furniture phase average when orders exist
    pub production_weight: f64,
    /// Weight of the delivered-orders fraction when orders exist
    pub orders_weight: f64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            production_weight: 0.7,
            orders_weight: 0.3,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            max_file_size: 1_887_436, // 1.8 MiB
            allowed_extensions: ["pdf", "jpg", "jpeg", "png"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            allowed_mime_types: ["application/pdf", "image/jpeg", "image/png"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            oversize: OversizePolicy::Placeholder,
            work_order_categories: vec![
                CategoryConfig::new("rilievi", "Foto / Rilievi"),
                CategoryConfig::new("disegni", "Disegni"),
                CategoryConfig::new("preventivi", "Preventivi / Fatture"),
                CategoryConfig::new("ordini", "Ordini"),
                CategoryConfig::new("fatture", "Documenti"),
            ],
            item_categories: vec![
                CategoryConfig::new("rilievi", "Foto / Rilievi"),
                CategoryConfig::new("disegni", "Disegni"),
                CategoryConfig::new("ordini", "Ordini"),
            ],
            open_dir: None,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                data_dir: default_data_dir(),
                layout: StorageLayout::Sharded,
                quota_bytes: None,
            },
            documents: DocumentsConfig::default(),
            progress: ProgressConfig::default(),
            logging: LoggingConfig {
                filter: "warn".to_string(),
                json: false,
            },
        }
    }
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
    #[error("Config file error: {0}")]
    FileError(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::FileError(err.to_string())
    }
}

impl From<ConfigError> for crate::error::CmError {
    fn from(err: ConfigError) -> Self {
        crate::error::CmError::Config(err.to_string())
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("it", "IdeaLegno", "commesse")
}

/// Platform data directory, falling back to `./.commesse`
pub fn default_data_dir() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".commesse"))
}

/// Platform location of `commesse.toml`
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("commesse.toml"))
}

/// Platform cache directory used for opened documents
pub fn default_cache_dir() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .unwrap_or_else(std::env::temp_dir)
}

impl AppConfig {
    /// Load defaults, then `file` (or the platform default file when it
    /// exists), then environment overrides.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let defaults = Config::try_from(&AppConfig::default())?;
        let mut builder = Config::builder().add_source(defaults);

        match file {
            Some(path) => {
                builder = builder.add_source(File::from(path).required(true));
            }
            None => {
                if let Some(path) = default_config_path() {
                    builder = builder.add_source(File::from(path).required(false));
                }
            }
        }

        let config: AppConfig = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values no calculation can work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let weights = &self.progress;
        if weights.production_weight < 0.0 || weights.orders_weight < 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "progress".into(),
                message: "weights must not be negative".into(),
            });
        }
        if weights.production_weight + weights.orders_weight <= 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "progress".into(),
                message: "weights must not both be zero".into(),
            });
        }
        if self.documents.max_file_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "documents.max_file_size".into(),
                message: "must be greater than zero".into(),
            });
        }
        if self.documents.work_order_categories.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "documents.work_order_categories".into(),
                message: "at least one category is required".into(),
            });
        }
        Ok(())
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage.data_dir = dir.into();
        self
    }
}
