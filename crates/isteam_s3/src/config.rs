use crate::error::StorageError;
use crate::models::types::MAX_PAGE_SIZE;
use crate::stores::key_path::CACHE_ROOT;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Options the host constructs the storage with.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub bucket: String,
    #[serde(default)]
    pub region: Option<String>,
    /// S3-compatible endpoint, e.g. a local MinIO.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub path_style: bool,
    #[serde(default = "default_list_page_size")]
    pub list_page_size: i32,
    #[serde(default)]
    pub lifecycle: Option<LifecycleConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LifecycleConfig {
    pub expiration_days: i32,
    #[serde(default = "default_lifecycle_prefix")]
    pub prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_list_page_size() -> i32 {
    crate::models::types::DEFAULT_MAX_COUNT
}

fn default_lifecycle_prefix() -> String {
    format!("{}/", CACHE_ROOT)
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl StorageConfig {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            region: None,
            endpoint: None,
            path_style: false,
            list_page_size: default_list_page_size(),
            lifecycle: None,
        }
    }

    /// Checks the page size fits one listing and that a lifecycle rule can
    /// only ever reach derived images.
    pub fn validate(&self) -> Result<(), StorageError> {
        if !(1..=MAX_PAGE_SIZE).contains(&self.list_page_size) {
            return Err(StorageError::Config(format!(
                "list_page_size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, self.list_page_size
            )));
        }

        if let Some(lifecycle) = &self.lifecycle {
            let cache_root = default_lifecycle_prefix();
            if !lifecycle.prefix.starts_with(&cache_root) {
                return Err(StorageError::Config(format!(
                    "lifecycle prefix must start with {}, got {:?}",
                    cache_root, lifecycle.prefix
                )));
            }
            if lifecycle.expiration_days <= 0 {
                return Err(StorageError::Config(format!(
                    "lifecycle expiration_days must be positive, got {}",
                    lifecycle.expiration_days
                )));
            }
        }

        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let config_path = path.unwrap_or("/etc/isteam/config.yaml");
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path))
            .add_source(config::Environment::with_prefix("ISTEAM").separator("__"))
            .build()?;

        settings.try_deserialize()
    }
}
