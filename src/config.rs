//! Configuration loading helpers.

use std::env;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::buffer::{BufferConfig, DEFAULT_EAGER_COMMIT_LIMIT};
use crate::stream::StreamMode;

/// Environment variable naming a TOML config file.
pub const CONFIG_PATH_ENV: &str = "SPARSEMEM_CONFIG";

/// Prefix of `SPARSEMEM__section__field` override variables.
pub const ENV_OVERRIDE_PREFIX: &str = "SPARSEMEM__";

/// Errors returned by configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error while reading config files.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parse error.
    #[error("toml parse error: {0}")]
    Toml(#[from] toml::de::Error),
    /// Invalid value for a key.
    #[error("invalid value for {key}: {value}")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Raw value string.
        value: String,
    },
    /// Unknown configuration key.
    #[error("unknown config key: {0}")]
    UnknownKey(String),
    /// Missing required configuration field.
    #[error("missing required field: {0}")]
    MissingField(String),
}

/// Top-level configuration schema.
///
/// ```toml
/// [stream]
/// capacity = 1073741824
/// block_size = 65536
/// mode = "read_write"
/// eager_commit_limit = 16777216
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SparsememConfig {
    /// Stream configuration.
    pub stream: Option<StreamConfigSpec>,
}

impl SparsememConfig {
    /// Load configuration from a TOML file.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Load configuration from the `SPARSEMEM_CONFIG` env var (if set),
    /// then apply `SPARSEMEM__section__field` overrides.
    pub fn load_from_env() -> Result<Self, ConfigError> {
        let mut config = match env::var(CONFIG_PATH_ENV).ok() {
            Some(path) => Self::load_from_path(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply environment overrides in-place.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(env::vars())
    }

    /// Apply `SPARSEMEM__section__field` style overrides from any source.
    pub fn apply_overrides<I>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(path) = key.strip_prefix(ENV_OVERRIDE_PREFIX) else {
                continue;
            };
            let path = path.to_ascii_lowercase();
            let parts: Vec<&str> = path.split("__").collect();
            let value = value.trim().to_string();

            match parts.as_slice() {
                ["stream", "capacity"] => {
                    self.stream_mut().capacity = Some(parse_value(&key, &value)?);
                }
                ["stream", "block_size"] => {
                    self.stream_mut().block_size = Some(parse_value(&key, &value)?);
                }
                ["stream", "mode"] => {
                    self.stream_mut().mode = Some(parse_value(&key, &value)?);
                }
                ["stream", "eager_commit_limit"] => {
                    self.stream_mut().eager_commit_limit = Some(parse_value(&key, &value)?);
                }
                _ => return Err(ConfigError::UnknownKey(key)),
            }
        }

        Ok(())
    }

    /// Build a `BufferConfig` using defaults plus overrides.
    pub fn to_buffer_config(&self) -> Result<BufferConfig, ConfigError> {
        let stream = self
            .stream
            .as_ref()
            .ok_or_else(|| ConfigError::MissingField("stream.capacity".into()))?;
        stream.resolve()
    }

    fn stream_mut(&mut self) -> &mut StreamConfigSpec {
        self.stream.get_or_insert_with(StreamConfigSpec::default)
    }
}

/// Stream configuration overrides.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreamConfigSpec {
    /// Logical capacity in bytes.
    pub capacity: Option<u64>,
    /// Block size in bytes.
    pub block_size: Option<u32>,
    /// Stream mode: "read_only", "write_only" or "read_write".
    pub mode: Option<StreamMode>,
    /// Largest capacity committed eagerly.
    pub eager_commit_limit: Option<u64>,
}

impl StreamConfigSpec {
    fn resolve(&self) -> Result<BufferConfig, ConfigError> {
        let capacity = self
            .capacity
            .ok_or_else(|| ConfigError::MissingField("stream.capacity".into()))?;
        if capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "stream.capacity".into(),
                value: capacity.to_string(),
            });
        }
        if self.block_size == Some(0) {
            return Err(ConfigError::InvalidValue {
                key: "stream.block_size".into(),
                value: "0".into(),
            });
        }

        let mut config = BufferConfig::new(capacity)
            .with_mode(self.mode.unwrap_or_default())
            .with_eager_commit_limit(
                self.eager_commit_limit
                    .unwrap_or(DEFAULT_EAGER_COMMIT_LIMIT),
            );
        if let Some(block_size) = self.block_size {
            config = config.with_block_size(block_size);
        }
        Ok(config)
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}
