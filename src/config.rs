//! Application configuration loaded from TOML with environment overrides.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "MUSIC_FLOW_CONFIG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub http: HttpConfig,
    pub logging: LoggingConfig,
    /// Start from the demo users, files and sessions when nothing is stored.
    pub seed_demo_data: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            http: HttpConfig::default(),
            logging: LoggingConfig::default(),
            seed_demo_data: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    Memory,
    #[default]
    Json,
    Sqlite,
}

impl std::str::FromStr for StorageBackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "json" => Ok(Self::Json),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(format!("unknown storage backend '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackendKind,
    /// Store file (JSON snapshot or SQLite database).
    pub path: PathBuf,
    /// Directory holding session slots for the JSON backend.
    pub session_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::Json,
            path: PathBuf::from("music-flow-data.json"),
            session_dir: PathBuf::from(".music-flow"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub addr: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(input: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(input).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw, path)
    }

    /// Loads the file named by `MUSIC_FLOW_CONFIG` (defaults otherwise) and
    /// applies the remaining `MUSIC_FLOW_*` overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(PathBuf::from(path))?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(backend) = lookup("MUSIC_FLOW_BACKEND") {
            self.storage.backend = backend
                .parse()
                .map_err(|message| ConfigError::InvalidValue {
                    key: "MUSIC_FLOW_BACKEND",
                    message,
                })?;
        }
        if let Some(path) = lookup("MUSIC_FLOW_DATA") {
            self.storage.path = PathBuf::from(path);
        }
        if let Some(dir) = lookup("MUSIC_FLOW_SESSION_DIR") {
            self.storage.session_dir = PathBuf::from(dir);
        }
        if let Some(addr) = lookup("MUSIC_FLOW_HTTP_ADDR") {
            self.http.addr = addr;
        }
        if let Some(filter) = lookup("MUSIC_FLOW_LOG") {
            self.logging.filter = filter;
        }
        if let Some(seed) = lookup("MUSIC_FLOW_SEED") {
            self.seed_demo_data = match seed.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                other => {
                    return Err(ConfigError::InvalidValue {
                        key: "MUSIC_FLOW_SEED",
                        message: format!("expected true or false, got '{other}'"),
                    });
                }
            };
        }
        Ok(())
    }
}
