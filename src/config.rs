use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_TARGET: &str = "zk:2181";
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("TOML parse error in config: {0}")]
    TomlParse(#[from] toml::de::Error),
}

/// Optional defaults read from a `--config` file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub target: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Connection settings after applying flags, config file and built-in defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub target: String,
    pub timeout: Duration,
}

impl Config {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Command line values win over the file, which wins over the defaults.
    pub fn resolve(&self, target: Option<String>, timeout_secs: Option<u64>) -> Settings {
        let target = target
            .or_else(|| self.target.clone())
            .unwrap_or_else(|| DEFAULT_TARGET.to_string());
        let timeout_secs = timeout_secs
            .or(self.timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Settings {
            target,
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}
