use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{PulseError, Result};

// ─── Environment keys ────────────────────────────────────────────

const ENV_CONFIG_PATH: &str = "PULSE_CONFIG";
const ENV_BIND_ADDR: &str = "PULSE_BIND_ADDR";
const ENV_STORAGE: &str = "PULSE_STORAGE";
const ENV_REDIS_URL: &str = "PULSE_REDIS_URL";
const ENV_LOG_LEVEL: &str = "PULSE_LOG_LEVEL";

/// Where the sample history lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// In-process, lost on restart.
    Memory,
    /// Redis sorted set, survives restarts.
    Redis,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Redis => "redis",
        }
    }
}

impl std::str::FromStr for StorageBackend {
    type Err = PulseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            other => Err(PulseError::InvalidConfig {
                reason: format!("unknown storage backend \"{other}\""),
            }),
        }
    }
}

/// Runtime configuration. Every field has a default so a partial
/// JSON file (or none at all) is valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bind_addr: String,
    pub sample_interval_secs: u64,
    pub default_history_minutes: i64,
    pub storage: StorageBackend,
    pub redis_url: String,
    pub redis_key_prefix: String,
    pub static_dir: String,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            sample_interval_secs: 3,
            default_history_minutes: 60,
            storage: StorageBackend::Memory,
            redis_url: "redis://127.0.0.1:6379/".to_string(),
            redis_key_prefix: "pulse".to_string(),
            static_dir: "static".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load from the file named by `PULSE_CONFIG` (if set), then apply
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var(ENV_CONFIG_PATH) {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PulseError::Io { path: path.to_path_buf(), source: e })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| PulseError::InvalidConfig {
            reason: format!("Failed to parse config: {e}"),
        })
    }

    /// Apply overrides from a key lookup (the process environment in
    /// production, a map in tests).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup(ENV_BIND_ADDR) {
            self.bind_addr = addr;
        }
        if let Some(storage) = lookup(ENV_STORAGE) {
            self.storage = storage.parse()?;
        }
        if let Some(url) = lookup(ENV_REDIS_URL) {
            self.redis_url = url;
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.log_level = level;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_interval_secs == 0 {
            return Err(PulseError::InvalidConfig {
                reason: "sample_interval_secs must be at least 1".into(),
            });
        }
        if self.default_history_minutes <= 0 {
            return Err(PulseError::InvalidConfig {
                reason: "default_history_minutes must be positive".into(),
            });
        }
        Ok(())
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs(self.sample_interval_secs)
    }
}
