//! Configuration loading for the `mindful` binary.
//!
//! Configuration is loaded from TOML with the following resolution order:
//! 1. `--config <path>` (CLI flag; must exist)
//! 2. `~/.mindful/config.toml` (user)
//! 3. `/etc/mindful/config.toml` (system)
//!
//! With no file at all, defaults apply.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::bridge::BridgeConfig;
use crate::cache::CacheConfig;
use crate::drift::DriftConfig;
use crate::providers::RetryConfig;
use crate::{MindfulError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bridge: BridgeSection,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub drift: DriftSection,
    #[serde(default)]
    pub retry: RetrySection,
    #[serde(default)]
    pub storage: StorageSection,
    /// Ollama provider; absent means no capability provider at all.
    #[serde(default)]
    pub ollama: Option<OllamaSection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BridgeSection {
    /// Bridge request timeout in seconds (default: 25).
    #[serde(default = "default_bridge_timeout")]
    pub timeout_secs: u64,
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_bridge_timeout(),
        }
    }
}

fn default_bridge_timeout() -> u64 {
    25
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    #[serde(default = "default_calm_summary_cache")]
    pub calm_summary: CacheLimits,
    #[serde(default = "default_usefulness_cache")]
    pub usefulness: CacheLimits,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            calm_summary: default_calm_summary_cache(),
            usefulness: default_usefulness_cache(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CacheLimits {
    pub max_entries: usize,
    pub ttl_secs: u64,
}

impl From<&CacheConfig> for CacheLimits {
    fn from(config: &CacheConfig) -> Self {
        Self {
            max_entries: config.max_entries,
            ttl_secs: config.ttl.as_secs(),
        }
    }
}

fn default_calm_summary_cache() -> CacheLimits {
    CacheLimits::from(&CacheConfig::calm_summary())
}

fn default_usefulness_cache() -> CacheLimits {
    CacheLimits::from(&CacheConfig::usefulness())
}

#[derive(Debug, Clone, Deserialize)]
pub struct DriftSection {
    #[serde(default = "default_threshold")]
    pub threshold: u8,
    #[serde(default = "default_consecutive_limit")]
    pub consecutive_limit: u32,
    #[serde(default = "default_dwell_secs")]
    pub dwell_secs: u64,
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

impl Default for DriftSection {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            consecutive_limit: default_consecutive_limit(),
            dwell_secs: default_dwell_secs(),
            tick_ms: default_tick_ms(),
        }
    }
}

fn default_threshold() -> u8 {
    4
}

fn default_consecutive_limit() -> u32 {
    3
}

fn default_dwell_secs() -> u64 {
    60
}

fn default_tick_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrySection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_delay_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_delay_ms() -> u64 {
    500
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageSection {
    /// Store file (default: the platform data dir, see `FileStore::default_path`).
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OllamaSection {
    #[serde(default = "default_ollama_url")]
    pub base_url: String,
    #[serde(default = "default_ollama_model")]
    pub model: String,
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3.2".to_string()
}

impl Config {
    /// Load from the standard locations, or defaults when there is no file.
    pub fn load_or_default(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            MindfulError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        Self::parse(&content).map_err(|e| match e {
            MindfulError::Configuration(msg) => {
                MindfulError::Configuration(format!("{msg} (in {path:?})"))
            }
            other => other,
        })
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| MindfulError::Configuration(format!("Failed to parse config: {e}")))
    }

    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(MindfulError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".mindful").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        let system_config = PathBuf::from("/etc/mindful/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }
        Ok(None)
    }

    pub fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig::new().timeout(Duration::from_secs(self.bridge.timeout_secs))
    }

    pub fn calm_summary_cache(&self) -> CacheConfig {
        cache_config(&self.cache.calm_summary)
    }

    pub fn usefulness_cache(&self) -> CacheConfig {
        cache_config(&self.cache.usefulness)
    }

    pub fn drift_config(&self) -> DriftConfig {
        DriftConfig::new()
            .threshold(self.drift.threshold)
            .consecutive_limit(self.drift.consecutive_limit)
            .dwell_limit(Duration::from_secs(self.drift.dwell_secs))
            .tick(Duration::from_millis(self.drift.tick_ms.max(1)))
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new()
            .max_attempts(self.retry.max_attempts.max(1))
            .initial_delay(Duration::from_millis(self.retry.delay_ms))
    }
}

fn cache_config(limits: &CacheLimits) -> CacheConfig {
    CacheConfig::new()
        .max_entries(limits.max_entries)
        .ttl(Duration::from_secs(limits.ttl_secs))
}
