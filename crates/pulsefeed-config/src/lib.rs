// pulsefeed-config - Unified runtime configuration
//
// Supports configuration from multiple sources:
// 1. Environment variables (highest priority)
// 2. Config file path from PULSEFEED_CONFIG env var
// 3. Config file contents from PULSEFEED_CONFIG_CONTENT env var
// 4. Default config file locations (./pulsefeed.toml, ./.pulsefeed.toml)
// 5. Built-in defaults (lowest priority)

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

mod env_overrides;
mod sources;
mod validation;

/// Main runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Deployment environment name; prefixes every cache key.
    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default)]
    pub batch: BatchConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub shutdown: ShutdownConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            batch: BatchConfig::default(),
            queue: QueueConfig::default(),
            cache: CacheConfig::default(),
            shutdown: ShutdownConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

fn default_environment() -> String {
    "development".to_string()
}

impl RuntimeConfig {
    pub fn load_from_path(path: impl AsRef<std::path::Path>) -> Result<Self> {
        sources::load_from_file_path(path)
    }

    pub fn load_or_default() -> Result<Self> {
        sources::load_or_default()
    }

    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}

/// Batch accumulation configuration, shared by every accumulator.
///
/// The size/interval tuning is a deployment decision, not a correctness
/// requirement; defaults follow the source system's final settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Flush once this many jobs are buffered.
    pub max_jobs: usize,
    /// Flush once the buffer has waited this long (milliseconds).
    pub interval_ms: u64,
    /// Scheduler tick period (milliseconds).
    pub tick_ms: u64,
}

impl BatchConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_jobs: 1000,
            interval_ms: 1000,
            tick_ms: 2000,
        }
    }
}

/// Durable-queue retry behavior for failed consumer callbacks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Delivery attempts before a job is dead-lettered.
    pub retry_attempts: u32,
    /// Base delay for exponential backoff between attempts (milliseconds).
    pub backoff_base_ms: u64,
}

impl QueueConfig {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            retry_attempts: 2,
            backoff_base_ms: 10_000,
        }
    }
}

/// Response cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Globally disables cache reads, writes and deletes when false.
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    /// Entry time-to-live (seconds).
    pub ttl_secs: u64,
}

fn default_cache_enabled() -> bool {
    true
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 3600,
        }
    }
}

/// Graceful shutdown timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// Wait after closing consumers so in-flight flush ticks can finish
    /// (milliseconds).
    pub grace_ms: u64,
    /// Force process exit if draining exceeds this bound (milliseconds).
    pub hard_timeout_ms: u64,
}

impl ShutdownConfig {
    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }

    pub fn hard_timeout(&self) -> Duration {
        Duration::from_millis(self.hard_timeout_ms)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_ms: 4000,
            hard_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}
