// Environment variable overrides.
//
// Applied last, on top of file config and defaults. The `EnvSource` trait
// keeps the override logic testable without mutating process state.

use anyhow::{Context, Result};

use crate::{LogFormat, RuntimeConfig};

pub const ENV_PREFIX: &str = "PULSEFEED_";

pub trait EnvSource {
    /// Lookup with the `PULSEFEED_` prefix applied.
    fn get(&self, key: &str) -> Option<String>;
}

pub fn apply_env_overrides(config: &mut RuntimeConfig, env: &dyn EnvSource) -> Result<()> {
    if let Some(value) = env.get("ENV") {
        config.environment = value;
    }

    if let Some(value) = env.get("BATCH_MAX_JOBS") {
        config.batch.max_jobs = parse(&value, "BATCH_MAX_JOBS")?;
    }
    if let Some(value) = env.get("BATCH_INTERVAL_MS") {
        config.batch.interval_ms = parse(&value, "BATCH_INTERVAL_MS")?;
    }
    if let Some(value) = env.get("BATCH_TICK_MS") {
        config.batch.tick_ms = parse(&value, "BATCH_TICK_MS")?;
    }

    if let Some(value) = env.get("QUEUE_RETRY_ATTEMPTS") {
        config.queue.retry_attempts = parse(&value, "QUEUE_RETRY_ATTEMPTS")?;
    }
    if let Some(value) = env.get("QUEUE_BACKOFF_BASE_MS") {
        config.queue.backoff_base_ms = parse(&value, "QUEUE_BACKOFF_BASE_MS")?;
    }

    if let Some(value) = env.get("CACHE_ENABLED") {
        config.cache.enabled = parse_bool(&value, "CACHE_ENABLED")?;
    }
    if let Some(value) = env.get("CACHE_TTL_SECS") {
        config.cache.ttl_secs = parse(&value, "CACHE_TTL_SECS")?;
    }

    if let Some(value) = env.get("SHUTDOWN_GRACE_MS") {
        config.shutdown.grace_ms = parse(&value, "SHUTDOWN_GRACE_MS")?;
    }
    if let Some(value) = env.get("SHUTDOWN_HARD_TIMEOUT_MS") {
        config.shutdown.hard_timeout_ms = parse(&value, "SHUTDOWN_HARD_TIMEOUT_MS")?;
    }

    if let Some(value) = env.get("LISTEN_ADDR") {
        config.server.listen_addr = value;
    }
    if let Some(value) = env.get("LOG_LEVEL") {
        config.server.log_level = value;
    }
    if let Some(value) = env.get("LOG_FORMAT") {
        config.server.log_format = match value.to_lowercase().as_str() {
            "text" => LogFormat::Text,
            "json" => LogFormat::Json,
            other => anyhow::bail!("Unsupported LOG_FORMAT: {other}. Supported: text, json"),
        };
    }

    Ok(())
}

fn parse<T: std::str::FromStr>(value: &str, key: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .with_context(|| format!("Invalid value for {ENV_PREFIX}{key}: {value}"))
}

fn parse_bool(value: &str, key: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => anyhow::bail!("Invalid value for {ENV_PREFIX}{key}: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    struct MapSource(HashMap<&'static str, &'static str>);

    impl EnvSource for MapSource {
        fn get(&self, key: &str) -> Option<String> {
            self.0.get(key).map(|v| v.to_string())
        }
    }

    #[test]
    fn overrides_win_over_defaults() {
        let mut config = RuntimeConfig::default();
        let source = MapSource(HashMap::from([
            ("ENV", "staging"),
            ("BATCH_MAX_JOBS", "25"),
            ("CACHE_ENABLED", "false"),
            ("LOG_FORMAT", "json"),
        ]));

        apply_env_overrides(&mut config, &source).unwrap();

        assert_eq!(config.environment, "staging");
        assert_eq!(config.batch.max_jobs, 25);
        assert!(!config.cache.enabled);
        assert_eq!(config.server.log_format, LogFormat::Json);
    }

    #[test]
    fn malformed_number_is_rejected() {
        let mut config = RuntimeConfig::default();
        let source = MapSource(HashMap::from([("BATCH_MAX_JOBS", "lots")]));
        assert!(apply_env_overrides(&mut config, &source).is_err());
    }
}
