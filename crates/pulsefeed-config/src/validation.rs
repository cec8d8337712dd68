// Configuration validation
//
// Validates that values are sensible before the pipeline starts; a bad
// config fails startup rather than misbehaving at the first flush.

use anyhow::{bail, Result};
use tracing::warn;

use crate::{BatchConfig, CacheConfig, QueueConfig, RuntimeConfig, ServerConfig, ShutdownConfig};

pub fn validate_config(config: &RuntimeConfig) -> Result<()> {
    if config.environment.is_empty() {
        bail!("environment must not be empty");
    }

    validate_batch_config(&config.batch)?;
    validate_queue_config(&config.queue)?;
    validate_cache_config(&config.cache)?;
    validate_shutdown_config(&config.shutdown)?;
    validate_server_config(&config.server)?;

    Ok(())
}

fn validate_batch_config(config: &BatchConfig) -> Result<()> {
    if config.max_jobs == 0 {
        bail!("batch.max_jobs must be greater than 0");
    }

    if config.interval_ms == 0 {
        bail!("batch.interval_ms must be greater than 0");
    }

    if config.tick_ms == 0 {
        bail!("batch.tick_ms must be greater than 0");
    }

    // Warn about very large batch sizes
    if config.max_jobs > 100_000 {
        warn!(
            max_jobs = config.max_jobs,
            "batch.max_jobs is very large; may cause memory issues"
        );
    }

    Ok(())
}

fn validate_queue_config(config: &QueueConfig) -> Result<()> {
    if config.retry_attempts == 0 {
        bail!("queue.retry_attempts must be greater than 0");
    }

    Ok(())
}

fn validate_cache_config(config: &CacheConfig) -> Result<()> {
    if config.enabled && config.ttl_secs == 0 {
        bail!("cache.ttl_secs must be greater than 0 when the cache is enabled");
    }

    Ok(())
}

fn validate_shutdown_config(config: &ShutdownConfig) -> Result<()> {
    if config.hard_timeout_ms == 0 {
        bail!("shutdown.hard_timeout_ms must be greater than 0");
    }

    if config.grace_ms >= config.hard_timeout_ms {
        bail!("shutdown.grace_ms must be smaller than shutdown.hard_timeout_ms");
    }

    Ok(())
}

fn validate_server_config(config: &ServerConfig) -> Result<()> {
    if config.listen_addr.is_empty() {
        bail!("server.listen_addr must not be empty");
    }

    // Basic validation that it looks like an address
    if !config.listen_addr.contains(':') {
        bail!("server.listen_addr must be in format 'host:port'");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_batch_size_is_rejected() {
        let config = BatchConfig {
            max_jobs: 0,
            interval_ms: 1000,
            tick_ms: 2000,
        };
        assert!(validate_batch_config(&config).is_err());
    }

    #[test]
    fn grace_must_be_inside_hard_timeout() {
        let valid = ShutdownConfig {
            grace_ms: 4000,
            hard_timeout_ms: 10_000,
        };
        assert!(validate_shutdown_config(&valid).is_ok());

        let inverted = ShutdownConfig {
            grace_ms: 10_000,
            hard_timeout_ms: 4000,
        };
        assert!(validate_shutdown_config(&inverted).is_err());
    }

    #[test]
    fn disabled_cache_skips_ttl_check() {
        let config = CacheConfig {
            enabled: false,
            ttl_secs: 0,
        };
        assert!(validate_cache_config(&config).is_ok());
    }
}
