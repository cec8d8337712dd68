// Configuration source loading.
//
// Priority order:
// 1. Environment variables (PULSEFEED_* prefix)
// 2. Config file path from PULSEFEED_CONFIG
// 3. Inline config content from PULSEFEED_CONFIG_CONTENT
// 4. Default config files (./pulsefeed.toml, ./.pulsefeed.toml)
// 5. Built-in defaults

use std::env;
use std::path::Path;

use anyhow::{Context, Result};

use crate::env_overrides::{self, EnvSource, ENV_PREFIX};
use crate::RuntimeConfig;

/// Load configuration from a specific file path (for CLI --config flag).
/// Returns an error if the file doesn't exist or can't be parsed.
pub fn load_from_file_path(path: impl AsRef<Path>) -> Result<RuntimeConfig> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let mut config: RuntimeConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    env_overrides::apply_env_overrides(&mut config, &StdEnvSource)?;
    config.validate()?;
    Ok(config)
}

/// Load configuration with graceful fallback to defaults.
/// Tries standard config file locations, returns defaults if none found.
pub fn load_or_default() -> Result<RuntimeConfig> {
    let mut config = load_from_env_locations()?.unwrap_or_default();

    env_overrides::apply_env_overrides(&mut config, &StdEnvSource)?;
    config.validate()?;
    Ok(config)
}

fn load_from_env_locations() -> Result<Option<RuntimeConfig>> {
    if let Ok(path) = env::var("PULSEFEED_CONFIG") {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: RuntimeConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        return Ok(Some(config));
    }

    if let Ok(content) = env::var("PULSEFEED_CONFIG_CONTENT") {
        let config: RuntimeConfig = toml::from_str(&content)
            .context("Failed to parse inline config from PULSEFEED_CONFIG_CONTENT")?;
        return Ok(Some(config));
    }

    for path in &["./pulsefeed.toml", "./.pulsefeed.toml"] {
        if Path::new(path).exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {path}"))?;
            let config: RuntimeConfig = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {path}"))?;
            return Ok(Some(config));
        }
    }

    Ok(None)
}

struct StdEnvSource;

impl EnvSource for StdEnvSource {
    fn get(&self, key: &str) -> Option<String> {
        env::var(format!("{ENV_PREFIX}{key}")).ok()
    }
}
