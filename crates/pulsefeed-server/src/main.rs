use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use pulsefeed_config::RuntimeConfig;

/// Social write-aggregation pipeline and enqueue API
#[derive(Parser)]
#[command(name = "pulsefeed")]
#[command(version)]
#[command(about = "Social write-aggregation pipeline and enqueue API", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// HTTP listen port (overrides config file)
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short = 'v', long, value_name = "LEVEL")]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    let mut config = if let Some(config_path) = &cli.config {
        RuntimeConfig::load_from_path(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else {
        RuntimeConfig::load_or_default().context("Failed to load configuration")?
    };

    apply_cli_overrides(&mut config, &cli);

    // CLI overrides come last; re-check before starting anything.
    config.validate()?;

    pulsefeed_server::run_with_config(config).await
}

fn apply_cli_overrides(config: &mut RuntimeConfig, cli: &Cli) {
    if let Some(port) = cli.port {
        config.server.listen_addr = format!("0.0.0.0:{port}");
    }

    if let Some(level) = &cli.log_level {
        config.server.log_level = level.clone();
    }
}
