//! Tion CLI
//!
//! Command-line interface for Tion breezers.

use anyhow::{Context, Result};
use clap::Parser;
use tion_core::{resolve_config_path, StaticConfig};
use tionctl::cli::{
    build_driver, generate_completion, handle_config, handle_get, handle_pair, handle_set,
    handle_status, Cli, Commands, SettingsUpdate,
};
use tracing::debug;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Priority chain: defaults → file → env → CLI args
    let config_path = resolve_config_path(cli.config);
    debug!("Configuration file: {}", config_path.display());

    let mut config = StaticConfig::load(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    if let Some(address) = cli.address {
        config.device.address = address;
        config.validate()?;
    }

    if !cli.command.needs_device() {
        return match cli.command {
            Commands::Config { command } => {
                handle_config(command, &config, &config_path, &cli.format)
            }
            Commands::Completion { shell } => {
                generate_completion(shell);
                Ok(())
            }
            _ => Ok(()),
        };
    }

    let mut driver = build_driver(&config).await?;
    match cli.command {
        Commands::Get { keep_connection } => {
            handle_get(&mut driver, keep_connection, &cli.format).await
        }
        Commands::Status => handle_status(&driver, &cli.format).await,
        Commands::Set {
            fan_speed,
            heater_temp,
            mode,
            power,
            heater,
            sound,
            keep_connection,
        } => {
            let update = SettingsUpdate {
                fan_speed,
                heater_temp,
                mode,
                power: power.map(|s| s.is_on()),
                heater: heater.map(|s| s.is_on()),
                sound: sound.map(|s| s.is_on()),
            };
            handle_set(&mut driver, update, keep_connection, &cli.format).await
        }
        Commands::Pair => handle_pair(&mut driver, &cli.format).await,
        Commands::Config { .. } | Commands::Completion { .. } => Ok(()),
    }
}

/// Initialize tracing subscriber
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
