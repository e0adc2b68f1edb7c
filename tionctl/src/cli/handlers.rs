//! Command execution handlers

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::time::Duration;
use tion_core::{ModelKind, StaticConfig};
use tion_hardware::models::{DeviceModel, S3Request, S3Settings, S3};
use tion_hardware::{BtleplugTransport, DeviceDriver, Transport};
use tracing::{debug, info};
use uuid::Uuid;

use crate::format::{format_ack, format_connection, format_state};

use super::commands::*;

/// Settings requested on the command line; `None` keeps the current value
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SettingsUpdate {
    pub fan_speed: Option<i64>,
    pub heater_temp: Option<u8>,
    pub mode: Option<tion_hardware::models::S3Mode>,
    pub power: Option<bool>,
    pub heater: Option<bool>,
    pub sound: Option<bool>,
}

impl SettingsUpdate {
    pub fn is_empty(&self) -> bool {
        *self == SettingsUpdate::default()
    }

    /// Overlay the requested values on `current`
    pub fn apply(&self, current: &mut S3Settings, fan_speed: tion_core::FanSpeed) {
        if self.fan_speed.is_some() {
            current.fan_speed = fan_speed;
        }
        if let Some(heater_temp) = self.heater_temp {
            current.heater_temp = heater_temp;
        }
        if let Some(mode) = self.mode {
            current.mode = mode;
        }
        if let Some(power) = self.power {
            current.power = power;
        }
        if let Some(heater) = self.heater {
            current.heater = heater;
        }
        if let Some(sound) = self.sound {
            current.sound = sound;
        }
    }
}

/// Build the driver described by `config`.
///
/// A simulated address gets no transport; anything else opens the host
/// Bluetooth adapter.
pub async fn build_driver(config: &StaticConfig) -> Result<DeviceDriver<S3>> {
    info!("Building {} driver", config.device.model.name());
    match config.device.model {
        ModelKind::S3 => {
            let transport = open_transport(config, S3::SERVICE_UUID).await?;
            Ok(DeviceDriver::from_config(S3, config, transport))
        }
    }
}

async fn open_transport(
    config: &StaticConfig,
    service: Uuid,
) -> Result<Option<Box<dyn Transport>>> {
    let address = config.device_address();
    if address.is_simulated() {
        info!("Using simulated device");
        return Ok(None);
    }

    let transport = BtleplugTransport::new(
        config.device.adapter,
        address.as_str(),
        Duration::from_secs(config.device.scan_secs),
    )
    .await
    .context("Failed to open Bluetooth adapter")?
    .with_service(service);
    Ok(Some(Box::new(transport)))
}

/// Handle get command
pub async fn handle_get<M: DeviceModel>(
    driver: &mut DeviceDriver<M>,
    keep_connection: bool,
    format: &OutputFormat,
) -> Result<()> {
    let state = driver.get(keep_connection).await?;
    println!("{}", format_state(M::NAME, &state, (*format).into())?);
    Ok(())
}

/// Handle status command
pub async fn handle_status<M: DeviceModel>(
    driver: &DeviceDriver<M>,
    format: &OutputFormat,
) -> Result<()> {
    let state = driver.connection_status().await?;
    println!(
        "{}",
        format_connection(driver.address(), state, (*format).into())?
    );
    Ok(())
}

/// Handle set command.
///
/// Reads the current state first so that only the requested settings change.
pub async fn handle_set(
    driver: &mut DeviceDriver<S3>,
    update: SettingsUpdate,
    keep_connection: bool,
    format: &OutputFormat,
) -> Result<()> {
    if update.is_empty() {
        bail!("Nothing to set. Pass at least one of --fan-speed, --heater-temp, --mode, --power, --heater, --sound");
    }

    let current = driver
        .get(true)
        .await
        .context("Failed to read current state")?;
    let mut settings = current.to_settings();

    if let Some(fan_speed) = update.fan_speed {
        driver.set_fan_speed(fan_speed);
    }
    let fan_speed = tion_core::FanSpeed::new(i64::from(driver.fan_speed()));
    update.apply(&mut settings, fan_speed);
    debug!("Applying {:?}", settings);

    let ack = driver
        .set(&S3Request::Set(settings), keep_connection)
        .await?;
    println!("{}", format_ack("set", ack, (*format).into())?);
    Ok(())
}

/// Handle pair command
pub async fn handle_pair<M: DeviceModel>(
    driver: &mut DeviceDriver<M>,
    format: &OutputFormat,
) -> Result<()> {
    let ack = driver.pair().await?;
    println!("{}", format_ack("pair", ack, (*format).into())?);
    Ok(())
}

/// Handle config commands
pub fn handle_config(
    command: ConfigCommands,
    config: &StaticConfig,
    config_path: &Path,
    format: &OutputFormat,
) -> Result<()> {
    match command {
        ConfigCommands::Show => {
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(config)?),
                OutputFormat::Table => {
                    println!("# {}", config_path.display());
                    print!("{}", config.to_toml()?);
                }
            }
            Ok(())
        }
        ConfigCommands::Init { force } => {
            init_config_file(config_path, force)?;
            println!("Wrote default configuration to {}", config_path.display());
            Ok(())
        }
    }
}

/// Write a default configuration file to `path`
pub fn init_config_file(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let content = StaticConfig::default().to_toml()?;
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Generate shell completion script
pub fn generate_completion(shell: clap_complete::Shell) {
    use clap::CommandFactory;
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, bin_name, &mut io::stdout());
}
