//! CLI command and subcommand definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tion_hardware::models::S3Mode;

/// Tion breezer CLI
#[derive(Parser, Debug)]
#[command(name = "tionctl")]
#[command(version, about = "Control Tion breezers over Bluetooth LE", long_about = None)]
pub struct Cli {
    /// Device address (overrides config file and TION_ADDRESS)
    ///
    /// Use "dummy" to talk to a simulated device.
    #[arg(short, long, global = true)]
    pub address: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    pub format: OutputFormat,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path (default: ~/.config/tion/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Pretty table output
    Table,
    /// JSON output
    Json,
}

impl From<OutputFormat> for crate::format::OutputFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Table => crate::format::OutputFormat::Table,
            OutputFormat::Json => crate::format::OutputFormat::Json,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Switch {
    On,
    Off,
}

impl Switch {
    pub fn is_on(self) -> bool {
        self == Switch::On
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Read and show the device state
    Get {
        /// Leave the link open after reading
        #[arg(long)]
        keep_connection: bool,
    },

    /// Show the connection state
    Status,

    /// Change device settings
    ///
    /// Unspecified settings keep their current values.
    Set {
        /// Fan speed (0-6, anything else becomes 1)
        #[arg(long, allow_negative_numbers = true)]
        fan_speed: Option<i64>,

        /// Heater target temperature
        #[arg(long)]
        heater_temp: Option<u8>,

        /// Air intake mode (recirculation or mixed)
        #[arg(long)]
        mode: Option<S3Mode>,

        /// Power
        #[arg(long, value_enum)]
        power: Option<Switch>,

        /// Heater
        #[arg(long, value_enum)]
        heater: Option<Switch>,

        /// Sound
        #[arg(long, value_enum)]
        sound: Option<Switch>,

        /// Leave the link open after writing
        #[arg(long)]
        keep_connection: bool,
    },

    /// Put the device into pairing mode
    Pair,

    /// Show or create the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completion for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

impl Commands {
    /// Whether the command talks to the device
    pub fn needs_device(&self) -> bool {
        !matches!(self, Commands::Config { .. } | Commands::Completion { .. })
    }
}
