//! Output formatting utilities for the CLI
//!
//! Provides table and JSON formatting with colors.

use anyhow::{bail, Result};
use colored::*;
use serde::Serialize;
use serde_json::{json, Value};
use tion_core::{ConnectionState, DeviceAddress, WriteAck};

use tabled::{settings::Style, Table, Tabled};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "Field")]
    field: String,
    #[tabled(rename = "Value")]
    value: String,
}

fn colorize(value: &Value) -> String {
    match value {
        Value::String(s) if s == "on" || s == "connected" => s.green().to_string(),
        Value::String(s) if s == "off" || s == "disc" => s.red().to_string(),
        Value::String(s) if s == "unknown" => s.yellow().to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Format a decoded device state.
///
/// Any state that serializes to a flat JSON object is accepted, so every
/// device family renders the same way.
pub fn format_state<T: Serialize>(name: &str, state: &T, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(state)?),
        OutputFormat::Table => {
            let Value::Object(fields) = serde_json::to_value(state)? else {
                bail!("{} state is not a record", name);
            };

            let rows: Vec<FieldRow> = fields
                .iter()
                .map(|(field, value)| FieldRow {
                    field: field.clone(),
                    value: colorize(value),
                })
                .collect();

            let mut output = name.bold().to_string();
            output.push('\n');
            output.push_str(&Table::new(rows).with(Style::rounded()).to_string());
            Ok(output)
        }
    }
}

/// Format the connection state of `address`
pub fn format_connection(
    address: &DeviceAddress,
    state: ConnectionState,
    format: OutputFormat,
) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&json!({
            "address": address.as_str(),
            "state": state,
        }))?),
        OutputFormat::Table => {
            let label = match state {
                ConnectionState::Connected => state.as_str().green(),
                ConnectionState::Disconnected => state.as_str().red(),
            };
            Ok(format!("{}: {}", address.as_str().cyan(), label))
        }
    }
}

/// Format the acknowledgement of a write
pub fn format_ack(action: &str, ack: WriteAck, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&json!({
            "action": action,
            "ack": ack,
        }))?),
        OutputFormat::Table => Ok(match ack {
            WriteAck::Sent => format!("{} {}", "✓".green(), action),
            WriteAck::Simulated => format!("{} {} (simulated)", "✓".yellow(), action),
        }),
    }
}
