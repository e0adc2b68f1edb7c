//! Tion Breezer 3S
//!
//! Requests are 20-byte frames `[0x3D, command, special, 0.., 0x5A]` written
//! to the UART RX characteristic. The device answers on the TX characteristic.
//!
//! State response layout:
//!
//! | byte   | meaning                                            |
//! |--------|----------------------------------------------------|
//! | 2      | high nibble: mode index, low nibble: fan speed     |
//! | 3      | heater target temperature                          |
//! | 4      | bit 0 heater, bit 1 power, bit 3 sound             |
//! | 7      | outside temperature (signed byte)                  |
//! | 8      | inside temperature (signed byte)                   |
//! | 9..=10 | filter days remaining, little endian               |
//! | 11, 12 | device clock hours, minutes                        |
//! | 13     | error code of the last request                     |
//! | 16, 17 | firmware version                                   |

use async_trait::async_trait;
use serde::Serialize;
use tion_core::{
    decode_temperature, label_for, process_status, to_hex, ActionKind, FanSpeed, Result,
    TionError,
};
use tracing::debug;
use uuid::Uuid;

use super::DeviceModel;
use crate::link::DeviceLink;

/// Labels for the mode nibble, indexed by code
pub const MODES: [&str; 2] = ["recirculation", "mixed"];

const FRAME_LEN: usize = 20;
const STATE_LEN: usize = 18;
const COMMAND_PREFIX: u8 = 0x3D;
const COMMAND_SUFFIX: u8 = 0x5A;

/// Command bytes
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Ask for current parameters (0x01)
    RequestParams = 0x01,
    /// Apply new parameters (0x02)
    SetParams = 0x02,
    /// Enter pairing (0x05)
    Pair = 0x05,
}

/// Air intake mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum S3Mode {
    Recirculation = 0,
    Mixed = 1,
}

impl S3Mode {
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "recirculation" => Some(S3Mode::Recirculation),
            "mixed" => Some(S3Mode::Mixed),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        MODES[*self as usize]
    }
}

impl std::str::FromStr for S3Mode {
    type Err = TionError;

    fn from_str(s: &str) -> Result<Self> {
        S3Mode::from_label(&s.to_lowercase())
            .ok_or_else(|| TionError::InvalidInput(format!("Unknown mode: {}", s)))
    }
}

/// Full parameter set written by a set request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Settings {
    pub power: bool,
    pub heater: bool,
    pub sound: bool,
    pub mode: S3Mode,
    pub fan_speed: FanSpeed,
    pub heater_temp: u8,
}

/// Requests understood by the 3S
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum S3Request {
    GetState,
    Set(S3Settings),
    Pair,
}

/// Decoded 3S state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct S3State {
    pub status: &'static str,
    pub heater: &'static str,
    pub sound: &'static str,
    pub mode: &'static str,
    pub fan_speed: u8,
    pub heater_temp: u8,
    pub in_temp: i16,
    pub out_temp: i16,
    pub filter_remain: u16,
    pub time: String,
    pub request_error_code: u8,
    pub fw_version: String,
}

impl S3State {
    /// Settings that reproduce this state, as a base for partial updates
    pub fn to_settings(&self) -> S3Settings {
        S3Settings {
            power: self.status == "on",
            heater: self.heater == "on",
            sound: self.sound == "on",
            mode: S3Mode::from_label(self.mode).unwrap_or(S3Mode::Recirculation),
            fan_speed: FanSpeed::new(self.fan_speed as i64),
            heater_temp: self.heater_temp,
        }
    }
}

/// Tion Breezer 3S model
#[derive(Debug, Clone, Copy, Default)]
pub struct S3;

impl S3 {
    fn command(command: Command) -> Vec<u8> {
        let mut frame = vec![0u8; FRAME_LEN];
        frame[0] = COMMAND_PREFIX;
        frame[1] = command as u8;
        frame[2] = u8::from(command == Command::Pair);
        frame[FRAME_LEN - 1] = COMMAND_SUFFIX;
        frame
    }
}

#[async_trait]
impl DeviceModel for S3 {
    const NAME: &'static str = "Tion Breezer 3S";
    const SERVICE_UUID: Uuid = Uuid::from_u128(0x6e400001_b5a3_f393_e0a9_e50e24dcca9e);
    const WRITE_UUID: Uuid = Uuid::from_u128(0x6e400002_b5a3_f393_e0a9_e50e24dcca9e);
    const NOTIFY_UUID: Uuid = Uuid::from_u128(0x6e400003_b5a3_f393_e0a9_e50e24dcca9e);

    type Request = S3Request;
    type State = S3State;

    fn status_request(&self) -> S3Request {
        S3Request::GetState
    }

    fn pair_request(&self) -> Option<S3Request> {
        Some(S3Request::Pair)
    }

    fn encode_request(&self, request: &S3Request) -> Result<Vec<u8>> {
        let frame = match request {
            S3Request::GetState => Self::command(Command::RequestParams),
            S3Request::Pair => Self::command(Command::Pair),
            S3Request::Set(settings) => {
                let mut frame = Self::command(Command::SetParams);
                frame[2] = settings.fan_speed.value();
                frame[3] = settings.heater_temp;
                frame[4] = settings.mode as u8;
                frame[5] = u8::from(settings.heater)
                    | u8::from(settings.power) << 1
                    | u8::from(settings.sound) << 3;
                frame
            }
        };
        debug!("Encoded {:?} as {}", request, to_hex(&frame));
        Ok(frame)
    }

    async fn send_request(&self, link: &mut DeviceLink, request: Vec<u8>) -> Result<Vec<u8>> {
        link.perform_with_retries(ActionKind::Read, move |link| {
            let request = request.clone();
            Box::pin(async move {
                link.discard_pending();
                let kind = ActionKind::Write(request.clone());
                link.perform_with_retries(kind, |link| {
                    let request = request.clone();
                    Box::pin(async move { link.write(&request).await })
                })
                .await?;
                link.wait_for_response().await
            })
        })
        .await
    }

    fn decode_response(&self, response: &[u8]) -> Result<S3State> {
        if response.len() < STATE_LEN {
            return Err(TionError::Decode(format!(
                "state frame too short: {} bytes, need {}: {}",
                response.len(),
                STATE_LEN,
                to_hex(response)
            )));
        }

        let mode_and_speed = response[2];
        let flags = response[4];

        Ok(S3State {
            status: process_status(((flags >> 1) & 1) as i64),
            heater: process_status((flags & 1) as i64),
            sound: process_status(((flags >> 3) & 1) as i64),
            mode: label_for(&MODES, (mode_and_speed >> 4) as i64),
            fan_speed: mode_and_speed & 0x0F,
            heater_temp: response[3],
            in_temp: decode_temperature(response[8]),
            out_temp: decode_temperature(response[7]),
            filter_remain: u16::from_le_bytes([response[9], response[10]]),
            time: format!("{:02}:{:02}", response[11], response[12]),
            request_error_code: response[13],
            fw_version: format!("{:02x}{:02x}", response[16], response[17]),
        })
    }

    fn simulated_response(&self, _request: &[u8]) -> Vec<u8> {
        let mut frame = vec![0u8; FRAME_LEN];
        frame[0] = 0xB3;
        frame[1] = 0x10;
        frame[2] = 0x12; // mixed, speed 2
        frame[3] = 20;
        frame[4] = 0b0000_0011; // heater on, power on
        frame[7] = 0xFB; // -5
        frame[8] = 21;
        frame[9] = 110;
        frame[11] = 12;
        frame[12] = 30;
        frame[17] = 0x3C;
        frame[FRAME_LEN - 1] = COMMAND_SUFFIX;
        frame
    }

    fn reported_fan_speed(&self, state: &S3State) -> Option<i64> {
        Some(state.fan_speed as i64)
    }
}
