//! LG-style RS-232 control protocol
//!
//! Outbound frames look like `"<code> <id> <argument>\r"`, inbound acks like
//! `"<code> <id> <status><payload>x"`. The set id is always the broadcast
//! id `"00"`.

pub mod codec;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Broadcast set id; addresses every set on the line
pub const BROADCAST_ID: &str = "00";

/// Argument meaning "report the current value"
pub const QUERY_ARGUMENT: &str = "FF";

/// Status prefix of a successful ack
pub const STATUS_OK: &str = "OK";

/// Outbound frame terminator
pub const COMMAND_TERMINATOR: char = '\r';

/// Function selectors this controller issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceCode {
    /// `ka`: power on/off
    Power,
    /// `kf`: volume level
    Volume,
}

impl DeviceCode {
    /// Two-character wire code
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceCode::Power => "ka",
            DeviceCode::Volume => "kf",
        }
    }

    /// Match the code echoed in an ack against the known commands
    ///
    /// Sets differ in how much of the code they echo: some answer
    /// `"ka 00 OK01"`, others only `"a 01 OK01"`. An ack code matches when
    /// the command code ends with it.
    pub fn from_ack_code(code: &str) -> Option<Self> {
        if code.is_empty() {
            return None;
        }
        [DeviceCode::Power, DeviceCode::Volume]
            .into_iter()
            .find(|candidate| candidate.as_str().ends_with(code))
    }
}

impl fmt::Display for DeviceCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A command to send to the set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// Two-character function selector
    pub code: String,
    /// One or two character argument; padded with `'0'` on the wire
    pub argument: String,
}

impl Command {
    /// Create a command from raw parts
    pub fn new(code: impl Into<String>, argument: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            argument: argument.into(),
        }
    }

    /// Switch the set on or off
    pub fn power(on: bool) -> Self {
        Self::new(DeviceCode::Power.as_str(), if on { "1" } else { "0" })
    }

    /// Set the volume; `level` is rounded and clamped to `0..=64`
    pub fn volume(level: f64) -> Self {
        Self::new(DeviceCode::Volume.as_str(), codec::encode_volume_level(level))
    }

    /// Ask the set to report the current value for `code`
    pub fn query(code: DeviceCode) -> Self {
        Self::new(code.as_str(), QUERY_ARGUMENT)
    }

    /// Whether this command reads rather than sets
    pub fn is_query(&self) -> bool {
        self.argument.eq_ignore_ascii_case(QUERY_ARGUMENT)
    }

    /// The known function this command selects, if any
    pub fn device_code(&self) -> Option<DeviceCode> {
        match self.code.as_str() {
            "ka" => Some(DeviceCode::Power),
            "kf" => Some(DeviceCode::Volume),
            _ => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.code,
            BROADCAST_ID,
            codec::pad_argument(&self.argument)
        )
    }
}

/// Status field of an ack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AckStatus {
    /// `OK`
    Ok,
    /// Anything else, typically `NG`
    Failed(String),
}

impl AckStatus {
    fn from_wire(status: &str) -> Self {
        if status == STATUS_OK {
            AckStatus::Ok
        } else {
            AckStatus::Failed(status.to_string())
        }
    }

    /// Whether the set accepted the command
    pub fn is_ok(&self) -> bool {
        matches!(self, AckStatus::Ok)
    }
}

impl fmt::Display for AckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AckStatus::Ok => f.write_str(STATUS_OK),
            AckStatus::Failed(status) => f.write_str(status),
        }
    }
}

/// One decoded inbound frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckFrame {
    /// Code echoed by the set
    pub code: String,
    /// Set id; always the broadcast id here and otherwise ignored
    pub device_id: String,
    /// Two-character status
    pub status: AckStatus,
    /// Remainder after the status
    pub payload: String,
}

impl AckFrame {
    /// The known function this ack answers, if any
    pub fn device_code(&self) -> Option<DeviceCode> {
        DeviceCode::from_ack_code(&self.code)
    }
}

impl fmt::Display for AckFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}{}",
            self.code, self.device_id, self.status, self.payload
        )
    }
}
