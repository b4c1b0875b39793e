//! Device and connection state
//!
//! State is in-memory only. It starts at `power = false, volume = 0` and is
//! re-synchronised with the television every time the link is opened.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Highest volume level the television reports (0x40)
pub const MAX_VOLUME: u8 = 64;

/// Last known state of the television
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceState {
    /// Whether the set is powered on
    pub power: bool,
    /// Volume level in `0..=MAX_VOLUME`; only meaningful while powered on
    pub volume: u8,
}

impl DeviceState {
    /// Create the initial, unsynchronised state
    pub fn new() -> Self {
        Self::default()
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "power={} volume={}",
            if self.power { "on" } else { "off" },
            self.volume
        )
    }
}

/// Connection lifecycle of the controller
///
/// `Disconnected -> Connecting -> Ready`. Each command passes through an
/// implicit awaiting-ack phase inside `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No link open; commands are no-ops
    #[default]
    Disconnected,
    /// Link is being configured and opened
    Connecting,
    /// Link open, commands are processed
    Ready,
}

impl ConnectionState {
    /// Whether commands are accepted in this state
    pub fn is_ready(&self) -> bool {
        matches!(self, ConnectionState::Ready)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Ready => write!(f, "Ready"),
        }
    }
}
