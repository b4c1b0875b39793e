//! # tvctl Communication
//!
//! Serial link, wire codec, and controller for televisions speaking the
//! LG-style RS-232 control protocol.
//!
//! Layers, leaves first:
//! - [`communication::link`]: owns the byte stream, frames inbound data on `'x'`
//! - [`protocol::codec`]: stateless translation between commands/acks and bytes
//! - [`controller`]: request/ack state machine, device state, change events

pub mod communication;
pub mod controller;
pub mod protocol;

pub use communication::{
    link::{Link, FRAME_TERMINATOR},
    serial::{list_ports, SerialPortInfo},
    stream::SerialStream,
    FlowControl, LineConfig, SerialParity,
};

pub use controller::{ControllerConfig, TvController};

pub use protocol::{
    codec::{decode, encode, encode_volume_level, parse_power_payload, parse_volume_payload},
    AckFrame, AckStatus, Command, DeviceCode,
};
