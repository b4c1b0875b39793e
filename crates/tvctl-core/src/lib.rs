//! # tvctl Core
//!
//! Core types shared by the tvctl crates:
//! the error taxonomy, device and connection state, and the event sink
//! that carries `power-changed` / `volume-changed` notifications.

pub mod data;
pub mod error;
pub mod event_bus;

pub use data::{ConnectionState, DeviceState, MAX_VOLUME};

pub use error::{
    ConnectionError, ControllerError, Error, LineConfigWarning, ProtocolError, Result,
};

pub use event_bus::{EventFilter, EventSink, EventSinkConfig, SubscriptionId, TvEvent};
