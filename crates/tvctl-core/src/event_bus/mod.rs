//! # Event Sink Module
//!
//! Publish/subscribe surface for device state notifications.
//!
//! ## Overview
//!
//! The controller owns one [`EventSink`] and publishes on it whenever an
//! acknowledgement changes device state:
//! - `power-changed(bool)`
//! - `volume-changed(0..=64)`
//!
//! Synchronous handlers run on the decode path in registration order, so
//! they must be quick and must not block. Async consumers can take a
//! broadcast receiver instead. Late subscribers see no replay.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tvctl_core::event_bus::{EventFilter, EventSink, TvEvent};
//!
//! let sink = EventSink::new();
//! let id = sink.subscribe(EventFilter::Power, |event| {
//!     if let TvEvent::PowerChanged(on) = event {
//!         println!("power: {}", on);
//!     }
//! });
//!
//! sink.publish(TvEvent::PowerChanged(true));
//! sink.unsubscribe(id);
//! ```

mod bus;
mod events;

pub use bus::*;
pub use events::*;
