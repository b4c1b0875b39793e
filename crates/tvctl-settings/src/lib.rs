//! tvctl Settings Crate
//!
//! Loads, validates, and saves the controller configuration.

pub mod config;
pub mod error;

pub use config::{Config, ConnectionSettings, ProtocolSettings};
pub use error::{ConfigError, Result, SettingsError};
