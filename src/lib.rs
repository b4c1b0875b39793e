//! # tvctl
//!
//! Control of LG-protocol televisions over an RS-232 serial line:
//! - Power on/off and volume (0-64) commands
//! - Acknowledgement-driven device state
//! - Change events for power and volume
//!
//! ## Architecture
//!
//! tvctl is organized as a workspace with multiple crates:
//!
//! 1. **tvctl-core** - Device state, errors, change events
//! 2. **tvctl-communication** - Serial link, wire codec, controller
//! 3. **tvctl-settings** - Configuration files
//! 4. **tvctl** - Command-line binary that integrates all crates

pub use tvctl_communication::{
    list_ports, ControllerConfig, FlowControl, LineConfig, SerialParity, SerialPortInfo,
    TvController,
};

pub use tvctl_core::{
    ConnectionError, ConnectionState, ControllerError, DeviceState, Error, EventFilter,
    ProtocolError, Result, SubscriptionId, TvEvent, MAX_VOLUME,
};

pub use tvctl_settings::{Config, ConnectionSettings, ProtocolSettings, SettingsError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging with the default configuration
///
/// Logs go to stderr so that event output on stdout stays machine readable.
/// `RUST_LOG` overrides the default `warn` level.
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_names(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
