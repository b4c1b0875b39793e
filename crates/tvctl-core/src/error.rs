//! Error handling for tvctl
//!
//! Provides the error types for every layer of the driver:
//! - Connection errors (device missing, unopenable, link lost)
//! - Protocol errors (malformed or rejected acknowledgement frames)
//! - Controller errors (state machine violations)
//!
//! Serial line configuration failures are not errors: they are reported as
//! [`LineConfigWarning`] values which callers log and move past.
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Connection error type
///
/// Represents failures to reach the television over its serial line.
/// A connection error during open is fatal to the session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Device node does not exist
    #[error("Port not found: {port}")]
    PortNotFound {
        /// The device path that was not found.
        port: String,
    },

    /// Insufficient permissions on the device node
    #[error("Permission denied opening {port}")]
    PermissionDenied {
        /// The device path that could not be opened.
        port: String,
    },

    /// Failed to open port
    #[error("Failed to open port {port}: {reason}")]
    FailedToOpen {
        /// The device path that failed to open.
        port: String,
        /// The reason the port failed to open.
        reason: String,
    },

    /// Operation attempted on a closed link
    #[error("Link is not connected")]
    NotConnected,

    /// The stream ended or failed while a frame was expected
    #[error("Connection lost: {reason}")]
    ConnectionLost {
        /// The reason the connection was lost.
        reason: String,
    },

    /// I/O error on an open link
    #[error("I/O error: {reason}")]
    Io {
        /// The reason for the I/O error.
        reason: String,
    },
}

impl ConnectionError {
    /// Map an I/O error raised while opening `port`
    pub fn from_open_error(port: &str, err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => ConnectionError::PortNotFound {
                port: port.to_string(),
            },
            std::io::ErrorKind::PermissionDenied => ConnectionError::PermissionDenied {
                port: port.to_string(),
            },
            _ => ConnectionError::FailedToOpen {
                port: port.to_string(),
                reason: err.to_string(),
            },
        }
    }
}

impl From<std::io::Error> for ConnectionError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::UnexpectedEof | std::io::ErrorKind::BrokenPipe => {
                ConnectionError::ConnectionLost {
                    reason: err.to_string(),
                }
            }
            _ => ConnectionError::Io {
                reason: err.to_string(),
            },
        }
    }
}

/// Serial line attributes could not be applied.
///
/// Never fatal: the line may already be configured correctly, so the open
/// continues optimistically after this is logged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Failed to configure serial line {port}: {reason}")]
pub struct LineConfigWarning {
    /// The device path being configured.
    pub port: String,
    /// Why configuration failed.
    pub reason: String,
}

/// Protocol error type
///
/// Raised while decoding acknowledgement frames. These are logged and the
/// frame is discarded; device state is left untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Frame does not have the `<code> <id> <status><payload>` shape
    #[error("Malformed frame {frame:?}: {reason}")]
    MalformedFrame {
        /// The offending frame, lossily decoded.
        frame: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The device answered with a non-OK status
    #[error("Non-OK ack {status:?} for command {code:?}")]
    BadAck {
        /// The command code echoed by the device.
        code: String,
        /// The status the device returned.
        status: String,
    },

    /// The ack carries a code this controller does not issue
    #[error("Unrecognized command code {code:?}")]
    UnknownCommandCode {
        /// The unrecognized code.
        code: String,
    },

    /// The ack payload could not be interpreted
    #[error("Invalid payload {payload:?} for command {code:?}")]
    InvalidPayload {
        /// The command code the payload belongs to.
        code: String,
        /// The payload text.
        payload: String,
    },
}

/// Controller error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControllerError {
    /// Controller is not connected
    #[error("Controller not connected")]
    NotConnected,

    /// Controller is already connected
    #[error("Controller already connected")]
    AlreadyConnected,

    /// Command queue to the IO task is full
    #[error("Command queue full, dropped {command}")]
    QueueFull {
        /// The dropped command, as it would appear on the wire.
        command: String,
    },
}

/// Main error type for tvctl
///
/// A unified error type that can represent any error from all layers.
#[derive(Error, Debug)]
pub enum Error {
    /// Connection error
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Protocol error
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Controller error
    #[error(transparent)]
    Controller(#[from] ControllerError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Connection(_))
    }

    /// Check if this is a protocol error
    pub fn is_protocol_error(&self) -> bool {
        matches!(self, Error::Protocol(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_open_error_mapping() {
        let err = io::Error::new(io::ErrorKind::NotFound, "no such file");
        assert_eq!(
            ConnectionError::from_open_error("/dev/ttyUSB9", &err),
            ConnectionError::PortNotFound {
                port: "/dev/ttyUSB9".to_string()
            }
        );

        let err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        assert!(matches!(
            ConnectionError::from_open_error("/dev/ttyUSB0", &err),
            ConnectionError::PermissionDenied { .. }
        ));

        let err = io::Error::new(io::ErrorKind::Other, "busy");
        assert!(matches!(
            ConnectionError::from_open_error("/dev/ttyUSB0", &err),
            ConnectionError::FailedToOpen { .. }
        ));
    }

    #[test]
    fn test_eof_is_connection_lost() {
        let err: ConnectionError = io::Error::new(io::ErrorKind::UnexpectedEof, "eof").into();
        assert!(matches!(err, ConnectionError::ConnectionLost { .. }));
    }

    #[test]
    fn test_error_classification() {
        let err: Error = ConnectionError::NotConnected.into();
        assert!(err.is_connection_error());
        assert!(!err.is_protocol_error());

        let err: Error = ProtocolError::UnknownCommandCode {
            code: "xx".to_string(),
        }
        .into();
        assert!(err.is_protocol_error());
        assert_eq!(err.to_string(), "Unrecognized command code \"xx\"");
    }
}
