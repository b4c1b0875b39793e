//! Event type definitions for the event sink.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Notification emitted when an acknowledgement changes device state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TvEvent {
    /// Power state reported by the set
    PowerChanged(bool),
    /// Volume level reported by the set
    VolumeChanged(u8),
}

impl TvEvent {
    /// Wire-style event name used by UI layers
    pub fn name(&self) -> &'static str {
        match self {
            TvEvent::PowerChanged(_) => "power-changed",
            TvEvent::VolumeChanged(_) => "volume-changed",
        }
    }
}

impl fmt::Display for TvEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TvEvent::PowerChanged(on) => write!(f, "{}({})", self.name(), on),
            TvEvent::VolumeChanged(level) => write!(f, "{}({})", self.name(), level),
        }
    }
}

/// Filter to receive only specific event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventFilter {
    /// Receive all events.
    #[default]
    All,
    /// Receive `power-changed` only.
    Power,
    /// Receive `volume-changed` only.
    Volume,
}

impl EventFilter {
    /// Check if an event matches this filter
    pub fn matches(&self, event: &TvEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Power => matches!(event, TvEvent::PowerChanged(_)),
            EventFilter::Volume => matches!(event, TvEvent::VolumeChanged(_)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        assert_eq!(TvEvent::PowerChanged(true).name(), "power-changed");
        assert_eq!(TvEvent::VolumeChanged(12).name(), "volume-changed");
        assert_eq!(TvEvent::VolumeChanged(32).to_string(), "volume-changed(32)");
    }

    #[test]
    fn test_filter_matches() {
        let power = TvEvent::PowerChanged(false);
        let volume = TvEvent::VolumeChanged(0);

        assert!(EventFilter::All.matches(&power));
        assert!(EventFilter::All.matches(&volume));
        assert!(EventFilter::Power.matches(&power));
        assert!(!EventFilter::Power.matches(&volume));
        assert!(EventFilter::Volume.matches(&volume));
        assert!(!EventFilter::Volume.matches(&power));
    }
}
