//! Event sink implementation.
//!
//! An explicit subscription list owned by its controller, delivering in
//! registration order.

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::events::{EventFilter, TvEvent};

/// Subscription handle for unsubscribing from events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Create a new unique subscription ID
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sub({})", &self.0.to_string()[..8])
    }
}

/// Type alias for event handler functions
type EventHandler = Arc<dyn Fn(TvEvent) + Send + Sync>;

struct Subscription {
    id: SubscriptionId,
    filter: EventFilter,
    handler: EventHandler,
}

/// Configuration for the event sink
#[derive(Debug, Clone)]
pub struct EventSinkConfig {
    /// Channel capacity for broadcast receivers.
    pub channel_capacity: usize,
}

impl Default for EventSinkConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 64,
        }
    }
}

/// Publish/subscribe surface for [`TvEvent`]s
pub struct EventSink {
    /// Broadcast channel sender for async receivers
    sender: broadcast::Sender<TvEvent>,
    /// Synchronous handlers in registration order
    subscriptions: RwLock<Vec<Subscription>>,
    /// Configuration
    config: EventSinkConfig,
}

impl EventSink {
    /// Create a new event sink with default configuration
    pub fn new() -> Self {
        Self::with_config(EventSinkConfig::default())
    }

    /// Create a new event sink with custom configuration
    pub fn with_config(config: EventSinkConfig) -> Self {
        let (sender, _) = broadcast::channel(config.channel_capacity.max(1));
        Self {
            sender,
            subscriptions: RwLock::new(Vec::new()),
            config,
        }
    }

    /// Publish an event to all subscribers
    ///
    /// Handlers are called on the publishing thread in the order they were
    /// registered. Returns the number of handlers that received the event.
    pub fn publish(&self, event: TvEvent) -> usize {
        // Snapshot so a handler may subscribe or unsubscribe without deadlocking.
        let handlers: Vec<EventHandler> = self
            .subscriptions
            .read()
            .iter()
            .filter(|s| s.filter.matches(&event))
            .map(|s| s.handler.clone())
            .collect();

        tracing::trace!("Publishing {} to {} handler(s)", event, handlers.len());

        for handler in &handlers {
            handler(event);
        }

        // No async receivers is not an error.
        let _ = self.sender.send(event);

        handlers.len()
    }

    /// Subscribe to events with a synchronous handler
    ///
    /// The handler will be called on the publishing path, so it should
    /// return quickly to avoid stalling frame decoding.
    pub fn subscribe<F>(&self, filter: EventFilter, handler: F) -> SubscriptionId
    where
        F: Fn(TvEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId::new();
        self.subscriptions.write().push(Subscription {
            id,
            filter,
            handler: Arc::new(handler),
        });
        tracing::debug!("Subscription {} added", id);
        id
    }

    /// Get a receiver for async event consumption
    pub fn receiver(&self) -> broadcast::Receiver<TvEvent> {
        self.sender.subscribe()
    }

    /// Unsubscribe from events
    ///
    /// Returns true if the subscription was found and removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self.subscriptions.write();
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != id);
        let removed = subscriptions.len() != before;
        if removed {
            tracing::debug!("Subscription {} removed", id);
        }
        removed
    }

    /// Get the number of active handler subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// Get the current configuration
    pub fn config(&self) -> &EventSinkConfig {
        &self.config
    }
}

impl Default for EventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSink")
            .field("subscribers", &self.subscriber_count())
            .field("config", &self.config)
            .finish()
    }
}
