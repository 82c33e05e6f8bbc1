//! Event bus for broadcasting tracker events to SSE subscribers

use super::{EventEmitter, TrackerEvent};
use tokio::sync::broadcast;
use tracing::debug;

/// Default broadcast channel capacity
const DEFAULT_CAPACITY: usize = 1024;

/// Event bus that distributes TrackerEvents via `tokio::sync::broadcast`
///
/// Emitting never blocks. With no subscribers connected, events are dropped.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<TrackerEvent>,
}

impl EventBus {
    /// Create a new EventBus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to receive events
    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.sender.subscribe()
    }

    /// Number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl EventEmitter for EventBus {
    fn emit(&self, event: TrackerEvent) {
        let action = event.action;
        let client_id = event.client_id.clone();
        if let Ok(n) = self.sender.send(event) {
            debug!(
                action = ?action,
                client_id = %client_id,
                subscribers = n,
                "TrackerEvent emitted"
            );
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
