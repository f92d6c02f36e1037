//! Domain event system: lets observers follow compilation and
//! instantiation without coupling to the loader.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ContextEvent {
    /// A record chain was validated, resolved and merged.
    RecordCompiled {
        record_id: String,
        chain_len: usize,
        fingerprint: String,
        timestamp: DateTime<Utc>,
    },

    /// A compiled record was served from the cache.
    CacheHit {
        record_id: String,
        timestamp: DateTime<Utc>,
    },

    /// Compilation failed; nothing was cached.
    CompilationFailed {
        record_id: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },

    /// A runtime context was bound to a user session.
    ContextInstantiated {
        record_id: String,
        user_id: String,
        session_id: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<ContextEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: ContextEvent) {
        // No subscribers is fine.
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive all events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ContextEvent>> {
        self.sender.subscribe()
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
