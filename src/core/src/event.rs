use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Event key type
pub type EventKey = String;

/// Event payload
pub type EventPayload = HashMap<String, serde_json::Value>;

/// Build event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildEvent {
    /// Event key (e.g., "build.step.started")
    pub key: EventKey,

    /// Event payload
    pub payload: EventPayload,

    /// Timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl BuildEvent {
    /// Create an event with a map payload
    pub fn with_map(key: impl Into<String>, map: EventPayload) -> Self {
        Self {
            key: key.into(),
            payload: map,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Event describing one image of a build
    pub fn for_image(key: impl Into<String>, name: &str, version: &str) -> Self {
        let mut map = HashMap::new();
        map.insert("image".to_string(), serde_json::json!(name));
        map.insert("version".to_string(), serde_json::json!(version));
        Self::with_map(key, map)
    }

    /// String entry of the payload
    pub fn field(&self, name: &str) -> Option<&str> {
        self.payload.get(name).and_then(serde_json::Value::as_str)
    }
}

/// Event emitter
#[derive(Clone)]
pub struct EventEmitter {
    sender: Arc<broadcast::Sender<BuildEvent>>,
}

impl EventEmitter {
    /// Create a new event emitter
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Emit an event
    pub fn emit(&self, event: BuildEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<BuildEvent> {
        self.sender.subscribe()
    }

    /// Subscribe to events with a filter
    pub fn subscribe_filtered(
        &self,
        filter: impl Fn(&BuildEvent) -> bool + Send + Sync + 'static,
    ) -> EventStream {
        EventStream {
            receiver: self.sender.subscribe(),
            filter: Arc::new(filter),
        }
    }
}

/// Event stream with filtering
pub struct EventStream {
    receiver: broadcast::Receiver<BuildEvent>,
    filter: Arc<dyn Fn(&BuildEvent) -> bool + Send + Sync>,
}

impl EventStream {
    /// Receive the next matching event
    pub async fn recv(&mut self) -> Option<BuildEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if (self.filter)(&event) {
                        return Some(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Event catalog - predefined event keys
pub mod events {
    // Build events
    pub const BUILD_STARTED: &str = "build.started";
    pub const BUILD_FINISHED: &str = "build.finished";

    // Step events
    pub const BUILD_STEP_STARTED: &str = "build.step.started";
    pub const BUILD_STEP_COMPLETED: &str = "build.step.completed";
    pub const BUILD_STEP_FAILED: &str = "build.step.failed";

    // Dispatcher events
    pub const DISPATCHER_PRESSURE: &str = "dispatcher.pressure";
    pub const DISPATCHER_IDLE: &str = "dispatcher.idle";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_and_subscribe() {
        let emitter = EventEmitter::new(16);
        let mut rx = emitter.subscribe();

        emitter.emit(BuildEvent::for_image(events::BUILD_STEP_STARTED, "app", "1.0"));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.key, events::BUILD_STEP_STARTED);
        assert_eq!(event.field("image"), Some("app"));
        assert_eq!(event.field("version"), Some("1.0"));
        assert_eq!(event.field("error"), None);
    }

    #[tokio::test]
    async fn test_filtered_stream() {
        let emitter = EventEmitter::new(16);
        let mut stream = emitter.subscribe_filtered(|e| e.key == events::BUILD_STEP_FAILED);

        emitter.emit(BuildEvent::for_image(events::BUILD_STEP_STARTED, "app", "1.0"));
        emitter.emit(BuildEvent::for_image(events::BUILD_STEP_FAILED, "app", "1.0"));

        let event = stream.recv().await.unwrap();
        assert_eq!(event.key, events::BUILD_STEP_FAILED);
    }

    #[tokio::test]
    async fn test_stream_ends_with_emitter() {
        let emitter = EventEmitter::new(4);
        let mut stream = emitter.subscribe_filtered(|_| true);
        drop(emitter);
        assert!(stream.recv().await.is_none());
    }

    #[test]
    fn test_emit_without_subscribers() {
        let emitter = EventEmitter::new(4);
        emitter.emit(BuildEvent::for_image(events::BUILD_STARTED, "app", ""));
    }
}
