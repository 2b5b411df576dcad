#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Event bus abstractions used to announce compound analysis results.

use std::{collections::VecDeque, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Generic event record encoded as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    /// Unique identifier (`evt-<uuid>`).
    pub id: String,
    /// Module producing the event.
    pub source: String,
    /// Event type (e.g., `compound.analysis.completed`).
    pub event_type: String,
    /// RFC 3339 timestamp.
    pub timestamp: String,
    /// Arbitrary JSON payload.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl EventRecord {
    /// Creates a record with a fresh id stamped with the current time.
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        event_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: format!("evt-{}", Uuid::new_v4()),
            source: source.into(),
            event_type: event_type.into(),
            timestamp: Utc::now().to_rfc3339(),
            payload,
        }
    }
}

/// Event publisher interface.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publishes an event to the bus.
    async fn publish(&self, event: EventRecord) -> Result<()>;
}

/// Event subscriber interface.
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// Returns a receiver for events published after this call.
    async fn subscribe(&self) -> Result<broadcast::Receiver<EventRecord>>;
}

/// In-memory broadcast bus with a bounded replay backlog.
#[derive(Debug, Clone)]
pub struct MemoryEventBus {
    sender: broadcast::Sender<EventRecord>,
    capacity: usize,
    backlog: Arc<Mutex<VecDeque<EventRecord>>>,
}

impl MemoryEventBus {
    /// Creates a new bus; `capacity` bounds both the channel and the backlog.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            capacity,
            backlog: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
        }
    }

    /// Snapshot of recent events retained in memory, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<EventRecord> {
        self.backlog.lock().iter().cloned().collect()
    }

    /// Events of the given type currently in the backlog.
    #[must_use]
    pub fn events_of(&self, event_type: &str) -> Vec<EventRecord> {
        self.backlog
            .lock()
            .iter()
            .filter(|event| event.event_type == event_type)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventPublisher for MemoryEventBus {
    async fn publish(&self, event: EventRecord) -> Result<()> {
        {
            let mut backlog = self.backlog.lock();
            if backlog.len() == self.capacity {
                backlog.pop_front();
            }
            backlog.push_back(event.clone());
        }
        // Ignores `SendError`, returned when there are no receivers.
        let _ = self.sender.send(event);
        Ok(())
    }
}

#[async_trait]
impl EventSubscriber for MemoryEventBus {
    async fn subscribe(&self) -> Result<broadcast::Receiver<EventRecord>> {
        Ok(self.sender.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::runtime::Runtime;

    fn analysis_event(confidence: f64) -> EventRecord {
        EventRecord::new(
            "compound-ai",
            "compound.analysis.completed",
            json!({ "compound": "TITAN_SERUM", "confidence": confidence }),
        )
    }

    #[test]
    fn publishes_and_receives() {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let bus = MemoryEventBus::new(16);
            let mut rx = bus.subscribe().await.unwrap();
            bus.publish(analysis_event(0.4)).await.unwrap();
            let event = rx.recv().await.unwrap();
            assert_eq!(event.event_type, "compound.analysis.completed");
            assert!(event.id.starts_with("evt-"));
        });
    }

    #[test]
    fn backlog_is_bounded() {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let bus = MemoryEventBus::new(2);
            for confidence in [0.1, 0.2, 0.3] {
                bus.publish(analysis_event(confidence)).await.unwrap();
            }
            let backlog = bus.snapshot();
            assert_eq!(backlog.len(), 2);
            assert_eq!(backlog[0].payload["confidence"], json!(0.2));
            assert_eq!(bus.events_of("compound.analysis.completed").len(), 2);
        });
    }
}
