//! In-process event bus that fans published events out to topic handlers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::events::EventPayload;

/// A named event with its raw JSON payload.
#[derive(Debug, Clone)]
pub struct Event {
    pub topic: String,
    pub payload: Arc<[u8]>,
    pub delivery_id: Uuid,
    pub received_at: DateTime<Utc>,
}

impl Event {
    pub fn new(topic: impl Into<String>, payload: impl Into<Arc<[u8]>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            delivery_id: Uuid::now_v7(),
            received_at: Utc::now(),
        }
    }

    /// Decode the payload into a typed event.
    pub fn decode<T: EventPayload>(&self) -> Result<T> {
        T::decode(&self.topic, &self.payload)
    }
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: Event);
}

/// Registers handlers for named events.
pub trait EventSubscriber {
    fn subscribe(&self, topic: &str, handler: Arc<dyn EventHandler>) -> Result<()>;
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
    /// Subscriptions per topic. Subscription tasks live as long as the bus.
    topics: Arc<Mutex<HashMap<String, usize>>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            topics: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn subscriptions_for(&self, topic: &str) -> usize {
        let topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        topics.get(topic).copied().unwrap_or(0)
    }

    /// Publish an event; returns how many subscriptions for its topic will
    /// handle it.
    pub fn publish(&self, event: Event) -> usize {
        let subscriptions = self.subscriptions_for(&event.topic);
        match self.sender.send(event) {
            Ok(_) => subscriptions,
            Err(broadcast::error::SendError(event)) => {
                debug!("No subscribers for topic '{}', dropping event", event.topic);
                0
            }
        }
    }
}

impl EventSubscriber for EventBus {
    fn subscribe(&self, topic: &str, handler: Arc<dyn EventHandler>) -> Result<()> {
        let topic = topic.to_string();
        let mut stream = BroadcastStream::new(self.sender.subscribe());
        *self
            .topics
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(topic.clone())
            .or_insert(0) += 1;

        tokio::spawn(async move {
            while let Some(item) = stream.next().await {
                match item {
                    Ok(event) if event.topic == topic => {
                        let handler = Arc::clone(&handler);
                        tokio::spawn(async move { handler.handle(event).await });
                    }
                    Ok(_) => {}
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        warn!("Subscriber for '{}' lagged, {} events dropped", topic, skipped);
                    }
                }
            }
            debug!("Event bus closed, subscription for '{}' ended", topic);
        });

        Ok(())
    }
}
