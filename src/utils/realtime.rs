use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::debug;

const TOPIC_CAPACITY: usize = 64;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RealtimeEvent {
    /// e.g. `notification`, `announcement`, `attendance`
    pub event: String,
    pub payload: serde_json::Value,
}

impl RealtimeEvent {
    pub fn new(event: &str, payload: impl Serialize) -> Self {
        Self {
            event: event.to_string(),
            payload: serde_json::to_value(payload).unwrap_or(serde_json::Value::Null),
        }
    }
}

pub fn notifications_topic(profile_id: &str) -> String {
    format!("notifications:{profile_id}")
}

pub fn announcements_topic(school_id: &str) -> String {
    format!("announcements:{school_id}")
}

pub fn attendance_topic(school_id: &str) -> String {
    format!("attendance:{school_id}")
}

struct Topic {
    sender: broadcast::Sender<RealtimeEvent>,
    listeners: usize,
}

type Topics = Arc<Mutex<HashMap<String, Topic>>>;

/// Topic registry for live updates. A topic exists only while it has listeners.
#[derive(Clone, Default)]
pub struct RealtimeHub {
    topics: Topics,
}

impl RealtimeHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, topic: &str) -> Subscription {
        let mut topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());

        let entry = topics.entry(topic.to_string()).or_insert_with(|| {
            debug!(topic, "Opening realtime topic");
            Topic {
                sender: broadcast::channel(TOPIC_CAPACITY).0,
                listeners: 0,
            }
        });
        entry.listeners += 1;

        Subscription {
            topic: topic.to_string(),
            receiver: entry.sender.subscribe(),
            topics: Arc::clone(&self.topics),
        }
    }

    /// Number of listeners reached. Publishing to an unknown topic is a no-op.
    pub fn publish(&self, topic: &str, event: RealtimeEvent) -> usize {
        let topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());

        match topics.get(topic) {
            Some(t) => t.sender.send(event).unwrap_or(0),
            None => 0,
        }
    }

    pub fn listener_count(&self, topic: &str) -> usize {
        self.topics
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(topic)
            .map_or(0, |t| t.listeners)
    }

    #[cfg(test)]
    pub fn topic_count(&self) -> usize {
        self.topics.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Listener handle. Dropping it unsubscribes.
pub struct Subscription {
    topic: String,
    receiver: broadcast::Receiver<RealtimeEvent>,
    topics: Topics,
}

impl Subscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Next event, skipping over any this listener lagged behind on.
    /// `None` once the topic is gone.
    pub async fn recv(&mut self) -> Option<RealtimeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    debug!(topic = %self.topic, skipped, "Realtime listener lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let mut topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(topic) = topics.get_mut(&self.topic) {
            topic.listeners = topic.listeners.saturating_sub(1);
            if topic.listeners == 0 {
                topics.remove(&self.topic);
                debug!(topic = %self.topic, "Closed realtime topic with no listeners");
            }
        }
    }
}
