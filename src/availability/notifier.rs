//! Live-update channel for availability changes.
//!
//! Listeners are registered per topic and stay registered for as long as the
//! returned `Subscription` is alive.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};

use tracing::debug;
use uuid::Uuid;

use super::models::ChangeEvent;

/// Topic carrying unit availability changes.
pub const AVAILABILITY_TOPIC: &str = "availability";

/// Callback invoked for every event published on a subscribed topic.
pub type ChangeListener = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Publish/subscribe primitive keyed by topic name.
pub trait ChangeNotifier: Send + Sync {
    fn subscribe(&self, topic: &str, listener: ChangeListener) -> Subscription;
}

/// Registration handle; dropping it removes the listener.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: Uuid,
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new(id: Uuid, cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            id,
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Remove the listener now.
    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

type Topics = HashMap<String, HashMap<Uuid, ChangeListener>>;

/// In-process hub fed by backend push events
#[derive(Clone, Default)]
pub struct LocalNotifier {
    topics: Arc<RwLock<Topics>>,
}

impl LocalNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an event to every listener of `topic`, returning how many were called.
    pub fn publish(&self, topic: &str, event: &ChangeEvent) -> usize {
        // Listeners run outside the lock so they may subscribe or unsubscribe.
        let listeners: Vec<ChangeListener> = {
            let topics = self.topics.read().unwrap_or_else(|p| p.into_inner());
            topics
                .get(topic)
                .map(|listeners| listeners.values().cloned().collect())
                .unwrap_or_default()
        };

        for listener in &listeners {
            listener(event);
        }

        debug!(
            topic,
            unit_id = %event.affected_unit_id,
            listeners = listeners.len(),
            "Published availability change"
        );
        listeners.len()
    }

    /// Number of live listeners on `topic`.
    pub fn listener_count(&self, topic: &str) -> usize {
        let topics = self.topics.read().unwrap_or_else(|p| p.into_inner());
        topics.get(topic).map_or(0, HashMap::len)
    }

    fn remove(topics: &Weak<RwLock<Topics>>, topic: &str, id: Uuid) {
        let Some(topics) = topics.upgrade() else {
            return;
        };
        let mut topics = topics.write().unwrap_or_else(|p| p.into_inner());
        if let Some(listeners) = topics.get_mut(topic) {
            listeners.remove(&id);
            if listeners.is_empty() {
                topics.remove(topic);
            }
        }
    }
}

impl ChangeNotifier for LocalNotifier {
    fn subscribe(&self, topic: &str, listener: ChangeListener) -> Subscription {
        let id = Uuid::new_v4();
        {
            let mut topics = self.topics.write().unwrap_or_else(|p| p.into_inner());
            topics
                .entry(topic.to_string())
                .or_default()
                .insert(id, listener);
        }

        let registry = Arc::downgrade(&self.topics);
        let topic = topic.to_string();
        Subscription::new(id, move || LocalNotifier::remove(&registry, &topic, id))
    }
}
