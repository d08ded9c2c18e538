//! Publish/subscribe hub for presentation layers.
//!
//! The bus owns its subscribers; subjects never see it. Subscriptions are
//! removed by id, so a view that goes away must call `unsubscribe` with the
//! id it was given.

use crate::event::{EventTopic, SimEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Box<dyn FnMut(&SimEvent)>;

struct Subscriber {
    id:       SubscriptionId,
    topic:    Option<EventTopic>,
    callback: Callback,
}

#[derive(Default)]
pub struct EventBus {
    next_id:     u64,
    subscribers: Vec<Subscriber>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive every event.
    pub fn subscribe(&mut self, callback: impl FnMut(&SimEvent) + 'static) -> SubscriptionId {
        self.insert(None, Box::new(callback))
    }

    /// Receive only events of one topic.
    pub fn subscribe_topic(
        &mut self,
        topic: EventTopic,
        callback: impl FnMut(&SimEvent) + 'static,
    ) -> SubscriptionId {
        self.insert(Some(topic), Box::new(callback))
    }

    fn insert(&mut self, topic: Option<EventTopic>, callback: Callback) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.subscribers.push(Subscriber { id, topic, callback });
        id
    }

    /// Returns false if the id was unknown (already removed).
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|s| s.id != id);
        self.subscribers.len() != before
    }

    pub fn publish(&mut self, event: &SimEvent) {
        let topic = event.topic();
        for sub in &mut self.subscribers {
            if sub.topic.is_none_or(|t| t == topic) {
                (sub.callback)(event);
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
