//! Topic management
//!
//! A `Topic` holds the last published value and the subscriber set for one
//! topic name. `TopicStore` owns every topic and implements the hierarchy:
//! a topic is the *ancestor* of every topic whose name starts with its name
//! (plain string prefix, not path segments).
//!
//! Inheritance only happens when a topic is created: the new topic starts
//! with the union of its existing ancestors' subscribers. Values never cross
//! topic boundaries, and topics are never removed.

use std::collections::{HashMap, HashSet};

pub type SubscriberId = String;

#[derive(Debug, Default)]
pub struct Topic {
    pub name: String,
    pub value: Option<String>,
    pub subscribers: HashSet<SubscriberId>,
}

impl Topic {
    /// Create a new value-less topic with the given name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            value: None,
            subscribers: HashSet::new(),
        }
    }

    /// Add a subscriber to the topic. Duplicate adds are ignored.
    pub fn subscribe(&mut self, id: SubscriberId) {
        self.subscribers.insert(id);
    }

    /// Remove a subscriber from the topic.
    pub fn unsubscribe(&mut self, id: &SubscriberId) {
        self.subscribers.remove(id);
    }
}

#[derive(Debug, Default)]
pub struct TopicStore {
    topics: HashMap<String, Topic>,
}

impl TopicStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` as the topic's latest value, creating the topic first
    /// if needed. Returns the subscribers the value must be delivered to.
    pub fn publish(&mut self, topic: &str, value: String) -> &HashSet<SubscriberId> {
        let topic = self.create_topic(topic);
        topic.value = Some(value);
        &topic.subscribers
    }

    /// Adds `subscriber` to `topic`, creating the topic first if needed.
    ///
    /// Returns the retained value, which the caller must deliver to the new
    /// subscriber straight away.
    pub fn subscribe(&mut self, topic: &str, subscriber: SubscriberId) -> Option<&str> {
        let topic = self.create_topic(topic);
        topic.subscribe(subscriber);
        topic.value.as_deref()
    }

    /// Removes `subscriber` from `topic` and from every topic below it.
    /// An empty `topic` matches everything.
    pub fn unsubscribe(&mut self, topic: &str, subscriber: &SubscriberId) {
        for (name, t) in self.topics.iter_mut() {
            if name.starts_with(topic) {
                t.unsubscribe(subscriber);
            }
        }
    }

    /// Names of the topics that hold a value, sorted.
    pub fn list_topics(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .topics
            .values()
            .filter(|t| t.value.is_some())
            .map(|t| t.name.clone())
            .collect();
        names.sort();
        names
    }

    /// Returns the topic, registering it first when it is unknown.
    ///
    /// A new topic copies the current subscribers of every existing ancestor.
    /// This is a one-time snapshot: later subscriptions to an ancestor do not
    /// reach it.
    pub fn create_topic(&mut self, name: &str) -> &mut Topic {
        let inherited = if self.topics.contains_key(name) {
            None
        } else {
            Some(self.ancestor_subscribers(name))
        };

        let topic = self
            .topics
            .entry(name.to_string())
            .or_insert_with(|| Topic::new(name));
        if let Some(subscribers) = inherited {
            topic.subscribers = subscribers;
        }
        topic
    }

    fn ancestor_subscribers(&self, name: &str) -> HashSet<SubscriberId> {
        self.topics
            .iter()
            .filter(|(existing, _)| name.starts_with(existing.as_str()))
            .flat_map(|(_, ancestor)| ancestor.subscribers.iter().cloned())
            .collect()
    }

    pub fn contains(&self, topic: &str) -> bool {
        self.topics.contains_key(topic)
    }

    pub fn value(&self, topic: &str) -> Option<&str> {
        self.topics.get(topic).and_then(|t| t.value.as_deref())
    }

    pub fn subscribers(&self, topic: &str) -> Option<&HashSet<SubscriberId>> {
        self.topics.get(topic).map(|t| &t.subscribers)
    }
}
