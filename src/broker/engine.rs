//! Broker engine
//!
//! This module contains the session handler: it owns the [`TopicStore`] and
//! the table of connected clients, interprets every decoded message, and
//! routes the resulting frames to the clients' outgoing channels.
//!
//! Concurrency and usage notes:
//! - The API is synchronous and designed to be held behind a lock
//!   (`SharedBroker`) by the transport layer. Nothing here awaits, so the
//!   lock is never held across network I/O.
//! - Outgoing frames go through unbounded per-client channels. There is no
//!   backpressure: a client that stops reading makes its queue grow.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::broker::topic::{SubscriberId, TopicStore};
use crate::client::{Client, SessionState};
use crate::protocol::{Format, Message, codec};

#[derive(Debug, Default)]
pub struct Broker {
    store: TopicStore,
    clients: HashMap<SubscriberId, Client>,
}

/// Frames already encoded for one outgoing message, keyed by format, so a
/// publish encodes at most once per format.
type EncodedFrames = HashMap<Format, Bytes>;

impl Broker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_client(&mut self, client: Client) {
        debug!("registered {}", client.id);
        self.clients.insert(client.id.clone(), client);
    }

    pub fn remove_client(&mut self, client_id: &SubscriberId) -> Option<Client> {
        self.clients.remove(client_id)
    }

    pub fn client(&self, client_id: &SubscriberId) -> Option<&Client> {
        self.clients.get(client_id)
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Read-only view of the topics.
    pub fn store(&self) -> &TopicStore {
        &self.store
    }

    /// Dispatches one decoded message received from `client_id`.
    pub fn handle_message(&mut self, client_id: &SubscriberId, message: Message) {
        debug!("{client_id} -> {message}");
        if let Some(client) = self.clients.get_mut(client_id) {
            client.state = SessionState::Active;
        }

        match message {
            Message::Ack { format } => self.acknowledge(client_id, format),
            Message::Sub { topic } => self.subscribe(&topic, client_id),
            Message::Pub { topic, value } => self.publish(&topic, value),
            Message::TopicListReq => self.send_topic_list(client_id),
            Message::CancelSub { topic } => self.unsubscribe(&topic, client_id),
            Message::TopicListRep { .. } => {
                debug!("ignoring TopicListRep sent by {client_id}");
            }
        }
    }

    /// Records the format `client_id` wants its messages in.
    pub fn acknowledge(&mut self, client_id: &SubscriberId, format: Format) {
        match self.clients.get_mut(client_id) {
            Some(client) => {
                client.format = format;
                info!("{client_id} speaks {format}");
            }
            None => warn!("Ack from unregistered client {client_id}"),
        }
    }

    /// Subscribes `subscriber` to `topic` and sends it the retained value, if any.
    pub fn subscribe(&mut self, topic: &str, subscriber: &SubscriberId) {
        let retained = self
            .store
            .subscribe(topic, subscriber.clone())
            .map(str::to_owned);
        info!("{subscriber} subscribed to {topic:?}");

        if let Some(value) = retained {
            let message = Message::publish(topic, value);
            deliver(&self.clients, subscriber, &message, &mut EncodedFrames::new());
        }
    }

    pub fn unsubscribe(&mut self, topic: &str, subscriber: &SubscriberId) {
        self.store.unsubscribe(topic, subscriber);
        if topic.is_empty() {
            info!("{subscriber} unsubscribed from all topics");
        } else {
            info!("{subscriber} unsubscribed from {topic:?} and its subtopics");
        }
    }

    /// Stores `value` on `topic` and delivers it to every subscriber, each in
    /// its own format.
    pub fn publish(&mut self, topic: &str, value: String) {
        let message = Message::publish(topic, value.clone());
        let subscribers = self.store.publish(topic, value);
        debug!("publish on {topic:?} to {} subscribers", subscribers.len());

        let mut encoded = EncodedFrames::new();
        for subscriber in subscribers {
            deliver(&self.clients, subscriber, &message, &mut encoded);
        }
    }

    pub fn list_topics(&self) -> Vec<String> {
        self.store.list_topics()
    }

    /// Replies with the topic list. A list too large for one frame
    /// disconnects the requester.
    fn send_topic_list(&mut self, client_id: &SubscriberId) {
        let Some(format) = self.clients.get(client_id).map(|c| c.format) else {
            warn!("No client registered with id: {client_id}");
            return;
        };
        let message = Message::TopicListRep {
            topics: self.list_topics(),
        };

        match codec::encode(format, &message) {
            Ok(frame) => {
                let mut encoded = EncodedFrames::from([(format, frame)]);
                deliver(&self.clients, client_id, &message, &mut encoded);
            }
            Err(e) => {
                warn!("Topic list for {client_id} cannot be sent ({e}), disconnecting");
                self.cleanup_client(client_id);
            }
        }
    }

    /// Unsubscribes a client from every topic and forgets it.
    /// Used when the connection ends for any reason.
    pub fn cleanup_client(&mut self, client_id: &SubscriberId) {
        self.store.unsubscribe("", client_id);
        self.remove_client(client_id);
        info!("Cleaned up client {client_id}");
    }
}

fn deliver(
    clients: &HashMap<SubscriberId, Client>,
    client_id: &SubscriberId,
    message: &Message,
    encoded: &mut EncodedFrames,
) {
    let Some(client) = clients.get(client_id) else {
        warn!("No client registered with id: {client_id}");
        return;
    };

    let frame = match encoded.entry(client.format) {
        Entry::Occupied(entry) => entry.get().clone(),
        Entry::Vacant(entry) => match codec::encode(client.format, message) {
            Ok(frame) => entry.insert(frame).clone(),
            Err(e) => {
                warn!("Failed to encode {} for {client_id}: {e}", message.kind());
                return;
            }
        },
    };

    if client.send_frame(frame).is_err() {
        warn!("Failed to send to {client_id}: connection is closing");
    }
}
