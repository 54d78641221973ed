pub mod engine;
pub mod topic;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub use engine::Broker;
pub use topic::{SubscriberId, Topic, TopicStore};

pub type SharedBroker = Arc<Mutex<Broker>>;

pub fn shared(broker: Broker) -> SharedBroker {
    Arc::new(Mutex::new(broker))
}

/// Locks the broker, ignoring poisoning.
pub fn lock(broker: &SharedBroker) -> MutexGuard<'_, Broker> {
    broker.lock().unwrap_or_else(PoisonError::into_inner)
}
