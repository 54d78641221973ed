//! The `client` module covers both ends of a connection.
//!
//! `Client` is the broker's record of a connected peer: its id, the channel
//! its writer task drains and the format it wants replies in. `Queue` is the
//! middleware applications use to talk to a broker as a producer or a
//! consumer of one topic.

pub mod pubsub_client;
pub mod queue;

pub use pubsub_client::{Client, SessionState};
pub use queue::{Queue, QueueKind};

#[cfg(test)]
mod tests;
