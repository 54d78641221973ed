//! Client representation
//!
//! `Client` is the broker's record of one connection: the id used in
//! subscriber sets, the sending side of the connection's outgoing channel,
//! and the payload format replies must be encoded in. A connection is
//! `Closed` once its record has been removed from the broker.

use bytes::Bytes;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::mpsc::error::SendError;
use uuid::Uuid;

use crate::broker::topic::SubscriberId;
use crate::protocol::Format;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, nothing decoded yet.
    #[default]
    AwaitingFormat,
    /// At least one message decoded.
    Active,
}

#[derive(Debug)]
pub struct Client {
    pub id: SubscriberId,
    pub sender: UnboundedSender<Bytes>,
    /// Format used for everything the broker sends to this client.
    /// JSON until the client sends an `Ack`.
    pub format: Format,
    pub state: SessionState,
}

impl Client {
    /// Create a new client with a sender channel. The `id` is a UUID used
    /// to identify the client across broker operations.
    pub fn new(sender: UnboundedSender<Bytes>) -> Self {
        Self::with_id(format!("client-{}", Uuid::new_v4()), sender)
    }

    pub fn with_id(id: impl Into<SubscriberId>, sender: UnboundedSender<Bytes>) -> Self {
        Self {
            id: id.into(),
            sender,
            format: Format::default(),
            state: SessionState::default(),
        }
    }

    /// Queues an encoded frame for the connection's writer task.
    pub fn send_frame(&self, frame: Bytes) -> Result<(), SendError<Bytes>> {
        self.sender.send(frame)
    }
}
