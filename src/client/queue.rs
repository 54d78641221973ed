//! Client middleware
//!
//! A `Queue` is bound to one topic and one payload format. Producers push
//! values to the topic; consumers are subscribed to it on connect and pull
//! deliveries. Every frame the queue writes uses its own format, and the
//! first frame is always the `Ack` announcing that format to the broker.

use std::collections::VecDeque;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::{debug, warn};

use crate::protocol::{Format, FrameReader, Message, codec};
use crate::utils::error::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    Producer,
    Consumer,
}

#[derive(Debug)]
pub struct Queue {
    topic: String,
    kind: QueueKind,
    format: Format,
    reader: FrameReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    /// Deliveries read while waiting for a topic list.
    pending: VecDeque<(String, String)>,
}

impl Queue {
    pub async fn connect(
        addr: impl ToSocketAddrs,
        topic: impl Into<String>,
        kind: QueueKind,
        format: Format,
    ) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        let (read_half, write_half) = stream.into_split();

        let mut queue = Self {
            topic: topic.into(),
            kind,
            format,
            reader: FrameReader::new(read_half),
            writer: write_half,
            pending: VecDeque::new(),
        };

        queue.send(&Message::Ack { format }).await?;
        if kind == QueueKind::Consumer {
            let sub = Message::sub(queue.topic.clone());
            queue.send(&sub).await?;
        }
        debug!("{kind:?} queue on {:?} connected ({format})", queue.topic);
        Ok(queue)
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn kind(&self) -> QueueKind {
        self.kind
    }

    pub fn format(&self) -> Format {
        self.format
    }

    /// Publishes `value` on the queue's topic.
    pub async fn push(&mut self, value: impl Into<String>) -> Result<(), ClientError> {
        if self.kind != QueueKind::Producer {
            return Err(ClientError::NotAProducer);
        }
        let message = Message::publish(self.topic.clone(), value);
        self.send(&message).await
    }

    /// Subscribes to another topic on the same connection.
    pub async fn subscribe(&mut self, topic: &str) -> Result<(), ClientError> {
        self.send(&Message::sub(topic)).await
    }

    /// Waits for the next delivery as `(topic, value)`.
    ///
    /// Returns `None` once the broker closes the connection.
    pub async fn pull(&mut self) -> Result<Option<(String, String)>, ClientError> {
        if let Some(delivery) = self.pending.pop_front() {
            return Ok(Some(delivery));
        }

        loop {
            match self.reader.read_message().await {
                Ok(Some(Message::Pub { topic, value })) => return Ok(Some((topic, value))),
                Ok(Some(other)) => debug!("ignoring unexpected {other}"),
                Ok(None) => return Ok(None),
                Err(e) if e.is_recoverable() => warn!("Skipping malformed frame: {e}"),
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Asks the broker for the topics that hold a value.
    pub async fn list_topics(&mut self) -> Result<Vec<String>, ClientError> {
        self.send(&Message::TopicListReq).await?;

        loop {
            match self.reader.read_message().await {
                Ok(Some(Message::TopicListRep { topics })) => return Ok(topics),
                Ok(Some(Message::Pub { topic, value })) => self.pending.push_back((topic, value)),
                Ok(Some(other)) => debug!("ignoring unexpected {other}"),
                Ok(None) => return Err(ClientError::Disconnected),
                Err(e) if e.is_recoverable() => warn!("Skipping malformed frame: {e}"),
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Cancels the subscription to the queue's topic and its subtopics.
    pub async fn cancel(&mut self) -> Result<(), ClientError> {
        let message = Message::cancel_sub(self.topic.clone());
        self.send(&message).await
    }

    /// Cancels every subscription held by this connection.
    pub async fn cancel_all(&mut self) -> Result<(), ClientError> {
        self.send(&Message::cancel_sub("")).await
    }

    /// Closes the write side; the broker treats this as a disconnect.
    pub async fn close(mut self) -> Result<(), ClientError> {
        self.writer.shutdown().await?;
        Ok(())
    }

    async fn send(&mut self, message: &Message) -> Result<(), ClientError> {
        let frame = codec::encode(self.format, message)?;
        self.writer.write_all(&frame).await?;
        Ok(())
    }
}
