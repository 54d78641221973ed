//! Message model
//!
//! `Message` is the closed set of frames exchanged between clients and the
//! broker. Each variant maps onto a flat record whose `type` field names the
//! variant (see [`Record`]); the conversion lives here so that every codec
//! shares the same field names and the same leniency rules.

use std::fmt;

use crate::protocol::record::{Field, Record};
use crate::utils::error::CodecError;

/// Payload encoding selected by the first byte of every frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Format {
    #[default]
    Json = 0,
    Xml = 1,
    Binary = 2,
}

impl Format {
    pub const ALL: [Format; 3] = [Format::Json, Format::Xml, Format::Binary];

    /// Maps a wire code onto a format. Unknown codes fall back to JSON.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Format::Xml,
            2 => Format::Binary,
            _ => Format::Json,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

impl From<u8> for Format {
    fn from(code: u8) -> Self {
        Format::from_code(i64::from(code))
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Format::Json => "json",
            Format::Xml => "xml",
            Format::Binary => "binary",
        };
        f.write_str(name)
    }
}

const TYPE: &str = "type";
const TOPIC: &str = "topic";
const VALUE: &str = "value";
const TOPICS: &str = "lista";
const FORMAT: &str = "lan";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Subscribe to a topic and, through inheritance, to topics created under it later.
    Sub { topic: String },
    /// Publish a value; also used by the broker to deliver values.
    Pub { topic: String, value: String },
    TopicListReq,
    TopicListRep { topics: Vec<String> },
    /// Cancel a subscription. An empty topic cancels every subscription.
    CancelSub { topic: String },
    /// Announces the format the client wants its replies in.
    Ack { format: Format },
}

impl Message {
    pub fn sub(topic: impl Into<String>) -> Self {
        Message::Sub {
            topic: topic.into(),
        }
    }

    pub fn publish(topic: impl Into<String>, value: impl Into<String>) -> Self {
        Message::Pub {
            topic: topic.into(),
            value: value.into(),
        }
    }

    pub fn cancel_sub(topic: impl Into<String>) -> Self {
        Message::CancelSub {
            topic: topic.into(),
        }
    }

    /// The `type` discriminator written on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Sub { .. } => "Sub",
            Message::Pub { .. } => "Pub",
            Message::TopicListReq => "TopicListReq",
            Message::TopicListRep { .. } => "TopicListRep",
            Message::CancelSub { .. } => "CancelSub",
            Message::Ack { .. } => "Ack",
        }
    }

    pub fn to_record(&self) -> Record {
        let mut record = Record::default();
        record.insert(TYPE, Field::Text(self.kind().to_string()));
        match self {
            Message::Sub { topic } | Message::CancelSub { topic } => {
                record.insert(TOPIC, Field::Text(topic.clone()));
            }
            Message::Pub { topic, value } => {
                record.insert(TOPIC, Field::Text(topic.clone()));
                record.insert(VALUE, Field::Text(value.clone()));
            }
            Message::TopicListReq => {}
            Message::TopicListRep { topics } => {
                record.insert(TOPICS, Field::List(topics.clone()));
            }
            Message::Ack { format } => {
                record.insert(FORMAT, Field::Int(i64::from(format.code())));
            }
        }
        record
    }

    pub fn from_record(mut record: Record) -> Result<Self, CodecError> {
        let kind = take_text(&mut record, TYPE)?;
        let message = match kind.as_str() {
            "Sub" => Message::Sub {
                topic: take_text(&mut record, TOPIC)?,
            },
            "Pub" => Message::Pub {
                topic: take_text(&mut record, TOPIC)?,
                value: take_text(&mut record, VALUE)?,
            },
            "TopicListReq" => Message::TopicListReq,
            "TopicListRep" => Message::TopicListRep {
                topics: take_list(&mut record, TOPICS)?,
            },
            "CancelSub" => Message::CancelSub {
                topic: take_text(&mut record, TOPIC)?,
            },
            "Ack" => Message::Ack {
                format: take_format(&mut record, FORMAT)?,
            },
            _ => return Err(CodecError::UnknownType(kind)),
        };
        Ok(message)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Sub { topic } | Message::CancelSub { topic } => {
                write!(f, "{}({topic:?})", self.kind())
            }
            Message::Pub { topic, value } => write!(f, "Pub({topic:?}, {value:?})"),
            Message::TopicListReq => f.write_str("TopicListReq"),
            Message::TopicListRep { topics } => write!(f, "TopicListRep({topics:?})"),
            Message::Ack { format } => write!(f, "Ack({format})"),
        }
    }
}

/// Text fields accept numbers too: a JSON client may publish `"value": 5`.
fn take_text(record: &mut Record, key: &'static str) -> Result<String, CodecError> {
    match record.take(key) {
        Some(Field::Text(text)) => Ok(text),
        Some(Field::Int(n)) => Ok(n.to_string()),
        Some(Field::Float(x)) => Ok(x.to_string()),
        Some(Field::List(_)) => Err(CodecError::WrongFieldKind(key)),
        None => Err(CodecError::MissingField(key)),
    }
}

/// XML carries no element for an empty list, so a missing list is empty.
fn take_list(record: &mut Record, key: &'static str) -> Result<Vec<String>, CodecError> {
    match record.take(key) {
        Some(Field::List(items)) => Ok(items),
        Some(Field::Text(item)) => Ok(vec![item]),
        Some(Field::Int(_) | Field::Float(_)) => Err(CodecError::WrongFieldKind(key)),
        None => Ok(Vec::new()),
    }
}

/// Format codes arrive as integers (JSON, binary) or numeric text (XML).
fn take_format(record: &mut Record, key: &'static str) -> Result<Format, CodecError> {
    match record.take(key) {
        Some(Field::Int(code)) => Ok(Format::from_code(code)),
        Some(Field::Float(code)) if code.fract() == 0.0 => Ok(Format::from_code(code as i64)),
        Some(Field::Float(_)) => Ok(Format::default()),
        Some(Field::Text(text)) => Ok(text
            .trim()
            .parse::<i64>()
            .map(Format::from_code)
            .unwrap_or_default()),
        Some(Field::List(_)) => Err(CodecError::WrongFieldKind(key)),
        None => Err(CodecError::MissingField(key)),
    }
}
