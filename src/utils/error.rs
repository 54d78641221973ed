//! The `error` module defines the error types used within `cerealbus`.
//!
//! Errors are split by layer: [`CodecError`] describes why a single payload
//! could not be (de)serialized, [`ProtocolError`] is what the frame layer and
//! the readers surface, and [`ClientError`] is returned by the client
//! middleware.

use std::io;

use thiserror::Error;

/// Why a payload could not be turned into (or built from) a message record.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("invalid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("XML document has no root element")]
    MissingRoot,

    #[error("malformed XML: {0}")]
    MalformedXml(&'static str),

    #[error("binary record truncated while reading {0}")]
    Truncated(&'static str),

    #[error("{0} trailing bytes after binary record")]
    TrailingBytes(usize),

    #[error("unknown binary field kind {0}")]
    UnknownFieldKind(u8),

    #[error("value of field `{0}` does not fit its length prefix")]
    FieldTooLong(String),

    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("field `{0}` has the wrong kind")]
    WrongFieldKind(&'static str),

    #[error("unknown message type `{0}`")]
    UnknownType(String),
}

/// Errors raised while framing, reading or decoding messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The payload did not parse in its declared format, or parsed but did
    /// not describe a known message. The raw payload is kept for logging.
    #[error("bad format ({source}): {}", String::from_utf8_lossy(.payload))]
    BadFormat {
        payload: Vec<u8>,
        #[source]
        source: CodecError,
    },

    #[error("could not encode message: {0}")]
    Encode(#[source] CodecError),

    #[error("payload of {0} bytes does not fit the 2-byte length prefix")]
    PayloadTooLarge(usize),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ProtocolError {
    pub fn bad_format(payload: &[u8], source: CodecError) -> Self {
        ProtocolError::BadFormat {
            payload: payload.to_vec(),
            source,
        }
    }

    /// `true` when the error only concerns one frame and the stream can keep
    /// being read.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ProtocolError::BadFormat { .. })
    }
}

/// Errors returned by the client middleware.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("broker closed the connection")]
    Disconnected,

    #[error("only producer queues can publish")]
    NotAProducer,
}
