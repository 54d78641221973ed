/*
[ format      : u8  ]
[ payload_len : u16 ]   big-endian
[ payload bytes...  ]
*/

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::protocol::message::Format;
use crate::utils::error::ProtocolError;

pub const HEADER_LEN: usize = 3;
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub format: Format,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(format: Format, payload: impl Into<Bytes>) -> Self {
        Self {
            format,
            payload: payload.into(),
        }
    }

    /// A zero-length frame is how a peer says it has nothing more to send.
    pub fn is_hangup(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn encode(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        if self.payload.len() > MAX_PAYLOAD_LEN {
            return Err(ProtocolError::PayloadTooLarge(self.payload.len()));
        }
        buf.reserve(HEADER_LEN + self.payload.len());
        buf.put_u8(self.format.code());
        buf.put_u16(self.payload.len() as u16);
        buf.extend_from_slice(&self.payload);
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Bytes, ProtocolError> {
        let mut buf = BytesMut::with_capacity(HEADER_LEN + self.payload.len());
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Splits one complete frame off the front of `buf`.
    ///
    /// Returns `None` and leaves `buf` untouched until the header and the
    /// whole payload are buffered.
    pub fn decode(buf: &mut BytesMut) -> Option<Frame> {
        if buf.len() < HEADER_LEN {
            return None;
        }

        let mut cursor = &buf[..];
        let format = Format::from(cursor.get_u8());
        let payload_len = cursor.get_u16() as usize;

        if cursor.remaining() < payload_len {
            return None;
        }

        buf.advance(HEADER_LEN);
        let payload = buf.split_to(payload_len).freeze();
        Some(Frame { format, payload })
    }
}
