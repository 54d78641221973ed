use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::protocol::codec;
use crate::protocol::frame::Frame;
use crate::protocol::message::Message;
use crate::utils::error::ProtocolError;

/// Reads frames off any byte stream, buffering partial input between reads.
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
    buf: BytesMut,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(4096),
        }
    }

    /// Next complete frame, or `None` once the stream is finished.
    ///
    /// A zero-length frame, or end of stream in the middle of a frame, both
    /// count as the peer going away.
    pub async fn next_frame(&mut self) -> Result<Option<Frame>, ProtocolError> {
        loop {
            if let Some(frame) = Frame::decode(&mut self.buf) {
                if frame.is_hangup() {
                    return Ok(None);
                }
                return Ok(Some(frame));
            }

            self.buf.reserve(1024);
            if self.inner.read_buf(&mut self.buf).await? == 0 {
                return Ok(None);
            }
        }
    }

    /// Next decoded message.
    ///
    /// A frame whose payload does not decode is consumed and reported as
    /// [`ProtocolError::BadFormat`]; the reader stays usable afterwards.
    pub async fn read_message(&mut self) -> Result<Option<Message>, ProtocolError> {
        match self.next_frame().await? {
            Some(frame) => codec::decode(&frame).map(Some),
            None => Ok(None),
        }
    }
}
