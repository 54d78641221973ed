//! The `protocol` module implements the wire protocol shared by the broker
//! and its clients.
//!
//! Every frame is `[format: u8][len: u16 BE][payload]`. The payload is a flat
//! record (`type` plus the variant's fields) encoded as JSON, XML or a binary
//! record depending on the format byte, which is read on every frame.

pub mod codec;
pub mod frame;
pub mod message;
pub mod record;
pub mod stream;

pub use codec::{Codec, codec_for, decode, encode};
pub use frame::Frame;
pub use message::{Format, Message};
pub use record::{Field, Record};
pub use stream::FrameReader;
