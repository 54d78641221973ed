//! Payload codecs.
//!
//! Every format turns a [`Record`] into bytes and back. Nothing outside this
//! module branches on [`Format`]; callers pick a codec with [`codec_for`] or
//! use the [`encode`] / [`decode`] helpers which also handle framing.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::protocol::frame::Frame;
use crate::protocol::message::{Format, Message};
use crate::protocol::record::{Field, Record};
use crate::utils::error::{CodecError, ProtocolError};

pub trait Codec: Send + Sync {
    fn format(&self) -> Format;
    fn encode(&self, record: &Record) -> Result<Vec<u8>, CodecError>;
    fn decode(&self, payload: &[u8]) -> Result<Record, CodecError>;
}

pub fn codec_for(format: Format) -> &'static dyn Codec {
    match format {
        Format::Json => &JsonCodec,
        Format::Xml => &XmlCodec,
        Format::Binary => &BinaryCodec,
    }
}

/// Encodes `message` as a complete frame (header included) in `format`.
pub fn encode(format: Format, message: &Message) -> Result<Bytes, ProtocolError> {
    let payload = codec_for(format)
        .encode(&message.to_record())
        .map_err(ProtocolError::Encode)?;
    Frame::new(format, payload).to_bytes()
}

/// Decodes the payload of `frame` using the format the frame declares.
pub fn decode(frame: &Frame) -> Result<Message, ProtocolError> {
    codec_for(frame.format)
        .decode(&frame.payload)
        .and_then(Message::from_record)
        .map_err(|source| ProtocolError::bad_format(&frame.payload, source))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn format(&self) -> Format {
        Format::Json
    }

    fn encode(&self, record: &Record) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(record)?)
    }

    fn decode(&self, payload: &[u8]) -> Result<Record, CodecError> {
        Ok(serde_json::from_slice(payload)?)
    }
}

/// `<?xml version="1.0"?><data type="Pub" topic="t" value="v"></data>`
///
/// Scalars are attributes of the root element; each list item is a child
/// element named after the list field.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlCodec;

const XML_DECL: &str = r#"<?xml version="1.0"?>"#;
const XML_ROOT: &str = "data";

impl Codec for XmlCodec {
    fn format(&self) -> Format {
        Format::Xml
    }

    fn encode(&self, record: &Record) -> Result<Vec<u8>, CodecError> {
        let mut attrs = String::new();
        let mut children = String::new();
        for (key, field) in record.iter() {
            match field {
                Field::Text(text) => attrs.push_str(&format!(r#" {key}="{}""#, escape(text))),
                Field::Int(n) => attrs.push_str(&format!(r#" {key}="{n}""#)),
                Field::Float(x) => attrs.push_str(&format!(r#" {key}="{x}""#)),
                Field::List(items) => {
                    for item in items {
                        children.push_str(&format!("<{key}>{}</{key}>", escape(item)));
                    }
                }
            }
        }
        Ok(format!("{XML_DECL}<{XML_ROOT}{attrs}>{children}</{XML_ROOT}>").into_bytes())
    }

    fn decode(&self, payload: &[u8]) -> Result<Record, CodecError> {
        let text = std::str::from_utf8(payload)?;
        let mut reader = Reader::from_str(text);
        let mut record = Record::default();
        let mut depth = 0usize;
        let mut root_seen = false;
        // list item currently open: (field name, text so far)
        let mut item: Option<(String, String)> = None;

        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    if depth == 0 {
                        if root_seen {
                            return Err(CodecError::MalformedXml("more than one root element"));
                        }
                        read_attributes(&e, &mut record)?;
                        root_seen = true;
                    } else if depth == 1 {
                        item = Some((element_name(&e)?, String::new()));
                    }
                    depth += 1;
                }
                Event::Empty(e) => {
                    if depth == 0 {
                        if root_seen {
                            return Err(CodecError::MalformedXml("more than one root element"));
                        }
                        read_attributes(&e, &mut record)?;
                        root_seen = true;
                    } else if depth == 1 {
                        record.push_item(&element_name(&e)?, String::new());
                    }
                }
                Event::Text(t) => {
                    let text = t.unescape()?;
                    if depth == 0 && !text.trim().is_empty() {
                        return Err(CodecError::MalformedXml("text outside the root element"));
                    }
                    if let Some((_, item_text)) = item.as_mut() {
                        item_text.push_str(&text);
                    }
                }
                Event::End(_) => {
                    if depth == 0 {
                        return Err(CodecError::MalformedXml("closing tag without an opening tag"));
                    }
                    if depth == 2 {
                        if let Some((name, text)) = item.take() {
                            record.push_item(&name, text);
                        }
                    }
                    depth -= 1;
                }
                Event::Eof => {
                    if depth != 0 {
                        return Err(CodecError::MalformedXml("unclosed element"));
                    }
                    break;
                }
                _ => {}
            }
        }

        if !root_seen {
            return Err(CodecError::MissingRoot);
        }
        Ok(record)
    }
}

fn element_name(e: &BytesStart<'_>) -> Result<String, CodecError> {
    Ok(std::str::from_utf8(e.name().as_ref())?.to_string())
}

fn read_attributes(e: &BytesStart<'_>, record: &mut Record) -> Result<(), CodecError> {
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = std::str::from_utf8(attr.key.as_ref())?.to_string();
        let value = attr.unescape_value()?.into_owned();
        record.insert(key, Field::Text(value));
    }
    Ok(())
}

/*
[ field_count : u16 ]
per field:
[ key_len : u16 ][ key bytes ]
[ kind : u8 ]
  0 text : [ len : u16 ][ utf8 bytes ]
  1 int  : [ i64 ]
  2 list : [ count : u16 ] then `count` texts
  3 float: [ f64 ]
all integers big-endian
*/
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryCodec;

const KIND_TEXT: u8 = 0;
const KIND_INT: u8 = 1;
const KIND_LIST: u8 = 2;
const KIND_FLOAT: u8 = 3;

impl Codec for BinaryCodec {
    fn format(&self) -> Format {
        Format::Binary
    }

    fn encode(&self, record: &Record) -> Result<Vec<u8>, CodecError> {
        let mut buf = BytesMut::new();
        buf.put_u16(prefix_len(record.iter().len(), "record")?);
        for (key, field) in record.iter() {
            put_text(&mut buf, key, key)?;
            match field {
                Field::Text(text) => {
                    buf.put_u8(KIND_TEXT);
                    put_text(&mut buf, text, key)?;
                }
                Field::Int(n) => {
                    buf.put_u8(KIND_INT);
                    buf.put_i64(*n);
                }
                Field::Float(x) => {
                    buf.put_u8(KIND_FLOAT);
                    buf.put_f64(*x);
                }
                Field::List(items) => {
                    buf.put_u8(KIND_LIST);
                    buf.put_u16(prefix_len(items.len(), key)?);
                    for item in items {
                        put_text(&mut buf, item, key)?;
                    }
                }
            }
        }
        Ok(buf.to_vec())
    }

    fn decode(&self, payload: &[u8]) -> Result<Record, CodecError> {
        let mut buf = payload;
        let count = get_u16(&mut buf, "field count")?;
        let mut record = Record::default();

        for _ in 0..count {
            let key = get_text(&mut buf, "field key")?;
            if !buf.has_remaining() {
                return Err(CodecError::Truncated("field kind"));
            }
            let field = match buf.get_u8() {
                KIND_TEXT => Field::Text(get_text(&mut buf, "text value")?),
                KIND_INT => {
                    if buf.remaining() < 8 {
                        return Err(CodecError::Truncated("integer value"));
                    }
                    Field::Int(buf.get_i64())
                }
                KIND_FLOAT => {
                    if buf.remaining() < 8 {
                        return Err(CodecError::Truncated("float value"));
                    }
                    Field::Float(buf.get_f64())
                }
                KIND_LIST => {
                    let len = get_u16(&mut buf, "list length")?;
                    let mut items = Vec::with_capacity(len as usize);
                    for _ in 0..len {
                        items.push(get_text(&mut buf, "list item")?);
                    }
                    Field::List(items)
                }
                other => return Err(CodecError::UnknownFieldKind(other)),
            };
            record.insert(key, field);
        }

        if buf.has_remaining() {
            return Err(CodecError::TrailingBytes(buf.remaining()));
        }
        Ok(record)
    }
}

fn prefix_len(len: usize, what: &str) -> Result<u16, CodecError> {
    u16::try_from(len).map_err(|_| CodecError::FieldTooLong(what.to_string()))
}

fn put_text(buf: &mut BytesMut, text: &str, what: &str) -> Result<(), CodecError> {
    buf.put_u16(prefix_len(text.len(), what)?);
    buf.extend_from_slice(text.as_bytes());
    Ok(())
}

fn get_u16(buf: &mut &[u8], what: &'static str) -> Result<u16, CodecError> {
    if buf.remaining() < 2 {
        return Err(CodecError::Truncated(what));
    }
    Ok(buf.get_u16())
}

fn get_text(buf: &mut &[u8], what: &'static str) -> Result<String, CodecError> {
    let len = get_u16(buf, what)? as usize;
    if buf.remaining() < len {
        return Err(CodecError::Truncated(what));
    }
    let (head, rest) = buf.split_at(len);
    let text = std::str::from_utf8(head)?.to_string();
    *buf = rest;
    Ok(text)
}
