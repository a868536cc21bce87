use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::message::{Code, Message, MessageType, MAX_TOKEN_LENGTH};
use crate::core::Error;

/// CoAP protocol version
const VERSION: u8 = 1;

/// Option number of Uri-Path
const OPTION_URI_PATH: u16 = 11;

/// Separates options from the payload
const PAYLOAD_MARKER: u8 = 0xff;

/// Datagram codec for CoAP-framed TMF messages
///
/// Each call to `decode` consumes the whole buffer as one datagram, which is
/// what `UdpFramed` hands over.
#[derive(Clone, Debug, Default)]
pub struct MessageCodec;

impl MessageCodec {
    /// Creates a new message codec
    pub fn new() -> Self {
        MessageCodec
    }
}

/// Splits an option delta or length into its nibble and extended bytes
fn put_option_nibble_ext(value: u16) -> (u8, Option<u8>, Option<u16>) {
    if value < 13 {
        (value as u8, None, None)
    } else if value < 269 {
        (13, Some((value - 13) as u8), None)
    } else {
        (14, None, Some(value - 269))
    }
}

fn put_option(dst: &mut BytesMut, delta: u16, value: &[u8]) {
    let (delta_nibble, delta_ext8, delta_ext16) = put_option_nibble_ext(delta);
    let (len_nibble, len_ext8, len_ext16) = put_option_nibble_ext(value.len() as u16);

    dst.put_u8((delta_nibble << 4) | len_nibble);
    if let Some(b) = delta_ext8 {
        dst.put_u8(b);
    }
    if let Some(v) = delta_ext16 {
        dst.put_u16(v);
    }
    if let Some(b) = len_ext8 {
        dst.put_u8(b);
    }
    if let Some(v) = len_ext16 {
        dst.put_u16(v);
    }
    dst.put_slice(value);
}

fn read_option_ext(nibble: u8, src: &mut Bytes) -> Result<u16, Error> {
    match nibble {
        0..=12 => Ok(u16::from(nibble)),
        13 => {
            if src.remaining() < 1 {
                return Err(Error::parse("truncated option extension"));
            }
            Ok(u16::from(src.get_u8()) + 13)
        }
        14 => {
            if src.remaining() < 2 {
                return Err(Error::parse("truncated option extension"));
            }
            src.get_u16()
                .checked_add(269)
                .ok_or_else(|| Error::parse("option extension overflow"))
        }
        _ => Err(Error::parse("reserved option nibble")),
    }
}

/// Parses one CoAP datagram
fn parse_datagram(mut src: Bytes) -> Result<Message, Error> {
    if src.remaining() < 4 {
        return Err(Error::parse("datagram shorter than CoAP header"));
    }

    let first = src.get_u8();
    if first >> 6 != VERSION {
        return Err(Error::parse(format!("unsupported CoAP version {}", first >> 6)));
    }
    let kind = MessageType::from_bits(first >> 4);
    let token_length = usize::from(first & 0x0f);
    if token_length > MAX_TOKEN_LENGTH {
        return Err(Error::parse(format!("token length {} too long", token_length)));
    }

    let code = Code(src.get_u8());
    let message_id = src.get_u16();

    if src.remaining() < token_length {
        return Err(Error::parse("truncated token"));
    }
    let token = src.split_to(token_length);

    let mut option_number: u16 = 0;
    let mut segments: Vec<String> = Vec::new();
    let mut payload = Bytes::new();

    while src.has_remaining() {
        let header = src.get_u8();
        if header == PAYLOAD_MARKER {
            if !src.has_remaining() {
                return Err(Error::parse("payload marker without payload"));
            }
            payload = src.split_to(src.remaining());
            break;
        }

        let delta = read_option_ext(header >> 4, &mut src)?;
        let length = usize::from(read_option_ext(header & 0x0f, &mut src)?);
        option_number = option_number
            .checked_add(delta)
            .ok_or_else(|| Error::parse("option number overflow"))?;

        if src.remaining() < length {
            return Err(Error::parse("truncated option value"));
        }
        let value = src.split_to(length);

        if option_number == OPTION_URI_PATH {
            let segment = std::str::from_utf8(&value)
                .map_err(|e| Error::parse(format!("Uri-Path is not UTF-8: {}", e)))?;
            segments.push(segment.to_string());
        }
    }

    let uri_path = if segments.is_empty() {
        None
    } else {
        Some(segments.join("/"))
    };

    Ok(Message {
        kind,
        code,
        message_id,
        token,
        uri_path,
        payload,
    })
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        // Datagram framing: the whole buffer is one message
        let datagram = src.split_to(src.len()).freeze();
        parse_datagram(datagram).map(Some)
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = Error;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.token.len() > MAX_TOKEN_LENGTH {
            return Err(Error::parse(format!("token length {} too long", item.token.len())));
        }

        dst.put_u8((VERSION << 6) | ((item.kind as u8) << 4) | item.token.len() as u8);
        dst.put_u8(item.code.0);
        dst.put_u16(item.message_id);
        dst.put_slice(&item.token);

        if let Some(path) = &item.uri_path {
            let mut previous = 0u16;
            for segment in path.split('/').filter(|s| !s.is_empty()) {
                if segment.len() > usize::from(u16::MAX - 269) {
                    return Err(Error::parse("Uri-Path segment too long"));
                }
                put_option(dst, OPTION_URI_PATH - previous, segment.as_bytes());
                previous = OPTION_URI_PATH;
            }
        }

        if !item.payload.is_empty() {
            dst.put_u8(PAYLOAD_MARKER);
            dst.put_slice(&item.payload);
        }

        Ok(())
    }
}
