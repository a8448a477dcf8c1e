//! Packet descriptor framing.
//!
//! Every packet on the native protocol starts with a 20-byte descriptor of
//! five big-endian u32 fields: body length, channel, offset (hi/lo) and
//! flags. The channel field doubles as the packet classifier: the sentinel
//! `NO_INDEX` marks a command/event tagstruct, any other value addresses a
//! stream's memory block.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{ProtoError, Result};
use crate::types::NO_INDEX;

/// Descriptor size: 5 big-endian u32 fields.
pub const DESCRIPTOR_SIZE: usize = 20;

/// Default maximum body size: 16 MiB.
pub const DEFAULT_MAX_BODY: usize = 16 * 1024 * 1024;

/// A parsed packet descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor {
    /// Byte count of the body that follows.
    pub length: u32,
    /// Stream index for memory blocks, or `NO_INDEX` for commands.
    pub channel: u32,
    /// Reserved; written as zero, ignored on read.
    pub offset_hi: u32,
    /// Reserved; written as zero, ignored on read.
    pub offset_lo: u32,
    /// Reserved; written as zero, ignored on read.
    pub flags: u32,
}

impl Descriptor {
    /// Descriptor for a command/event tagstruct body.
    pub fn command(body_len: u32) -> Self {
        Self {
            length: body_len,
            channel: NO_INDEX,
            offset_hi: 0,
            offset_lo: 0,
            flags: 0,
        }
    }

    /// Descriptor for a memory block destined for `channel`.
    pub fn memblock(channel: u32, body_len: u32) -> Self {
        Self {
            length: body_len,
            channel,
            offset_hi: 0,
            offset_lo: 0,
            flags: 0,
        }
    }

    /// Whether the body is a command/event tagstruct.
    pub fn is_command(&self) -> bool {
        self.channel == NO_INDEX
    }

    /// Append the 20-byte wire form to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(DESCRIPTOR_SIZE);
        dst.put_u32(self.length);
        dst.put_u32(self.channel);
        dst.put_u32(self.offset_hi);
        dst.put_u32(self.offset_lo);
        dst.put_u32(self.flags);
    }

    /// Parse a descriptor from exactly `DESCRIPTOR_SIZE` bytes.
    pub fn decode(mut src: &[u8]) -> Result<Self> {
        if src.len() < DESCRIPTOR_SIZE {
            return Err(ProtoError::ShortRead {
                needed: DESCRIPTOR_SIZE - src.len(),
                remaining: src.len(),
            });
        }
        Ok(Self {
            length: src.get_u32(),
            channel: src.get_u32(),
            offset_hi: src.get_u32(),
            offset_lo: src.get_u32(),
            flags: src.get_u32(),
        })
    }
}

/// A complete framed packet: routing channel plus body.
#[derive(Debug, Clone)]
pub struct Packet {
    /// Stream index, or `NO_INDEX` for a command/event.
    pub channel: u32,
    /// The packet body.
    pub body: Bytes,
}

impl Packet {
    /// Whether the body is a command/event tagstruct.
    pub fn is_command(&self) -> bool {
        self.channel == NO_INDEX
    }
}

/// Encode a packet into the wire format: descriptor then body.
pub fn encode_packet(channel: u32, body: &[u8], dst: &mut BytesMut) -> Result<()> {
    if body.len() > u32::MAX as usize {
        return Err(ProtoError::PacketTooLarge {
            size: body.len(),
            max: u32::MAX as usize,
        });
    }
    dst.reserve(DESCRIPTOR_SIZE + body.len());
    Descriptor::memblock(channel, body.len() as u32).encode(dst);
    dst.put_slice(body);
    Ok(())
}

/// Decode a packet from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete packet yet.
/// On success, consumes the packet bytes from the buffer.
pub fn decode_packet(src: &mut BytesMut, max_body: usize) -> Result<Option<Packet>> {
    if src.len() < DESCRIPTOR_SIZE {
        return Ok(None);
    }

    let descriptor = Descriptor::decode(&src[..DESCRIPTOR_SIZE])?;
    let body_len = descriptor.length as usize;

    if body_len > max_body {
        return Err(ProtoError::PacketTooLarge {
            size: body_len,
            max: max_body,
        });
    }

    let total = DESCRIPTOR_SIZE + body_len;
    if src.len() < total {
        return Ok(None);
    }

    src.advance(DESCRIPTOR_SIZE);
    let body = src.split_to(body_len).freeze();

    Ok(Some(Packet {
        channel: descriptor.channel,
        body,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_descriptor_wire_form() {
        let mut buf = BytesMut::new();
        Descriptor::command(9).encode(&mut buf);
        assert_eq!(
            buf.as_ref(),
            &[
                0x00, 0x00, 0x00, 0x09, 0xFF, 0xFF, 0xFF, 0xFF, 0x00, 0x00, 0x00, 0x00, 0x00,
                0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00
            ]
        );
    }

    #[test]
    fn encode_decode_roundtrip() {
        let mut buf = BytesMut::new();
        encode_packet(3, b"pcm bytes", &mut buf).unwrap();
        assert_eq!(buf.len(), DESCRIPTOR_SIZE + 9);

        let packet = decode_packet(&mut buf, DEFAULT_MAX_BODY).unwrap().unwrap();
        assert_eq!(packet.channel, 3);
        assert_eq!(packet.body.as_ref(), b"pcm bytes");
        assert!(!packet.is_command());
        assert!(buf.is_empty());
    }

    #[test]
    fn command_channel_classification() {
        let mut buf = BytesMut::new();
        encode_packet(NO_INDEX, b"\x4c\x00\x00\x00\x02", &mut buf).unwrap();
        let packet = decode_packet(&mut buf, DEFAULT_MAX_BODY).unwrap().unwrap();
        assert!(packet.is_command());
    }

    #[test]
    fn decode_incomplete_descriptor() {
        let mut buf = BytesMut::from(&[0u8; 10][..]);
        assert!(decode_packet(&mut buf, DEFAULT_MAX_BODY).unwrap().is_none());
        assert_eq!(buf.len(), 10);
    }

    #[test]
    fn decode_incomplete_body() {
        let mut buf = BytesMut::new();
        encode_packet(1, b"audio", &mut buf).unwrap();
        buf.truncate(DESCRIPTOR_SIZE + 2);
        assert!(decode_packet(&mut buf, DEFAULT_MAX_BODY).unwrap().is_none());
    }

    #[test]
    fn decode_body_too_large() {
        let mut buf = BytesMut::new();
        Descriptor::memblock(1, 32 * 1024 * 1024).encode(&mut buf);
        let result = decode_packet(&mut buf, DEFAULT_MAX_BODY);
        assert!(matches!(result, Err(ProtoError::PacketTooLarge { .. })));
    }

    #[test]
    fn multiple_packets() {
        let mut buf = BytesMut::new();
        encode_packet(1, b"first", &mut buf).unwrap();
        encode_packet(2, b"second", &mut buf).unwrap();

        let p1 = decode_packet(&mut buf, DEFAULT_MAX_BODY).unwrap().unwrap();
        let p2 = decode_packet(&mut buf, DEFAULT_MAX_BODY).unwrap().unwrap();
        assert_eq!((p1.channel, p1.body.as_ref()), (1, b"first".as_ref()));
        assert_eq!((p2.channel, p2.body.as_ref()), (2, b"second".as_ref()));
        assert!(buf.is_empty());
    }

    #[test]
    fn empty_body() {
        let mut buf = BytesMut::new();
        encode_packet(0, b"", &mut buf).unwrap();
        let packet = decode_packet(&mut buf, DEFAULT_MAX_BODY).unwrap().unwrap();
        assert_eq!(packet.channel, 0);
        assert!(packet.body.is_empty());
    }
}
