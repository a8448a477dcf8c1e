//! Packet-level I/O over a byte stream.
//!
//! Handles partial reads internally; callers always get complete packets.
//! A clean close between packets and a close mid-packet are distinct
//! failures: the latter means the stream died inside a frame.

use std::io::{ErrorKind, Read, Write};

use bytes::BytesMut;
use pulsewire_proto::{decode_packet, encode_packet, Packet, DEFAULT_MAX_BODY, NO_INDEX};

use crate::error::{ClientError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete packets from any `Read` stream.
pub struct PacketReader<T> {
    inner: T,
    buf: BytesMut,
    max_body: usize,
}

impl<T: Read> PacketReader<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            max_body: DEFAULT_MAX_BODY,
        }
    }

    /// Read the next complete packet (blocking).
    pub fn read_packet(&mut self) -> Result<Packet> {
        loop {
            if let Some(packet) = decode_packet(&mut self.buf, self.max_body)? {
                return Ok(packet);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(ClientError::Io(err)),
            };

            if read == 0 {
                // EOF inside a frame is a framing error; between frames it
                // is an ordinary close.
                return if self.buf.is_empty() {
                    Err(ClientError::Closed)
                } else {
                    Err(ClientError::TruncatedPacket)
                };
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

/// Writes complete packets to any `Write` stream, preserving order.
pub struct PacketWriter<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: Write> PacketWriter<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Send a command/event tagstruct body.
    pub fn write_command(&mut self, body: &[u8]) -> Result<()> {
        self.write_raw(NO_INDEX, body)
    }

    /// Send a memory block to a stream channel.
    pub fn write_memblock(&mut self, channel: u32, body: &[u8]) -> Result<()> {
        self.write_raw(channel, body)
    }

    fn write_raw(&mut self, channel: u32, body: &[u8]) -> Result<()> {
        self.buf.clear();
        encode_packet(channel, body, &mut self.buf)?;

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(ClientError::Closed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(ClientError::Io(err)),
            }
        }

        self.flush()
    }

    fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(ClientError::Io(err)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use pulsewire_proto::{Descriptor, DESCRIPTOR_SIZE};

    #[test]
    fn roundtrip_over_pipe() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut writer = PacketWriter::new(left);
        let mut reader = PacketReader::new(right);

        writer.write_memblock(7, b"pcm").unwrap();
        let packet = reader.read_packet().unwrap();

        assert_eq!(packet.channel, 7);
        assert_eq!(packet.body.as_ref(), b"pcm");
    }

    #[test]
    fn command_and_memblock_interleaved() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut writer = PacketWriter::new(left);
        let mut reader = PacketReader::new(right);

        writer.write_command(b"\x4c\x00\x00\x00\x02").unwrap();
        writer.write_memblock(3, b"audio").unwrap();

        let first = reader.read_packet().unwrap();
        assert!(first.is_command());
        let second = reader.read_packet().unwrap();
        assert_eq!(second.channel, 3);
        assert_eq!(second.body.as_ref(), b"audio");
    }

    #[test]
    fn clean_close_between_packets() {
        let mut reader = PacketReader::new(Cursor::new(Vec::<u8>::new()));
        let err = reader.read_packet().unwrap_err();
        assert!(matches!(err, ClientError::Closed));
    }

    #[test]
    fn close_mid_packet_is_framing_error() {
        let mut wire = BytesMut::new();
        Descriptor::memblock(2, 16).encode(&mut wire);
        wire.extend_from_slice(b"only-part");

        let mut reader = PacketReader::new(Cursor::new(wire.to_vec()));
        let err = reader.read_packet().unwrap_err();
        assert!(matches!(err, ClientError::TruncatedPacket));
    }

    #[test]
    fn partial_reads_reassemble() {
        struct ByteByByte {
            bytes: Vec<u8>,
            pos: usize,
        }
        impl Read for ByteByByte {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                if self.pos >= self.bytes.len() || buf.is_empty() {
                    return Ok(0);
                }
                buf[0] = self.bytes[self.pos];
                self.pos += 1;
                Ok(1)
            }
        }

        let mut wire = BytesMut::new();
        encode_packet(5, b"slow", &mut wire).unwrap();
        let mut reader = PacketReader::new(ByteByByte {
            bytes: wire.to_vec(),
            pos: 0,
        });

        let packet = reader.read_packet().unwrap();
        assert_eq!(packet.channel, 5);
        assert_eq!(packet.body.as_ref(), b"slow");
    }

    #[test]
    fn writer_emits_descriptor_then_body() {
        let mut writer = PacketWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.write_memblock(1, b"abcd").unwrap();

        let wire = writer.inner.into_inner();
        assert_eq!(wire.len(), DESCRIPTOR_SIZE + 4);
        let descriptor = Descriptor::decode(&wire[..DESCRIPTOR_SIZE]).unwrap();
        assert_eq!(descriptor.length, 4);
        assert_eq!(descriptor.channel, 1);
        assert_eq!(&wire[DESCRIPTOR_SIZE..], b"abcd");
    }
}
