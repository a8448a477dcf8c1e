//! Tagstruct encoding and decoding.
//!
//! A tagstruct body is a concatenation of self-describing values, each a
//! one-byte [`Tag`] followed by a type-specific payload. Reading is
//! positional: consumers read values in the exact order the producer wrote
//! them, and every read checks the tag byte and the remaining length before
//! touching the payload.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{ProtoError, Result};
use crate::proplist::Props;
use crate::tag::Tag;
use crate::types::{
    ChannelMap, ChannelVolume, FormatInfo, SampleFormat, SampleSpec, Volume, MAX_CHANNELS,
    NO_INDEX,
};

/// Writers grow the buffer in multiples of this.
const GROWTH_CHUNK: usize = 64;

/// Serializes tagged values into a growable buffer.
#[derive(Debug, Default)]
pub struct TagWriter {
    buf: BytesMut,
}

impl TagWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finish and take the encoded body.
    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    fn grow(&mut self, extra: usize) {
        let free = self.buf.capacity() - self.buf.len();
        if extra > free {
            let chunks = (extra - free).div_ceil(GROWTH_CHUNK);
            self.buf.reserve(chunks * GROWTH_CHUNK);
        }
    }

    pub fn put_u8(&mut self, value: u8) {
        self.grow(2);
        self.buf.put_u8(Tag::U8.byte());
        self.buf.put_u8(value);
    }

    pub fn put_u32(&mut self, value: u32) {
        self.grow(5);
        self.buf.put_u8(Tag::U32.byte());
        self.buf.put_u32(value);
    }

    pub fn put_u64(&mut self, value: u64) {
        self.grow(9);
        self.buf.put_u8(Tag::U64.byte());
        self.buf.put_u64(value);
    }

    pub fn put_s64(&mut self, value: i64) {
        self.grow(9);
        self.buf.put_u8(Tag::S64.byte());
        self.buf.put_i64(value);
    }

    /// A microsecond count.
    pub fn put_usec(&mut self, micros: u64) {
        self.grow(9);
        self.buf.put_u8(Tag::Usec.byte());
        self.buf.put_u64(micros);
    }

    /// A string, or the null string for `None`.
    pub fn put_string(&mut self, value: Option<&str>) {
        match value {
            Some(s) => {
                self.grow(s.len() + 2);
                self.buf.put_u8(Tag::String.byte());
                self.buf.put_slice(s.as_bytes());
                self.buf.put_u8(0);
            }
            None => {
                self.grow(1);
                self.buf.put_u8(Tag::StringNull.byte());
            }
        }
    }

    /// An optional u32 where `None` is the `NO_INDEX` sentinel.
    pub fn put_index(&mut self, index: Option<u32>) {
        self.put_u32(index.unwrap_or(NO_INDEX));
    }

    pub fn put_arbitrary(&mut self, bytes: &[u8]) {
        self.grow(bytes.len() + 5);
        self.buf.put_u8(Tag::Arbitrary.byte());
        self.buf.put_u32(bytes.len() as u32);
        self.buf.put_slice(bytes);
    }

    pub fn put_bool(&mut self, value: bool) {
        self.grow(1);
        self.buf.put_u8(if value {
            Tag::BooleanTrue.byte()
        } else {
            Tag::BooleanFalse.byte()
        });
    }

    pub fn put_sample_spec(&mut self, spec: &SampleSpec) -> Result<()> {
        if (spec.channels as usize) >= MAX_CHANNELS {
            return Err(ProtoError::InvalidChannels {
                channels: spec.channels as usize,
                limit: MAX_CHANNELS,
            });
        }
        self.grow(7);
        self.buf.put_u8(Tag::SampleSpec.byte());
        self.buf.put_u8(spec.format.code());
        self.buf.put_u8(spec.channels);
        self.buf.put_u32(spec.rate);
        Ok(())
    }

    pub fn put_channel_map(&mut self, map: &ChannelMap) {
        self.grow(map.positions().len() + 2);
        self.buf.put_u8(Tag::ChannelMap.byte());
        self.buf.put_u8(map.num_channels());
        self.buf.put_slice(map.positions());
    }

    pub fn put_cvolume(&mut self, volumes: &ChannelVolume) {
        self.grow(volumes.volumes().len() * 4 + 2);
        self.buf.put_u8(Tag::Cvolume.byte());
        self.buf.put_u8(volumes.num_channels());
        for volume in volumes.volumes() {
            self.buf.put_u32(volume.0);
        }
    }

    pub fn put_volume(&mut self, volume: Volume) {
        self.grow(5);
        self.buf.put_u8(Tag::Volume.byte());
        self.buf.put_u32(volume.0);
    }

    /// A property list: flattened entries, each `key`, `length`, `value`
    /// (value bytes include a trailing NUL), terminated by a null string.
    pub fn put_props(&mut self, props: &Props) {
        self.grow(1);
        self.buf.put_u8(Tag::Proplist.byte());
        for (key, value) in props.deflate() {
            self.put_string(Some(&key));
            self.put_u32(value.len() as u32 + 1);
            let mut bytes = Vec::with_capacity(value.len() + 1);
            bytes.extend_from_slice(value.as_bytes());
            bytes.push(0);
            self.put_arbitrary(&bytes);
        }
        self.put_string(None);
    }

    pub fn put_format_info(&mut self, format: &FormatInfo) {
        self.grow(1);
        self.buf.put_u8(Tag::FormatInfo.byte());
        self.put_u8(format.encoding);
        self.put_props(&format.props);
    }
}

/// Reads tagged values back out of a body, in order, with bounds checks.
#[derive(Debug)]
pub struct TagReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> TagReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// True once every byte has been consumed.
    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(ProtoError::ShortRead {
                needed: n - self.remaining(),
                remaining: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_u32(&mut self) -> Result<u32> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.take(4)?);
        Ok(u32::from_be_bytes(raw))
    }

    fn take_u64(&mut self) -> Result<u64> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.take(8)?);
        Ok(u64::from_be_bytes(raw))
    }

    fn expect_tag(&mut self, expected: Tag) -> Result<()> {
        let found = self.take(1)?[0];
        if found == Tag::Timeval.byte() && expected != Tag::Timeval {
            return Err(ProtoError::UnsupportedTag { tag: found });
        }
        if found != expected.byte() {
            return Err(ProtoError::UnexpectedTag {
                expected: expected.byte(),
                found,
            });
        }
        Ok(())
    }

    pub fn get_u8(&mut self) -> Result<u8> {
        self.expect_tag(Tag::U8)?;
        Ok(self.take(1)?[0])
    }

    pub fn get_u32(&mut self) -> Result<u32> {
        self.expect_tag(Tag::U32)?;
        self.take_u32()
    }

    pub fn get_u64(&mut self) -> Result<u64> {
        self.expect_tag(Tag::U64)?;
        self.take_u64()
    }

    pub fn get_s64(&mut self) -> Result<i64> {
        self.expect_tag(Tag::S64)?;
        Ok(self.take_u64()? as i64)
    }

    pub fn get_usec(&mut self) -> Result<u64> {
        self.expect_tag(Tag::Usec)?;
        self.take_u64()
    }

    /// A string or the null string.
    pub fn get_string(&mut self) -> Result<Option<String>> {
        let found = self.take(1)?[0];
        match found {
            b if b == Tag::StringNull.byte() => Ok(None),
            b if b == Tag::String.byte() => {
                let rest = &self.buf[self.pos..];
                let nul = rest
                    .iter()
                    .position(|&b| b == 0)
                    .ok_or(ProtoError::UnterminatedString)?;
                let value = std::str::from_utf8(&rest[..nul])?.to_string();
                self.pos += nul + 1;
                Ok(Some(value))
            }
            b if b == Tag::Timeval.byte() => Err(ProtoError::UnsupportedTag { tag: b }),
            found => Err(ProtoError::UnexpectedTag {
                expected: Tag::String.byte(),
                found,
            }),
        }
    }

    /// An optional u32 where the `NO_INDEX` sentinel reads as `None`.
    pub fn get_index(&mut self) -> Result<Option<u32>> {
        let value = self.get_u32()?;
        Ok(if value == NO_INDEX { None } else { Some(value) })
    }

    pub fn get_arbitrary(&mut self) -> Result<&'a [u8]> {
        self.expect_tag(Tag::Arbitrary)?;
        let len = self.take_u32()? as usize;
        self.take(len)
    }

    pub fn get_bool(&mut self) -> Result<bool> {
        let found = self.take(1)?[0];
        match found {
            b if b == Tag::BooleanTrue.byte() => Ok(true),
            b if b == Tag::BooleanFalse.byte() => Ok(false),
            b if b == Tag::Timeval.byte() => Err(ProtoError::UnsupportedTag { tag: b }),
            found => Err(ProtoError::UnexpectedTag {
                expected: Tag::BooleanTrue.byte(),
                found,
            }),
        }
    }

    pub fn get_sample_spec(&mut self) -> Result<SampleSpec> {
        self.expect_tag(Tag::SampleSpec)?;
        let format = SampleFormat::from_code(self.take(1)?[0])?;
        let channels = self.take(1)?[0];
        if (channels as usize) >= MAX_CHANNELS {
            return Err(ProtoError::InvalidChannels {
                channels: channels as usize,
                limit: MAX_CHANNELS,
            });
        }
        let rate = self.take_u32()?;
        Ok(SampleSpec {
            format,
            channels,
            rate,
        })
    }

    pub fn get_channel_map(&mut self) -> Result<ChannelMap> {
        self.expect_tag(Tag::ChannelMap)?;
        let count = self.take(1)?[0] as usize;
        let positions = self.take(count)?.to_vec();
        ChannelMap::from_positions(positions)
    }

    pub fn get_cvolume(&mut self) -> Result<ChannelVolume> {
        self.expect_tag(Tag::Cvolume)?;
        let count = self.take(1)?[0] as usize;
        let mut volumes = Vec::with_capacity(count);
        for _ in 0..count {
            volumes.push(Volume(self.take_u32()?));
        }
        ChannelVolume::from_volumes(volumes)
    }

    pub fn get_volume(&mut self) -> Result<Volume> {
        self.expect_tag(Tag::Volume)?;
        Ok(Volume(self.take_u32()?))
    }

    /// A property list; see [`TagWriter::put_props`] for the layout.
    ///
    /// The per-entry length field is redundant with the arbitrary blob and
    /// is read but not trusted; the value is recovered from the blob with
    /// its trailing NUL trimmed.
    pub fn get_props(&mut self) -> Result<Props> {
        self.expect_tag(Tag::Proplist)?;
        let mut entries = Vec::new();
        while let Some(key) = self.get_string()? {
            let _declared_len = self.get_u32()?;
            let blob = self.get_arbitrary()?;
            let value_bytes = blob.strip_suffix(&[0]).unwrap_or(blob);
            let value = std::str::from_utf8(value_bytes)?.to_string();
            entries.push((key, value));
        }
        Ok(Props::inflate(entries))
    }

    pub fn get_format_info(&mut self) -> Result<FormatInfo> {
        self.expect_tag(Tag::FormatInfo)?;
        let encoding = self.get_u8()?;
        let props = self.get_props()?;
        Ok(FormatInfo { encoding, props })
    }
}
