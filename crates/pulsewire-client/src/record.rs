//! Record streams: creation, bounded inbound delivery, and lifecycle.
//!
//! Inbound memory blocks are routed here by channel id. Delivery is pull
//! model: the consumer resumes the stream and drains buffered bytes; when
//! the buffer overruns, delivery pauses and later blocks are dropped rather
//! than held, so one slow consumer cannot stall the whole connection.

use std::collections::VecDeque;
use std::io::{Read, Write};

use bytes::Bytes;
use pulsewire_proto::{
    ChannelMap, ChannelVolume, CommandCode, FormatInfo, Props, SampleSpec, TagReader, TagWriter,
    NO_VALUE,
};

use crate::client::Client;
use crate::error::{ClientError, Result};
use crate::events::{RecordBufferAttr, StreamEvent};

/// Default consumer buffer bound.
const DEFAULT_CAPACITY: usize = 1024 * 1024;

/// Result of handing one inbound block to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushOutcome {
    /// Bytes accepted for the consumer.
    pub delivered: usize,
    /// Delivery paused because the buffer overran.
    pub overrun: bool,
    /// The byte cap was reached by this block; fires exactly once.
    pub ended: bool,
}

impl PushOutcome {
    const DROPPED: PushOutcome = PushOutcome {
        delivered: 0,
        overrun: false,
        ended: false,
    };
}

/// Inbound delivery state for one record stream.
#[derive(Debug)]
pub struct RecordEngine {
    running: bool,
    remaining: Option<u64>,
    buffer: VecDeque<Bytes>,
    buffered: usize,
    capacity: usize,
    ended: bool,
}

impl RecordEngine {
    /// A fresh engine. `limit` caps total delivered bytes; `capacity`
    /// bounds how much may sit undrained before delivery pauses.
    pub fn new(limit: Option<u64>, capacity: usize) -> Self {
        Self {
            running: false,
            remaining: limit,
            buffer: VecDeque::new(),
            buffered: 0,
            capacity: capacity.max(1),
            ended: false,
        }
    }

    /// Accept an inbound block. Dropped outright while paused or ended.
    pub fn push(&mut self, block: Bytes) -> PushOutcome {
        if !self.running || self.ended {
            return PushOutcome::DROPPED;
        }

        let n = match self.remaining {
            Some(remaining) => block.len().min(remaining.min(usize::MAX as u64) as usize),
            None => block.len(),
        };
        if n > 0 {
            self.buffer.push_back(block.slice(..n));
            self.buffered += n;
        }
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= n as u64;
        }

        let overrun = self.buffered > self.capacity;
        if overrun {
            self.running = false;
        }

        let ended = self.remaining == Some(0);
        if ended {
            self.ended = true;
        }

        PushOutcome {
            delivered: n,
            overrun,
            ended,
        }
    }

    /// Drain up to `max` buffered bytes.
    pub fn pop(&mut self, max: usize) -> Option<Bytes> {
        let head_len = self.buffer.front()?.len();
        let taken = if head_len <= max {
            self.buffer.pop_front()?
        } else {
            self.buffer.front_mut()?.split_to(max)
        };
        self.buffered -= taken.len();
        Some(taken)
    }

    /// Resume delivery; a no-op once the stream has ended.
    pub fn resume(&mut self) {
        if !self.ended {
            self.running = true;
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn buffered(&self) -> usize {
        self.buffered
    }
}

/// Stream flags carried in the create request.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordFlags {
    pub no_remap: bool,
    pub no_remix: bool,
    pub fix_format: bool,
    pub fix_rate: bool,
    pub fix_channels: bool,
    pub no_move: bool,
    pub variable_rate: bool,
    pub peak_detect: bool,
    pub adjust_latency: bool,
    pub early_requests: bool,
    pub dont_inhibit_auto_suspend: bool,
    pub fail_on_suspend: bool,
    pub muted: bool,
    pub volume_set: bool,
    pub muted_set: bool,
    pub relative_volume: bool,
    pub passthrough: bool,
}

/// Parameters for creating a record stream.
#[derive(Debug, Clone)]
pub struct RecordParams {
    pub sample_spec: SampleSpec,
    /// Defaults to the WAV mapping for the channel count.
    pub channel_map: Option<ChannelMap>,
    pub source_index: Option<u32>,
    pub source_name: Option<String>,
    pub maxlength: u32,
    pub corked: bool,
    pub fragsize: u32,
    /// Record from this sink input directly, if set.
    pub direct_on_input: Option<u32>,
    /// Defaults to 100% on every channel.
    pub volume: Option<ChannelVolume>,
    pub flags: RecordFlags,
    pub props: Props,
    pub formats: Vec<FormatInfo>,
    /// Local cap on total delivered bytes; the stream ends on reaching it.
    pub byte_limit: Option<u64>,
    /// Local consumer buffer bound before delivery pauses.
    pub capacity: usize,
}

impl RecordParams {
    pub fn new(sample_spec: SampleSpec) -> Self {
        Self {
            sample_spec,
            channel_map: None,
            source_index: None,
            source_name: None,
            maxlength: NO_VALUE,
            corked: false,
            fragsize: NO_VALUE,
            direct_on_input: None,
            volume: None,
            flags: RecordFlags::default(),
            props: Props::new(),
            formats: Vec::new(),
            byte_limit: None,
            capacity: DEFAULT_CAPACITY,
        }
    }

    /// Serialize the per-command fields in the server's fixed order.
    pub(crate) fn write(&self, w: &mut TagWriter) -> Result<()> {
        let channel_map = match &self.channel_map {
            Some(map) => map.clone(),
            None => ChannelMap::wav_default(self.sample_spec.channels)?,
        };
        let volume = match &self.volume {
            Some(volume) => volume.clone(),
            None => ChannelVolume::norm(self.sample_spec.channels)?,
        };
        let flags = self.flags;

        w.put_sample_spec(&self.sample_spec)?;
        w.put_channel_map(&channel_map);
        w.put_index(self.source_index);
        w.put_string(self.source_name.as_deref());
        w.put_u32(self.maxlength);
        w.put_bool(self.corked);
        w.put_u32(self.fragsize);
        w.put_bool(flags.no_remap);
        w.put_bool(flags.no_remix);
        w.put_bool(flags.fix_format);
        w.put_bool(flags.fix_rate);
        w.put_bool(flags.fix_channels);
        w.put_bool(flags.no_move);
        w.put_bool(flags.variable_rate);
        w.put_bool(flags.peak_detect);
        w.put_bool(flags.adjust_latency);
        w.put_props(&self.props);
        w.put_index(self.direct_on_input);
        w.put_bool(flags.early_requests);
        w.put_bool(flags.dont_inhibit_auto_suspend);
        w.put_bool(flags.fail_on_suspend);
        w.put_u8(self.formats.len() as u8);
        for format in &self.formats {
            w.put_format_info(format);
        }
        w.put_cvolume(&volume);
        w.put_bool(flags.muted);
        w.put_bool(flags.volume_set || self.volume.is_some());
        w.put_bool(flags.muted_set);
        w.put_bool(flags.relative_volume);
        w.put_bool(flags.passthrough);
        Ok(())
    }
}

/// Everything the server reports back from a successful create.
#[derive(Debug, Clone)]
pub struct CreateRecordReply {
    pub index: u32,
    pub source_output_index: u32,
    pub buffer_attr: RecordBufferAttr,
    pub sample_spec: SampleSpec,
    pub channel_map: ChannelMap,
    pub source_index: u32,
    pub source_name: Option<String>,
    pub source_suspended: bool,
    pub source_latency_usec: u64,
    pub format: FormatInfo,
}

impl CreateRecordReply {
    pub(crate) fn parse(r: &mut TagReader<'_>) -> Result<Self> {
        Ok(Self {
            index: r.get_u32()?,
            source_output_index: r.get_u32()?,
            buffer_attr: RecordBufferAttr {
                maxlength: r.get_u32()?,
                fragsize: r.get_u32()?,
            },
            sample_spec: r.get_sample_spec()?,
            channel_map: r.get_channel_map()?,
            source_index: r.get_u32()?,
            source_name: r.get_string()?,
            source_suspended: r.get_bool()?,
            source_latency_usec: r.get_usec()?,
            format: r.get_format_info()?,
        })
    }
}

/// Handle to a live record stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordStream {
    pub(crate) index: u32,
}

impl RecordStream {
    /// The server-assigned stream index.
    pub fn index(&self) -> u32 {
        self.index
    }
}

pub(crate) struct RecordState {
    pub(crate) engine: RecordEngine,
    pub(crate) events: VecDeque<StreamEvent>,
    pub(crate) killed: bool,
}

impl RecordState {
    pub(crate) fn new(engine: RecordEngine) -> Self {
        Self {
            engine,
            events: VecDeque::new(),
            killed: false,
        }
    }
}

impl<T: Read + Write> Client<T> {
    /// Create a record stream. Delivery starts paused; the first
    /// [`Client::record_read`] resumes it.
    pub fn create_record_stream(
        &mut self,
        params: RecordParams,
    ) -> Result<(RecordStream, CreateRecordReply)> {
        let body = self.round_trip(CommandCode::CreateRecordStream, |w| params.write(w))?;
        let mut r = TagReader::new(&body);
        let reply = CreateRecordReply::parse(&mut r)?;

        let engine = RecordEngine::new(params.byte_limit, params.capacity);
        self.record.insert(reply.index, RecordState::new(engine));

        tracing::debug!(
            index = reply.index,
            source_output = reply.source_output_index,
            "record stream created"
        );
        Ok((RecordStream { index: reply.index }, reply))
    }

    /// Read up to `max` captured bytes, blocking until data arrives.
    ///
    /// Returns an empty buffer once the stream has ended and everything
    /// buffered has been drained.
    pub fn record_read(&mut self, stream: RecordStream, max: usize) -> Result<Bytes> {
        loop {
            let state = self.record_state(stream.index)?;
            if let Some(data) = state.engine.pop(max) {
                return Ok(data);
            }
            if state.engine.is_ended() {
                return Ok(Bytes::new());
            }
            state.engine.resume();
            self.pump_one()?;
        }
    }

    /// Pause or resume the stream on the server.
    pub fn record_cork(&mut self, stream: RecordStream, corked: bool) -> Result<()> {
        self.record_state(stream.index)?;
        self.round_trip(CommandCode::CorkRecordStream, |w| {
            w.put_u32(stream.index);
            w.put_bool(corked);
            Ok(())
        })?;
        Ok(())
    }

    /// Delete the stream on the server and drop the local registration.
    pub fn delete_record_stream(&mut self, stream: RecordStream) -> Result<()> {
        self.record.remove(&stream.index);
        self.delete_stream(CommandCode::DeleteRecordStream, stream.index)
    }

    /// Drain pending notifications for the stream.
    pub fn record_events(&mut self, stream: RecordStream) -> Vec<StreamEvent> {
        match self.record.get_mut(&stream.index) {
            Some(state) => state.events.drain(..).collect(),
            None => Vec::new(),
        }
    }

    fn record_state(&mut self, index: u32) -> Result<&mut RecordState> {
        match self.record.get_mut(&index) {
            None => Err(ClientError::NoSuchStream { index }),
            Some(state) if state.killed => Err(ClientError::StreamKilled { index }),
            Some(state) => Ok(state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_dropped_while_paused() {
        let mut engine = RecordEngine::new(None, 64);
        let outcome = engine.push(Bytes::from_static(&[1, 2, 3]));
        assert_eq!(outcome, PushOutcome::DROPPED);
        assert_eq!(engine.buffered(), 0);
    }

    #[test]
    fn delivery_respects_byte_cap() {
        let mut engine = RecordEngine::new(Some(5), 64);
        engine.resume();

        let first = engine.push(Bytes::from_static(&[0; 3]));
        assert_eq!(first.delivered, 3);
        assert!(!first.ended);

        let second = engine.push(Bytes::from_static(&[0; 4]));
        assert_eq!(second.delivered, 2);
        assert!(second.ended);

        // The stream ends exactly once; later blocks are dropped.
        let third = engine.push(Bytes::from_static(&[0; 4]));
        assert_eq!(third, PushOutcome::DROPPED);
        assert_eq!(engine.buffered(), 5);
        assert!(engine.is_ended());
    }

    #[test]
    fn overrun_pauses_delivery() {
        let mut engine = RecordEngine::new(None, 4);
        engine.resume();

        let outcome = engine.push(Bytes::from_static(&[0; 6]));
        assert_eq!(outcome.delivered, 6);
        assert!(outcome.overrun);
        assert!(!engine.is_running());

        // Paused: the next block is dropped, not held.
        let dropped = engine.push(Bytes::from_static(&[0; 2]));
        assert_eq!(dropped, PushOutcome::DROPPED);

        engine.resume();
        assert!(engine.is_running());
    }

    #[test]
    fn pop_splits_large_chunks() {
        let mut engine = RecordEngine::new(None, 64);
        engine.resume();
        engine.push(Bytes::from_static(&[1, 2, 3, 4, 5]));

        assert_eq!(engine.pop(2).unwrap().as_ref(), &[1, 2]);
        assert_eq!(engine.pop(16).unwrap().as_ref(), &[3, 4, 5]);
        assert!(engine.pop(16).is_none());
        assert_eq!(engine.buffered(), 0);
    }

    #[test]
    fn resume_after_end_is_a_no_op() {
        let mut engine = RecordEngine::new(Some(1), 64);
        engine.resume();
        engine.push(Bytes::from_static(&[9]));
        assert!(engine.is_ended());
        engine.resume();
        assert!(!engine.is_running());
    }
}
