//! Playback streams: creation, credit-based shipping, drain and delete.
//!
//! The server drives outbound flow: REQUEST events grant byte credit, and
//! the client ships frame-aligned memory blocks up to that credit. Bytes
//! the credit does not cover wait in a queue, and the producer blocks until
//! the engine reports it is ready for more.

use std::collections::VecDeque;
use std::io::{Read, Write};

use bytes::{Bytes, BytesMut};
use pulsewire_proto::{
    ChannelMap, ChannelVolume, CommandCode, FormatInfo, Props, SampleSpec, TagReader, TagWriter,
    NO_VALUE,
};

use crate::client::Client;
use crate::error::{ClientError, Result};
use crate::events::{PlaybackBufferAttr, StreamEvent};

/// Flow-control state for one outbound stream.
///
/// Pure state machine; the dispatcher feeds it grants and drains shippable
/// chunks. All shipped chunks are multiples of the frame size.
#[derive(Debug)]
pub struct PlaybackEngine {
    frame_size: usize,
    credit: u64,
    queue: VecDeque<Bytes>,
    queued: usize,
    remaining: Option<u64>,
}

impl PlaybackEngine {
    /// A fresh engine. `limit` caps total bytes through the stream.
    pub fn new(frame_size: usize, limit: Option<u64>) -> Self {
        Self {
            frame_size: frame_size.max(1),
            credit: 0,
            queue: VecDeque::new(),
            queued: 0,
            remaining: limit,
        }
    }

    /// Accumulate send credit from a REQUEST event.
    pub fn grant(&mut self, bytes: u32) {
        self.credit += u64::from(bytes);
    }

    /// Unfulfilled credit in bytes.
    pub fn credit(&self) -> u64 {
        self.credit
    }

    /// Bytes queued but not yet shipped.
    pub fn queued(&self) -> usize {
        self.queued
    }

    /// Bytes still permitted through the stream, if capped.
    pub fn remaining(&self) -> Option<u64> {
        self.remaining
    }

    /// Append producer bytes to the queue.
    ///
    /// Fails without queueing anything when the bytes would push the stream
    /// past its configured limit.
    pub fn enqueue(&mut self, data: Bytes) -> Result<()> {
        if let Some(remaining) = self.remaining {
            if (self.queued + data.len()) as u64 > remaining {
                return Err(ClientError::MaximumLengthReached);
            }
        }
        if !data.is_empty() {
            self.queued += data.len();
            self.queue.push_back(data);
        }
        Ok(())
    }

    /// Take the largest frame-aligned chunk the credit covers.
    ///
    /// Returns `None` when nothing can ship: no credit, empty queue, or
    /// less than one frame available under the current credit.
    pub fn take_shippable(&mut self) -> Option<Bytes> {
        let shippable = self.queued.min(self.credit.min(usize::MAX as u64) as usize);
        let shippable = shippable - (shippable % self.frame_size);
        if shippable == 0 {
            return None;
        }

        let mut out = BytesMut::with_capacity(shippable);
        let mut wanted = shippable;
        while let Some(head) = self.queue.front_mut() {
            if head.len() <= wanted {
                wanted -= head.len();
                out.extend_from_slice(head);
                self.queue.pop_front();
            } else {
                out.extend_from_slice(&head.split_to(wanted));
                wanted = 0;
            }
            if wanted == 0 {
                break;
            }
        }

        self.queued -= shippable;
        self.credit -= shippable as u64;
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= shippable as u64;
        }
        Some(out.freeze())
    }

    /// Whether the producer should be woken for more data.
    ///
    /// True when the server wants more than the queue can supply (credit
    /// outstanding but less than a frame queued) or the stream has reached
    /// its byte limit.
    pub fn ready_for_more(&self) -> bool {
        (self.credit > 0 && self.queued < self.frame_size) || self.remaining == Some(0)
    }

    /// Whether the byte limit has been exhausted.
    pub fn at_limit(&self) -> bool {
        self.remaining == Some(0)
    }
}

/// Stream flags carried in the create request.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaybackFlags {
    pub no_remap: bool,
    pub no_remix: bool,
    pub fix_format: bool,
    pub fix_rate: bool,
    pub fix_channels: bool,
    pub no_move: bool,
    pub variable_rate: bool,
    pub muted: bool,
    pub adjust_latency: bool,
    pub volume_set: bool,
    pub early_requests: bool,
    pub muted_set: bool,
    pub dont_inhibit_auto_suspend: bool,
    pub fail_on_suspend: bool,
    pub relative_volume: bool,
    pub passthrough: bool,
}

/// Parameters for creating a playback stream.
#[derive(Debug, Clone)]
pub struct PlaybackParams {
    pub sample_spec: SampleSpec,
    /// Defaults to the WAV mapping for the channel count.
    pub channel_map: Option<ChannelMap>,
    pub sink_index: Option<u32>,
    pub sink_name: Option<String>,
    /// Total byte limit for the stream; `NO_VALUE` means unlimited.
    pub maxlength: u32,
    pub corked: bool,
    pub tlength: u32,
    pub prebuf: u32,
    pub minreq: u32,
    /// Defaults to the client's next sync-group counter value.
    pub sync_id: Option<u32>,
    /// Defaults to 100% on every channel.
    pub volume: Option<ChannelVolume>,
    pub flags: PlaybackFlags,
    pub props: Props,
    pub formats: Vec<FormatInfo>,
}

impl PlaybackParams {
    pub fn new(sample_spec: SampleSpec) -> Self {
        Self {
            sample_spec,
            channel_map: None,
            sink_index: None,
            sink_name: None,
            maxlength: NO_VALUE,
            corked: false,
            tlength: NO_VALUE,
            prebuf: NO_VALUE,
            minreq: NO_VALUE,
            sync_id: None,
            volume: None,
            flags: PlaybackFlags::default(),
            props: Props::new(),
            formats: Vec::new(),
        }
    }

    /// Serialize the per-command fields in the server's fixed order.
    pub(crate) fn write(&self, w: &mut TagWriter, sync_id: u32) -> Result<()> {
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
        w.put_index(self.sink_index);
        w.put_string(self.sink_name.as_deref());
        w.put_u32(self.maxlength);
        w.put_bool(self.corked);
        w.put_u32(self.tlength);
        w.put_u32(self.prebuf);
        w.put_u32(self.minreq);
        w.put_u32(sync_id);
        w.put_cvolume(&volume);
        w.put_bool(flags.no_remap);
        w.put_bool(flags.no_remix);
        w.put_bool(flags.fix_format);
        w.put_bool(flags.fix_rate);
        w.put_bool(flags.fix_channels);
        w.put_bool(flags.no_move);
        w.put_bool(flags.variable_rate);
        w.put_bool(flags.muted);
        w.put_bool(flags.adjust_latency);
        w.put_props(&self.props);
        w.put_bool(flags.volume_set || self.volume.is_some());
        w.put_bool(flags.early_requests);
        w.put_bool(flags.muted_set);
        w.put_bool(flags.dont_inhibit_auto_suspend);
        w.put_bool(flags.fail_on_suspend);
        w.put_bool(flags.relative_volume);
        w.put_bool(flags.passthrough);
        w.put_u8(self.formats.len() as u8);
        for format in &self.formats {
            w.put_format_info(format);
        }
        Ok(())
    }
}

/// Everything the server reports back from a successful create.
#[derive(Debug, Clone)]
pub struct CreatePlaybackReply {
    pub index: u32,
    pub sink_input_index: u32,
    /// Initial send credit in bytes.
    pub requested_bytes: u32,
    pub buffer_attr: PlaybackBufferAttr,
    pub sample_spec: SampleSpec,
    pub channel_map: ChannelMap,
    pub sink_index: u32,
    pub sink_name: Option<String>,
    pub sink_suspended: bool,
    pub sink_latency_usec: u64,
    pub format: FormatInfo,
}

impl CreatePlaybackReply {
    /// Every field is mandatory on protocol >= 32; a short read is a
    /// protocol error.
    pub(crate) fn parse(r: &mut TagReader<'_>) -> Result<Self> {
        Ok(Self {
            index: r.get_u32()?,
            sink_input_index: r.get_u32()?,
            requested_bytes: r.get_u32()?,
            buffer_attr: PlaybackBufferAttr {
                maxlength: r.get_u32()?,
                tlength: r.get_u32()?,
                prebuf: r.get_u32()?,
                minreq: r.get_u32()?,
            },
            sample_spec: r.get_sample_spec()?,
            channel_map: r.get_channel_map()?,
            sink_index: r.get_u32()?,
            sink_name: r.get_string()?,
            sink_suspended: r.get_bool()?,
            sink_latency_usec: r.get_usec()?,
            format: r.get_format_info()?,
        })
    }
}

/// Handle to a live playback stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackStream {
    pub(crate) index: u32,
}

impl PlaybackStream {
    /// The server-assigned stream index.
    pub fn index(&self) -> u32 {
        self.index
    }
}

pub(crate) struct PlaybackState {
    pub(crate) engine: PlaybackEngine,
    pub(crate) events: VecDeque<StreamEvent>,
    pub(crate) killed: bool,
}

impl PlaybackState {
    pub(crate) fn new(engine: PlaybackEngine) -> Self {
        Self {
            engine,
            events: VecDeque::new(),
            killed: false,
        }
    }
}

impl<T: Read + Write> Client<T> {
    /// Create a playback stream.
    ///
    /// The stream's index is known only from the reply. The reply's
    /// `requested_bytes` seeds the engine's credit, so the first write can
    /// ship immediately.
    pub fn create_playback_stream(
        &mut self,
        params: PlaybackParams,
    ) -> Result<(PlaybackStream, CreatePlaybackReply)> {
        let sync_id = match params.sync_id {
            Some(id) => id,
            None => self.next_sync_id(),
        };
        let body = self.round_trip(CommandCode::CreatePlaybackStream, |w| {
            params.write(w, sync_id)
        })?;
        let mut r = TagReader::new(&body);
        let reply = CreatePlaybackReply::parse(&mut r)?;

        let limit = (params.maxlength != NO_VALUE).then_some(u64::from(params.maxlength));
        let mut engine = PlaybackEngine::new(reply.sample_spec.frame_size(), limit);
        engine.grant(reply.requested_bytes);
        self.playback
            .insert(reply.index, PlaybackState::new(engine));

        tracing::debug!(
            index = reply.index,
            sink_input = reply.sink_input_index,
            requested = reply.requested_bytes,
            "playback stream created"
        );
        Ok((PlaybackStream { index: reply.index }, reply))
    }

    /// Write PCM bytes to a playback stream.
    ///
    /// Ships what the current credit allows and then blocks, pumping the
    /// connection, until the engine is ready for more producer data. Fails
    /// with [`ClientError::MaximumLengthReached`] when the bytes would
    /// exceed the stream's configured limit.
    pub fn playback_write(&mut self, stream: PlaybackStream, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        self.playback_state(stream.index)?
            .engine
            .enqueue(Bytes::copy_from_slice(data))?;
        self.ship_playback(stream.index)?;

        loop {
            match self.playback.get(&stream.index) {
                None => return Err(ClientError::NoSuchStream {
                    index: stream.index,
                }),
                Some(state) if state.killed => {
                    return Err(ClientError::StreamKilled {
                        index: stream.index,
                    })
                }
                Some(state) if state.engine.ready_for_more() => return Ok(()),
                Some(_) => {}
            }
            self.pump_one()?;
        }
    }

    /// Block until the server has consumed everything buffered for the
    /// stream. Only then is end-of-stream meaningful downstream.
    pub fn playback_drain(&mut self, stream: PlaybackStream) -> Result<()> {
        self.playback_state(stream.index)?;
        self.round_trip(CommandCode::DrainPlaybackStream, |w| {
            w.put_u32(stream.index);
            Ok(())
        })?;
        Ok(())
    }

    /// Pause or resume the stream.
    pub fn playback_cork(&mut self, stream: PlaybackStream, corked: bool) -> Result<()> {
        self.playback_state(stream.index)?;
        self.round_trip(CommandCode::CorkPlaybackStream, |w| {
            w.put_u32(stream.index);
            w.put_bool(corked);
            Ok(())
        })?;
        Ok(())
    }

    /// Delete the stream on the server and drop the local registration.
    pub fn delete_playback_stream(&mut self, stream: PlaybackStream) -> Result<()> {
        self.playback.remove(&stream.index);
        self.delete_stream(CommandCode::DeletePlaybackStream, stream.index)
    }

    /// Drain pending notifications for the stream.
    pub fn playback_events(&mut self, stream: PlaybackStream) -> Vec<StreamEvent> {
        match self.playback.get_mut(&stream.index) {
            Some(state) => state.events.drain(..).collect(),
            None => Vec::new(),
        }
    }

    fn playback_state(&mut self, index: u32) -> Result<&mut PlaybackState> {
        match self.playback.get_mut(&index) {
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
    fn ships_frame_aligned_up_to_credit() {
        let mut engine = PlaybackEngine::new(4, None);
        engine.grant(10);
        engine.enqueue(Bytes::from_static(&[1, 2, 3])).unwrap();
        engine.enqueue(Bytes::from_static(&[4, 5, 6, 7])).unwrap();
        engine.enqueue(Bytes::from_static(&[8, 9, 10, 11])).unwrap();

        let shipped = engine.take_shippable().unwrap();
        assert_eq!(shipped.len(), 8);
        assert_eq!(shipped.as_ref(), &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(engine.credit(), 2);
        assert_eq!(engine.queued(), 3);
        // Shipment fell short of the credit, so the producer is woken.
        assert!(engine.ready_for_more());
    }

    #[test]
    fn nothing_ships_without_a_whole_frame_of_credit() {
        let mut engine = PlaybackEngine::new(4, None);
        engine.grant(2);
        engine
            .enqueue(Bytes::from_static(&[0, 1, 2, 3, 4, 5, 6, 7]))
            .unwrap();
        assert!(engine.take_shippable().is_none());
        // Data is waiting; the server just hasn't granted enough.
        assert!(!engine.ready_for_more());
    }

    #[test]
    fn nothing_ships_with_sub_frame_queue() {
        let mut engine = PlaybackEngine::new(4, None);
        engine.grant(100);
        engine.enqueue(Bytes::from_static(&[1, 2])).unwrap();
        assert!(engine.take_shippable().is_none());
        assert!(engine.ready_for_more());
    }

    #[test]
    fn shipped_bytes_never_exceed_grants() {
        let mut engine = PlaybackEngine::new(2, None);
        let mut granted = 0u64;
        let mut shipped = 0u64;
        for round in 0..32u32 {
            engine.grant(round % 7);
            granted += u64::from(round % 7);
            engine
                .enqueue(Bytes::from(vec![0u8; (round % 5) as usize]))
                .unwrap();
            if let Some(chunk) = engine.take_shippable() {
                assert_eq!(chunk.len() % 2, 0);
                shipped += chunk.len() as u64;
            }
            assert!(shipped <= granted);
        }
    }

    #[test]
    fn limit_enforced_on_enqueue() {
        let mut engine = PlaybackEngine::new(1, Some(8));
        engine.enqueue(Bytes::from_static(&[0; 6])).unwrap();
        let err = engine.enqueue(Bytes::from_static(&[0; 3])).unwrap_err();
        assert!(matches!(err, ClientError::MaximumLengthReached));
        // The failed enqueue must not have taken any bytes.
        assert_eq!(engine.queued(), 6);
        engine.enqueue(Bytes::from_static(&[0; 2])).unwrap();
    }

    #[test]
    fn reaching_limit_wakes_producer() {
        let mut engine = PlaybackEngine::new(1, Some(4));
        engine.grant(16);
        engine.enqueue(Bytes::from_static(&[0; 4])).unwrap();
        let shipped = engine.take_shippable().unwrap();
        assert_eq!(shipped.len(), 4);
        assert!(engine.at_limit());
        assert!(engine.ready_for_more());
    }

    #[test]
    fn split_head_chunk_keeps_remainder_in_order() {
        let mut engine = PlaybackEngine::new(2, None);
        engine.grant(3);
        engine
            .enqueue(Bytes::from_static(&[10, 11, 12, 13, 14, 15]))
            .unwrap();
        let first = engine.take_shippable().unwrap();
        assert_eq!(first.as_ref(), &[10, 11]);

        engine.grant(10);
        let second = engine.take_shippable().unwrap();
        assert_eq!(second.as_ref(), &[12, 13, 14, 15]);
    }
}
