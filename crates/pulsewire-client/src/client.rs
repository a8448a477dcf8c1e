//! The connection dispatcher.
//!
//! One client owns one connection. All protocol work happens on the calling
//! thread: a command method writes its request and then pumps the read loop
//! until the matching reply tag resolves. Whatever else arrives while
//! pumping (subscribe events, stream events, memory blocks, other replies)
//! is dispatched to its queue or registry first.
//!
//! Correlation is by request tag, never by arrival order. Memory blocks are
//! routed to record streams by channel id.

use std::collections::{HashMap, VecDeque};
use std::io::{Read, Write};
use std::path::PathBuf;

use bytes::Bytes;
use tracing::{debug, info, warn};

use pulsewire_proto::{
    mask, CommandCode, ErrorCode, Props, SubscribeEvent, TagReader, TagWriter, COOKIE_SIZE,
    PROTOCOL_VERSION,
};
use pulsewire_transport::{cookie, PulseStream};

use crate::error::{ClientError, Result};
use crate::events::{PlaybackBufferAttr, RecordBufferAttr, StreamEvent};
use crate::playback::PlaybackState;
use crate::record::RecordState;
use crate::upload::UploadState;
use crate::wire::{PacketReader, PacketWriter};

/// Tags wrap below the `NO_TAG` sentinel.
const TAG_MODULUS: u32 = 0xFFFF_FFFE;

/// Cap on undrained subscribe events before the oldest are dropped.
const EVENT_QUEUE_LIMIT: usize = 1024;

/// Connection settings for [`Client::connect`].
#[derive(Debug, Default)]
pub struct Config {
    /// Daemon socket path; resolved from the environment when unset.
    pub socket_path: Option<PathBuf>,
    /// Cookie file path; resolved from the environment when unset.
    pub cookie_path: Option<PathBuf>,
    /// Client properties announced with SET_CLIENT_NAME.
    pub props: Props,
}

enum ReplyState {
    Waiting,
    Success(Bytes),
    Failure(ErrorCode),
}

enum ConnState {
    Open,
    Closed { by_user: bool },
}

/// Proof of an active event subscription; hand it back to
/// [`Client::unsubscribe`].
#[derive(Debug)]
#[must_use = "subscriptions are counted; keep the token and return it to unsubscribe"]
pub struct Subscription(());

/// A connection to the sound server.
pub struct Client<T> {
    reader: PacketReader<T>,
    writer: PacketWriter<T>,
    protocol_version: u16,
    next_tag: u32,
    pending: HashMap<u32, ReplyState>,
    pub(crate) playback: HashMap<u32, PlaybackState>,
    pub(crate) record: HashMap<u32, RecordState>,
    pub(crate) upload: HashMap<u32, UploadState>,
    events: VecDeque<SubscribeEvent>,
    subscriptions: usize,
    sync_counter: u32,
    state: ConnState,
    conn_error: Option<String>,
}

impl Client<PulseStream> {
    /// Connect to the daemon, authenticate, and announce client properties.
    pub fn connect(config: Config) -> Result<Self> {
        let stream = match &config.socket_path {
            Some(path) => PulseStream::connect(path)?,
            None => PulseStream::connect_default()?,
        };
        let reader_half = stream.try_clone()?;
        let mut client = Client::new(reader_half, stream);

        let cookie = match &config.cookie_path {
            Some(path) => cookie::load_from(path),
            None => cookie::load_default(),
        };
        let version = client.auth(&cookie)?;
        info!(version, "authenticated with sound server");

        let mut props = config.props;
        if props.get("application.name").is_none() {
            props.set("application.name", "pulsewire");
        }
        props.set("application.process.id", std::process::id().to_string());
        let client_index = client.set_client_name(&props)?;
        debug!(client_index, "client registered");

        Ok(client)
    }
}

impl<T: Read + Write> Client<T> {
    /// A client over raw transport halves. No authentication is performed;
    /// call [`Client::auth`] before anything else.
    pub fn new(reader_half: T, writer_half: T) -> Self {
        Self {
            reader: PacketReader::new(reader_half),
            writer: PacketWriter::new(writer_half),
            protocol_version: PROTOCOL_VERSION,
            next_tag: 0,
            pending: HashMap::new(),
            playback: HashMap::new(),
            record: HashMap::new(),
            upload: HashMap::new(),
            events: VecDeque::new(),
            subscriptions: 0,
            sync_counter: 0,
            state: ConnState::Open,
            conn_error: None,
        }
    }

    /// The negotiated protocol version.
    pub fn protocol_version(&self) -> u16 {
        self.protocol_version
    }

    /// Why the connection failed, if it failed without a user close.
    pub fn connection_error(&self) -> Option<&str> {
        self.conn_error.as_deref()
    }

    /// Authenticate with the server.
    ///
    /// The cookie is zero-padded or truncated to the 256 bytes the wire
    /// expects. The reply's low 16 bits carry the server protocol version;
    /// the high bits are shared-memory flags this client ignores. A server
    /// below version 32 is a fatal startup error.
    pub fn auth(&mut self, cookie: &[u8]) -> Result<u16> {
        let mut padded = [0u8; COOKIE_SIZE];
        let n = cookie.len().min(COOKIE_SIZE);
        padded[..n].copy_from_slice(&cookie[..n]);

        let body = self.round_trip(CommandCode::Auth, |w| {
            w.put_u32(u32::from(PROTOCOL_VERSION));
            w.put_arbitrary(&padded);
            Ok(())
        })?;
        let raw = TagReader::new(&body).get_u32()?;
        let server_version = (raw & 0xFFFF) as u16;
        if server_version < PROTOCOL_VERSION {
            return Err(ClientError::Version {
                server: server_version,
                minimum: PROTOCOL_VERSION,
            });
        }
        self.protocol_version = server_version.min(PROTOCOL_VERSION);
        Ok(self.protocol_version)
    }

    /// Announce client properties; returns the server-assigned client index.
    pub fn set_client_name(&mut self, props: &Props) -> Result<u32> {
        let body = self.round_trip(CommandCode::SetClientName, |w| {
            w.put_props(props);
            Ok(())
        })?;
        TagReader::new(&body).get_u32().map_err(Into::into)
    }

    /// Start receiving change events for every facility.
    ///
    /// Subscriptions are counted: the first one issues SUBSCRIBE with the
    /// all-facilities mask, the last [`Client::unsubscribe`] issues the
    /// null mask. Overlapping subscribe/unsubscribe sequences never send
    /// redundant commands.
    pub fn subscribe(&mut self) -> Result<Subscription> {
        if self.subscriptions == 0 {
            self.send_subscribe_mask(mask::ALL)?;
        }
        self.subscriptions += 1;
        Ok(Subscription(()))
    }

    /// Return a subscription token; the last one turns events off.
    pub fn unsubscribe(&mut self, subscription: Subscription) -> Result<()> {
        drop(subscription);
        if self.subscriptions == 0 {
            return Ok(());
        }
        self.subscriptions -= 1;
        if self.subscriptions == 0 {
            self.send_subscribe_mask(mask::NULL)?;
        }
        Ok(())
    }

    /// Block until the next subscribe event arrives.
    pub fn next_event(&mut self) -> Result<SubscribeEvent> {
        loop {
            if let Some(event) = self.events.pop_front() {
                return Ok(event);
            }
            self.pump_one()?;
        }
    }

    /// Take an already-queued subscribe event without blocking.
    pub fn try_next_event(&mut self) -> Option<SubscribeEvent> {
        self.events.pop_front()
    }

    /// Close the connection locally. Outstanding requests are rejected and
    /// every live stream sees a `Closed` event; no connection error is
    /// reported for a user-requested close.
    pub fn close(&mut self) {
        if matches!(self.state, ConnState::Closed { .. }) {
            return;
        }
        self.state = ConnState::Closed { by_user: true };
        self.pending.clear();
        self.notify_streams_closed();
        info!("connection closed");
    }

    fn send_subscribe_mask(&mut self, mask: u32) -> Result<()> {
        self.round_trip(CommandCode::Subscribe, |w| {
            w.put_u32(mask);
            Ok(())
        })
        .map(drop)
    }

    pub(crate) fn next_sync_id(&mut self) -> u32 {
        let id = self.sync_counter;
        self.sync_counter = self.sync_counter.wrapping_add(1);
        id
    }

    fn alloc_tag(&mut self) -> u32 {
        loop {
            let tag = self.next_tag;
            self.next_tag = (self.next_tag + 1) % TAG_MODULUS;
            if !self.pending.contains_key(&tag) {
                return tag;
            }
        }
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state {
            ConnState::Open => Ok(()),
            ConnState::Closed { .. } => Err(ClientError::Disconnected),
        }
    }

    /// Send a request and block until its reply arrives.
    ///
    /// The returned body is positioned past the command code and tag.
    pub(crate) fn round_trip(
        &mut self,
        code: CommandCode,
        build: impl FnOnce(&mut TagWriter) -> Result<()>,
    ) -> Result<Bytes> {
        let tag = self.send_request(code, build)?;
        self.wait_reply(tag)
    }

    fn send_request(
        &mut self,
        code: CommandCode,
        build: impl FnOnce(&mut TagWriter) -> Result<()>,
    ) -> Result<u32> {
        self.ensure_open()?;
        let tag = self.alloc_tag();
        let mut w = TagWriter::new();
        w.put_u32(code.to_wire());
        w.put_u32(tag);
        build(&mut w)?;
        self.writer.write_command(w.as_slice())?;
        self.pending.insert(tag, ReplyState::Waiting);
        Ok(tag)
    }

    fn wait_reply(&mut self, tag: u32) -> Result<Bytes> {
        loop {
            match self.pending.get(&tag) {
                Some(ReplyState::Waiting) => {}
                Some(_) => {
                    return match self.pending.remove(&tag) {
                        Some(ReplyState::Success(body)) => Ok(body),
                        Some(ReplyState::Failure(code)) => Err(ClientError::Server(code)),
                        _ => unreachable!("checked non-waiting state"),
                    };
                }
                // The table was cleared by a connection failure.
                None => return Err(ClientError::Disconnected),
            }
            self.pump_one()?;
        }
    }

    /// Read and dispatch exactly one packet.
    pub(crate) fn pump_one(&mut self) -> Result<()> {
        self.ensure_open()?;
        let packet = match self.reader.read_packet() {
            Ok(packet) => packet,
            Err(err) => {
                self.fail_connection(&err);
                return Err(err);
            }
        };

        if !packet.is_command() {
            self.handle_memblock(packet.channel, packet.body);
            return Ok(());
        }

        match self.handle_command(packet.body) {
            Ok(()) => Ok(()),
            Err(err) => {
                if err.is_fatal() {
                    self.fail_connection(&err);
                }
                Err(err)
            }
        }
    }

    fn handle_memblock(&mut self, channel: u32, body: Bytes) {
        let Some(state) = self.record.get_mut(&channel) else {
            // No record stream at this channel; drop silently.
            debug!(channel, len = body.len(), "memory block for unknown channel");
            return;
        };
        let outcome = state.engine.push(body);
        if outcome.overrun {
            warn!(channel, "record consumer overrun; pausing delivery");
            state.events.push_back(StreamEvent::Overrun);
        }
        if outcome.ended {
            debug!(channel, "record stream reached its byte cap");
            state.events.push_back(StreamEvent::Ended);
        }
    }

    fn handle_command(&mut self, body: Bytes) -> Result<()> {
        let mut r = TagReader::new(&body);
        let code_raw = r.get_u32()?;
        let code = CommandCode::from_wire(code_raw)?;
        let tag = r.get_u32()?;

        match code {
            CommandCode::Reply => {
                let offset = body.len() - r.remaining();
                self.complete(tag, ReplyState::Success(body.slice(offset..)))
            }
            CommandCode::Error => {
                let error = ErrorCode::from_wire(r.get_u32()?);
                self.complete(tag, ReplyState::Failure(error))
            }
            CommandCode::SubscribeEvent => {
                let event = SubscribeEvent::decode(r.get_u32()?, r.get_u32()?)?;
                if self.events.len() >= EVENT_QUEUE_LIMIT {
                    warn!("subscribe event queue full; dropping oldest");
                    self.events.pop_front();
                }
                self.events.push_back(event);
                Ok(())
            }
            CommandCode::Request => {
                let channel = r.get_u32()?;
                let bytes = r.get_u32()?;
                self.handle_request(channel, bytes)
            }
            CommandCode::Started => {
                let index = r.get_u32()?;
                self.push_playback_event(index, StreamEvent::Started);
                Ok(())
            }
            CommandCode::Overflow => {
                let index = r.get_u32()?;
                self.push_playback_event(index, StreamEvent::Overflow);
                Ok(())
            }
            CommandCode::Underflow => {
                let index = r.get_u32()?;
                let offset = r.get_s64()?;
                self.push_playback_event(index, StreamEvent::Underflow { offset });
                Ok(())
            }
            CommandCode::PlaybackStreamSuspended => {
                let index = r.get_u32()?;
                let suspended = r.get_bool()?;
                self.push_playback_event(index, StreamEvent::Suspended { suspended });
                Ok(())
            }
            CommandCode::RecordStreamSuspended => {
                let index = r.get_u32()?;
                let suspended = r.get_bool()?;
                self.push_record_event(index, StreamEvent::Suspended { suspended });
                Ok(())
            }
            CommandCode::PlaybackStreamMoved => {
                let index = r.get_u32()?;
                let destination = r.get_u32()?;
                let name = r.get_string()?;
                let suspended = r.get_bool()?;
                let attr = PlaybackBufferAttr {
                    maxlength: r.get_u32()?,
                    tlength: r.get_u32()?,
                    prebuf: r.get_u32()?,
                    minreq: r.get_u32()?,
                };
                let sink_usec = r.get_usec()?;
                self.push_playback_event(
                    index,
                    StreamEvent::Moved {
                        destination,
                        name,
                        suspended,
                    },
                );
                self.push_playback_event(index, StreamEvent::PlaybackBufferChanged { attr, sink_usec });
                Ok(())
            }
            CommandCode::RecordStreamMoved => {
                let index = r.get_u32()?;
                let destination = r.get_u32()?;
                let name = r.get_string()?;
                let suspended = r.get_bool()?;
                let attr = RecordBufferAttr {
                    maxlength: r.get_u32()?,
                    fragsize: r.get_u32()?,
                };
                let source_usec = r.get_usec()?;
                self.push_record_event(
                    index,
                    StreamEvent::Moved {
                        destination,
                        name,
                        suspended,
                    },
                );
                self.push_record_event(index, StreamEvent::RecordBufferChanged { attr, source_usec });
                Ok(())
            }
            CommandCode::PlaybackBufferAttrChanged => {
                let index = r.get_u32()?;
                let attr = PlaybackBufferAttr {
                    maxlength: r.get_u32()?,
                    tlength: r.get_u32()?,
                    prebuf: r.get_u32()?,
                    minreq: r.get_u32()?,
                };
                let sink_usec = r.get_usec()?;
                self.push_playback_event(index, StreamEvent::PlaybackBufferChanged { attr, sink_usec });
                Ok(())
            }
            CommandCode::RecordBufferAttrChanged => {
                let index = r.get_u32()?;
                let attr = RecordBufferAttr {
                    maxlength: r.get_u32()?,
                    fragsize: r.get_u32()?,
                };
                let source_usec = r.get_usec()?;
                self.push_record_event(index, StreamEvent::RecordBufferChanged { attr, source_usec });
                Ok(())
            }
            CommandCode::PlaybackStreamEvent => {
                let index = r.get_u32()?;
                let event = r.get_string()?.unwrap_or_default();
                let props = r.get_props()?;
                self.push_playback_event(index, StreamEvent::Named { event, props });
                Ok(())
            }
            CommandCode::RecordStreamEvent => {
                let index = r.get_u32()?;
                let event = r.get_string()?.unwrap_or_default();
                let props = r.get_props()?;
                self.push_record_event(index, StreamEvent::Named { event, props });
                Ok(())
            }
            CommandCode::PlaybackStreamKilled => {
                let index = r.get_u32()?;
                warn!(index, "playback stream killed by server");
                if let Some(state) = self.playback.get_mut(&index) {
                    state.killed = true;
                    state.events.push_back(StreamEvent::Killed);
                }
                Ok(())
            }
            CommandCode::RecordStreamKilled => {
                let index = r.get_u32()?;
                warn!(index, "record stream killed by server");
                if let Some(state) = self.record.get_mut(&index) {
                    state.killed = true;
                    state.events.push_back(StreamEvent::Killed);
                }
                Ok(())
            }
            _ => Err(ClientError::UnexpectedCommand { code: code_raw }),
        }
    }

    fn handle_request(&mut self, channel: u32, bytes: u32) -> Result<()> {
        if let Some(state) = self.playback.get_mut(&channel) {
            state.engine.grant(bytes);
            state.events.push_back(StreamEvent::Request { bytes });
            return self.ship_playback(channel);
        }
        if self.upload.contains_key(&channel) {
            if let Some(state) = self.upload.get_mut(&channel) {
                state.engine.grant(bytes);
            }
            return self.ship_upload(channel);
        }
        debug!(channel, bytes, "credit for unknown stream");
        Ok(())
    }

    fn complete(&mut self, tag: u32, state: ReplyState) -> Result<()> {
        match self.pending.get(&tag) {
            Some(ReplyState::Waiting) => {
                self.pending.insert(tag, state);
                Ok(())
            }
            _ => Err(ClientError::UnknownTag { tag }),
        }
    }

    fn push_playback_event(&mut self, index: u32, event: StreamEvent) {
        match self.playback.get_mut(&index) {
            Some(state) => state.events.push_back(event),
            // Post-destruction events are no-ops.
            None => debug!(index, "event for unknown playback stream"),
        }
    }

    fn push_record_event(&mut self, index: u32, event: StreamEvent) {
        match self.record.get_mut(&index) {
            Some(state) => state.events.push_back(event),
            None => debug!(index, "event for unknown record stream"),
        }
    }

    /// Ship whatever the playback engine's credit covers, as one block.
    pub(crate) fn ship_playback(&mut self, index: u32) -> Result<()> {
        loop {
            let chunk = match self.playback.get_mut(&index) {
                Some(state) => state.engine.take_shippable(),
                None => return Ok(()),
            };
            match chunk {
                Some(data) => self.writer.write_memblock(index, &data)?,
                None => return Ok(()),
            }
        }
    }

    /// Ship whatever the upload engine's credit covers, as one block.
    pub(crate) fn ship_upload(&mut self, index: u32) -> Result<()> {
        loop {
            let chunk = match self.upload.get_mut(&index) {
                Some(state) => state.engine.take_shippable(),
                None => return Ok(()),
            };
            match chunk {
                Some(data) => self.writer.write_memblock(index, &data)?,
                None => return Ok(()),
            }
        }
    }

    /// Delete a stream, tolerating "already gone" answers.
    pub(crate) fn delete_stream(&mut self, code: CommandCode, index: u32) -> Result<()> {
        match self.round_trip(code, |w| {
            w.put_u32(index);
            Ok(())
        }) {
            Ok(_) => Ok(()),
            Err(ClientError::Server(ErrorCode::NoEntity)) => {
                debug!(index, "stream already gone on delete");
                Ok(())
            }
            Err(ClientError::Server(ErrorCode::Exist)) => {
                // Some servers answer EXIST where NOENTITY is meant.
                warn!(index, "server answered EXIST to a delete; treating as gone");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Tear everything down after a fatal error: reject all outstanding
    /// requests, propagate to every open stream, and remember the error
    /// for [`Client::connection_error`].
    fn fail_connection(&mut self, err: &ClientError) {
        if matches!(self.state, ConnState::Closed { .. }) {
            return;
        }
        warn!(%err, "connection failed");
        self.state = ConnState::Closed { by_user: false };
        self.conn_error = Some(err.to_string());
        self.pending.clear();
        self.notify_streams_closed();
    }

    fn notify_streams_closed(&mut self) {
        for state in self.playback.values_mut() {
            state.killed = true;
            state.events.push_back(StreamEvent::Closed);
        }
        for state in self.record.values_mut() {
            state.killed = true;
            state.events.push_back(StreamEvent::Closed);
        }
        self.upload.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::os::unix::net::UnixStream;
    use std::thread;

    use pulsewire_proto::{
        ChannelMap, ChannelVolume, FormatInfo, SampleFormat, SampleSpec, Volume, NO_TAG,
    };

    use super::*;
    use crate::playback::PlaybackParams;
    use crate::record::RecordParams;

    /// The server half of a socketpair, speaking raw packets.
    struct FakeServer {
        reader: PacketReader<UnixStream>,
        writer: PacketWriter<UnixStream>,
    }

    impl FakeServer {
        fn pair() -> (FakeServer, Client<UnixStream>) {
            let (server_side, client_side) = UnixStream::pair().unwrap();
            let server = FakeServer {
                reader: PacketReader::new(server_side.try_clone().unwrap()),
                writer: PacketWriter::new(server_side),
            };
            let client = Client::new(client_side.try_clone().unwrap(), client_side);
            (server, client)
        }

        fn read_command(&mut self) -> (u32, u32, Bytes) {
            let packet = self.reader.read_packet().unwrap();
            assert!(packet.is_command());
            let mut r = TagReader::new(&packet.body);
            let code = r.get_u32().unwrap();
            let tag = r.get_u32().unwrap();
            let offset = packet.body.len() - r.remaining();
            (code, tag, packet.body.slice(offset..))
        }

        fn write_reply(&mut self, tag: u32, build: impl FnOnce(&mut TagWriter)) {
            let mut w = TagWriter::new();
            w.put_u32(CommandCode::Reply.to_wire());
            w.put_u32(tag);
            build(&mut w);
            self.writer.write_command(w.as_slice()).unwrap();
        }

        fn write_error(&mut self, tag: u32, code: ErrorCode) {
            let mut w = TagWriter::new();
            w.put_u32(CommandCode::Error.to_wire());
            w.put_u32(tag);
            w.put_u32(code as u32);
            self.writer.write_command(w.as_slice()).unwrap();
        }

        fn write_server_command(&mut self, code: CommandCode, build: impl FnOnce(&mut TagWriter)) {
            let mut w = TagWriter::new();
            w.put_u32(code.to_wire());
            w.put_u32(NO_TAG);
            build(&mut w);
            self.writer.write_command(w.as_slice()).unwrap();
        }

        fn write_memblock(&mut self, channel: u32, data: &[u8]) {
            self.writer.write_memblock(channel, data).unwrap();
        }

        fn reply_create_playback(&mut self, tag: u32, index: u32, requested: u32) {
            let spec = SampleSpec::new(SampleFormat::S16Le, 2, 44_100).unwrap();
            self.write_reply(tag, |w| {
                w.put_u32(index);
                w.put_u32(90 + index);
                w.put_u32(requested);
                w.put_u32(65_536);
                w.put_u32(32_768);
                w.put_u32(16_384);
                w.put_u32(4_096);
                w.put_sample_spec(&spec).unwrap();
                w.put_channel_map(&ChannelMap::wav_default(2).unwrap());
                w.put_u32(0);
                w.put_string(Some("sink"));
                w.put_bool(false);
                w.put_usec(10_000);
                w.put_format_info(&FormatInfo::pcm());
            });
        }

        fn reply_create_record(&mut self, tag: u32, index: u32) {
            let spec = SampleSpec::new(SampleFormat::S16Le, 2, 44_100).unwrap();
            self.write_reply(tag, |w| {
                w.put_u32(index);
                w.put_u32(70 + index);
                w.put_u32(65_536);
                w.put_u32(4_096);
                w.put_sample_spec(&spec).unwrap();
                w.put_channel_map(&ChannelMap::wav_default(2).unwrap());
                w.put_u32(1);
                w.put_string(Some("source"));
                w.put_bool(false);
                w.put_usec(5_000);
                w.put_format_info(&FormatInfo::pcm());
            });
        }
    }

    fn sample_spec() -> SampleSpec {
        SampleSpec::new(SampleFormat::S16Le, 2, 44_100).unwrap()
    }

    #[test]
    fn auth_negotiates_version() {
        let (mut server, mut client) = FakeServer::pair();
        let handle = thread::spawn(move || {
            let (code, tag, rest) = server.read_command();
            assert_eq!(code, CommandCode::Auth.to_wire());
            let mut r = TagReader::new(&rest);
            assert_eq!(r.get_u32().unwrap(), 32);
            assert_eq!(r.get_arbitrary().unwrap().len(), 256);
            // Version 32 plus a shared-memory flag in the high bits.
            server.write_reply(tag, |w| w.put_u32(0x0100_0020));
        });

        let version = client.auth(&[0xAB; 16]).unwrap();
        assert_eq!(version, 32);
        handle.join().unwrap();
    }

    #[test]
    fn auth_rejects_old_server() {
        let (mut server, mut client) = FakeServer::pair();
        let handle = thread::spawn(move || {
            let (_, tag, _) = server.read_command();
            server.write_reply(tag, |w| w.put_u32(16));
        });

        let err = client.auth(&[]).unwrap_err();
        assert!(matches!(
            err,
            ClientError::Version {
                server: 16,
                minimum: 32
            }
        ));
        handle.join().unwrap();
    }

    #[test]
    fn replies_correlate_by_tag_not_order() {
        let (mut server, mut client) = FakeServer::pair();

        let first = client
            .send_request(CommandCode::GetServerInfo, |_| Ok(()))
            .unwrap();
        let second = client.send_request(CommandCode::Stat, |_| Ok(())).unwrap();
        assert_ne!(first, second);

        let handle = thread::spawn(move || {
            let (_, tag_a, _) = server.read_command();
            let (_, tag_b, _) = server.read_command();
            // Answer in reverse order.
            server.write_reply(tag_b, |w| w.put_u32(2));
            server.write_reply(tag_a, |w| w.put_u32(1));
        });

        let body_first = client.wait_reply(first).unwrap();
        assert_eq!(TagReader::new(&body_first).get_u32().unwrap(), 1);
        let body_second = client.wait_reply(second).unwrap();
        assert_eq!(TagReader::new(&body_second).get_u32().unwrap(), 2);

        // Resolved tags leave the table.
        assert!(client.pending.is_empty());
        handle.join().unwrap();
    }

    #[test]
    fn server_error_fails_only_that_request() {
        let (mut server, mut client) = FakeServer::pair();
        let handle = thread::spawn(move || {
            let (_, tag, _) = server.read_command();
            server.write_error(tag, ErrorCode::NoEntity);
            let (_, tag, _) = server.read_command();
            server.write_reply(tag, |w| w.put_u32(9));
        });

        let err = client.lookup_sink("missing").unwrap_err();
        assert!(matches!(
            err,
            ClientError::Server(ErrorCode::NoEntity)
        ));

        // The connection survives a server error.
        assert_eq!(client.lookup_sink("present").unwrap(), 9);
        handle.join().unwrap();
    }

    #[test]
    fn unknown_reply_tag_is_fatal() {
        let (mut server, mut client) = FakeServer::pair();
        let tag = client
            .send_request(CommandCode::GetServerInfo, |_| Ok(()))
            .unwrap();

        let handle = thread::spawn(move || {
            let _ = server.read_command();
            server.write_reply(tag + 100, |w| w.put_u32(0));
            server
        });

        let err = client.wait_reply(tag).unwrap_err();
        assert!(matches!(err, ClientError::UnknownTag { .. }));
        assert!(client.pending.is_empty());
        assert!(client.connection_error().is_some());

        // Everything after the failure reports disconnection.
        let err = client.stat().unwrap_err();
        assert!(matches!(err, ClientError::Disconnected));
        drop(handle.join().unwrap());
    }

    #[test]
    fn subscribe_sends_masks_and_decodes_events() {
        let (mut server, mut client) = FakeServer::pair();
        let handle = thread::spawn(move || {
            let (code, tag, rest) = server.read_command();
            assert_eq!(code, CommandCode::Subscribe.to_wire());
            assert_eq!(TagReader::new(&rest).get_u32().unwrap(), 0x02FF);
            server.write_reply(tag, |_| {});

            // Sink-input change on index 5.
            server.write_server_command(CommandCode::SubscribeEvent, |w| {
                w.put_u32(0x12);
                w.put_u32(5);
            });

            let (code, tag, rest) = server.read_command();
            assert_eq!(code, CommandCode::Subscribe.to_wire());
            assert_eq!(TagReader::new(&rest).get_u32().unwrap(), 0x0000);
            server.write_reply(tag, |_| {});
        });

        let first = client.subscribe().unwrap();
        let second = client.subscribe().unwrap();

        let event = client.next_event().unwrap();
        assert_eq!(event.facility.as_str(), "sink_input");
        assert_eq!(event.operation.as_str(), "change");
        assert_eq!(event.index, 5);

        // Only the last unsubscribe sends the null mask.
        client.unsubscribe(first).unwrap();
        client.unsubscribe(second).unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn memblocks_route_by_channel_and_unknown_channels_drop() {
        let (mut server, mut client) = FakeServer::pair();
        let handle = thread::spawn(move || {
            let (_, tag, _) = server.read_command();
            server.reply_create_record(tag, 4);

            // One block for a channel nobody owns, then a real one.
            server.write_memblock(9, b"lost");
            server.write_memblock(4, b"abcd");
        });

        let (stream, reply) = client
            .create_record_stream(RecordParams::new(sample_spec()))
            .unwrap();
        assert_eq!(stream.index(), 4);
        assert_eq!(reply.source_output_index, 74);

        let data = client.record_read(stream, 64).unwrap();
        assert_eq!(data.as_ref(), b"abcd");
        handle.join().unwrap();
    }

    #[test]
    fn playback_flow_control_end_to_end() {
        let (mut server, mut client) = FakeServer::pair();
        let handle = thread::spawn(move || {
            let (code, tag, _) = server.read_command();
            assert_eq!(code, CommandCode::CreatePlaybackStream.to_wire());
            // Initial credit of 8 bytes (two frames of S16LE stereo).
            server.reply_create_playback(tag, 2, 8);

            let block = server.reader.read_packet().unwrap();
            assert_eq!(block.channel, 2);
            assert_eq!(block.body.len(), 8);
            assert_eq!(block.body.as_ref(), &[1, 2, 3, 4, 5, 6, 7, 8]);

            // Grant more; the client ships the remainder.
            server.write_server_command(CommandCode::Request, |w| {
                w.put_u32(2);
                w.put_u32(8);
            });
            let block = server.reader.read_packet().unwrap();
            assert_eq!(block.body.as_ref(), &[9, 10, 11, 12]);
        });

        let (stream, reply) = client
            .create_playback_stream(PlaybackParams::new(sample_spec()))
            .unwrap();
        assert_eq!(reply.requested_bytes, 8);

        // 12 bytes against 8 bytes of credit: 8 ship now, 4 wait for the
        // next grant.
        client
            .playback_write(stream, &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12])
            .unwrap();

        let events = client.playback_events(stream);
        assert!(events.contains(&StreamEvent::Request { bytes: 8 }));
        handle.join().unwrap();
    }

    #[test]
    fn delete_tolerates_noentity_and_exist() {
        let (mut server, mut client) = FakeServer::pair();
        let handle = thread::spawn(move || {
            for code in [ErrorCode::NoEntity, ErrorCode::Exist] {
                let (_, tag, _) = server.read_command();
                server.write_error(tag, code);
            }
            let (_, tag, _) = server.read_command();
            server.write_error(tag, ErrorCode::Access);
        });

        client
            .delete_stream(CommandCode::DeletePlaybackStream, 1)
            .unwrap();
        client
            .delete_stream(CommandCode::DeletePlaybackStream, 2)
            .unwrap();
        let err = client
            .delete_stream(CommandCode::DeletePlaybackStream, 3)
            .unwrap_err();
        assert!(matches!(err, ClientError::Server(ErrorCode::Access)));
        handle.join().unwrap();
    }

    #[test]
    fn stream_killed_marks_handle_dead() {
        let (mut server, mut client) = FakeServer::pair();
        let handle = thread::spawn(move || {
            let (_, tag, _) = server.read_command();
            server.reply_create_playback(tag, 6, 4);
            server.write_server_command(CommandCode::PlaybackStreamKilled, |w| {
                w.put_u32(6);
            });
            // Give the client something to pump afterwards.
            server.write_server_command(CommandCode::SubscribeEvent, |w| {
                w.put_u32(0x00);
                w.put_u32(0);
            });
        });

        let (stream, _) = client
            .create_playback_stream(PlaybackParams::new(sample_spec()))
            .unwrap();
        let _ = client.next_event().unwrap();

        let events = client.playback_events(stream);
        assert!(events.contains(&StreamEvent::Killed));
        let err = client.playback_write(stream, &[0; 4]).unwrap_err();
        assert!(matches!(err, ClientError::StreamKilled { index: 6 }));
        handle.join().unwrap();
    }

    #[test]
    fn disconnect_rejects_outstanding_and_notifies_streams() {
        let (mut server, mut client) = FakeServer::pair();
        let handle = thread::spawn(move || {
            let (_, tag, _) = server.read_command();
            server.reply_create_playback(tag, 1, 4);
            // Drop both halves: the client sees EOF.
        });

        let (stream, _) = client
            .create_playback_stream(PlaybackParams::new(sample_spec()))
            .unwrap();
        handle.join().unwrap();

        let err = client.pump_one().unwrap_err();
        assert!(matches!(err, ClientError::Closed));
        assert!(client.connection_error().is_some());

        // Everything after the failure reports disconnection.
        let err = client.stat().unwrap_err();
        assert!(matches!(err, ClientError::Disconnected));

        let events = client.playback_events(stream);
        assert!(events.contains(&StreamEvent::Closed));
    }

    #[test]
    fn user_close_reports_no_connection_error() {
        let (_server, mut client) = FakeServer::pair();
        client.close();
        assert!(client.connection_error().is_none());
        assert!(matches!(client.stat().unwrap_err(), ClientError::Disconnected));
        // Closing twice is a no-op.
        client.close();
    }

    #[test]
    fn tags_skip_values_still_outstanding() {
        let (_server, mut client) = FakeServer::pair();
        let tag = client
            .send_request(CommandCode::GetServerInfo, |_| Ok(()))
            .unwrap();
        assert_eq!(tag, 0);
        client.next_tag = 0; // force a wrap onto the outstanding tag
        let second = client.alloc_tag();
        assert_eq!(second, 1);
    }

    #[test]
    fn upload_ships_within_granted_length() {
        let (mut server, mut client) = FakeServer::pair();
        let handle = thread::spawn(move || {
            let (code, tag, rest) = server.read_command();
            assert_eq!(code, CommandCode::CreateUploadStream.to_wire());
            let mut r = TagReader::new(&rest);
            assert_eq!(r.get_string().unwrap().as_deref(), Some("beep"));
            server.write_reply(tag, |w| {
                w.put_u32(11);
                w.put_u32(8);
            });

            let block = server.reader.read_packet().unwrap();
            assert_eq!(block.channel, 11);
            assert_eq!(block.body.len(), 8);

            let (code, tag, _) = server.read_command();
            assert_eq!(code, CommandCode::FinishUploadStream.to_wire());
            server.write_reply(tag, |_| {});
        });

        let params = crate::upload::UploadParams::new("beep", sample_spec(), 8);
        let (stream, reply) = client.create_upload_stream(params).unwrap();
        assert_eq!(reply.requested_bytes, 8);

        client.upload_write(stream, &[0; 8]).unwrap();
        let err = client.upload_write(stream, &[0; 4]).unwrap_err();
        assert!(matches!(err, ClientError::MaximumLengthReached));

        client.finish_upload(stream).unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn volume_out_of_range_fails_before_the_wire() {
        let (_server, mut client) = FakeServer::pair();
        let bad = ChannelVolume::from_volumes(vec![Volume(0x9000_0000)]).unwrap();
        let err = client
            .set_sink_volume(crate::commands::Target::Index(0), &bad)
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidArgument(_)));
    }
}
