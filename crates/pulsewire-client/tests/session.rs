//! A scripted end-to-end session against a fake server on a socketpair:
//! authentication, introspection, playback with flow control, drain, and a
//! tolerated delete.

use std::os::unix::net::UnixStream;
use std::thread;

use pulsewire_client::{
    Client, ClientError, PacketReader, PacketWriter, PlaybackParams, StreamEvent,
};
use pulsewire_proto::{
    ChannelMap, CommandCode, ErrorCode, FormatInfo, SampleFormat, SampleSpec, TagReader,
    TagWriter, NO_TAG,
};

struct Script {
    reader: PacketReader<UnixStream>,
    writer: PacketWriter<UnixStream>,
}

impl Script {
    fn read_command(&mut self) -> (u32, u32, bytes::Bytes) {
        let packet = self.reader.read_packet().unwrap();
        assert!(packet.is_command(), "expected a command packet");
        let mut r = TagReader::new(&packet.body);
        let code = r.get_u32().unwrap();
        let tag = r.get_u32().unwrap();
        let offset = packet.body.len() - r.remaining();
        (code, tag, packet.body.slice(offset..))
    }

    fn reply(&mut self, tag: u32, build: impl FnOnce(&mut TagWriter)) {
        let mut w = TagWriter::new();
        w.put_u32(CommandCode::Reply.to_wire());
        w.put_u32(tag);
        build(&mut w);
        self.writer.write_command(w.as_slice()).unwrap();
    }

    fn error(&mut self, tag: u32, code: ErrorCode) {
        let mut w = TagWriter::new();
        w.put_u32(CommandCode::Error.to_wire());
        w.put_u32(tag);
        w.put_u32(code as u32);
        self.writer.write_command(w.as_slice()).unwrap();
    }

    fn push(&mut self, code: CommandCode, build: impl FnOnce(&mut TagWriter)) {
        let mut w = TagWriter::new();
        w.put_u32(code.to_wire());
        w.put_u32(NO_TAG);
        build(&mut w);
        self.writer.write_command(w.as_slice()).unwrap();
    }
}

fn spec() -> SampleSpec {
    SampleSpec::new(SampleFormat::S16Le, 2, 44_100).unwrap()
}

fn run_server(mut s: Script) {
    // AUTH: check the version and the padded cookie, answer with version
    // 32 plus a shared-memory flag the client must ignore.
    let (code, tag, rest) = s.read_command();
    assert_eq!(code, CommandCode::Auth.to_wire());
    let mut r = TagReader::new(&rest);
    assert_eq!(r.get_u32().unwrap(), 32);
    assert_eq!(r.get_arbitrary().unwrap().len(), 256);
    s.reply(tag, |w| w.put_u32(0x0100_0020));

    // SET_CLIENT_NAME: echo back a client index.
    let (code, tag, rest) = s.read_command();
    assert_eq!(code, CommandCode::SetClientName.to_wire());
    let mut r = TagReader::new(&rest);
    let props = r.get_props().unwrap();
    assert_eq!(props.get("application.name"), Some("session-test"));
    s.reply(tag, |w| w.put_u32(42));

    // GET_SERVER_INFO.
    let (code, tag, _) = s.read_command();
    assert_eq!(code, CommandCode::GetServerInfo.to_wire());
    s.reply(tag, |w| {
        w.put_string(Some("pulseaudio"));
        w.put_string(Some("16.1"));
        w.put_string(Some("user"));
        w.put_string(Some("host"));
        w.put_sample_spec(&spec()).unwrap();
        w.put_string(Some("@DEFAULT_SINK@"));
        w.put_string(Some("@DEFAULT_SOURCE@"));
        w.put_u32(0xBEEF);
        w.put_channel_map(&ChannelMap::wav_default(2).unwrap());
    });

    // CREATE_PLAYBACK_STREAM: grant 4 bytes of initial credit.
    let (code, tag, _) = s.read_command();
    assert_eq!(code, CommandCode::CreatePlaybackStream.to_wire());
    s.reply(tag, |w| {
        w.put_u32(3);
        w.put_u32(17);
        w.put_u32(4);
        w.put_u32(65_536);
        w.put_u32(32_768);
        w.put_u32(16_384);
        w.put_u32(4_096);
        w.put_sample_spec(&spec()).unwrap();
        w.put_channel_map(&ChannelMap::wav_default(2).unwrap());
        w.put_u32(0);
        w.put_string(Some("alsa_output"));
        w.put_bool(false);
        w.put_usec(9_000);
        w.put_format_info(&FormatInfo::pcm());
    });

    // First frame-aligned block under the initial credit.
    let block = s.reader.read_packet().unwrap();
    assert_eq!(block.channel, 3);
    assert_eq!(block.body.as_ref(), &[1, 2, 3, 4]);

    // Grant the rest; expect the remainder.
    s.push(CommandCode::Request, |w| {
        w.put_u32(3);
        w.put_u32(16);
    });
    let block = s.reader.read_packet().unwrap();
    assert_eq!(block.body.as_ref(), &[5, 6, 7, 8]);

    // DRAIN, then a delete the server answers with NOENTITY.
    let (code, tag, _) = s.read_command();
    assert_eq!(code, CommandCode::DrainPlaybackStream.to_wire());
    s.reply(tag, |_| {});

    let (code, tag, _) = s.read_command();
    assert_eq!(code, CommandCode::DeletePlaybackStream.to_wire());
    s.error(tag, ErrorCode::NoEntity);
}

#[test]
fn scripted_session() {
    let (server_side, client_side) = UnixStream::pair().unwrap();
    let script = Script {
        reader: PacketReader::new(server_side.try_clone().unwrap()),
        writer: PacketWriter::new(server_side),
    };
    let server = thread::spawn(move || run_server(script));

    let mut client = Client::new(client_side.try_clone().unwrap(), client_side);
    assert_eq!(client.auth(&[0x11; 300]).unwrap(), 32);

    let mut props = pulsewire_proto::Props::new();
    props.set("application.name", "session-test");
    assert_eq!(client.set_client_name(&props).unwrap(), 42);

    let info = client.server_info().unwrap();
    assert_eq!(info.package_name.as_deref(), Some("pulseaudio"));
    assert_eq!(info.default_sink_name.as_deref(), Some("@DEFAULT_SINK@"));

    let (stream, reply) = client
        .create_playback_stream(PlaybackParams::new(spec()))
        .unwrap();
    assert_eq!(stream.index(), 3);
    assert_eq!(reply.sink_input_index, 17);
    assert_eq!(reply.requested_bytes, 4);

    client.playback_write(stream, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
    let events = client.playback_events(stream);
    assert!(events.contains(&StreamEvent::Request { bytes: 16 }));

    client.playback_drain(stream).unwrap();
    client.delete_playback_stream(stream).unwrap();

    client.close();
    assert!(matches!(
        client.server_info().unwrap_err(),
        ClientError::Disconnected
    ));
    server.join().unwrap();
}
