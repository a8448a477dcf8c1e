//! Session layer for the PulseAudio native protocol.
//!
//! A [`Client`] owns one connection to the daemon and multiplexes
//! everything over it: request/reply commands correlated by tag,
//! out-of-band subscribe events, and PCM memory blocks routed to streams
//! by channel id. Playback is credit-driven (the server asks, the client
//! ships frame-aligned blocks), record delivery is bounded and pull-based.

pub mod client;
pub mod commands;
pub mod error;
pub mod events;
pub mod introspect;
pub mod playback;
pub mod record;
pub mod upload;
pub mod wire;

pub use client::{Client, Config, Subscription};
pub use commands::{ModuleArgs, Target};
pub use error::{ClientError, Result};
pub use events::{PlaybackBufferAttr, RecordBufferAttr, StreamEvent};
pub use introspect::{
    ClientInfo, ModuleInfo, PortInfo, ServerInfo, SinkInfo, SinkInputInfo, SourceInfo,
    SourceOutputInfo, StatInfo,
};
pub use playback::{
    CreatePlaybackReply, PlaybackEngine, PlaybackFlags, PlaybackParams, PlaybackStream,
};
pub use record::{CreateRecordReply, RecordEngine, RecordFlags, RecordParams, RecordStream};
pub use upload::{CreateUploadReply, UploadParams, UploadStream};
pub use wire::{PacketReader, PacketWriter};
