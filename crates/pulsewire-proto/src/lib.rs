//! Wire codec for the PulseAudio native protocol (version >= 32).
//!
//! This is the I/O-free layer: packet descriptors, the self-describing
//! tagstruct value encoding, property lists, and the command/error/event
//! code enumerations. Byte layouts match the server bit-for-bit.

pub mod command;
pub mod descriptor;
pub mod error;
pub mod event;
pub mod proplist;
pub mod tag;
pub mod tagstruct;
pub mod types;

pub use command::{CommandCode, ErrorCode};
pub use descriptor::{
    decode_packet, encode_packet, Descriptor, Packet, DEFAULT_MAX_BODY, DESCRIPTOR_SIZE,
};
pub use error::{ProtoError, Result};
pub use event::{mask, EventOp, Facility, SubscribeEvent};
pub use proplist::{PropEntry, Props};
pub use tag::Tag;
pub use tagstruct::{TagReader, TagWriter};
pub use types::{
    encoding, ChannelMap, ChannelPosition, ChannelVolume, FormatInfo, SampleFormat, SampleSpec,
    Volume, COOKIE_SIZE, DEFAULT_SINK_NAME, DEFAULT_SOURCE_NAME, MAX_CHANNELS, NO_INDEX, NO_TAG,
    NO_VALUE, PROTOCOL_VERSION,
};
