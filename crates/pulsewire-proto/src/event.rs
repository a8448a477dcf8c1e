//! Subscribe-event codes.
//!
//! A subscribe event carries a single u32 whose low nibble names the
//! facility (what kind of object changed) and whose bits 4-5 name the
//! operation (what happened to it).

use crate::error::{ProtoError, Result};

/// Facility selection bits for the SUBSCRIBE command mask.
pub mod mask {
    pub const NULL: u32 = 0x0000;
    pub const SINK: u32 = 0x0001;
    pub const SOURCE: u32 = 0x0002;
    pub const SINK_INPUT: u32 = 0x0004;
    pub const SOURCE_OUTPUT: u32 = 0x0008;
    pub const MODULE: u32 = 0x0010;
    pub const CLIENT: u32 = 0x0020;
    pub const SAMPLE_CACHE: u32 = 0x0040;
    pub const SERVER: u32 = 0x0080;
    pub const AUTOLOAD: u32 = 0x0100;
    pub const CARD: u32 = 0x0200;
    pub const ALL: u32 = 0x02FF;
}

const FACILITY_BITS: u32 = 0x0F;
const OPERATION_BITS: u32 = 0x30;

/// The kind of object a subscribe event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facility {
    Sink,
    Source,
    SinkInput,
    SourceOutput,
    Module,
    Client,
    SampleCache,
    Server,
    Autoload,
    Card,
}

impl Facility {
    /// A stable lowercase name for event routing and display.
    pub fn as_str(self) -> &'static str {
        match self {
            Facility::Sink => "sink",
            Facility::Source => "source",
            Facility::SinkInput => "sink_input",
            Facility::SourceOutput => "source_output",
            Facility::Module => "module",
            Facility::Client => "client",
            Facility::SampleCache => "sample_cache",
            Facility::Server => "server",
            Facility::Autoload => "autoload",
            Facility::Card => "card",
        }
    }
}

/// What happened to the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOp {
    New,
    Change,
    Remove,
}

impl EventOp {
    /// A stable lowercase name for event routing and display.
    pub fn as_str(self) -> &'static str {
        match self {
            EventOp::New => "new",
            EventOp::Change => "change",
            EventOp::Remove => "remove",
        }
    }
}

/// A decoded subscribe event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscribeEvent {
    /// Index of the object the event refers to.
    pub index: u32,
    /// The raw event code as it arrived.
    pub code: u32,
    pub facility: Facility,
    pub operation: EventOp,
}

impl SubscribeEvent {
    /// Decompose an event code and index.
    ///
    /// Unknown facility or operation bits are a protocol error.
    pub fn decode(code: u32, index: u32) -> Result<Self> {
        let facility = match code & FACILITY_BITS {
            0 => Facility::Sink,
            1 => Facility::Source,
            2 => Facility::SinkInput,
            3 => Facility::SourceOutput,
            4 => Facility::Module,
            5 => Facility::Client,
            6 => Facility::SampleCache,
            7 => Facility::Server,
            8 => Facility::Autoload,
            9 => Facility::Card,
            _ => return Err(ProtoError::UnknownEvent { code }),
        };
        let operation = match code & OPERATION_BITS {
            0x00 => EventOp::New,
            0x10 => EventOp::Change,
            0x20 => EventOp::Remove,
            _ => return Err(ProtoError::UnknownEvent { code }),
        };
        Ok(Self {
            index,
            code,
            facility,
            operation,
        })
    }
}
