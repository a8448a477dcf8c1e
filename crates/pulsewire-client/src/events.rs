//! Server-to-client stream notifications.

use pulsewire_proto::Props;

/// Buffer metrics the server reports for a playback stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackBufferAttr {
    pub maxlength: u32,
    pub tlength: u32,
    pub prebuf: u32,
    pub minreq: u32,
}

/// Buffer metrics the server reports for a record stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordBufferAttr {
    pub maxlength: u32,
    pub fragsize: u32,
}

/// A notification delivered to a playback or record stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// The device actually started playing.
    Started,
    /// The server granted additional send credit.
    Request { bytes: u32 },
    /// The server ran out of data at the given stream offset.
    Underflow { offset: i64 },
    /// The server-side buffer overflowed.
    Overflow,
    /// The device was suspended or resumed.
    Suspended { suspended: bool },
    /// The stream was moved to another device.
    Moved {
        destination: u32,
        name: Option<String>,
        suspended: bool,
    },
    /// Playback buffer metrics changed.
    PlaybackBufferChanged {
        attr: PlaybackBufferAttr,
        sink_usec: u64,
    },
    /// Record buffer metrics changed.
    RecordBufferChanged {
        attr: RecordBufferAttr,
        source_usec: u64,
    },
    /// A generic named event with properties.
    Named { event: String, props: Props },
    /// Record delivery paused because the consumer buffer filled.
    Overrun,
    /// The record stream reached its byte cap and ended.
    Ended,
    /// The server killed the stream.
    Killed,
    /// The connection to the server is gone.
    Closed,
}
