/// Errors that can occur while encoding or decoding wire data.
#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    /// The next byte was not the tag the reader expected.
    #[error("unexpected tag {found:#04x}, expected {expected:#04x}")]
    UnexpectedTag { expected: u8, found: u8 },

    /// The buffer ended before the value it promised.
    #[error("short read: needed {needed} more bytes, {remaining} remaining")]
    ShortRead { needed: usize, remaining: usize },

    /// A STRING payload had no NUL terminator before the end of the body.
    #[error("unterminated string")]
    UnterminatedString,

    /// A STRING payload was not valid UTF-8.
    #[error("invalid UTF-8 in string: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// A byte that does not name any tagstruct type.
    #[error("unknown tag byte {tag:#04x}")]
    UnknownTag { tag: u8 },

    /// A tag that is recognized but never carried on protocol >= 32.
    #[error("unsupported tag {tag:#04x}")]
    UnsupportedTag { tag: u8 },

    /// A sample spec or channel map with an out-of-range channel count.
    #[error("invalid channel count {channels} (limit {limit})")]
    InvalidChannels { channels: usize, limit: usize },

    /// A volume array with an out-of-range length.
    #[error("invalid volume count {count} (expected 1..={max})")]
    InvalidVolumeCount { count: usize, max: usize },

    /// A packet body larger than the configured maximum.
    #[error("packet too large ({size} bytes, max {max})")]
    PacketTooLarge { size: usize, max: usize },

    /// An unknown sample format code.
    #[error("unknown sample format code {code}")]
    UnknownSampleFormat { code: u8 },

    /// An unknown command code at the head of a command packet.
    #[error("unknown command code {code}")]
    UnknownCommand { code: u32 },

    /// A subscribe event whose facility or operation bits name nothing.
    #[error("unknown subscribe event code {code:#x}")]
    UnknownEvent { code: u32 },
}

pub type Result<T> = std::result::Result<T, ProtoError>;
