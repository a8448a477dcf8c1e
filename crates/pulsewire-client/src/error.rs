use pulsewire_proto::{ErrorCode, ProtoError};
use pulsewire_transport::TransportError;

/// Errors that can occur in client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Wire-level encode/decode error. Fatal to the connection.
    #[error("protocol error: {0}")]
    Proto(#[from] ProtoError),

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// An I/O error on the connection. Fatal to the connection.
    #[error("connection I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The server answered a request with an ERROR reply.
    #[error("server error: {0}")]
    Server(ErrorCode),

    /// A reply or error arrived for a tag with no outstanding request.
    #[error("reply for unknown request tag {tag}")]
    UnknownTag { tag: u32 },

    /// The server sent a command this client never expects.
    #[error("unexpected command {code} from server")]
    UnexpectedCommand { code: u32 },

    /// The stream ended cleanly between packets.
    #[error("connection closed")]
    Closed,

    /// The stream ended in the middle of a packet.
    #[error("connection closed mid-packet")]
    TruncatedPacket,

    /// The connection is gone; outstanding and future requests fail.
    #[error("disconnected from server")]
    Disconnected,

    /// The negotiated protocol version is too old for this client.
    #[error("server speaks protocol version {server}, need at least {minimum}")]
    Version { server: u16, minimum: u16 },

    /// A playback or upload write would exceed the stream's byte limit.
    #[error("maximum stream length reached")]
    MaximumLengthReached,

    /// The stream handle no longer names a live stream.
    #[error("no such stream (index {index})")]
    NoSuchStream { index: u32 },

    /// The server killed the stream out from under the client.
    #[error("stream {index} killed by server")]
    StreamKilled { index: u32 },

    /// An argument was rejected before anything hit the wire.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
}

impl ClientError {
    /// Whether this error ends the connection for everyone, as opposed to
    /// failing only the request that caused it.
    pub fn is_fatal(&self) -> bool {
        match self {
            ClientError::Proto(_)
            | ClientError::Io(_)
            | ClientError::UnknownTag { .. }
            | ClientError::UnexpectedCommand { .. }
            | ClientError::Closed
            | ClientError::TruncatedPacket
            | ClientError::Disconnected => true,
            ClientError::Transport(_)
            | ClientError::Server(_)
            | ClientError::Version { .. }
            | ClientError::MaximumLengthReached
            | ClientError::NoSuchStream { .. }
            | ClientError::StreamKilled { .. }
            | ClientError::InvalidArgument(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
