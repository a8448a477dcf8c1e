//! Command and error code enumerations.
//!
//! The numeric values mirror the server's native-common header and must not
//! be reordered; the wire carries the raw numbers.

use crate::error::{ProtoError, Result};

macro_rules! command_codes {
    ($($name:ident = $value:expr,)*) => {
        /// Command codes carried at the head of every command packet.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u32)]
        pub enum CommandCode {
            $($name = $value,)*
        }

        impl CommandCode {
            /// Map a wire value back to a command code.
            pub fn from_wire(code: u32) -> Result<Self> {
                match code {
                    $($value => Ok(CommandCode::$name),)*
                    other => Err(ProtoError::UnknownCommand { code: other }),
                }
            }
        }
    };
}

command_codes! {
    Error = 0,
    Timeout = 1,
    Reply = 2,

    CreatePlaybackStream = 3,
    DeletePlaybackStream = 4,
    CreateRecordStream = 5,
    DeleteRecordStream = 6,
    Exit = 7,
    Auth = 8,
    SetClientName = 9,
    LookupSink = 10,
    LookupSource = 11,
    DrainPlaybackStream = 12,
    Stat = 13,
    GetPlaybackLatency = 14,
    CreateUploadStream = 15,
    DeleteUploadStream = 16,
    FinishUploadStream = 17,
    PlaySample = 18,
    RemoveSample = 19,

    GetServerInfo = 20,
    GetSinkInfo = 21,
    GetSinkInfoList = 22,
    GetSourceInfo = 23,
    GetSourceInfoList = 24,
    GetModuleInfo = 25,
    GetModuleInfoList = 26,
    GetClientInfo = 27,
    GetClientInfoList = 28,
    GetSinkInputInfo = 29,
    GetSinkInputInfoList = 30,
    GetSourceOutputInfo = 31,
    GetSourceOutputInfoList = 32,
    GetSampleInfo = 33,
    GetSampleInfoList = 34,
    Subscribe = 35,

    SetSinkVolume = 36,
    SetSinkInputVolume = 37,
    SetSourceVolume = 38,
    SetSinkMute = 39,
    SetSourceMute = 40,

    CorkPlaybackStream = 41,
    FlushPlaybackStream = 42,
    TriggerPlaybackStream = 43,

    SetDefaultSink = 44,
    SetDefaultSource = 45,

    SetPlaybackStreamName = 46,
    SetRecordStreamName = 47,

    KillClient = 48,
    KillSinkInput = 49,
    KillSourceOutput = 50,

    LoadModule = 51,
    UnloadModule = 52,

    GetRecordLatency = 57,
    CorkRecordStream = 58,
    FlushRecordStream = 59,
    PrebufPlaybackStream = 60,

    Request = 61,
    Overflow = 62,
    Underflow = 63,
    PlaybackStreamKilled = 64,
    RecordStreamKilled = 65,
    SubscribeEvent = 66,

    MoveSinkInput = 67,
    MoveSourceOutput = 68,
    SetSinkInputMute = 69,
    SuspendSink = 70,
    SuspendSource = 71,

    SetPlaybackStreamBufferAttr = 72,
    SetRecordStreamBufferAttr = 73,
    UpdatePlaybackStreamSampleRate = 74,
    UpdateRecordStreamSampleRate = 75,

    PlaybackStreamSuspended = 76,
    RecordStreamSuspended = 77,
    PlaybackStreamMoved = 78,
    RecordStreamMoved = 79,

    UpdateRecordStreamProplist = 80,
    UpdatePlaybackStreamProplist = 81,
    UpdateClientProplist = 82,
    RemoveRecordStreamProplist = 83,
    RemovePlaybackStreamProplist = 84,
    RemoveClientProplist = 85,

    Started = 86,
    Extension = 87,

    GetCardInfo = 88,
    GetCardInfoList = 89,
    SetCardProfile = 90,

    ClientEvent = 91,
    PlaybackStreamEvent = 92,
    RecordStreamEvent = 93,

    PlaybackBufferAttrChanged = 94,
    RecordBufferAttrChanged = 95,

    SetSinkPort = 96,
    SetSourcePort = 97,

    SetSourceOutputVolume = 98,
    SetSourceOutputMute = 99,

    SetPortLatencyOffset = 100,

    EnableSrbchannel = 101,
    DisableSrbchannel = 102,
    RegisterMemfdShmid = 103,
}

impl CommandCode {
    /// The wire value.
    pub fn to_wire(self) -> u32 {
        self as u32
    }
}

macro_rules! error_codes {
    ($($name:ident = $value:expr,)*) => {
        /// Server-side error codes carried in ERROR replies.
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[repr(u32)]
        pub enum ErrorCode {
            $($name = $value,)*
        }

        impl ErrorCode {
            /// Map a wire value, falling back to `Unknown` for values this
            /// client has no name for.
            pub fn from_wire(code: u32) -> Self {
                match code {
                    $($value => ErrorCode::$name,)*
                    _ => ErrorCode::Unknown,
                }
            }
        }
    };
}

error_codes! {
    Ok = 0,
    Access = 1,
    Command = 2,
    Invalid = 3,
    Exist = 4,
    NoEntity = 5,
    ConnectionRefused = 6,
    Protocol = 7,
    Timeout = 8,
    AuthKey = 9,
    Internal = 10,
    ConnectionTerminated = 11,
    Killed = 12,
    InvalidServer = 13,
    ModInitFailed = 14,
    BadState = 15,
    NoData = 16,
    Version = 17,
    TooLarge = 18,
    NotSupported = 19,
    Unknown = 20,
    NoExtension = 21,
    Obsolete = 22,
    NotImplemented = 23,
    Forked = 24,
    Io = 25,
    Busy = 26,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            ErrorCode::Ok => "ok",
            ErrorCode::Access => "access denied",
            ErrorCode::Command => "unknown command",
            ErrorCode::Invalid => "invalid argument",
            ErrorCode::Exist => "entity exists",
            ErrorCode::NoEntity => "no such entity",
            ErrorCode::ConnectionRefused => "connection refused",
            ErrorCode::Protocol => "protocol error",
            ErrorCode::Timeout => "timeout",
            ErrorCode::AuthKey => "no authentication key",
            ErrorCode::Internal => "internal error",
            ErrorCode::ConnectionTerminated => "connection terminated",
            ErrorCode::Killed => "entity killed",
            ErrorCode::InvalidServer => "invalid server",
            ErrorCode::ModInitFailed => "module initialization failed",
            ErrorCode::BadState => "bad state",
            ErrorCode::NoData => "no data",
            ErrorCode::Version => "incompatible protocol version",
            ErrorCode::TooLarge => "data too large",
            ErrorCode::NotSupported => "operation not supported",
            ErrorCode::Unknown => "unknown error",
            ErrorCode::NoExtension => "no such extension",
            ErrorCode::Obsolete => "obsolete functionality",
            ErrorCode::NotImplemented => "missing implementation",
            ErrorCode::Forked => "client forked",
            ErrorCode::Io => "input/output error",
            ErrorCode::Busy => "device or resource busy",
        };
        f.write_str(text)
    }
}
