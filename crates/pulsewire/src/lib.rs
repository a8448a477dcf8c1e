//! Client for the PulseAudio native protocol (version >= 32).
//!
//! pulsewire speaks the daemon's length-prefixed packet framing and
//! tagstruct value encoding over a local stream socket, multiplexes
//! request/reply commands with out-of-band events, and moves PCM bytes
//! through credit-controlled playback, record, and upload streams.
//!
//! # Crate Structure
//!
//! - [`proto`] — Wire codec: descriptors, tagstructs, property lists, codes
//! - [`transport`] — The daemon socket and the authentication cookie
//! - [`client`] — Dispatcher, commands, introspection, stream engines

/// Re-export wire codec types.
pub mod proto {
    pub use pulsewire_proto::*;
}

/// Re-export transport types.
pub mod transport {
    pub use pulsewire_transport::*;
}

/// Re-export session types.
pub mod client {
    pub use pulsewire_client::*;
}

pub use pulsewire_client::{Client, ClientError, Config};
