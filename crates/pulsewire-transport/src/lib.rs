//! Transport layer: the local stream socket to the sound server and the
//! authentication cookie it expects.

pub mod cookie;
pub mod error;
pub mod socket;

pub use cookie::{default_cookie_path, load_default, load_from, COOKIE_SIZE};
pub use error::{Result, TransportError};
pub use socket::{default_socket_path, PulseStream};
