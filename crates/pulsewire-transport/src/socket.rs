//! Client-side UNIX-domain socket connection to the daemon.

use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TransportError};

/// Unix `sockaddr_un.sun_path` is typically 108 bytes on Linux, 104 on macOS.
#[cfg(target_os = "linux")]
const MAX_PATH_LEN: usize = 108;
#[cfg(not(target_os = "linux"))]
const MAX_PATH_LEN: usize = 104;

/// Resolve the daemon socket path from the environment.
///
/// `PULSE_SERVER` wins (with a `unix:` prefix stripped if present), then
/// `XDG_RUNTIME_DIR`, then the conventional `/run/user/<uid>` runtime
/// directory.
pub fn default_socket_path() -> PathBuf {
    if let Ok(server) = std::env::var("PULSE_SERVER") {
        let path = server.strip_prefix("unix:").unwrap_or(&server);
        return PathBuf::from(path);
    }
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        return Path::new(&runtime_dir).join("pulse/native");
    }
    // SAFETY: getuid never fails and touches no caller state.
    let uid = unsafe { libc::getuid() };
    PathBuf::from(format!("/run/user/{uid}/pulse/native"))
}

/// A connected stream to the daemon.
///
/// Wraps a Unix domain socket; `try_clone` yields an independently owned
/// descriptor so one half can read while the other writes.
pub struct PulseStream {
    inner: UnixStream,
}

impl PulseStream {
    /// Connect to the daemon at the default socket path.
    pub fn connect_default() -> Result<Self> {
        Self::connect(default_socket_path())
    }

    /// Connect to the daemon at an explicit socket path.
    pub fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let path_bytes = path.as_os_str().len();
        if path_bytes >= MAX_PATH_LEN {
            return Err(TransportError::PathTooLong {
                path: path.to_path_buf(),
                len: path_bytes,
                max: MAX_PATH_LEN,
            });
        }

        let stream = UnixStream::connect(path).map_err(|e| TransportError::Connect {
            path: path.to_path_buf(),
            source: e,
        })?;
        debug!(?path, "connected to sound server socket");
        Ok(Self { inner: stream })
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_read_timeout(timeout).map_err(Into::into)
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_write_timeout(timeout).map_err(Into::into)
    }

    /// Try to clone this stream (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        let cloned = self.inner.try_clone()?;
        Ok(Self { inner: cloned })
    }

    /// Shut down both directions of the stream.
    pub fn shutdown(&self) -> Result<()> {
        self.inner
            .shutdown(std::net::Shutdown::Both)
            .map_err(Into::into)
    }
}

impl Read for PulseStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for PulseStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl std::fmt::Debug for PulseStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PulseStream").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::net::UnixListener;

    #[test]
    fn path_too_long_rejected() {
        let long_path = "/tmp/".to_string() + &"a".repeat(200) + ".sock";
        let result = PulseStream::connect(&long_path);
        assert!(matches!(result, Err(TransportError::PathTooLong { .. })));
    }

    #[test]
    fn connect_to_listening_socket() {
        let dir = std::env::temp_dir().join(format!("pulsewire-sock-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let sock_path = dir.join("native");

        let listener = UnixListener::bind(&sock_path).unwrap();
        let client = PulseStream::connect(&sock_path).unwrap();
        let (mut server, _) = listener.accept().unwrap();

        let mut client_writer = client.try_clone().unwrap();
        client_writer.write_all(b"ping").unwrap();
        let mut buf = [0u8; 4];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_socket_is_connect_error() {
        let result = PulseStream::connect("/nonexistent/pulse/native");
        assert!(matches!(result, Err(TransportError::Connect { .. })));
    }

    #[test]
    fn default_path_prefers_pulse_server() {
        // Environment mutation: keep this test single-purpose.
        let prev = std::env::var_os("PULSE_SERVER");
        std::env::set_var("PULSE_SERVER", "unix:/tmp/custom/native");
        let path = default_socket_path();
        match prev {
            Some(value) => std::env::set_var("PULSE_SERVER", value),
            None => std::env::remove_var("PULSE_SERVER"),
        }
        assert_eq!(path, PathBuf::from("/tmp/custom/native"));
    }
}
