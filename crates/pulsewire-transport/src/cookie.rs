//! Authentication cookie loading.
//!
//! The daemon accepts a 256-byte cookie shared through the filesystem.
//! A missing cookie is tolerated: a zero-filled cookie is sent and the
//! server may still accept the connection via UID/GID credentials on the
//! local socket.

use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Size of the cookie sent with AUTH.
pub const COOKIE_SIZE: usize = 256;

/// Resolve the cookie file path from the environment.
///
/// `PULSE_COOKIE` wins; otherwise `<home>/.config/pulse/cookie`.
pub fn default_cookie_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("PULSE_COOKIE") {
        return Some(PathBuf::from(path));
    }
    std::env::var_os("HOME").map(|home| Path::new(&home).join(".config/pulse/cookie"))
}

/// Load the cookie from the default location.
///
/// Absence or a short file yields a zero-padded cookie rather than an error.
pub fn load_default() -> [u8; COOKIE_SIZE] {
    match default_cookie_path() {
        Some(path) => load_from(&path),
        None => {
            debug!("no home directory; sending zero cookie");
            [0u8; COOKIE_SIZE]
        }
    }
}

/// Load a cookie from an explicit path, zero-padding short or missing files.
pub fn load_from(path: &Path) -> [u8; COOKIE_SIZE] {
    let mut cookie = [0u8; COOKIE_SIZE];
    match std::fs::File::open(path) {
        Ok(mut file) => {
            let mut filled = 0;
            while filled < COOKIE_SIZE {
                match file.read(&mut cookie[filled..]) {
                    Ok(0) => break,
                    Ok(n) => filled += n,
                    Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(err) => {
                        debug!(?path, %err, "cookie read failed; sending zero cookie");
                        return [0u8; COOKIE_SIZE];
                    }
                }
            }
            debug!(?path, bytes = filled, "loaded authentication cookie");
        }
        Err(err) => {
            debug!(?path, %err, "no cookie file; sending zero cookie");
        }
    }
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_yields_zero_cookie() {
        let cookie = load_from(Path::new("/nonexistent/pulse/cookie"));
        assert_eq!(cookie, [0u8; COOKIE_SIZE]);
    }

    #[test]
    fn short_file_is_zero_padded() {
        let dir = std::env::temp_dir().join(format!("pulsewire-cookie-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("cookie");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(&[0xAB; 16])
            .unwrap();

        let cookie = load_from(&path);
        assert_eq!(&cookie[..16], &[0xAB; 16]);
        assert_eq!(&cookie[16..], &[0u8; COOKIE_SIZE - 16]);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn full_file_is_read_whole() {
        let dir = std::env::temp_dir().join(format!("pulsewire-cookie-full-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("cookie");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(&[0x5C; COOKIE_SIZE])
            .unwrap();

        let cookie = load_from(&path);
        assert_eq!(cookie, [0x5C; COOKIE_SIZE]);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
