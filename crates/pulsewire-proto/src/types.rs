//! Core protocol value types and sentinels.

use crate::error::{ProtoError, Result};
use crate::proplist::Props;

/// Lowest protocol version this client speaks.
pub const PROTOCOL_VERSION: u16 = 32;

/// "No such index" sentinel, also used as the command-packet channel.
pub const NO_INDEX: u32 = 0xFFFF_FFFF;
/// "No such tag" sentinel; never allocated to a request.
pub const NO_TAG: u32 = 0xFFFF_FFFF;
/// "No value" sentinel for optional u32 fields.
pub const NO_VALUE: u32 = 0xFFFF_FFFF;

/// Upper bound on channels per stream.
pub const MAX_CHANNELS: usize = 32;

/// Server-side alias for the default sink.
pub const DEFAULT_SINK_NAME: &str = "@DEFAULT_SINK@";
/// Server-side alias for the default source.
pub const DEFAULT_SOURCE_NAME: &str = "@DEFAULT_SOURCE@";

/// Size of the authentication cookie in bytes.
pub const COOKIE_SIZE: usize = 256;

/// PCM sample formats, with the server's wire codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SampleFormat {
    U8 = 0,
    Alaw = 1,
    Ulaw = 2,
    S16Le = 3,
    S16Be = 4,
    Float32Le = 5,
    Float32Be = 6,
    S32Le = 7,
    S32Be = 8,
    S24Le = 9,
    S24Be = 10,
    S24In32Le = 11,
    S24In32Be = 12,
}

impl SampleFormat {
    /// Map a wire code back to a format.
    pub fn from_code(code: u8) -> Result<Self> {
        Ok(match code {
            0 => SampleFormat::U8,
            1 => SampleFormat::Alaw,
            2 => SampleFormat::Ulaw,
            3 => SampleFormat::S16Le,
            4 => SampleFormat::S16Be,
            5 => SampleFormat::Float32Le,
            6 => SampleFormat::Float32Be,
            7 => SampleFormat::S32Le,
            8 => SampleFormat::S32Be,
            9 => SampleFormat::S24Le,
            10 => SampleFormat::S24Be,
            11 => SampleFormat::S24In32Le,
            12 => SampleFormat::S24In32Be,
            other => return Err(ProtoError::UnknownSampleFormat { code: other }),
        })
    }

    /// The wire code for this format.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Bytes occupied by one sample of this format.
    pub fn sample_size(self) -> usize {
        match self {
            SampleFormat::U8 | SampleFormat::Alaw | SampleFormat::Ulaw => 1,
            SampleFormat::S16Le | SampleFormat::S16Be => 2,
            SampleFormat::S24Le | SampleFormat::S24Be => 3,
            SampleFormat::Float32Le
            | SampleFormat::Float32Be
            | SampleFormat::S32Le
            | SampleFormat::S32Be
            | SampleFormat::S24In32Le
            | SampleFormat::S24In32Be => 4,
        }
    }
}

/// A sample specification: format, channel count, sample rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleSpec {
    pub format: SampleFormat,
    pub channels: u8,
    pub rate: u32,
}

impl SampleSpec {
    /// Build a spec, requiring a usable channel count.
    pub fn new(format: SampleFormat, channels: u8, rate: u32) -> Result<Self> {
        if channels == 0 || (channels as usize) >= MAX_CHANNELS {
            return Err(ProtoError::InvalidChannels {
                channels: channels as usize,
                limit: MAX_CHANNELS,
            });
        }
        Ok(Self {
            format,
            channels,
            rate,
        })
    }

    /// Bytes per frame: one sample across all channels.
    pub fn frame_size(&self) -> usize {
        self.format.sample_size() * self.channels as usize
    }
}

/// Channel positions, as the server numbers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChannelPosition {
    Mono = 0,
    FrontLeft = 1,
    FrontRight = 2,
    FrontCenter = 3,
    RearCenter = 4,
    RearLeft = 5,
    RearRight = 6,
    Lfe = 7,
    FrontLeftOfCenter = 8,
    FrontRightOfCenter = 9,
    SideLeft = 10,
    SideRight = 11,
}

/// A channel map: one position byte per channel.
///
/// Positions are carried as raw bytes so maps read off the wire survive a
/// round trip even when they use positions this client has no name for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelMap {
    positions: Vec<u8>,
}

impl ChannelMap {
    /// A map from explicit position bytes.
    pub fn from_positions(positions: Vec<u8>) -> Result<Self> {
        if positions.len() > u8::MAX as usize {
            return Err(ProtoError::InvalidChannels {
                channels: positions.len(),
                limit: u8::MAX as usize,
            });
        }
        Ok(Self { positions })
    }

    /// The default WAV mapping for a channel count.
    pub fn wav_default(channels: u8) -> Result<Self> {
        use ChannelPosition::*;
        let positions: &[ChannelPosition] = match channels {
            1 => &[Mono],
            2 => &[FrontLeft, FrontRight],
            3 => &[FrontLeft, FrontRight, FrontCenter],
            4 => &[FrontLeft, FrontRight, RearLeft, RearRight],
            5 => &[FrontLeft, FrontRight, FrontCenter, RearLeft, RearRight],
            6 => &[FrontLeft, FrontRight, FrontCenter, Lfe, RearLeft, RearRight],
            7 => &[
                FrontLeft,
                FrontRight,
                FrontCenter,
                Lfe,
                RearCenter,
                SideLeft,
                SideRight,
            ],
            8 => &[
                FrontLeft,
                FrontRight,
                FrontCenter,
                Lfe,
                RearLeft,
                RearRight,
                SideLeft,
                SideRight,
            ],
            other => {
                return Err(ProtoError::InvalidChannels {
                    channels: other as usize,
                    limit: 8,
                })
            }
        };
        Ok(Self {
            positions: positions.iter().map(|p| *p as u8).collect(),
        })
    }

    /// Number of channels in the map.
    pub fn num_channels(&self) -> u8 {
        self.positions.len() as u8
    }

    /// The raw position bytes.
    pub fn positions(&self) -> &[u8] {
        &self.positions
    }
}

/// A single volume value.
///
/// `0` is muted, `0x10000` is 100% (0 dB), `0x7FFFFFFF` is the clamp
/// maximum and `0xFFFFFFFF` is the "invalid" sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Volume(pub u32);

impl Volume {
    pub const MUTED: Volume = Volume(0);
    pub const NORM: Volume = Volume(0x10000);
    pub const MAX: Volume = Volume(0x7FFF_FFFF);
    pub const INVALID: Volume = Volume(0xFFFF_FFFF);

    /// Whether the value is inside the valid range.
    pub fn is_valid(self) -> bool {
        self.0 <= Volume::MAX.0
    }

    /// Clamp into the valid range.
    pub fn clamped(self) -> Volume {
        Volume(self.0.min(Volume::MAX.0))
    }
}

/// A per-channel volume array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelVolume {
    volumes: Vec<Volume>,
}

impl ChannelVolume {
    /// An array of `channels` entries, all set to `volume`.
    pub fn uniform(channels: u8, volume: Volume) -> Result<Self> {
        Self::from_volumes(vec![volume; channels as usize])
    }

    /// 100% volume on every channel.
    pub fn norm(channels: u8) -> Result<Self> {
        Self::uniform(channels, Volume::NORM)
    }

    /// An array from explicit entries. Length must be 1..=32.
    pub fn from_volumes(volumes: Vec<Volume>) -> Result<Self> {
        if volumes.is_empty() || volumes.len() > MAX_CHANNELS {
            return Err(ProtoError::InvalidVolumeCount {
                count: volumes.len(),
                max: MAX_CHANNELS,
            });
        }
        Ok(Self { volumes })
    }

    pub fn num_channels(&self) -> u8 {
        self.volumes.len() as u8
    }

    pub fn volumes(&self) -> &[Volume] {
        &self.volumes
    }
}

/// Format encoding codes carried in FORMAT_INFO values.
pub mod encoding {
    pub const ANY: u8 = 0;
    pub const PCM: u8 = 1;
}

/// A stream format description: encoding code plus properties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatInfo {
    pub encoding: u8,
    pub props: Props,
}

impl FormatInfo {
    /// A plain PCM format with no extra properties.
    pub fn pcm() -> Self {
        Self {
            encoding: encoding::PCM,
            props: Props::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_sizes_match_codes() {
        let expected = [1, 1, 1, 2, 2, 4, 4, 4, 4, 3, 3, 4, 4];
        for (code, size) in expected.iter().enumerate() {
            let format = SampleFormat::from_code(code as u8).unwrap();
            assert_eq!(format.code(), code as u8);
            assert_eq!(format.sample_size(), *size);
        }
        assert!(SampleFormat::from_code(13).is_err());
    }

    #[test]
    fn frame_size_is_sample_size_times_channels() {
        let spec = SampleSpec::new(SampleFormat::S16Le, 2, 44_100).unwrap();
        assert_eq!(spec.frame_size(), 4);
    }

    #[test]
    fn sample_spec_rejects_bad_channel_counts() {
        assert!(SampleSpec::new(SampleFormat::S16Le, 0, 44_100).is_err());
        assert!(SampleSpec::new(SampleFormat::S16Le, 32, 44_100).is_err());
        assert!(SampleSpec::new(SampleFormat::S16Le, 31, 44_100).is_ok());
    }

    #[test]
    fn wav_default_stereo() {
        let map = ChannelMap::wav_default(2).unwrap();
        assert_eq!(
            map.positions(),
            &[
                ChannelPosition::FrontLeft as u8,
                ChannelPosition::FrontRight as u8
            ]
        );
    }

    #[test]
    fn wav_default_5_1() {
        let map = ChannelMap::wav_default(6).unwrap();
        assert_eq!(map.num_channels(), 6);
        assert_eq!(map.positions()[3], ChannelPosition::Lfe as u8);
    }

    #[test]
    fn volume_validity() {
        assert!(Volume::NORM.is_valid());
        assert!(Volume::MAX.is_valid());
        assert!(!Volume::INVALID.is_valid());
        assert_eq!(Volume(0x8000_0000).clamped(), Volume::MAX);
    }

    #[test]
    fn cvolume_bounds() {
        assert!(ChannelVolume::from_volumes(vec![]).is_err());
        assert!(ChannelVolume::from_volumes(vec![Volume::NORM; 33]).is_err());
        assert_eq!(ChannelVolume::norm(2).unwrap().num_channels(), 2);
    }
}
