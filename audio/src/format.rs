//! Sample rate and channel layout of decoded audio.

/// Describes the layout of a decoded clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Format {
    /// Sample rate in Hz (e.g., 16000, 44100).
    pub sample_rate: u32,
    /// Number of interleaved channels.
    pub channels: u16,
}

impl Format {
    pub const fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// Creates a mono format with the given sample rate.
    pub const fn mono(sample_rate: u32) -> Self {
        Self::new(sample_rate, 1)
    }

    /// Returns true for single-channel audio.
    pub fn is_mono(&self) -> bool {
        self.channels == 1
    }
}

// Common format presets
impl Format {
    /// 16kHz mono, the input rate of the speaker and language models.
    pub const MONO_16K: Format = Format::mono(16000);
    /// 44.1kHz stereo (CD quality)
    pub const STEREO_44K: Format = Format::new(44100, 2);
    /// 48kHz stereo
    pub const STEREO_48K: Format = Format::new(48000, 2);
}
