//! RIFF/WAVE decoding.

use std::io::Cursor;

use hound::{SampleFormat, WavReader};

use crate::error::AudioError;
use crate::format::Format;

/// Decoded audio: interleaved `f32` samples in `[-1, 1]`.
#[derive(Debug, Clone)]
pub struct Pcm {
    pub format: Format,
    pub samples: Vec<f32>,
}

impl Pcm {
    /// Number of sample frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.format.channels.max(1) as usize
    }

    /// Down-mixes to a single channel by averaging each frame.
    pub fn to_mono(&self) -> Vec<f32> {
        let channels = self.format.channels as usize;
        if channels <= 1 {
            return self.samples.clone();
        }
        self.samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    }
}

/// Decodes an in-memory WAV file.
///
/// Integer PCM of 8 to 32 bits and 32-bit float are accepted.
/// Returns [`AudioError::Empty`] for a well-formed file without samples.
pub fn decode_wav(data: &[u8]) -> Result<Pcm, AudioError> {
    let mut reader = WavReader::new(Cursor::new(data))?;
    let spec = reader.spec();
    if spec.channels == 0 {
        return Err(AudioError::Unsupported("zero channels".into()));
    }
    if spec.sample_rate == 0 {
        return Err(AudioError::InvalidRate(0));
    }

    let samples: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, 32) => reader.samples::<f32>().collect::<Result<_, _>>()?,
        (SampleFormat::Int, bits @ 1..=32) => {
            let scale = (1u64 << (bits - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
        (fmt, bits) => {
            return Err(AudioError::Unsupported(format!("{fmt:?} {bits}-bit")));
        }
    };

    if samples.is_empty() {
        return Err(AudioError::Empty);
    }

    Ok(Pcm {
        format: Format::new(spec.sample_rate, spec.channels),
        samples,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Encodes 16-bit interleaved samples as a WAV file.
    pub(crate) fn encode_wav(format: Format, samples: &[i16]) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: format.channels,
            sample_rate: format.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut buf = Vec::new();
        {
            let mut writer = hound::WavWriter::new(Cursor::new(&mut buf), spec).unwrap();
            for &s in samples {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }
        buf
    }

    #[test]
    fn decode_mono_16bit() {
        let data = encode_wav(Format::MONO_16K, &[0, 16384, -16384, i16::MIN]);
        let pcm = decode_wav(&data).unwrap();
        assert_eq!(pcm.format, Format::MONO_16K);
        assert_eq!(pcm.frames(), 4);
        assert_eq!(pcm.samples, vec![0.0, 0.5, -0.5, -1.0]);
    }

    #[test]
    fn decode_float_wav() {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 22050,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut buf = Vec::new();
        {
            let mut writer = hound::WavWriter::new(Cursor::new(&mut buf), spec).unwrap();
            writer.write_sample(0.25f32).unwrap();
            writer.write_sample(-0.75f32).unwrap();
            writer.finalize().unwrap();
        }
        let pcm = decode_wav(&buf).unwrap();
        assert_eq!(pcm.format.sample_rate, 22050);
        assert_eq!(pcm.samples, vec![0.25, -0.75]);
    }

    #[test]
    fn stereo_to_mono_averages() {
        let data = encode_wav(Format::new(16000, 2), &[16384, 0, -16384, -16384]);
        let pcm = decode_wav(&data).unwrap();
        assert_eq!(pcm.frames(), 2);
        assert_eq!(pcm.to_mono(), vec![0.25, -0.5]);
    }

    #[test]
    fn empty_wav_is_rejected() {
        let data = encode_wav(Format::MONO_16K, &[]);
        assert!(matches!(decode_wav(&data), Err(AudioError::Empty)));
    }

    #[test]
    fn truncated_header_is_rejected() {
        let data = encode_wav(Format::MONO_16K, &[1, 2, 3]);
        assert!(matches!(decode_wav(&data[..10]), Err(AudioError::Wav(_))));
    }
}
