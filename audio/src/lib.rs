//! Audio decoding for speaker models.
//!
//! Uploaded clips arrive as WAV files of arbitrary rate and channel count.
//! Speaker and language models expect 16kHz mono samples in `[-1, 1]`:
//!
//! - [`decode_wav`]: RIFF/WAVE bytes -> interleaved [`Pcm`]
//! - [`Pcm::to_mono`]: channel down-mix by averaging
//! - [`resample`]: FFT sample rate conversion (rubato)
//!
//! [`load_mono`] chains the three.
//!
//! # Example
//!
//! ```no_run
//! use voicematch_audio::load_mono;
//!
//! let data = std::fs::read("clip.wav").unwrap();
//! let samples = load_mono(&data, 16000).unwrap();
//! println!("{} samples at 16kHz", samples.len());
//! ```

mod error;
mod format;
mod resample;
mod wav;

pub use error::AudioError;
pub use format::Format;
pub use resample::resample;
pub use wav::{decode_wav, Pcm};

/// Decodes a WAV file and converts it to mono samples at `sample_rate`.
pub fn load_mono(data: &[u8], sample_rate: u32) -> Result<Vec<f32>, AudioError> {
    let pcm = decode_wav(data)?;
    let src_rate = pcm.format.sample_rate;
    let mono = pcm.to_mono();
    let out = resample(&mono, src_rate, sample_rate)?;
    tracing::debug!(
        src_rate,
        dst_rate = sample_rate,
        channels = pcm.format.channels,
        frames = out.len(),
        "decoded audio clip"
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wav::tests::encode_wav;

    #[test]
    fn load_mono_resamples_stereo_48k() {
        // 100ms of stereo 48kHz.
        let frames = 4800;
        let mut interleaved = Vec::with_capacity(frames * 2);
        for _ in 0..frames {
            interleaved.push(1000i16);
            interleaved.push(-1000i16);
        }
        let data = encode_wav(Format::new(48000, 2), &interleaved);

        let out = load_mono(&data, 16000).unwrap();
        assert_eq!(out.len(), 1600);
        // L and R cancel out.
        assert!(out.iter().all(|s| s.abs() < 1e-3));
    }

    #[test]
    fn load_mono_rejects_garbage() {
        assert!(load_mono(b"definitely not a wav file", 16000).is_err());
    }
}
