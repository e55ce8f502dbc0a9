//! Rubato-based sample rate conversion.
//!
//! Works on a whole clip at once: the signal is fed through a fixed-size
//! FFT resampler in chunks, zero-padded at the end, and the resampler's
//! output delay is trimmed so sample 0 of the output aligns with sample 0
//! of the input.

use rubato::{FftFixedInOut, Resampler};

use crate::error::AudioError;

/// Frames per processing block.
const CHUNK_SIZE: usize = 1024;

/// Converts mono samples from `src_rate` to `dst_rate`.
///
/// The output holds `ceil(len * dst_rate / src_rate)` samples.
/// Equal rates return the input unchanged.
pub fn resample(samples: &[f32], src_rate: u32, dst_rate: u32) -> Result<Vec<f32>, AudioError> {
    if src_rate == 0 {
        return Err(AudioError::InvalidRate(src_rate));
    }
    if dst_rate == 0 {
        return Err(AudioError::InvalidRate(dst_rate));
    }
    if src_rate == dst_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let mut resampler =
        FftFixedInOut::<f32>::new(src_rate as usize, dst_rate as usize, CHUNK_SIZE, 1)?;

    let expected = (samples.len() as u64 * dst_rate as u64).div_ceil(src_rate as u64) as usize;
    let delay = resampler.output_delay();

    let mut input = vec![Vec::with_capacity(resampler.input_frames_max())];
    let mut output = vec![vec![0.0f32; resampler.output_frames_max()]];
    let mut out = Vec::with_capacity(expected + delay + resampler.output_frames_max());
    let mut pos = 0;

    while out.len() < expected + delay {
        let need = resampler.input_frames_next();
        input[0].clear();
        if pos < samples.len() {
            let end = (pos + need).min(samples.len());
            input[0].extend_from_slice(&samples[pos..end]);
            pos = end;
        }
        // Pad the final chunk (and the delay flush) with silence.
        input[0].resize(need, 0.0);

        let (_, written) = resampler.process_into_buffer(&input, &mut output, None)?;
        out.extend_from_slice(&output[0][..written]);
    }

    out.drain(..delay);
    out.truncate(expected);
    Ok(out)
}
