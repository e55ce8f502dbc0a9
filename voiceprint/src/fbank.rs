use std::f64::consts::PI;

/// Configures mel filterbank feature extraction.
///
/// The default matches the ECAPA-TDNN speaker recipes: hamming window,
/// 25ms frames, 10ms shift, 80 mel bins over 0-8000 Hz, log energies in dB.
/// [`FbankConfig::kaldi`] gives the Kaldi-style variant (Povey window,
/// pre-emphasis, natural log).
#[derive(Debug, Clone, PartialEq)]
pub struct FbankConfig {
    /// Input sample rate in Hz (default: 16000).
    pub sample_rate: usize,
    /// Number of mel filterbank channels (default: 80).
    pub num_mels: usize,
    /// Frame length in samples (default: 400 = 25ms @ 16kHz).
    pub frame_length: usize,
    /// Frame shift in samples (default: 160 = 10ms @ 16kHz).
    pub frame_shift: usize,
    /// Pre-emphasis coefficient, 0 disables (default: 0).
    pub pre_emphasis: f64,
    /// Floor for filterbank energy (default: 1e-10).
    pub energy_floor: f64,
    /// Low cutoff frequency for mel bins (default: 0 Hz).
    pub low_freq: f64,
    /// High cutoff frequency, zero or negative = offset from Nyquist (default: 0).
    pub high_freq: f64,
    /// Remove DC offset per frame (default: false).
    pub remove_dc: bool,
    /// Use Povey window (hamming^0.85) instead of Hamming (default: false).
    pub povey_window: bool,
    /// Emit `10 * log10(energy)` instead of `ln(energy)` (default: true).
    pub db_scale: bool,
}

impl Default for FbankConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            num_mels: 80,
            frame_length: 400, // 25ms @ 16kHz
            frame_shift: 160,  // 10ms @ 16kHz
            pre_emphasis: 0.0,
            energy_floor: 1e-10,
            low_freq: 0.0,
            high_freq: 0.0,
            remove_dc: false,
            povey_window: false,
            db_scale: true,
        }
    }
}

impl FbankConfig {
    /// Same framing as the default with a different number of mel bins.
    /// The VoxLingua107 language classifier uses 60.
    pub fn with_mels(num_mels: usize) -> Self {
        Self {
            num_mels,
            ..Self::default()
        }
    }

    /// Kaldi/sherpa-onnx compatible features: Povey window, pre-emphasis
    /// 0.97, DC removal, 20-7600 Hz, natural log.
    pub fn kaldi() -> Self {
        Self {
            pre_emphasis: 0.97,
            low_freq: 20.0,
            high_freq: -400.0, // Nyquist - 400 = 7600 Hz for 16kHz
            remove_dc: true,
            povey_window: true,
            db_scale: false,
            ..Self::default()
        }
    }
}

/// Extracts log mel filterbank features from mono samples in `[-1, 1]`.
///
/// Output: 2D vec `[num_frames][num_mels]` of log mel filterbank energies.
///
/// Returns `None` if the audio is too short for a single frame.
pub fn compute_fbank(samples: &[f32], cfg: &FbankConfig) -> Option<Vec<Vec<f32>>> {
    if cfg.frame_shift == 0 || cfg.frame_length == 0 || cfg.num_mels == 0 {
        return None;
    }
    if samples.len() < cfg.frame_length {
        return None;
    }

    let num_frames = (samples.len() - cfg.frame_length) / cfg.frame_shift + 1;

    // FFT size: next power of 2 >= frame_length.
    let fft_size = cfg.frame_length.next_power_of_two();
    let half_fft = fft_size / 2 + 1;

    let window = if cfg.povey_window {
        povey_window(cfg.frame_length)
    } else {
        hamming_window(cfg.frame_length)
    };

    let high_freq = if cfg.high_freq <= 0.0 {
        cfg.sample_rate as f64 / 2.0 + cfg.high_freq
    } else {
        cfg.high_freq
    };

    let filterbank = mel_filterbank(
        cfg.num_mels,
        fft_size,
        cfg.sample_rate,
        cfg.low_freq,
        high_freq,
    );

    let mut result = Vec::with_capacity(num_frames);
    let mut frame_buf = vec![0.0f64; cfg.frame_length];
    let mut fft_buf = vec![(0.0f64, 0.0f64); fft_size];
    let mut power_spec = vec![0.0f64; half_fft];

    for f in 0..num_frames {
        let offset = f * cfg.frame_shift;
        for (dst, &src) in frame_buf
            .iter_mut()
            .zip(&samples[offset..offset + cfg.frame_length])
        {
            *dst = src as f64;
        }

        if cfg.remove_dc {
            let mean: f64 = frame_buf.iter().sum::<f64>() / cfg.frame_length as f64;
            for v in &mut frame_buf {
                *v -= mean;
            }
        }

        // Pre-emphasis (applied per frame after DC removal).
        if cfg.pre_emphasis > 0.0 {
            for i in (1..cfg.frame_length).rev() {
                frame_buf[i] -= cfg.pre_emphasis * frame_buf[i - 1];
            }
            frame_buf[0] *= 1.0 - cfg.pre_emphasis;
        }

        // Apply window and zero-pad to FFT size.
        fft_buf.fill((0.0, 0.0));
        for i in 0..cfg.frame_length {
            fft_buf[i] = (frame_buf[i] * window[i], 0.0);
        }

        fft(&mut fft_buf);

        for (k, p) in power_spec.iter_mut().enumerate() {
            let (r, im) = fft_buf[k];
            *p = r * r + im * im;
        }

        let frame: Vec<f32> = filterbank
            .iter()
            .map(|filter| {
                let energy: f64 = filter
                    .iter()
                    .zip(&power_spec)
                    .map(|(w, p)| w * p)
                    .sum::<f64>()
                    .max(cfg.energy_floor);
                if cfg.db_scale {
                    (10.0 * energy.log10()) as f32
                } else {
                    energy.ln() as f32
                }
            })
            .collect();
        result.push(frame);
    }

    Some(result)
}

/// Per-bin mean normalization over the whole utterance, and variance
/// normalization when `std_norm` is set.
pub fn cmvn(features: &mut [Vec<f32>], std_norm: bool) {
    if features.is_empty() {
        return;
    }
    let num_mels = features[0].len();
    let t = features.len() as f64;

    for m in 0..num_mels {
        let mean = features.iter().map(|f| f[m] as f64).sum::<f64>() / t;

        let std = if std_norm {
            let var = features
                .iter()
                .map(|f| {
                    let d = f[m] as f64 - mean;
                    d * d
                })
                .sum::<f64>()
                / t;
            var.sqrt().max(1e-10)
        } else {
            1.0
        };

        for f in features.iter_mut() {
            f[m] = ((f[m] as f64 - mean) / std) as f32;
        }
    }
}

/// L2-normalizes a vector to unit length in-place.
/// A zero vector is left unchanged.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v
        .iter()
        .map(|&x| (x as f64) * (x as f64))
        .sum::<f64>()
        .sqrt();
    if norm > 0.0 {
        let scale = (1.0 / norm) as f32;
        for x in v.iter_mut() {
            *x *= scale;
        }
    }
}

fn hamming_window(n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![1.0];
    }
    (0..n)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / (n - 1) as f64).cos())
        .collect()
}

/// Povey window (hamming^0.85) used by Kaldi.
fn povey_window(n: usize) -> Vec<f64> {
    hamming_window(n).into_iter().map(|w| w.powf(0.85)).collect()
}

fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10.0_f64.powf(mel / 2595.0) - 1.0)
}

/// Computes triangular mel filterbank weights.
/// Returns `[num_mels][half_fft]` weights.
fn mel_filterbank(
    num_mels: usize,
    fft_size: usize,
    sample_rate: usize,
    low_freq: f64,
    high_freq: f64,
) -> Vec<Vec<f64>> {
    let half_fft = fft_size / 2 + 1;
    let mel_low = hz_to_mel(low_freq);
    let mel_high = hz_to_mel(high_freq);

    // Equally spaced mel points, converted to FFT bin indices.
    let bins: Vec<usize> = (0..num_mels + 2)
        .map(|i| {
            let mel = mel_low + i as f64 * (mel_high - mel_low) / (num_mels + 1) as f64;
            let bin = (mel_to_hz(mel) * fft_size as f64 / sample_rate as f64).floor() as isize;
            bin.clamp(0, half_fft as isize - 1) as usize
        })
        .collect();

    (0..num_mels)
        .map(|m| {
            let mut filter = vec![0.0f64; half_fft];
            let (left, center, right) = (bins[m], bins[m + 1], bins[m + 2]);
            if center > left {
                for k in left..=center {
                    filter[k] = (k - left) as f64 / (center - left) as f64;
                }
            }
            if right > center {
                for k in center..=right {
                    filter[k] = (right - k) as f64 / (right - center) as f64;
                }
            }
            filter
        })
        .collect()
}

/// In-place radix-2 Cooley-Tukey FFT over (real, imag) pairs.
/// Input length must be a power of 2.
fn fft(x: &mut [(f64, f64)]) {
    let n = x.len();
    if n <= 1 {
        return;
    }

    // Bit-reversal permutation.
    let mut j = 0usize;
    for i in 1..n {
        let mut bit = n >> 1;
        while j & bit != 0 {
            j ^= bit;
            bit >>= 1;
        }
        j ^= bit;
        if i < j {
            x.swap(i, j);
        }
    }

    let mut size = 2;
    while size <= n {
        let half = size / 2;
        let angle = -2.0 * PI / size as f64;
        let wn = (angle.cos(), angle.sin());
        for start in (0..n).step_by(size) {
            let mut w = (1.0, 0.0);
            for k in 0..half {
                let u = x[start + k];
                let v = x[start + k + half];
                let t = (w.0 * v.0 - w.1 * v.1, w.0 * v.1 + w.1 * v.0);
                x[start + k] = (u.0 + t.0, u.1 + t.1);
                x[start + k + half] = (u.0 - t.0, u.1 - t.1);
                w = (w.0 * wn.0 - w.1 * wn.1, w.0 * wn.1 + w.1 * wn.0);
            }
        }
        size <<= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(freq: f64, n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| ((freq * 2.0 * PI * i as f64 / 16000.0).sin() * 0.5) as f32)
            .collect()
    }

    #[test]
    fn fbank_config_default() {
        let cfg = FbankConfig::default();
        assert_eq!(cfg.sample_rate, 16000);
        assert_eq!(cfg.num_mels, 80);
        assert_eq!(cfg.frame_length, 400);
        assert_eq!(cfg.frame_shift, 160);
        assert_eq!(FbankConfig::with_mels(60).num_mels, 60);
        assert!(FbankConfig::kaldi().povey_window);
    }

    #[test]
    fn compute_fbank_too_short() {
        let cfg = FbankConfig::default();
        assert!(compute_fbank(&[0.0; 399], &cfg).is_none());
    }

    #[test]
    fn compute_fbank_silence_hits_floor() {
        let cfg = FbankConfig::default();
        // num_frames = (800 - 400) / 160 + 1 = 3.
        let features = compute_fbank(&[0.0; 800], &cfg).unwrap();
        assert_eq!(features.len(), 3);
        assert_eq!(features[0].len(), 80);
        // 10 * log10(1e-10) = -100 dB.
        assert!(features[0].iter().all(|&v| (v + 100.0).abs() < 1e-3));
    }

    #[test]
    fn compute_fbank_one_second_tone() {
        for cfg in [FbankConfig::default(), FbankConfig::kaldi()] {
            // Frames: (16000 - 400) / 160 + 1 = 98.
            let features = compute_fbank(&tone(440.0, 16000), &cfg).unwrap();
            assert_eq!(features.len(), 98);
            assert_eq!(features[0].len(), 80);

            let first = &features[0];
            let not_all_same = first.windows(2).any(|w| (w[0] - w[1]).abs() > 0.01);
            assert!(not_all_same, "tone should produce varied mel energies");
        }
    }

    #[test]
    fn tone_energy_peaks_in_low_bins() {
        let features = compute_fbank(&tone(300.0, 4000), &FbankConfig::default()).unwrap();
        let frame = &features[5];
        let peak = frame
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert!(peak < 20, "300 Hz should land in a low mel bin, got {peak}");
    }

    #[test]
    fn cmvn_mean_only() {
        let mut features = vec![vec![1.0f32, 10.0], vec![3.0, 30.0]];
        cmvn(&mut features, false);
        assert_eq!(features, vec![vec![-1.0, -10.0], vec![1.0, 10.0]]);
    }

    #[test]
    fn cmvn_mean_and_variance() {
        let mut features = vec![
            vec![1.0f32, 2.0, 3.0],
            vec![3.0, 4.0, 5.0],
            vec![5.0, 6.0, 7.0],
        ];
        cmvn(&mut features, true);

        for m in 0..3 {
            let vals: Vec<f64> = features.iter().map(|f| f[m] as f64).collect();
            let mean = vals.iter().sum::<f64>() / vals.len() as f64;
            let var = vals.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / vals.len() as f64;
            assert!(mean.abs() < 1e-5, "mean should be ~0, got {mean}");
            assert!((var - 1.0).abs() < 1e-4, "var should be ~1, got {var}");
        }
    }

    #[test]
    fn l2_normalize_unit() {
        let mut v = vec![3.0f32, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn l2_normalize_zero() {
        let mut v = vec![0.0f32, 0.0, 0.0];
        l2_normalize(&mut v);
        assert_eq!(v, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn fft_impulse() {
        // FFT of [1,0,0,0] should be [1,1,1,1].
        let mut buf = vec![(1.0, 0.0), (0.0, 0.0), (0.0, 0.0), (0.0, 0.0)];
        fft(&mut buf);
        for (re, im) in &buf {
            assert!((re - 1.0).abs() < 1e-10, "real should be 1, got {re}");
            assert!(im.abs() < 1e-10, "imag should be 0, got {im}");
        }
    }

    #[test]
    fn fft_parseval() {
        // sum |x[n]|^2 * N = sum |X[k]|^2
        let n = 8;
        let mut buf: Vec<(f64, f64)> = (0..n)
            .map(|i| ((2.0 * PI * i as f64 / n as f64).sin(), 0.0))
            .collect();

        let time_energy: f64 = buf.iter().map(|(r, im)| r * r + im * im).sum();
        fft(&mut buf);
        let freq_energy: f64 = buf.iter().map(|(r, im)| r * r + im * im).sum();

        assert!((time_energy * n as f64 - freq_energy).abs() < 1e-8);
    }

    #[test]
    fn mel_hz_roundtrip() {
        for &hz in &[0.0, 100.0, 440.0, 1000.0, 8000.0] {
            let back = mel_to_hz(hz_to_mel(hz));
            assert!((hz - back).abs() < 1e-6, "roundtrip failed for {hz}: got {back}");
        }
    }
}
