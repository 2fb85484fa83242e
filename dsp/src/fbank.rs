//! Log mel filterbank feature extraction.
//!
//! Kaldi-compatible semantics: per-frame DC removal, pre-emphasis, Hamming
//! window, power spectrum, triangular mel filters from 20 Hz to Nyquist,
//! natural log, then per-utterance CMVN. Output is flat row-major
//! `[num_frames][num_bins]`.

use std::f64::consts::PI;

/// Configures mel filterbank feature extraction.
///
/// Defaults match the engine's speaker-embedding featurizer:
/// 25 ms frames, 10 ms shift, 80 mel bins, 20 Hz to Nyquist at 16 kHz.
#[derive(Debug, Clone)]
pub struct FbankConfig {
    /// Input sample rate in Hz (default: 16000).
    pub sample_rate: usize,
    /// Number of mel filterbank channels (default: 80).
    pub num_bins: usize,
    /// Frame length in samples (default: 400 = 25ms @ 16kHz).
    pub frame_length: usize,
    /// Frame shift in samples (default: 160 = 10ms @ 16kHz).
    pub frame_shift: usize,
    /// Pre-emphasis coefficient (default: 0.97).
    pub pre_emphasis: f64,
    /// Floor for mel energies before the log (default: 1e-10).
    pub energy_floor: f64,
    /// Low cutoff frequency for mel bins (default: 20 Hz).
    pub low_freq: f64,
    /// High cutoff; non-positive means offset from Nyquist (default: 0 = Nyquist).
    pub high_freq: f64,
    /// Remove DC offset per frame (default: true).
    pub remove_dc: bool,
}

impl Default for FbankConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            num_bins: 80,
            frame_length: 400,
            frame_shift: 160,
            pre_emphasis: 0.97,
            energy_floor: 1e-10,
            low_freq: 20.0,
            high_freq: 0.0,
            remove_dc: true,
        }
    }
}

/// Flat row-major filterbank matrix with its dimensions.
#[derive(Debug, Clone)]
pub struct FbankFeatures {
    /// `num_frames * num_bins` floats, frame-major.
    pub data: Vec<f32>,
    pub num_frames: usize,
    pub num_bins: usize,
}

impl FbankFeatures {
    /// Returns one frame's bins.
    pub fn frame(&self, i: usize) -> &[f32] {
        &self.data[i * self.num_bins..(i + 1) * self.num_bins]
    }
}

/// Extracts CMVN-normalized log mel filterbank features.
///
/// Returns `None` (with a warning) when the input is shorter than one frame.
/// Double-precision accumulation keeps NaN/Inf out of the output.
pub fn compute_fbank(samples: &[f32], cfg: &FbankConfig) -> Option<FbankFeatures> {
    if cfg.frame_shift == 0 || cfg.frame_length == 0 || cfg.num_bins == 0 {
        return None;
    }
    if samples.len() < cfg.frame_length {
        tracing::warn!(
            samples = samples.len(),
            frame = cfg.frame_length,
            "input shorter than one frame, no fbank output"
        );
        return None;
    }

    let num_frames = (samples.len() - cfg.frame_length) / cfg.frame_shift + 1;

    // FFT size: next power of 2 >= frame_length.
    let fft_size = next_pow2(cfg.frame_length);
    let half_fft = fft_size / 2 + 1;

    let window = hamming_window(cfg.frame_length);

    let high_freq = if cfg.high_freq <= 0.0 {
        cfg.sample_rate as f64 / 2.0 + cfg.high_freq
    } else {
        cfg.high_freq
    };
    let filterbank = mel_filterbank(cfg.num_bins, fft_size, cfg.sample_rate, cfg.low_freq, high_freq);

    let mut out = FbankFeatures {
        data: Vec::with_capacity(num_frames * cfg.num_bins),
        num_frames,
        num_bins: cfg.num_bins,
    };

    let mut fft_buf = vec![(0.0f64, 0.0f64); fft_size];
    let mut frame_buf = vec![0.0f64; cfg.frame_length];
    let mut power_spec = vec![0.0f64; half_fft];

    for f in 0..num_frames {
        let offset = f * cfg.frame_shift;
        for (i, v) in frame_buf.iter_mut().enumerate() {
            *v = samples[offset + i] as f64;
        }

        if cfg.remove_dc {
            let mean: f64 = frame_buf.iter().sum::<f64>() / cfg.frame_length as f64;
            for v in &mut frame_buf {
                *v -= mean;
            }
        }

        if cfg.pre_emphasis > 0.0 {
            for i in (1..cfg.frame_length).rev() {
                frame_buf[i] -= cfg.pre_emphasis * frame_buf[i - 1];
            }
            frame_buf[0] *= 1.0 - cfg.pre_emphasis;
        }

        for v in &mut fft_buf {
            *v = (0.0, 0.0);
        }
        for i in 0..cfg.frame_length {
            fft_buf[i] = (frame_buf[i] * window[i], 0.0);
        }

        fft(&mut fft_buf);

        for (k, p) in power_spec.iter_mut().enumerate() {
            let (re, im) = fft_buf[k];
            *p = re * re + im * im;
        }

        for filter in &filterbank {
            let mut energy: f64 = 0.0;
            for (k, &w) in filter.iter().enumerate() {
                energy += w * power_spec[k];
            }
            if energy < cfg.energy_floor {
                energy = cfg.energy_floor;
            }
            out.data.push(energy.ln() as f32);
        }
    }

    cmvn(&mut out);
    Some(out)
}

/// CMVN: per-bin zero mean, unit variance across the utterance.
pub fn cmvn(features: &mut FbankFeatures) {
    let t = features.num_frames;
    if t == 0 {
        return;
    }
    let bins = features.num_bins;

    for b in 0..bins {
        let mut sum: f64 = 0.0;
        for f in 0..t {
            sum += features.data[f * bins + b] as f64;
        }
        let mean = sum / t as f64;

        let mut var_sum: f64 = 0.0;
        for f in 0..t {
            let d = features.data[f * bins + b] as f64 - mean;
            var_sum += d * d;
        }
        let mut std = (var_sum / t as f64).sqrt();
        if std < 1e-10 {
            std = 1e-10;
        }

        for f in 0..t {
            let v = &mut features.data[f * bins + b];
            *v = ((*v as f64 - mean) / std) as f32;
        }
    }
}

fn next_pow2(n: usize) -> usize {
    let mut p = 1;
    while p < n {
        p <<= 1;
    }
    p
}

fn hamming_window(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / (n - 1) as f64).cos())
        .collect()
}

fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10.0_f64.powf(mel / 2595.0) - 1.0)
}

/// Triangular mel filterbank weights, `[num_bins][half_fft]`.
fn mel_filterbank(
    num_bins: usize,
    fft_size: usize,
    sample_rate: usize,
    low_freq: f64,
    high_freq: f64,
) -> Vec<Vec<f64>> {
    let half_fft = fft_size / 2 + 1;
    let mel_low = hz_to_mel(low_freq);
    let mel_high = hz_to_mel(high_freq);

    let mel_points: Vec<f64> = (0..num_bins + 2)
        .map(|i| mel_low + i as f64 * (mel_high - mel_low) / (num_bins + 1) as f64)
        .collect();

    let bin_indices: Vec<usize> = mel_points
        .iter()
        .map(|&m| {
            let hz = mel_to_hz(m);
            let bin = (hz * fft_size as f64 / sample_rate as f64).floor() as isize;
            bin.clamp(0, half_fft as isize - 1) as usize
        })
        .collect();

    let mut fb = Vec::with_capacity(num_bins);
    for m in 0..num_bins {
        let mut filter = vec![0.0f64; half_fft];
        let left = bin_indices[m];
        let center = bin_indices[m + 1];
        let right = bin_indices[m + 2];

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
        fb.push(filter);
    }
    fb
}

/// In-place Cooley-Tukey FFT over (real, imag) tuples.
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
        let mut start = 0;
        while start < n {
            let mut w = (1.0, 0.0);
            for k in 0..half {
                let u = x[start + k];
                let t_re = w.0 * x[start + k + half].0 - w.1 * x[start + k + half].1;
                let t_im = w.0 * x[start + k + half].1 + w.1 * x[start + k + half].0;
                x[start + k] = (u.0 + t_re, u.1 + t_im);
                x[start + k + half] = (u.0 - t_re, u.1 - t_im);
                let new_w = (w.0 * wn.0 - w.1 * wn.1, w.0 * wn.1 + w.1 * wn.0);
                w = new_w;
            }
            start += size;
        }
        size <<= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(n: usize, freq: f64) -> Vec<f32> {
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f64 / 16_000.0).sin() as f32 * 0.5)
            .collect()
    }

    #[test]
    fn config_defaults() {
        let cfg = FbankConfig::default();
        assert_eq!(cfg.sample_rate, 16_000);
        assert_eq!(cfg.num_bins, 80);
        assert_eq!(cfg.frame_length, 400);
        assert_eq!(cfg.frame_shift, 160);
    }

    #[test]
    fn too_short_returns_none() {
        let cfg = FbankConfig::default();
        assert!(compute_fbank(&vec![0.0; 399], &cfg).is_none());
    }

    #[test]
    fn frame_count() {
        let cfg = FbankConfig::default();
        // (16000 - 400) / 160 + 1 = 98 frames for 1s.
        let feats = compute_fbank(&sine(16_000, 440.0), &cfg).unwrap();
        assert_eq!(feats.num_frames, 98);
        assert_eq!(feats.num_bins, 80);
        assert_eq!(feats.data.len(), 98 * 80);
    }

    #[test]
    fn no_nan_or_inf_on_silence() {
        let cfg = FbankConfig::default();
        let feats = compute_fbank(&vec![0.0f32; 8000], &cfg).unwrap();
        for (i, &v) in feats.data.iter().enumerate() {
            assert!(v.is_finite(), "data[{i}] = {v}");
        }
    }

    #[test]
    fn cmvn_zero_mean_unit_std() {
        let cfg = FbankConfig::default();
        let feats = compute_fbank(&sine(16_000, 440.0), &cfg).unwrap();
        for b in 0..feats.num_bins {
            let vals: Vec<f64> = (0..feats.num_frames)
                .map(|f| feats.data[f * feats.num_bins + b] as f64)
                .collect();
            let mean: f64 = vals.iter().sum::<f64>() / vals.len() as f64;
            let var: f64 =
                vals.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / vals.len() as f64;
            assert!(mean.abs() < 1e-4, "bin {b} mean {mean}");
            // Bins that are pure floor have std clamped, skip those.
            if var > 1e-6 {
                assert!((var.sqrt() - 1.0).abs() < 1e-3, "bin {b} std {}", var.sqrt());
            }
        }
    }

    #[test]
    fn tone_produces_varied_bins() {
        let cfg = FbankConfig::default();
        let feats = compute_fbank(&sine(16_000, 440.0), &cfg).unwrap();
        let first = feats.frame(0);
        assert!(
            first.windows(2).any(|w| (w[0] - w[1]).abs() > 0.01),
            "tone should produce varied mel energies"
        );
    }

    #[test]
    fn fft_impulse() {
        // FFT of [1,0,0,0] is all-ones.
        let mut buf = vec![(1.0, 0.0), (0.0, 0.0), (0.0, 0.0), (0.0, 0.0)];
        fft(&mut buf);
        for (re, im) in &buf {
            assert!((re - 1.0).abs() < 1e-10);
            assert!(im.abs() < 1e-10);
        }
    }

    #[test]
    fn fft_parseval() {
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
            assert!((hz - back).abs() < 1e-6);
        }
    }
}
