//! Level measurements: BS.1770-4 loudness, SNR, HNR, RMS, clarity.
//!
//! The K-weighting coefficients are computed for 16 kHz; inputs must be
//! conditioned to the engine rate first.

use crate::fbank::FbankFeatures;

// K-weighting stage 1: high-shelf pre-filter at 16 kHz.
const HS_B0: f32 = 1.5303;
const HS_B1: f32 = -2.6906;
const HS_B2: f32 = 1.1983;
const HS_A1: f32 = -1.6636;
const HS_A2: f32 = 0.7134;

// K-weighting stage 2: ~100 Hz high-pass at 16 kHz.
const HP_B0: f32 = 0.9961;
const HP_B1: f32 = -1.9922;
const HP_B2: f32 = 0.9961;
const HP_A1: f32 = -1.9921;
const HP_A2: f32 = 0.9924;

#[derive(Default)]
struct BiquadState {
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl BiquadState {
    // Direct Form I.
    fn tick(&mut self, x: f32, b0: f32, b1: f32, b2: f32, a1: f32, a2: f32) -> f32 {
        let y = b0 * x + b1 * self.x1 + b2 * self.x2 - a1 * self.y1 - a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;
        y
    }
}

/// Integrated loudness (LUFS) per ITU-R BS.1770-4.
///
/// 400 ms blocks with 100 ms hop, absolute gate at -70 LUFS, relative gate
/// 10 LU below the mean of the surviving blocks. Floored at -70.
pub fn compute_lufs(pcm: &[f32]) -> f32 {
    const SAMPLE_RATE: usize = 16_000;
    if pcm.is_empty() {
        return -70.0;
    }

    let mut hs = BiquadState::default();
    let mut hp = BiquadState::default();
    let filtered: Vec<f32> = pcm
        .iter()
        .map(|&x| {
            let y = hs.tick(x, HS_B0, HS_B1, HS_B2, HS_A1, HS_A2);
            hp.tick(y, HP_B0, HP_B1, HP_B2, HP_A1, HP_A2)
        })
        .collect();

    let block_size = SAMPLE_RATE * 2 / 5; // 400ms
    let hop_size = SAMPLE_RATE / 10; // 100ms

    let mut block_ms = Vec::new();
    let mut start = 0;
    while start + block_size <= filtered.len() {
        let sum: f64 = filtered[start..start + block_size]
            .iter()
            .map(|&s| s as f64 * s as f64)
            .sum();
        block_ms.push((sum / block_size as f64) as f32);
        start += hop_size;
    }

    if block_ms.is_empty() {
        // Short audio: single block over whatever is there.
        let sum: f64 = filtered.iter().map(|&s| s as f64 * s as f64).sum();
        let ms = (sum / filtered.len() as f64) as f32;
        return if ms > 1e-10 {
            10.0 * ms.log10() - 0.691
        } else {
            -70.0
        };
    }

    // Absolute gate at -70 LUFS.
    let abs_threshold = 10f64.powf((-70.0 - 0.691) / 10.0) as f32;
    let above_abs: Vec<f32> = block_ms.iter().copied().filter(|&ms| ms >= abs_threshold).collect();
    if above_abs.is_empty() {
        return -70.0;
    }

    // Relative gate: mean of the above-absolute blocks minus 10 LU.
    let mean_abs: f64 = above_abs.iter().map(|&ms| ms as f64).sum::<f64>() / above_abs.len() as f64;
    let rel_threshold = (mean_abs * 0.1) as f32;

    let mut final_mean = 0.0f64;
    let mut count = 0usize;
    for &ms in &block_ms {
        if ms >= rel_threshold {
            final_mean += ms as f64;
            count += 1;
        }
    }
    if count == 0 {
        return -70.0;
    }
    final_mean /= count as f64;

    if final_mean > 1e-10 {
        (10.0 * final_mean.log10() - 0.691) as f32
    } else {
        -70.0
    }
}

/// SNR in dB from separated speech and noise buffers.
pub fn compute_snr_db(speech: &[f32], noise: &[f32]) -> f32 {
    let s = rms_f64(speech);
    let n = rms_f64(noise).max(1e-12);
    (20.0 * (s / n).log10()) as f32
}

/// SNR estimate from a single buffer: the quietest 20% of 10 ms frames are
/// taken as the noise floor.
pub fn compute_snr_db_simple(pcm: &[f32]) -> f32 {
    const FRAME: usize = 160; // 10ms @ 16kHz
    if pcm.len() < FRAME {
        return 20.0;
    }

    let mut frame_energy: Vec<f64> = pcm
        .chunks_exact(FRAME)
        .map(|f| f.iter().map(|&x| x as f64 * x as f64).sum::<f64>() / FRAME as f64)
        .collect();

    let sig_e: f64 = frame_energy.iter().sum::<f64>() / frame_energy.len() as f64;

    frame_energy.sort_by(|a, b| a.total_cmp(b));
    let noise_end = (frame_energy.len() / 5).max(1);
    let noise_e: f64 =
        (frame_energy[..noise_end].iter().sum::<f64>() / noise_end as f64).max(1e-12);

    (10.0 * (sig_e / noise_e).log10()) as f32
}

/// Harmonics-to-noise ratio in dB via autocorrelation at the pitch period.
///
/// Returns a neutral 15 dB when pitch or input is out of range.
pub fn compute_hnr_db(pcm: &[f32], pitch_hz: f32) -> f32 {
    const SAMPLE_RATE: f32 = 16_000.0;
    if !(50.0..=600.0).contains(&pitch_hz) || pcm.is_empty() {
        return 15.0;
    }
    let t0 = (SAMPLE_RATE / pitch_hz).round() as usize;
    if t0 == 0 || t0 >= pcm.len() {
        return 15.0;
    }

    let n = pcm.len() - t0;
    let mut r0 = 0.0f64;
    let mut rt = 0.0f64;
    for i in 0..n {
        r0 += pcm[i] as f64 * pcm[i] as f64;
        rt += pcm[i] as f64 * pcm[i + t0] as f64;
    }
    if r0 < 1e-12 {
        return 15.0;
    }
    let ratio = (rt / r0).clamp(0.0, 0.9999);
    (10.0 * (ratio / (1.0 - ratio)).log10()) as f32
}

/// RMS energy of the buffer.
pub fn compute_rms(pcm: &[f32]) -> f32 {
    rms_f64(pcm) as f32
}

/// Standard deviation of 10 ms frame RMS values.
pub fn compute_energy_variability(pcm: &[f32]) -> f32 {
    const FRAME: usize = 160;
    if pcm.len() < FRAME {
        return 0.0;
    }
    let energies: Vec<f64> = pcm
        .chunks_exact(FRAME)
        .map(|f| (f.iter().map(|&x| x as f64 * x as f64).sum::<f64>() / FRAME as f64).sqrt())
        .collect();
    let mean: f64 = energies.iter().sum::<f64>() / energies.len() as f64;
    let var: f64 =
        energies.iter().map(|e| (e - mean) * (e - mean)).sum::<f64>() / energies.len() as f64;
    var.sqrt() as f32
}

/// Clarity proxy: energy-weighted mel-spectral centroid, normalized so that
/// a centroid at 60% of the bin range maps to 1.
pub fn compute_clarity(features: &FbankFeatures) -> f32 {
    if features.num_frames == 0 || features.num_bins == 0 {
        return 0.5;
    }
    let bins = features.num_bins;

    let mut mean_spec = vec![0.0f64; bins];
    for f in 0..features.num_frames {
        for (b, m) in mean_spec.iter_mut().enumerate() {
            *m += features.data[f * bins + b] as f64;
        }
    }
    for m in &mut mean_spec {
        *m /= features.num_frames as f64;
    }

    let mut total = 0.0f64;
    let mut weighted = 0.0f64;
    for (b, &log_v) in mean_spec.iter().enumerate() {
        let lin = log_v.exp();
        total += lin;
        weighted += lin * b as f64;
    }
    if total < 1e-12 {
        return 0.5;
    }
    let centroid_bin = weighted / total;
    (centroid_bin / (bins as f64 * 0.6)).min(1.0) as f32
}

fn rms_f64(pcm: &[f32]) -> f64 {
    if pcm.is_empty() {
        return 1e-12;
    }
    let sum: f64 = pcm.iter().map(|&x| x as f64 * x as f64).sum();
    (sum / pcm.len() as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fbank::{compute_fbank, FbankConfig};

    fn sine(n: usize, freq: f64, amp: f32) -> Vec<f32> {
        (0..n)
            .map(|i| (2.0 * std::f64::consts::PI * freq * i as f64 / 16_000.0).sin() as f32 * amp)
            .collect()
    }

    #[test]
    fn lufs_of_silence_is_floor() {
        let lufs = compute_lufs(&vec![0.0f32; 48_000]);
        assert!(lufs <= -60.0, "silence LUFS {lufs}");
    }

    #[test]
    fn lufs_of_full_scale_sine() {
        let lufs = compute_lufs(&sine(48_000, 440.0, 1.0));
        assert!(lufs > -20.0 && lufs <= 0.0, "full-scale LUFS {lufs}");
    }

    #[test]
    fn lufs_monotonic_in_level() {
        let loud = compute_lufs(&sine(48_000, 440.0, 0.8));
        let quiet = compute_lufs(&sine(48_000, 440.0, 0.08));
        assert!(loud > quiet, "{loud} vs {quiet}");
        // 20 dB level difference should show up as roughly 20 LU.
        assert!((loud - quiet - 20.0).abs() < 3.0, "{loud} vs {quiet}");
    }

    #[test]
    fn lufs_short_input_does_not_panic() {
        let lufs = compute_lufs(&sine(1000, 440.0, 0.5));
        assert!(lufs.is_finite());
    }

    #[test]
    fn snr_known_levels() {
        let speech = sine(16_000, 300.0, 0.5);
        let noise = sine(16_000, 3000.0, 0.05);
        let snr = compute_snr_db(&speech, &noise);
        assert!((snr - 20.0).abs() < 1.0, "snr {snr}");
    }

    #[test]
    fn snr_silent_noise_is_large() {
        let snr = compute_snr_db(&sine(16_000, 300.0, 0.5), &[]);
        assert!(snr > 100.0);
    }

    #[test]
    fn snr_simple_tone_with_gaps() {
        // 0.5s tone, 0.5s near-silence: bottom-20% frames are the quiet part.
        let mut pcm = sine(8000, 300.0, 0.5);
        pcm.extend(vec![1e-4f32; 8000]);
        let snr = compute_snr_db_simple(&pcm);
        assert!(snr > 10.0, "snr {snr}");
    }

    #[test]
    fn hnr_of_pure_sine_is_high() {
        let hnr = compute_hnr_db(&sine(16_000, 200.0, 0.5), 200.0);
        assert!(hnr > 20.0, "hnr {hnr}");
    }

    #[test]
    fn hnr_out_of_range_pitch_is_neutral() {
        assert_eq!(compute_hnr_db(&sine(16_000, 200.0, 0.5), 0.0), 15.0);
        assert_eq!(compute_hnr_db(&sine(16_000, 200.0, 0.5), 700.0), 15.0);
        assert_eq!(compute_hnr_db(&[], 200.0), 15.0);
    }

    #[test]
    fn rms_of_known_sine() {
        // RMS of a sine at amplitude A is A / sqrt(2).
        let rms = compute_rms(&sine(16_000, 440.0, 0.5));
        assert!((rms - 0.5 / 2f32.sqrt()).abs() < 0.01, "rms {rms}");
    }

    #[test]
    fn energy_variability_constant_tone_is_low() {
        let v = compute_energy_variability(&sine(16_000, 300.0, 0.5));
        assert!(v < 0.02, "variability {v}");
    }

    #[test]
    fn clarity_in_unit_range() {
        let feats = compute_fbank(&sine(16_000, 440.0, 0.5), &FbankConfig::default()).unwrap();
        let c = compute_clarity(&feats);
        assert!((0.0..=1.0).contains(&c), "clarity {c}");
    }
}
