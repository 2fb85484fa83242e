//! YIN fundamental-frequency estimation.
//!
//! Cumulative mean normalized difference per de Cheveigné & Kawahara (2002),
//! one estimate per 10 ms hop, summarized over the utterance.

/// Configures the YIN detector.
#[derive(Debug, Clone)]
pub struct PitchConfig {
    /// Input sample rate in Hz (default: 16000).
    pub sample_rate: usize,
    /// Lowest detectable F0 in Hz (default: 60).
    pub min_f0: f64,
    /// Highest detectable F0 in Hz (default: 600).
    pub max_f0: f64,
    /// CMNDF acceptance threshold (default: 0.15).
    pub threshold: f64,
}

impl Default for PitchConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            min_f0: 60.0,
            max_f0: 600.0,
            threshold: 0.15,
        }
    }
}

/// One 10 ms pitch estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchFrame {
    /// Fundamental frequency in Hz; 0 = unvoiced.
    pub f0_hz: f32,
    /// Voicing probability [0, 1].
    pub probability: f32,
}

/// Utterance-level pitch summary.
#[derive(Debug, Clone, Copy, Default)]
pub struct PitchSummary {
    /// Mean F0 over voiced frames, Hz. 0 when nothing is voiced.
    pub mean_f0_hz: f32,
    /// F0 standard deviation over voiced frames, Hz.
    pub std_f0_hz: f32,
    /// Fraction of frames that are voiced, [0, 1].
    pub voiced_fraction: f32,
}

/// YIN pitch detector.
pub struct PitchAnalyzer {
    cfg: PitchConfig,
    min_period: usize,
    max_period: usize,
    frame_size: usize,
}

impl PitchAnalyzer {
    pub fn new(cfg: PitchConfig) -> Self {
        let min_period = (cfg.sample_rate as f64 / cfg.max_f0) as usize;
        let max_period = (cfg.sample_rate as f64 / cfg.min_f0) as usize;
        let frame_size = max_period * 2;
        Self {
            cfg,
            min_period,
            max_period,
            frame_size,
        }
    }

    /// Analyzes a full utterance: one [`PitchFrame`] per 10 ms hop.
    pub fn analyze(&self, pcm: &[f32]) -> Vec<PitchFrame> {
        let hop = self.cfg.sample_rate / 100;
        let mut result = Vec::new();
        if pcm.len() < self.frame_size {
            return result;
        }

        let mut start = 0;
        while start + self.frame_size <= pcm.len() {
            result.push(self.estimate_frame(&pcm[start..start + self.frame_size]));
            start += hop;
        }
        result
    }

    /// Mean/std over voiced frames plus the voiced fraction.
    pub fn summarize(frames: &[PitchFrame]) -> PitchSummary {
        let mut summary = PitchSummary::default();
        if frames.is_empty() {
            return summary;
        }
        let voiced: Vec<f64> = frames
            .iter()
            .filter(|f| f.f0_hz > 0.0)
            .map(|f| f.f0_hz as f64)
            .collect();
        summary.voiced_fraction = voiced.len() as f32 / frames.len() as f32;
        if voiced.is_empty() {
            return summary;
        }
        let mean: f64 = voiced.iter().sum::<f64>() / voiced.len() as f64;
        let var: f64 =
            voiced.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / voiced.len() as f64;
        summary.mean_f0_hz = mean as f32;
        summary.std_f0_hz = var.sqrt() as f32;
        summary
    }

    fn estimate_frame(&self, frame: &[f32]) -> PitchFrame {
        let n = frame.len();
        let tau_max = self.max_period.min(n / 2);
        if tau_max <= self.min_period {
            return PitchFrame {
                f0_hz: 0.0,
                probability: 0.0,
            };
        }

        // Difference function d(tau).
        let mut df = vec![0.0f64; tau_max + 1];
        for (tau, d) in df.iter_mut().enumerate().skip(1) {
            let mut acc = 0.0f64;
            let mut j = 0usize;
            while j + tau < n && j < tau_max * 2 {
                let diff = (frame[j] - frame[j + tau]) as f64;
                acc += diff * diff;
                j += 1;
            }
            *d = acc;
        }

        // Cumulative mean normalized difference.
        let mut cmndf = vec![1.0f64; tau_max + 1];
        let mut running_sum = 0.0f64;
        for tau in 1..=tau_max {
            running_sum += df[tau];
            cmndf[tau] = if running_sum > 0.0 {
                df[tau] * tau as f64 / running_sum
            } else {
                1.0
            };
        }

        // First dip below threshold, else the global minimum when it is
        // convincing enough.
        let mut best_tau = None;
        for tau in self.min_period..=tau_max {
            if cmndf[tau] < self.cfg.threshold {
                best_tau = Some(tau);
                break;
            }
        }
        if best_tau.is_none() {
            let mut min_val = f64::MAX;
            let mut min_tau = 0;
            for tau in self.min_period..=tau_max {
                if cmndf[tau] < min_val {
                    min_val = cmndf[tau];
                    min_tau = tau;
                }
            }
            if min_val < 0.35 && min_tau > 0 {
                best_tau = Some(min_tau);
            }
        }

        match best_tau {
            Some(tau) => PitchFrame {
                f0_hz: (self.cfg.sample_rate as f64 / tau as f64) as f32,
                probability: (1.0 - cmndf[tau]).max(0.0) as f32,
            },
            None => PitchFrame {
                f0_hz: 0.0,
                probability: 0.0,
            },
        }
    }
}

impl Default for PitchAnalyzer {
    fn default() -> Self {
        Self::new(PitchConfig::default())
    }
}
