//! Audio conditioning for the voxid engine.
//!
//! Every downstream component (VAD, FBank, embedding, DSP analyzers) assumes
//! 16 kHz mono float32 in [-1, 1]. This crate establishes that invariant:
//!
//! 1. [`wav::read_wav`]: RIFF/WAVE file -> float samples + declared rate
//! 2. [`resample::resample`]: linear interpolation to the target rate
//! 3. [`condition`]: buffer + declared rate -> 16 kHz mono float
//!
//! Values outside [-1, 1] are tolerated and passed through unclamped.

mod error;
pub mod resample;
pub mod wav;

pub use error::AudioError;
pub use resample::resample;
pub use wav::{read_wav, write_wav_i16};

/// Standard sample rate of the whole engine.
pub const SAMPLE_RATE: u32 = 16_000;

/// Conditions a float buffer with a declared sample rate to 16 kHz.
///
/// Returns the input unchanged when it is already at 16 kHz.
pub fn condition(samples: &[f32], sample_rate: u32) -> Vec<f32> {
    if sample_rate == SAMPLE_RATE {
        return samples.to_vec();
    }
    tracing::debug!(from = sample_rate, to = SAMPLE_RATE, "resampling input");
    resample(samples, sample_rate, SAMPLE_RATE)
}

/// Reads a WAV file and conditions it to 16 kHz mono float.
pub fn condition_file(path: &str) -> Result<Vec<f32>, AudioError> {
    let (samples, rate) = read_wav(path)?;
    Ok(condition(&samples, rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_identity_at_16k() {
        let samples = vec![0.1f32, -0.2, 0.3];
        assert_eq!(condition(&samples, 16_000), samples);
    }

    #[test]
    fn condition_resamples_other_rates() {
        let samples = vec![0.5f32; 8000];
        let out = condition(&samples, 8000);
        // 1s at 8kHz becomes ~1s at 16kHz.
        assert!((out.len() as i64 - 16_000).unsigned_abs() <= 10);
    }
}
