//! Deterministic signal processing for the voxid engine.
//!
//! Everything in this crate operates on 16 kHz mono float32 established by
//! the audio conditioner; behavior at other rates is undefined for the
//! loudness and filterbank paths.
//!
//! - [`fbank`]: Kaldi-compatible 80-bin log mel filterbank with CMVN
//! - [`pitch`]: YIN fundamental-frequency estimation
//! - [`loudness`]: ITU-R BS.1770-4 integrated loudness, SNR, HNR, clarity
//! - [`prosody`]: speaking rate, jitter/shimmer stability, breathiness,
//!   resonance

pub mod fbank;
pub mod loudness;
pub mod pitch;
pub mod prosody;

pub use fbank::{cmvn, compute_fbank, FbankConfig, FbankFeatures};
pub use loudness::{
    compute_clarity, compute_energy_variability, compute_hnr_db, compute_lufs, compute_rms,
    compute_snr_db, compute_snr_db_simple,
};
pub use pitch::{PitchAnalyzer, PitchConfig, PitchFrame, PitchSummary};
pub use prosody::{
    compute_breathiness, compute_resonance, compute_voice_stability, estimate_speaking_rate,
};
