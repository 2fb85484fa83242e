//! Voice analysis for the voxid engine.
//!
//! [`VoiceAnalyzer`] decomposes an utterance into acoustic and
//! paralinguistic descriptors selected by a feature bitmask:
//!
//! - model-backed: gender/age, emotion, anti-spoof, MOS (DNSMOS), language
//! - DSP-only: quality metrics, voice features, pleasantness, voice state
//!
//! Optional models missing at init silently downgrade their feature bits;
//! DSP features never depend on a model. Shared work (VAD split, FBank,
//! pitch) is computed once per analyze call and fanned out.

mod analyzer;
mod derived;
mod error;
mod language;
mod neural;
mod types;

pub use analyzer::{
    VoiceAnalyzer, ANTISPOOF_MODEL_FILE, DNSMOS_MODEL_FILE, EMOTION_MODEL_FILE,
    GENDER_AGE_MODEL_FILE, LANGUAGE_MODEL_FILE,
};
pub use derived::{compute_pleasantness, compute_voice_state};
pub use error::AnalyzeError;
pub use language::language_for_index;
pub use neural::{ANTISPOOF_SAMPLES, DNSMOS_FRAMES, LANGUAGE_FRAMES};
pub use types::{
    feature, AgeGroup, AgeResult, AnalysisResult, AntiSpoofResult, Emotion, EmotionResult,
    FatigueLevel, Gender, GenderResult, HealthState, LanguageResult, PleasantnessResult,
    QualityResult, StressLevel, VoiceFeatures, VoiceStateResult, EMOTION_COUNT,
};
