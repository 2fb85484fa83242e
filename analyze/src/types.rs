//! Result structures and classification enums.

use std::fmt;

/// Feature-selection bitmask values for analyzer init and analyze calls.
pub mod feature {
    pub const GENDER: u32 = 0x001;
    pub const AGE: u32 = 0x002;
    pub const EMOTION: u32 = 0x004;
    pub const ANTISPOOF: u32 = 0x008;
    pub const QUALITY: u32 = 0x010;
    pub const VOICE_FEATS: u32 = 0x020;
    pub const PLEASANTNESS: u32 = 0x040;
    pub const VOICE_STATE: u32 = 0x080;
    pub const LANGUAGE: u32 = 0x100;
    pub const ALL: u32 = 0x1FF;
}

/// Perceived speaker gender class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Female = 0,
    Male = 1,
    Child = 2,
}

impl Gender {
    pub fn from_index(i: usize) -> Self {
        match i {
            1 => Self::Male,
            2 => Self::Child,
            _ => Self::Female,
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Female => write!(f, "female"),
            Self::Male => write!(f, "male"),
            Self::Child => write!(f, "child"),
        }
    }
}

/// Age bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeGroup {
    /// 0-12
    Child = 0,
    /// 13-17
    Teen = 1,
    /// 18-59
    Adult = 2,
    /// 60+
    Elder = 3,
}

impl AgeGroup {
    pub fn from_index(i: usize) -> Self {
        match i {
            1 => Self::Teen,
            2 => Self::Adult,
            3 => Self::Elder,
            _ => Self::Child,
        }
    }

    /// Representative age when the model has no regression output.
    pub fn midpoint_years(&self) -> u32 {
        match self {
            Self::Child => 8,
            Self::Teen => 15,
            Self::Adult => 35,
            Self::Elder => 68,
        }
    }
}

impl fmt::Display for AgeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Child => write!(f, "child"),
            Self::Teen => write!(f, "teen"),
            Self::Adult => write!(f, "adult"),
            Self::Elder => write!(f, "elder"),
        }
    }
}

/// Emotion class set of the emotion model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emotion {
    Neutral = 0,
    Happy = 1,
    Sad = 2,
    Angry = 3,
    Fearful = 4,
    Disgusted = 5,
    Surprised = 6,
    Calm = 7,
}

/// Number of emotion classes.
pub const EMOTION_COUNT: usize = 8;

impl Emotion {
    pub fn from_index(i: usize) -> Self {
        match i {
            1 => Self::Happy,
            2 => Self::Sad,
            3 => Self::Angry,
            4 => Self::Fearful,
            5 => Self::Disgusted,
            6 => Self::Surprised,
            7 => Self::Calm,
            _ => Self::Neutral,
        }
    }

    /// Approximate valence when the model has no dimensional outputs.
    pub fn default_valence(&self) -> f32 {
        const TABLE: [f32; EMOTION_COUNT] = [0.0, 0.8, -0.7, -0.8, -0.7, -0.5, 0.3, 0.2];
        TABLE[*self as usize]
    }

    /// Approximate arousal when the model has no dimensional outputs.
    pub fn default_arousal(&self) -> f32 {
        const TABLE: [f32; EMOTION_COUNT] = [0.0, 0.7, -0.4, 0.9, 0.8, 0.1, 0.9, -0.3];
        TABLE[*self as usize]
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Neutral => "neutral",
            Self::Happy => "happy",
            Self::Sad => "sad",
            Self::Angry => "angry",
            Self::Fearful => "fearful",
            Self::Disgusted => "disgusted",
            Self::Surprised => "surprised",
            Self::Calm => "calm",
        };
        write!(f, "{name}")
    }
}

/// Fatigue classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatigueLevel {
    Normal,
    Moderate,
    High,
}

/// Vocal health classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Normal,
    Hoarse,
    Nasal,
    Breathy,
}

/// Stress classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StressLevel {
    Low,
    Medium,
    High,
}

/// Gender recognition result.
#[derive(Debug, Clone)]
pub struct GenderResult {
    pub gender: Gender,
    /// Softmax scores: [female, male, child]. Sum to 1.
    pub scores: [f32; 3],
}

/// Age estimation result.
#[derive(Debug, Clone)]
pub struct AgeResult {
    pub age_years: u32,
    pub group: AgeGroup,
    /// Confidence of the winning group, [0, 1].
    pub confidence: f32,
    /// Per-group probabilities. Sum to 1.
    pub group_scores: [f32; 4],
}

/// Emotion recognition result.
#[derive(Debug, Clone)]
pub struct EmotionResult {
    pub emotion: Emotion,
    /// Per-class probabilities. Sum to 1.
    pub scores: [f32; EMOTION_COUNT],
    /// Negative to positive, [-1, 1].
    pub valence: f32,
    /// Calm to excited, [-1, 1].
    pub arousal: f32,
}

/// Anti-spoofing / liveness result.
#[derive(Debug, Clone)]
pub struct AntiSpoofResult {
    pub is_genuine: bool,
    pub genuine_score: f32,
    pub spoof_score: f32,
}

/// Voice quality assessment.
#[derive(Debug, Clone)]
pub struct QualityResult {
    /// Mean opinion score, [1, 5].
    pub mos_score: f32,
    pub snr_db: f32,
    /// Intelligibility proxy, [0, 1].
    pub clarity: f32,
    /// Background noise level, [0, 1].
    pub noise_level: f32,
    /// Integrated loudness (BS.1770-4), LUFS.
    pub loudness_lufs: f32,
    pub hnr_db: f32,
}

/// Acoustic voice features.
#[derive(Debug, Clone, Default)]
pub struct VoiceFeatures {
    /// Mean F0 over voiced frames, Hz. 0 = unvoiced.
    pub pitch_hz: f32,
    /// F0 standard deviation, Hz.
    pub pitch_variability: f32,
    /// Estimated syllables per second.
    pub speaking_rate: f32,
    /// Jitter/shimmer stability, [0, 1].
    pub voice_stability: f32,
    /// Mid-band resonance ratio, [0, 1].
    pub resonance_score: f32,
    /// Breathiness index, [0, 1].
    pub breathiness: f32,
    /// Mean RMS energy.
    pub energy_mean: f32,
    /// Frame-RMS standard deviation.
    pub energy_variability: f32,
}

/// Voice pleasantness scores, all in [0, 100].
#[derive(Debug, Clone)]
pub struct PleasantnessResult {
    pub overall_score: f32,
    pub magnetism: f32,
    pub warmth: f32,
    pub authority: f32,
    pub clarity_score: f32,
}

/// Rule-based voice condition.
#[derive(Debug, Clone)]
pub struct VoiceStateResult {
    pub fatigue_level: FatigueLevel,
    pub health_state: HealthState,
    pub stress_level: StressLevel,
    /// Continuous scores, [0, 1].
    pub fatigue_score: f32,
    pub stress_score: f32,
    pub health_score: f32,
}

/// Language identification result.
#[derive(Debug, Clone)]
pub struct LanguageResult {
    /// ISO 639-1 code, e.g. "en".
    pub code: String,
    /// Human readable name, e.g. "English".
    pub name: String,
    /// Softmax confidence at the winning index, [0, 1].
    pub confidence: f32,
    /// Accent strength, [0, 1]. 0 until a model provides it.
    pub accent_score: f32,
    /// e.g. "Mandarin" for Chinese, else the language name.
    pub accent_region: String,
}

/// Aggregated analysis output. `features_computed` is the bitmask of
/// sub-results that are populated.
#[derive(Debug, Clone, Default)]
pub struct AnalysisResult {
    pub features_computed: u32,
    pub gender: Option<GenderResult>,
    pub age: Option<AgeResult>,
    pub emotion: Option<EmotionResult>,
    pub antispoof: Option<AntiSpoofResult>,
    pub quality: Option<QualityResult>,
    pub voice_features: Option<VoiceFeatures>,
    pub pleasantness: Option<PleasantnessResult>,
    pub voice_state: Option<VoiceStateResult>,
    pub language: Option<LanguageResult>,
}
