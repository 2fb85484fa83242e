//! Speaker recognition for the voxid engine.
//!
//! # Architecture
//!
//! The pipeline turns audio into identity decisions in four stages:
//!
//! 1. [`VoiceActivityDetector::detect`]: 16 kHz mono float -> speech segments
//! 2. [`EmbeddingExtractor::extract`]: audio -> L2-normalized speaker vector
//! 3. [`similarity::best_match`]: query vector -> best enrolled candidate
//! 4. [`SpeakerRegistry`]: enroll / identify / verify over a persistent
//!    speaker table with a reader-writer-locked in-memory cache
//!
//! [`Diarizer`] reuses stages 1-2 per segment and clusters the resulting
//! vectors to attribute time ranges to speakers.
//!
//! # Concurrency
//!
//! All public types are `Send + Sync`. Identification and verification scan
//! under a shared lock; enrollment and removal hold the exclusive lock
//! across both the cache update and the persistent write, so a completed
//! enroll is visible to every later call. Failure details are mirrored into
//! a per-thread slot readable via [`error::last_error`].

pub mod clustering;
pub mod embedding;
pub mod error;
pub mod registry;
pub mod similarity;
pub mod store;
pub mod vad;

mod diarizer;

pub use diarizer::{DiarizeConfig, DiarizeSegment, Diarizer};
pub use embedding::{
    EmbeddingExtractor, DEFAULT_EMBEDDING_DIM, MIN_SPEECH_SECONDS, SPEAKER_MODEL_FILE,
    VAD_MODEL_FILE,
};
pub use error::{last_error, set_last_error, VoiceprintError};
pub use registry::{Identification, SpeakerRegistry, DEFAULT_THRESHOLD};
pub use similarity::{best_match, cosine_similarity, l2_normalize, BestMatch};
pub use store::{SpeakerProfile, SqliteStore};
pub use vad::{SpeechSegment, VadConfig, VoiceActivityDetector, WINDOW_SIZE};
