//! Speaker registry: a write-through cache over the persistent table.
//!
//! The in-memory map is authoritative for reads during a session and is
//! protected by a reader/writer lock: identification and verification scan
//! under a shared lock, enrollment and removal mutate under an exclusive
//! lock, and the persistent write happens inside the exclusive section so a
//! completed enroll is visible to any later identify/verify.

use std::collections::HashMap;
use std::path::Path;

use parking_lot::{Mutex, RwLock};

use crate::embedding::EmbeddingExtractor;
use crate::error::{record, VoiceprintError};
use crate::similarity::{best_match, cosine_similarity, l2_normalize, BestMatch};
use crate::store::{SpeakerProfile, SqliteStore};

/// Default 1:N / 1:1 acceptance threshold on cosine similarity.
pub const DEFAULT_THRESHOLD: f32 = 0.30;

/// A successful 1:N identification.
#[derive(Debug, Clone)]
pub struct Identification {
    pub speaker_id: String,
    pub score: f32,
}

/// Thread-safe speaker registry backed by a SQLite table.
pub struct SpeakerRegistry {
    extractor: Option<Mutex<EmbeddingExtractor>>,
    cache: RwLock<HashMap<String, SpeakerProfile>>,
    store: Mutex<SqliteStore>,
    threshold: RwLock<f32>,
}

impl SpeakerRegistry {
    /// Opens the registry: loads the speaker and VAD models from
    /// `model_dir`, opens the database, and fills the cache from it.
    pub fn open<P: AsRef<Path>, Q: AsRef<Path>>(
        model_dir: P,
        db_path: Q,
    ) -> Result<Self, VoiceprintError> {
        let extractor = EmbeddingExtractor::new(model_dir, 1)?;
        let mut registry = Self::open_embedding_only(db_path)?;
        registry.extractor = Some(Mutex::new(extractor));
        Ok(registry)
    }

    /// Opens the registry without neural models. Embedding-level operations
    /// ([`enroll_embedding`](Self::enroll_embedding),
    /// [`match_embedding`](Self::match_embedding), removal, counting) work;
    /// audio-level operations fail with `NotInit`.
    pub fn open_embedding_only<P: AsRef<Path>>(db_path: P) -> Result<Self, VoiceprintError> {
        let store = SqliteStore::open(db_path)?;
        let profiles = store.load_all()?;

        let mut cache = HashMap::with_capacity(profiles.len());
        for profile in profiles {
            cache.insert(profile.speaker_id.clone(), profile);
        }
        tracing::info!(speakers = cache.len(), "speaker registry ready");

        Ok(Self {
            extractor: None,
            cache: RwLock::new(cache),
            store: Mutex::new(store),
            threshold: RwLock::new(DEFAULT_THRESHOLD),
        })
    }

    /// Enrolls audio under `speaker_id`, creating or updating the profile.
    pub fn enroll(
        &self,
        speaker_id: &str,
        audio: &[f32],
        sample_rate: u32,
    ) -> Result<(), VoiceprintError> {
        record(self.enroll_inner(speaker_id, audio, sample_rate))
    }

    fn enroll_inner(
        &self,
        speaker_id: &str,
        audio: &[f32],
        sample_rate: u32,
    ) -> Result<(), VoiceprintError> {
        validate_id(speaker_id)?;
        validate_audio(audio)?;
        let embedding = self.extract(audio, sample_rate)?;
        self.enroll_embedding(speaker_id, embedding)
    }

    /// Enrolls a WAV file under `speaker_id`.
    pub fn enroll_file<P: AsRef<Path>>(
        &self,
        speaker_id: &str,
        wav_path: P,
    ) -> Result<(), VoiceprintError> {
        record(self.enroll_file_inner(speaker_id, wav_path.as_ref()))
    }

    fn enroll_file_inner(
        &self,
        speaker_id: &str,
        wav_path: &Path,
    ) -> Result<(), VoiceprintError> {
        validate_id(speaker_id)?;
        let extractor = self.extractor.as_ref().ok_or(VoiceprintError::NotInit)?;
        let embedding = extractor.lock().extract_from_file(wav_path)?;
        self.enroll_embedding(speaker_id, embedding)
    }

    /// Folds an already-computed L2-normalized embedding into the profile.
    ///
    /// First enrollment stores the embedding as-is; subsequent enrollments
    /// update the incremental mean and re-normalize. This is the only way
    /// the "embedding equals normalized mean" invariant is maintained.
    pub fn enroll_embedding(
        &self,
        speaker_id: &str,
        embedding: Vec<f32>,
    ) -> Result<(), VoiceprintError> {
        record(self.enroll_embedding_inner(speaker_id, embedding))
    }

    fn enroll_embedding_inner(
        &self,
        speaker_id: &str,
        embedding: Vec<f32>,
    ) -> Result<(), VoiceprintError> {
        validate_id(speaker_id)?;
        if embedding.is_empty() {
            return Err(VoiceprintError::InvalidParam("empty embedding".into()));
        }

        let mut cache = self.cache.write();
        let profile = match cache.get_mut(speaker_id) {
            Some(existing) => {
                if existing.embedding.len() != embedding.len() {
                    return Err(VoiceprintError::InvalidParam(format!(
                        "embedding dimension {} does not match enrolled {}",
                        embedding.len(),
                        existing.embedding.len()
                    )));
                }
                let n = existing.enroll_count as f64;
                for (mean, &new) in existing.embedding.iter_mut().zip(embedding.iter()) {
                    *mean = ((*mean as f64 * n + new as f64) / (n + 1.0)) as f32;
                }
                l2_normalize(&mut existing.embedding);
                existing.enroll_count += 1;
                tracing::info!(
                    speaker = speaker_id,
                    count = existing.enroll_count,
                    "speaker updated"
                );
                existing.clone()
            }
            None => {
                let profile = SpeakerProfile {
                    speaker_id: speaker_id.to_string(),
                    embedding,
                    enroll_count: 1,
                };
                cache.insert(speaker_id.to_string(), profile.clone());
                tracing::info!(speaker = speaker_id, "speaker enrolled");
                profile
            }
        };

        // Persist inside the exclusive section so a completed enroll is
        // atomically visible to later calls.
        self.store.lock().save(&profile)
    }

    /// Removes a speaker from the cache and the persistent table.
    pub fn remove(&self, speaker_id: &str) -> Result<(), VoiceprintError> {
        record(self.remove_inner(speaker_id))
    }

    fn remove_inner(&self, speaker_id: &str) -> Result<(), VoiceprintError> {
        validate_id(speaker_id)?;

        let mut cache = self.cache.write();
        if cache.remove(speaker_id).is_none() {
            return Err(VoiceprintError::SpeakerNotFound(speaker_id.to_string()));
        }
        let existed = self.store.lock().remove(speaker_id)?;
        if !existed {
            tracing::warn!(speaker = speaker_id, "removed from cache but absent in table");
        }
        tracing::info!(speaker = speaker_id, "speaker removed");
        Ok(())
    }

    /// 1:N identification.
    ///
    /// Returns the best match when its score reaches the threshold,
    /// otherwise `NoMatch` carrying the close miss for the caller to log.
    pub fn identify(
        &self,
        audio: &[f32],
        sample_rate: u32,
    ) -> Result<Identification, VoiceprintError> {
        record(self.identify_inner(audio, sample_rate))
    }

    fn identify_inner(
        &self,
        audio: &[f32],
        sample_rate: u32,
    ) -> Result<Identification, VoiceprintError> {
        validate_audio(audio)?;
        let embedding = self.extract(audio, sample_rate)?;
        let threshold = self.threshold();

        let best = {
            let cache = self.cache.read();
            best_match(
                &embedding,
                cache
                    .values()
                    .map(|p| (p.speaker_id.as_str(), p.embedding.as_slice())),
            )
        };

        match best {
            Some(m) if m.score >= threshold => {
                tracing::info!(speaker = %m.speaker_id, score = m.score, "identified");
                Ok(Identification {
                    speaker_id: m.speaker_id,
                    score: m.score,
                })
            }
            Some(m) => {
                tracing::info!(best = %m.speaker_id, score = m.score, threshold, "no match");
                Err(VoiceprintError::NoMatch {
                    best_id: m.speaker_id,
                    best_score: m.score,
                })
            }
            None => Err(VoiceprintError::NoMatch {
                best_id: String::new(),
                best_score: 0.0,
            }),
        }
    }

    /// 1:1 verification. The score is always reported, even below the
    /// threshold; the caller's decision layer compares.
    pub fn verify(
        &self,
        speaker_id: &str,
        audio: &[f32],
        sample_rate: u32,
    ) -> Result<f32, VoiceprintError> {
        record(self.verify_inner(speaker_id, audio, sample_rate))
    }

    fn verify_inner(
        &self,
        speaker_id: &str,
        audio: &[f32],
        sample_rate: u32,
    ) -> Result<f32, VoiceprintError> {
        validate_id(speaker_id)?;
        validate_audio(audio)?;

        // Copy the reference out under the shared lock, then release it for
        // the (slow) embedding computation.
        let reference = {
            let cache = self.cache.read();
            cache
                .get(speaker_id)
                .map(|p| p.embedding.clone())
                .ok_or_else(|| VoiceprintError::SpeakerNotFound(speaker_id.to_string()))?
        };

        let embedding = self.extract(audio, sample_rate)?;
        let score = cosine_similarity(&embedding, &reference);
        tracing::info!(speaker = speaker_id, score, "verified");
        Ok(score)
    }

    /// Scans all profiles for the embedding's best match, regardless of the
    /// threshold. Used by the diarizer for centroid matching.
    pub fn match_embedding(&self, embedding: &[f32]) -> Option<BestMatch> {
        let cache = self.cache.read();
        best_match(
            embedding,
            cache
                .values()
                .map(|p| (p.speaker_id.as_str(), p.embedding.as_slice())),
        )
    }

    /// Number of enrolled speakers.
    pub fn count(&self) -> usize {
        self.cache.read().len()
    }

    /// Sets the acceptance threshold, clamped to [0, 1].
    pub fn set_threshold(&self, threshold: f32) {
        let t = threshold.clamp(0.0, 1.0);
        *self.threshold.write() = t;
        tracing::info!(threshold = t, "threshold set");
    }

    /// Current acceptance threshold.
    pub fn threshold(&self) -> f32 {
        *self.threshold.read()
    }

    fn extract(&self, audio: &[f32], sample_rate: u32) -> Result<Vec<f32>, VoiceprintError> {
        let extractor = self.extractor.as_ref().ok_or(VoiceprintError::NotInit)?;
        extractor.lock().extract(audio, sample_rate)
    }
}

fn validate_id(speaker_id: &str) -> Result<(), VoiceprintError> {
    if speaker_id.is_empty() {
        return Err(VoiceprintError::InvalidParam(
            "speaker id must be non-empty".into(),
        ));
    }
    Ok(())
}

fn validate_audio(audio: &[f32]) -> Result<(), VoiceprintError> {
    if audio.is_empty() {
        return Err(VoiceprintError::InvalidParam("empty audio buffer".into()));
    }
    Ok(())
}
