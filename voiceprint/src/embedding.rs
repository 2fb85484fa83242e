//! Speaker embedding extraction.
//!
//! Pipeline: condition to 16 kHz → VAD silence filtering (best-effort) →
//! 1.5 s minimum-speech gate → FBank with CMVN → speaker model →
//! L2 normalization.

use std::path::Path;

use voxid_dsp::{compute_fbank, FbankConfig};
use voxid_onnx::Model;

use crate::error::VoiceprintError;
use crate::similarity::l2_normalize;
use crate::vad::{SpeechSegment, VadConfig, VoiceActivityDetector};

/// Speaker embedding model file expected under the model directory.
pub const SPEAKER_MODEL_FILE: &str = "ecapa_tdnn.onnx";
/// VAD model file expected under the model directory.
pub const VAD_MODEL_FILE: &str = "silero_vad.onnx";

/// Minimum speech after silence filtering, seconds.
pub const MIN_SPEECH_SECONDS: f32 = 1.5;

/// Embedding dimension assumed when the model does not report one.
pub const DEFAULT_EMBEDDING_DIM: usize = 192;

/// Turns conditioned audio into L2-normalized speaker vectors.
///
/// Owns the VAD and the speaker model; the embedding dimension is fixed at
/// construction from the model's reported output shape.
pub struct EmbeddingExtractor {
    vad: VoiceActivityDetector,
    model: Model,
    fbank_cfg: FbankConfig,
    dim: usize,
}

impl EmbeddingExtractor {
    /// Loads the VAD and speaker models from `model_dir`.
    pub fn new<P: AsRef<Path>>(model_dir: P, threads: usize) -> Result<Self, VoiceprintError> {
        let dir = model_dir.as_ref();

        let vad = VoiceActivityDetector::new(dir.join(VAD_MODEL_FILE), VadConfig::default())?;
        let model = Model::load(dir.join(SPEAKER_MODEL_FILE), threads)?;

        let dim = model.output_dim().unwrap_or(DEFAULT_EMBEDDING_DIM);
        tracing::info!(dim, "embedding extractor ready");

        Ok(Self {
            vad,
            model,
            fbank_cfg: FbankConfig::default(),
            dim,
        })
    }

    /// Embedding dimension, fixed for the life of the extractor.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Runs VAD over already-conditioned 16 kHz audio.
    pub fn detect_speech(&mut self, audio: &[f32]) -> Vec<SpeechSegment> {
        self.vad.detect(audio)
    }

    /// Extracts an L2-normalized embedding from audio at any declared rate.
    pub fn extract(
        &mut self,
        audio: &[f32],
        sample_rate: u32,
    ) -> Result<Vec<f32>, VoiceprintError> {
        if audio.is_empty() {
            return Err(VoiceprintError::InvalidParam("empty audio buffer".into()));
        }

        let audio_16k = voxid_audio::condition(audio, sample_rate);

        // Best-effort silence filtering: no detected speech keeps the full
        // buffer rather than failing outright.
        let mut speech = self.vad.filter_silence(&audio_16k);
        if speech.is_empty() {
            tracing::warn!("vad found no speech, using full audio as fallback");
            speech = audio_16k;
        }

        let speech_sec = speech.len() as f32 / voxid_audio::SAMPLE_RATE as f32;
        if speech_sec < MIN_SPEECH_SECONDS {
            return Err(VoiceprintError::AudioTooShort {
                got_sec: speech_sec,
                min_sec: MIN_SPEECH_SECONDS,
            });
        }

        let feats = compute_fbank(&speech, &self.fbank_cfg)
            .ok_or_else(|| VoiceprintError::AudioInvalid("fbank extraction failed".into()))?;

        let shape = [1i64, feats.num_frames as i64, feats.num_bins as i64];
        let mut embedding = self.model.run(&feats.data, &shape)?;

        if embedding.len() > self.dim {
            embedding.truncate(self.dim);
        }
        l2_normalize(&mut embedding);

        tracing::debug!(
            dim = embedding.len(),
            speech_sec,
            "embedding extracted"
        );
        Ok(embedding)
    }

    /// Extracts an embedding from a WAV file.
    pub fn extract_from_file<P: AsRef<Path>>(
        &mut self,
        wav_path: P,
    ) -> Result<Vec<f32>, VoiceprintError> {
        let (samples, rate) = voxid_audio::read_wav(wav_path)?;
        self.extract(&samples, rate)
    }
}
