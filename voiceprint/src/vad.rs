//! Voice activity detection.
//!
//! Wraps a streaming silero-style detector: 512-sample windows through a
//! stateful session (`input [1,512]`, `state [2,1,128]`, `sr [1]` →
//! probability + next state), followed by a segmentation state machine and
//! a merge pass over the resulting segments.

use std::path::Path;

use ndarray::{Array1, Array2, ArrayD};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;

use crate::error::{set_last_error, VoiceprintError};

/// Fixed analysis window: 512 samples = 32 ms at 16 kHz.
pub const WINDOW_SIZE: usize = 512;

const STATE_SHAPE: [usize; 3] = [2, 1, 128];

/// Configures VAD segmentation.
#[derive(Debug, Clone)]
pub struct VadConfig {
    /// Speech probability threshold (default: 0.5).
    pub threshold: f32,
    /// Minimum silence to close a segment, ms (default: 300).
    pub min_silence_ms: u32,
    /// Minimum segment length to emit, ms (default: 250).
    pub min_speech_ms: u32,
    /// Sample rate fed to the model (default: 16000).
    pub sample_rate: u32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            min_silence_ms: 300,
            min_speech_ms: 250,
            sample_rate: 16_000,
        }
    }
}

/// One detected speech interval, in samples of the analyzed buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeechSegment {
    pub start_sample: usize,
    pub end_sample: usize,
    /// Mean speech probability over the segment's voiced windows, [0, 1].
    pub confidence: f32,
}

impl SpeechSegment {
    /// Segment duration in seconds at the given rate.
    pub fn duration_sec(&self, sample_rate: u32) -> f32 {
        (self.end_sample - self.start_sample) as f32 / sample_rate as f32
    }
}

/// Streaming neural voice activity detector.
pub struct VoiceActivityDetector {
    session: Session,
    state: ArrayD<f32>,
    sr: Array1<i64>,
    cfg: VadConfig,
}

impl VoiceActivityDetector {
    /// Loads the VAD model from a file.
    pub fn new<P: AsRef<Path>>(model_path: P, cfg: VadConfig) -> Result<Self, VoiceprintError> {
        let path = model_path.as_ref();
        let session = (|| -> ort::Result<Session> {
            Session::builder()?
                .with_optimization_level(GraphOptimizationLevel::Level3)?
                .with_intra_threads(1)?
                .commit_from_file(path)
        })()
        .map_err(|e| VoiceprintError::ModelLoad(format!("{}: {e}", path.display())))?;

        tracing::info!(path = %path.display(), "vad model loaded");

        let sr = Array1::from_elem(1, cfg.sample_rate as i64);
        Ok(Self {
            session,
            state: ArrayD::zeros(STATE_SHAPE.as_slice()),
            sr,
            cfg,
        })
    }

    /// Detects speech segments in the buffer.
    ///
    /// Inference failure is non-fatal: it returns an empty list with the
    /// thread-local last error set, which callers treat as "no speech".
    pub fn detect(&mut self, audio: &[f32]) -> Vec<SpeechSegment> {
        match self.try_detect(audio) {
            Ok(segments) => segments,
            Err(e) => {
                tracing::warn!(error = %e, "vad inference failed, treating as no speech");
                set_last_error(&e);
                Vec::new()
            }
        }
    }

    /// Concatenates the samples of every detected segment, in order.
    /// Empty when no speech is found.
    pub fn filter_silence(&mut self, audio: &[f32]) -> Vec<f32> {
        let segments = self.detect(audio);
        let filtered = slice_segments(audio, &segments);
        if !segments.is_empty() {
            tracing::debug!(
                input = audio.len(),
                output = filtered.len(),
                segments = segments.len(),
                "silence filtered"
            );
        }
        filtered
    }

    /// Total speech time across segments, in seconds.
    pub fn speech_duration(segments: &[SpeechSegment], sample_rate: u32) -> f32 {
        segments.iter().map(|s| s.duration_sec(sample_rate)).sum()
    }

    fn try_detect(&mut self, audio: &[f32]) -> Result<Vec<SpeechSegment>, VoiceprintError> {
        // Fresh hidden state per utterance.
        self.state = ArrayD::zeros(STATE_SHAPE.as_slice());

        let sr = self.cfg.sample_rate as usize;
        let min_silence_samples = self.cfg.min_silence_ms as usize * sr / 1000;
        let min_speech_samples = self.cfg.min_speech_ms as usize * sr / 1000;

        let mut segments: Vec<SpeechSegment> = Vec::new();
        let mut in_speech = false;
        let mut speech_start = 0usize;
        let mut silence_counter = 0usize;
        let mut confidence_sum = 0.0f32;
        let mut voiced_windows = 0usize;

        let mut offset = 0usize;
        while offset + WINDOW_SIZE <= audio.len() {
            let prob = self.step(&audio[offset..offset + WINDOW_SIZE])?;

            if prob >= self.cfg.threshold {
                if !in_speech {
                    speech_start = offset;
                    in_speech = true;
                    confidence_sum = 0.0;
                    voiced_windows = 0;
                }
                silence_counter = 0;
                confidence_sum += prob;
                voiced_windows += 1;
            } else if in_speech {
                silence_counter += WINDOW_SIZE;
                if silence_counter >= min_silence_samples {
                    let speech_end = offset - silence_counter + WINDOW_SIZE;
                    if speech_end.saturating_sub(speech_start) >= min_speech_samples {
                        segments.push(SpeechSegment {
                            start_sample: speech_start,
                            end_sample: speech_end,
                            confidence: mean_confidence(confidence_sum, voiced_windows),
                        });
                    }
                    in_speech = false;
                    silence_counter = 0;
                }
            }

            offset += WINDOW_SIZE;
        }

        // Close a segment still open at end of audio.
        if in_speech {
            let speech_end = audio.len();
            if speech_end.saturating_sub(speech_start) >= min_speech_samples {
                segments.push(SpeechSegment {
                    start_sample: speech_start,
                    end_sample: speech_end,
                    confidence: mean_confidence(confidence_sum, voiced_windows),
                });
            }
        }

        // Merge neighbors closer than the silence threshold; noisy windows
        // can split one utterance into two.
        if segments.len() > 1 {
            let mut merged: Vec<SpeechSegment> = Vec::with_capacity(segments.len());
            merged.push(segments[0]);
            for seg in segments.into_iter().skip(1) {
                let last = merged.len() - 1;
                if seg.start_sample.saturating_sub(merged[last].end_sample) < min_silence_samples {
                    merged[last].end_sample = seg.end_sample;
                    merged[last].confidence = (merged[last].confidence + seg.confidence) / 2.0;
                } else {
                    merged.push(seg);
                }
            }
            segments = merged;
        }

        tracing::debug!(segments = segments.len(), "vad detection complete");
        Ok(segments)
    }

    fn step(&mut self, window: &[f32]) -> Result<f32, VoiceprintError> {
        let input = Array2::from_shape_vec((1, WINDOW_SIZE), window.to_vec())
            .map_err(|e| VoiceprintError::Inference(e.to_string()))?;

        let state = std::mem::take(&mut self.state);
        let inputs = ort::inputs![
            "input" => Tensor::from_array(input).map_err(to_inference_error)?,
            "state" => Tensor::from_array(state).map_err(to_inference_error)?,
            "sr" => Tensor::from_array(self.sr.clone().into_dyn()).map_err(to_inference_error)?,
        ];

        let outputs = self.session.run(inputs).map_err(to_inference_error)?;

        // Copy the returned hidden state back for the next step.
        self.state = outputs["stateN"]
            .try_extract_array::<f32>()
            .map_err(to_inference_error)?
            .to_owned();

        let (_, data) = outputs["output"]
            .try_extract_tensor::<f32>()
            .map_err(to_inference_error)?;
        Ok(data.first().copied().unwrap_or(0.0))
    }
}

fn to_inference_error(e: ort::Error) -> VoiceprintError {
    VoiceprintError::Inference(e.to_string())
}

fn mean_confidence(sum: f32, count: usize) -> f32 {
    if count > 0 {
        sum / count as f32
    } else {
        0.0
    }
}

/// Concatenates the audio covered by the segments, in order.
pub fn slice_segments(audio: &[f32], segments: &[SpeechSegment]) -> Vec<f32> {
    let mut out = Vec::new();
    for seg in segments {
        let start = seg.start_sample.min(audio.len());
        let end = seg.end_sample.min(audio.len());
        out.extend_from_slice(&audio[start..end]);
    }
    out
}

/// Samples NOT covered by any segment, in order. The noise complement of
/// [`slice_segments`].
pub fn slice_complement(audio: &[f32], segments: &[SpeechSegment]) -> Vec<f32> {
    let mut out = Vec::new();
    let mut cursor = 0usize;
    for seg in segments {
        let start = seg.start_sample.min(audio.len());
        if cursor < start {
            out.extend_from_slice(&audio[cursor..start]);
        }
        cursor = cursor.max(seg.end_sample.min(audio.len()));
    }
    if cursor < audio.len() {
        out.extend_from_slice(&audio[cursor..]);
    }
    out
}
