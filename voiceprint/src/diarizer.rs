//! Multi-speaker diarization.
//!
//! VAD segments → per-segment embeddings → agglomerative clustering →
//! labeled time ranges, optionally matched against the speaker registry.

use std::path::Path;

use parking_lot::Mutex;

use crate::clustering::agglomerative_cluster;
use crate::embedding::EmbeddingExtractor;
use crate::error::{record, VoiceprintError};
use crate::registry::SpeakerRegistry;
use crate::similarity::l2_normalize;

/// Configures diarization.
#[derive(Debug, Clone)]
pub struct DiarizeConfig {
    /// Maximum cosine distance for merging clusters (default: 0.45).
    pub threshold: f32,
    /// Hard cap on the speaker count, 0 = unlimited (default: 0).
    pub max_clusters: usize,
    /// Segments shorter than this are dropped before embedding, seconds
    /// (default: 0.5).
    pub min_segment_sec: f32,
}

impl Default for DiarizeConfig {
    fn default() -> Self {
        Self {
            threshold: 0.45,
            max_clusters: 0,
            min_segment_sec: 0.5,
        }
    }
}

/// One diarized time range attributed to a cluster.
#[derive(Debug, Clone)]
pub struct DiarizeSegment {
    pub start_sec: f32,
    pub end_sec: f32,
    /// Auto-assigned label, `SPEAKER_<k>`.
    pub speaker_label: String,
    /// Registered speaker matched to the cluster centroid, when a registry
    /// was supplied and the match cleared its threshold.
    pub speaker_id: Option<String>,
    /// VAD confidence of the original segment, [0, 1].
    pub confidence: f32,
}

/// Segments audio by speaker.
pub struct Diarizer {
    extractor: Mutex<EmbeddingExtractor>,
    cfg: DiarizeConfig,
}

impl Diarizer {
    /// Loads the VAD and speaker models from `model_dir`.
    pub fn new<P: AsRef<Path>>(model_dir: P, cfg: DiarizeConfig) -> Result<Self, VoiceprintError> {
        let extractor = EmbeddingExtractor::new(model_dir, 1)?;
        tracing::info!(threshold = cfg.threshold, "diarizer ready");
        Ok(Self {
            extractor: Mutex::new(extractor),
            cfg,
        })
    }

    /// Diarizes 16 kHz mono audio into at most `max_out` segments.
    pub fn diarize(
        &self,
        audio: &[f32],
        max_out: usize,
    ) -> Result<Vec<DiarizeSegment>, VoiceprintError> {
        record(self.diarize_inner(audio, max_out, None))
    }

    /// Like [`diarize`](Self::diarize), additionally matching cluster
    /// centroids against the registry. The registry is borrowed only for
    /// the duration of the call.
    pub fn diarize_with_registry(
        &self,
        audio: &[f32],
        max_out: usize,
        registry: &SpeakerRegistry,
    ) -> Result<Vec<DiarizeSegment>, VoiceprintError> {
        record(self.diarize_inner(audio, max_out, Some(registry)))
    }

    fn diarize_inner(
        &self,
        audio: &[f32],
        max_out: usize,
        registry: Option<&SpeakerRegistry>,
    ) -> Result<Vec<DiarizeSegment>, VoiceprintError> {
        if audio.is_empty() || max_out == 0 {
            return Err(VoiceprintError::InvalidParam(
                "empty audio or zero output capacity".into(),
            ));
        }

        let sr = voxid_audio::SAMPLE_RATE;
        let mut extractor = self.extractor.lock();

        let segments = extractor.detect_speech(audio);
        if segments.is_empty() {
            tracing::warn!("diarizer found no speech");
            return Ok(Vec::new());
        }
        tracing::debug!(segments = segments.len(), "vad segments for diarization");

        // Embed each sufficiently long segment; segments whose speech
        // content is still too short for the embedding model are skipped.
        struct Embedded {
            start_sample: usize,
            end_sample: usize,
            confidence: f32,
            embedding: Vec<f32>,
        }
        let mut embedded: Vec<Embedded> = Vec::new();
        for seg in &segments {
            if seg.duration_sec(sr) < self.cfg.min_segment_sec {
                continue;
            }
            let start = seg.start_sample.min(audio.len());
            let end = seg.end_sample.min(audio.len());
            if end <= start {
                continue;
            }
            match extractor.extract(&audio[start..end], sr) {
                Ok(embedding) => embedded.push(Embedded {
                    start_sample: start,
                    end_sample: end,
                    confidence: seg.confidence,
                    embedding,
                }),
                Err(e) => {
                    tracing::debug!(start, end, error = %e, "segment skipped");
                }
            }
        }
        drop(extractor);

        if embedded.is_empty() {
            tracing::warn!("all segments too short to embed");
            return Ok(Vec::new());
        }

        let embeddings: Vec<Vec<f32>> = embedded.iter().map(|s| s.embedding.clone()).collect();
        let clusters =
            agglomerative_cluster(&embeddings, self.cfg.threshold, self.cfg.max_clusters);
        tracing::info!(
            segments = embedded.len(),
            speakers = clusters.num_clusters,
            "diarization clustered"
        );

        // Count-weighted centroids per cluster, then the optional match
        // against registered speakers.
        let dim = embeddings[0].len();
        let k = clusters.num_clusters;
        let mut centroids = vec![vec![0.0f32; dim]; k];
        let mut member_counts = vec![0usize; k];
        for (emb, &label) in embeddings.iter().zip(clusters.labels.iter()) {
            for (c, &v) in centroids[label].iter_mut().zip(emb.iter()) {
                *c += v;
            }
            member_counts[label] += 1;
        }
        for centroid in centroids.iter_mut() {
            l2_normalize(centroid);
        }

        let mut cluster_speaker: Vec<Option<String>> = vec![None; k];
        if let Some(registry) = registry {
            let threshold = registry.threshold();
            for (label, centroid) in centroids.iter().enumerate() {
                if member_counts[label] == 0 {
                    continue;
                }
                if let Some(m) = registry.match_embedding(centroid) {
                    if m.score >= threshold {
                        tracing::debug!(
                            cluster = label,
                            speaker = %m.speaker_id,
                            score = m.score,
                            "centroid matched registered speaker"
                        );
                        cluster_speaker[label] = Some(m.speaker_id);
                    }
                }
            }
        }

        let out = embedded
            .iter()
            .zip(clusters.labels.iter())
            .take(max_out)
            .map(|(seg, &label)| DiarizeSegment {
                start_sec: seg.start_sample as f32 / sr as f32,
                end_sec: seg.end_sample as f32 / sr as f32,
                speaker_label: format!("SPEAKER_{label}"),
                speaker_id: cluster_speaker[label].clone(),
                confidence: seg.confidence,
            })
            .collect();

        Ok(out)
    }
}
