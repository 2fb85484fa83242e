//! Post-processing around the optional feature models.

use voxid_dsp::FbankFeatures;
use voxid_onnx::Model;

use crate::error::AnalyzeError;
use crate::language::language_for_index;
use crate::types::{
    AgeGroup, AgeResult, AntiSpoofResult, Emotion, EmotionResult, Gender, GenderResult,
    LanguageResult, EMOTION_COUNT,
};

/// Anti-spoof models take a fixed 4 s raw waveform (64600 samples @ 16 kHz).
pub const ANTISPOOF_SAMPLES: usize = 64_600;
/// DNSMOS takes a bin-major log-mel of 512 frames.
pub const DNSMOS_FRAMES: usize = 512;
/// Whisper-style language models take a bin-major log-mel of 3000 frames.
pub const LANGUAGE_FRAMES: usize = 3000;

/// In-place stable softmax.
pub(crate) fn softmax(xs: &mut [f32]) {
    if xs.is_empty() {
        return;
    }
    let max = xs.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut sum = 0.0f32;
    for x in xs.iter_mut() {
        *x = (*x - max).exp();
        sum += *x;
    }
    if sum > 1e-8 {
        for x in xs.iter_mut() {
            *x /= sum;
        }
    }
}

/// Zero-pads or truncates a waveform to exactly `len` samples.
pub(crate) fn pad_or_truncate(pcm: &[f32], len: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; len];
    let copy = pcm.len().min(len);
    out[..copy].copy_from_slice(&pcm[..copy]);
    out
}

/// Transposes frame-major fbank data into a zero-padded bin-major buffer
/// `[num_bins][target_frames]`, truncating past `target_frames`.
pub(crate) fn bin_major(feats: &FbankFeatures, target_frames: usize) -> Vec<f32> {
    let bins = feats.num_bins;
    let mut out = vec![0.0f32; bins * target_frames];
    let frames = feats.num_frames.min(target_frames);
    for t in 0..frames {
        for b in 0..bins {
            out[b * target_frames + t] = feats.data[t * bins + b];
        }
    }
    out
}

/// Gender + age model: `[1,T,80]` → at least 7 logits
/// (3 gender + 4 age group, optional regressed age as the 8th).
pub(crate) fn run_gender_age(
    model: &mut Model,
    feats: &FbankFeatures,
) -> Result<(GenderResult, AgeResult), AnalyzeError> {
    let shape = [1i64, feats.num_frames as i64, feats.num_bins as i64];
    let raw = model.run(&feats.data, &shape)?;
    if raw.len() < 7 {
        return Err(AnalyzeError::Inference(format!(
            "gender_age model output too small: {}",
            raw.len()
        )));
    }

    let mut gender_scores = [raw[0], raw[1], raw[2]];
    softmax(&mut gender_scores);
    let gender_idx = argmax(&gender_scores);

    let mut group_scores = [raw[3], raw[4], raw[5], raw[6]];
    softmax(&mut group_scores);
    let group_idx = argmax(&group_scores);
    let group = AgeGroup::from_index(group_idx);

    let age_years = if raw.len() >= 8 {
        raw[7].round().clamp(0.0, 100.0) as u32
    } else {
        group.midpoint_years()
    };

    Ok((
        GenderResult {
            gender: Gender::from_index(gender_idx),
            scores: gender_scores,
        },
        AgeResult {
            age_years,
            group,
            confidence: group_scores[group_idx],
            group_scores,
        },
    ))
}

/// Emotion model: `[1,T,80]` → at least 8 class logits, optional
/// valence/arousal at positions 8/9.
pub(crate) fn run_emotion(
    model: &mut Model,
    feats: &FbankFeatures,
) -> Result<EmotionResult, AnalyzeError> {
    let shape = [1i64, feats.num_frames as i64, feats.num_bins as i64];
    let raw = model.run(&feats.data, &shape)?;
    if raw.len() < EMOTION_COUNT {
        return Err(AnalyzeError::Inference(format!(
            "emotion model output too small: {}",
            raw.len()
        )));
    }

    let mut scores = [0.0f32; EMOTION_COUNT];
    scores.copy_from_slice(&raw[..EMOTION_COUNT]);
    softmax(&mut scores);
    let emotion = Emotion::from_index(argmax(&scores));

    let valence = match raw.get(EMOTION_COUNT) {
        Some(&v) => v.tanh().clamp(-1.0, 1.0),
        None => emotion.default_valence(),
    };
    let arousal = match raw.get(EMOTION_COUNT + 1) {
        Some(&v) => v.tanh().clamp(-1.0, 1.0),
        None => emotion.default_arousal(),
    };

    Ok(EmotionResult {
        emotion,
        scores,
        valence,
        arousal,
    })
}

/// Anti-spoof model: `[1,64600]` raw waveform → `[spoof, genuine]` logits.
pub(crate) fn run_antispoof(
    model: &mut Model,
    pcm: &[f32],
) -> Result<AntiSpoofResult, AnalyzeError> {
    let input = pad_or_truncate(pcm, ANTISPOOF_SAMPLES);
    let raw = model.run(&input, &[1, ANTISPOOF_SAMPLES as i64])?;
    if raw.len() < 2 {
        return Err(AnalyzeError::Inference(format!(
            "antispoof model output too small: {}",
            raw.len()
        )));
    }

    let mut logits = [raw[0], raw[1]];
    softmax(&mut logits);
    Ok(AntiSpoofResult {
        is_genuine: logits[1] >= 0.5,
        genuine_score: logits[1],
        spoof_score: logits[0],
    })
}

/// DNSMOS model: `[1,80,512]` bin-major log-mel → `[SIG, BAK, OVR]`.
/// Returns OVR clamped to [1, 5].
pub(crate) fn run_dnsmos(model: &mut Model, feats: &FbankFeatures) -> Result<f32, AnalyzeError> {
    let input = bin_major(feats, DNSMOS_FRAMES);
    let shape = [1i64, feats.num_bins as i64, DNSMOS_FRAMES as i64];
    let raw = model.run(&input, &shape)?;
    match raw.len() {
        0 => Err(AnalyzeError::Inference("dnsmos returned no output".into())),
        1 | 2 => Ok(raw[0].clamp(1.0, 5.0)),
        _ => Ok(raw[2].clamp(1.0, 5.0)),
    }
}

/// Language model: `[1,80,3000]` bin-major log-mel → language logits.
pub(crate) fn run_language(
    model: &mut Model,
    feats: &FbankFeatures,
) -> Result<LanguageResult, AnalyzeError> {
    let input = bin_major(feats, LANGUAGE_FRAMES);
    let shape = [1i64, feats.num_bins as i64, LANGUAGE_FRAMES as i64];
    let mut raw = model.run(&input, &shape)?;
    if raw.is_empty() {
        return Err(AnalyzeError::Inference(
            "language model returned no output".into(),
        ));
    }

    let index = argmax(&raw);
    softmax(&mut raw);
    Ok(language_for_index(index, raw[index]))
}

fn argmax(xs: &[f32]) -> usize {
    let mut best = 0usize;
    for (i, &v) in xs.iter().enumerate() {
        if v > xs[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn softmax_sums_to_one() {
        let mut xs = [1.0f32, 2.0, 3.0, 4.0];
        softmax(&mut xs);
        let sum: f32 = xs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(xs[3] > xs[0]);
    }

    #[test]
    fn softmax_handles_large_logits() {
        let mut xs = [1000.0f32, 1001.0];
        softmax(&mut xs);
        assert!(xs.iter().all(|x| x.is_finite()));
        assert!((xs.iter().sum::<f32>() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn pad_or_truncate_pads_short_input() {
        let out = pad_or_truncate(&[1.0, 2.0], 5);
        assert_eq!(out, vec![1.0, 2.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn pad_or_truncate_truncates_long_input() {
        let input: Vec<f32> = (0..ANTISPOOF_SAMPLES + 100).map(|i| i as f32).collect();
        let out = pad_or_truncate(&input, ANTISPOOF_SAMPLES);
        assert_eq!(out.len(), ANTISPOOF_SAMPLES);
        assert_eq!(out[ANTISPOOF_SAMPLES - 1], (ANTISPOOF_SAMPLES - 1) as f32);
    }

    #[test]
    fn bin_major_transposes() {
        // 2 frames x 3 bins, frame-major: [f0b0, f0b1, f0b2, f1b0, f1b1, f1b2]
        let feats = FbankFeatures {
            data: vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            num_frames: 2,
            num_bins: 3,
        };
        let out = bin_major(&feats, 4);
        assert_eq!(out.len(), 3 * 4);
        // Bin 0 row: frames [1.0, 4.0], padded.
        assert_eq!(&out[0..4], &[1.0, 4.0, 0.0, 0.0]);
        // Bin 2 row: frames [3.0, 6.0], padded.
        assert_eq!(&out[8..12], &[3.0, 6.0, 0.0, 0.0]);
    }

    #[test]
    fn bin_major_truncates_extra_frames() {
        let feats = FbankFeatures {
            data: vec![1.0, 2.0, 3.0, 4.0],
            num_frames: 4,
            num_bins: 1,
        };
        let out = bin_major(&feats, 2);
        assert_eq!(out, vec![1.0, 2.0]);
    }

    #[test]
    fn argmax_first_wins_ties() {
        assert_eq!(argmax(&[0.5, 0.5, 0.1]), 0);
        assert_eq!(argmax(&[0.1, 0.9, 0.2]), 1);
    }
}
