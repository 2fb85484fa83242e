//! Rule-based aggregations over quality, prosody, and emotion outputs.

use crate::types::{
    EmotionResult, FatigueLevel, HealthState, PleasantnessResult, QualityResult, StressLevel,
    VoiceFeatures, VoiceStateResult,
};

/// Pleasantness sub-scores from fixed weighted combinations, all in [0, 100].
pub fn compute_pleasantness(
    quality: &QualityResult,
    features: &VoiceFeatures,
    emotion: Option<&EmotionResult>,
) -> PleasantnessResult {
    // Magnetism: pitch in an appealing register, stable, resonant. Male
    // voices score best near 130 Hz, female near 210 Hz.
    let pitch_score = if features.pitch_hz > 0.0 {
        let ideal_male = (1.0 - (features.pitch_hz - 130.0).abs() / 100.0).clamp(0.0, 1.0);
        let ideal_female = (1.0 - (features.pitch_hz - 210.0).abs() / 100.0).clamp(0.0, 1.0);
        ideal_male.max(ideal_female)
    } else {
        0.5
    };
    let magnetism = ((0.4 * pitch_score
        + 0.35 * features.voice_stability
        + 0.25 * features.resonance_score)
        * 100.0)
        .clamp(0.0, 100.0);

    // Warmth: positive valence, moderate rate, little breathiness.
    let valence_norm = match emotion {
        Some(e) => ((e.valence + 1.0) / 2.0).clamp(0.0, 1.0),
        None => 0.5,
    };
    let rate_score = (1.0 - (features.speaking_rate - 4.0).abs() / 4.0).clamp(0.0, 1.0);
    let warmth = ((0.5 * valence_norm + 0.3 * rate_score + 0.2 * (1.0 - features.breathiness))
        * 100.0)
        .clamp(0.0, 100.0);

    // Authority: stable, resonant, clean phonation.
    let authority = ((0.4 * features.voice_stability
        + 0.35 * features.resonance_score
        + 0.25 * (1.0 - features.breathiness))
        * 100.0)
        .clamp(0.0, 100.0);

    // Clarity: MOS, SNR, and the spectral clarity proxy.
    let mos_norm = ((quality.mos_score - 1.0) / 4.0).clamp(0.0, 1.0);
    let snr_norm = ((quality.snr_db + 5.0) / 40.0).clamp(0.0, 1.0);
    let clarity_score =
        ((0.5 * mos_norm + 0.3 * snr_norm + 0.2 * quality.clarity) * 100.0).clamp(0.0, 100.0);

    let overall_score = (0.30 * magnetism + 0.25 * warmth + 0.20 * authority
        + 0.25 * clarity_score)
        .clamp(0.0, 100.0);

    PleasantnessResult {
        overall_score,
        magnetism,
        warmth,
        authority,
        clarity_score,
    }
}

/// Fatigue / health / stress classification.
pub fn compute_voice_state(
    quality: &QualityResult,
    features: &VoiceFeatures,
    emotion: Option<&EmotionResult>,
) -> VoiceStateResult {
    // Fatigue: low F0, slow rate, low energy, deteriorating stability.
    let mut fatigue = 0.0f32;
    if features.pitch_hz > 0.0 && features.pitch_hz < 100.0 {
        fatigue += 0.25;
    }
    if features.speaking_rate < 2.5 {
        fatigue += 0.25;
    }
    if features.energy_mean < 0.02 {
        fatigue += 0.25;
    }
    if features.voice_stability < 0.4 {
        fatigue += 0.25;
    }
    let fatigue_score = fatigue.clamp(0.0, 1.0);
    let fatigue_level = if fatigue > 0.7 {
        FatigueLevel::High
    } else if fatigue > 0.35 {
        FatigueLevel::Moderate
    } else {
        FatigueLevel::Normal
    };

    // Health: hoarse = breathy + low HNR; breathy alone; nasal = strong
    // mid resonance with a flat pitch contour.
    let health_state = if features.breathiness > 0.7 && quality.hnr_db < 5.0 {
        HealthState::Hoarse
    } else if features.breathiness > 0.65 {
        HealthState::Breathy
    } else if features.resonance_score > 0.75 && features.pitch_variability < 20.0 {
        HealthState::Nasal
    } else {
        HealthState::Normal
    };
    let health_score = (0.5 * (1.0 - features.breathiness)
        + 0.5 * ((quality.hnr_db + 5.0) / 30.0).clamp(0.0, 1.0))
    .clamp(0.0, 1.0);

    // Stress: elevated expressive F0, fast rate, high arousal, dynamic
    // energy.
    let mut stress = 0.0f32;
    if features.pitch_hz > 220.0 && features.pitch_variability > 40.0 {
        stress += 0.3;
    }
    if features.speaking_rate > 6.0 {
        stress += 0.25;
    }
    if let Some(e) = emotion {
        if e.arousal.abs() > 0.5 {
            stress += 0.25;
        }
    }
    if features.energy_variability > 0.1 {
        stress += 0.2;
    }
    let stress_score = stress.clamp(0.0, 1.0);
    let stress_level = if stress > 0.65 {
        StressLevel::High
    } else if stress > 0.30 {
        StressLevel::Medium
    } else {
        StressLevel::Low
    };

    VoiceStateResult {
        fatigue_level,
        health_state,
        stress_level,
        fatigue_score,
        stress_score,
        health_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Emotion, EMOTION_COUNT};

    fn quality() -> QualityResult {
        QualityResult {
            mos_score: 4.0,
            snr_db: 25.0,
            clarity: 0.6,
            noise_level: 0.2,
            loudness_lufs: -20.0,
            hnr_db: 18.0,
        }
    }

    fn features() -> VoiceFeatures {
        VoiceFeatures {
            pitch_hz: 130.0,
            pitch_variability: 15.0,
            speaking_rate: 4.0,
            voice_stability: 0.8,
            resonance_score: 0.6,
            breathiness: 0.2,
            energy_mean: 0.1,
            energy_variability: 0.03,
        }
    }

    fn emotion(valence: f32, arousal: f32) -> EmotionResult {
        EmotionResult {
            emotion: Emotion::Neutral,
            scores: [1.0 / EMOTION_COUNT as f32; EMOTION_COUNT],
            valence,
            arousal,
        }
    }

    #[test]
    fn pleasantness_exact_weights() {
        let p = compute_pleasantness(&quality(), &features(), None);
        // pitch_score = 1.0 (130 Hz male ideal), stability 0.8, resonance 0.6
        // magnetism = (0.4 + 0.28 + 0.15) * 100 = 83
        assert!((p.magnetism - 83.0).abs() < 0.1, "magnetism {}", p.magnetism);
        // warmth = (0.5*0.5 + 0.3*1.0 + 0.2*0.8) * 100 = 71
        assert!((p.warmth - 71.0).abs() < 0.1, "warmth {}", p.warmth);
        // authority = (0.32 + 0.21 + 0.2) * 100 = 73
        assert!((p.authority - 73.0).abs() < 0.1, "authority {}", p.authority);
        // clarity = (0.5*0.75 + 0.3*0.75 + 0.2*0.6) * 100 = 72
        assert!(
            (p.clarity_score - 72.0).abs() < 0.1,
            "clarity {}",
            p.clarity_score
        );
        // overall = 0.30*83 + 0.25*71 + 0.20*73 + 0.25*72 = 75.25
        assert!((p.overall_score - 75.25).abs() < 0.1, "overall {}", p.overall_score);
    }

    #[test]
    fn pleasantness_bounds_on_extremes() {
        let vf = VoiceFeatures {
            pitch_hz: 0.0,
            breathiness: 1.0,
            ..VoiceFeatures::default()
        };
        let p = compute_pleasantness(&quality(), &vf, Some(&emotion(-1.0, 1.0)));
        for v in [p.overall_score, p.magnetism, p.warmth, p.authority, p.clarity_score] {
            assert!((0.0..=100.0).contains(&v), "score {v}");
        }
    }

    #[test]
    fn positive_valence_raises_warmth() {
        let happy = compute_pleasantness(&quality(), &features(), Some(&emotion(0.8, 0.3)));
        let sad = compute_pleasantness(&quality(), &features(), Some(&emotion(-0.8, 0.3)));
        assert!(happy.warmth > sad.warmth);
    }

    #[test]
    fn fatigue_accumulates_per_rule() {
        let vf = VoiceFeatures {
            pitch_hz: 80.0,
            speaking_rate: 2.0,
            energy_mean: 0.01,
            voice_stability: 0.3,
            ..VoiceFeatures::default()
        };
        let state = compute_voice_state(&quality(), &vf, None);
        assert!((state.fatigue_score - 1.0).abs() < 1e-6);
        assert_eq!(state.fatigue_level, FatigueLevel::High);
    }

    #[test]
    fn healthy_voice_is_normal() {
        let state = compute_voice_state(&quality(), &features(), None);
        assert_eq!(state.health_state, HealthState::Normal);
        assert_eq!(state.fatigue_level, FatigueLevel::Normal);
        assert!(state.health_score > 0.7);
    }

    #[test]
    fn hoarse_beats_breathy_classification() {
        let mut q = quality();
        q.hnr_db = 2.0;
        let vf = VoiceFeatures {
            breathiness: 0.8,
            ..features()
        };
        let state = compute_voice_state(&q, &vf, None);
        assert_eq!(state.health_state, HealthState::Hoarse);
    }

    #[test]
    fn breathy_without_low_hnr() {
        let vf = VoiceFeatures {
            breathiness: 0.68,
            ..features()
        };
        let state = compute_voice_state(&quality(), &vf, None);
        assert_eq!(state.health_state, HealthState::Breathy);
    }

    #[test]
    fn nasal_needs_flat_pitch_and_resonance() {
        let vf = VoiceFeatures {
            resonance_score: 0.8,
            pitch_variability: 10.0,
            ..features()
        };
        let state = compute_voice_state(&quality(), &vf, None);
        assert_eq!(state.health_state, HealthState::Nasal);
    }

    #[test]
    fn stress_rules_stack() {
        let vf = VoiceFeatures {
            pitch_hz: 260.0,
            pitch_variability: 50.0,
            speaking_rate: 7.0,
            energy_variability: 0.2,
            ..features()
        };
        let state = compute_voice_state(&quality(), &vf, Some(&emotion(0.0, 0.9)));
        assert!((state.stress_score - 1.0).abs() < 1e-6);
        assert_eq!(state.stress_level, StressLevel::High);
    }

    #[test]
    fn negative_arousal_also_counts_toward_stress() {
        let state = compute_voice_state(&quality(), &features(), Some(&emotion(0.0, -0.8)));
        assert!((state.stress_score - 0.25).abs() < 1e-6);
    }

    #[test]
    fn calm_voice_is_low_stress() {
        let state = compute_voice_state(&quality(), &features(), None);
        assert_eq!(state.stress_level, StressLevel::Low);
        assert_eq!(state.stress_score, 0.0);
    }
}
