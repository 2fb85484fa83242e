//! Linear-interpolation resampler.
//!
//! Quality is sufficient for speech features at the rates this engine sees
//! (8/22.05/44.1/48 kHz down- or up-sampled to 16 kHz). Output length is
//! `ceil(input_len * dst / src)`.

/// Resamples `input` from `src_rate` to `dst_rate` by linear interpolation.
///
/// Returns the input unchanged when the rates match.
pub fn resample(input: &[f32], src_rate: u32, dst_rate: u32) -> Vec<f32> {
    if src_rate == dst_rate || input.is_empty() {
        return input.to_vec();
    }

    let ratio = dst_rate as f64 / src_rate as f64;
    let output_len = (input.len() as f64 * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let src_pos = i as f64 / ratio;
        let idx = src_pos as usize;
        let frac = src_pos - idx as f64;

        let v = if idx + 1 < input.len() {
            input[idx] as f64 * (1.0 - frac) + input[idx + 1] as f64 * frac
        } else if idx < input.len() {
            input[idx] as f64
        } else {
            0.0
        };
        output.push(v as f32);
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_when_rates_match() {
        let input = vec![0.1f32, -0.5, 0.9];
        assert_eq!(resample(&input, 16_000, 16_000), input);
    }

    #[test]
    fn upsample_doubles_length() {
        let input = vec![0.25f32; 8000];
        let out = resample(&input, 8000, 16_000);
        assert!((out.len() as i64 - 16_000).unsigned_abs() <= 10);
    }

    #[test]
    fn constant_signal_preserved() {
        let input = vec![0.7f32; 4000];
        let out = resample(&input, 8000, 16_000);
        for &v in &out {
            assert!((v - 0.7).abs() < 0.01, "constant drifted: {v}");
        }
    }

    #[test]
    fn downsample_halves_length() {
        let input = vec![0.0f32; 32_000];
        let out = resample(&input, 32_000, 16_000);
        assert!((out.len() as i64 - 16_000).unsigned_abs() <= 10);
    }

    #[test]
    fn sine_shape_survives_upsampling() {
        // 100 Hz sine at 8 kHz upsampled to 16 kHz stays close to the
        // analytic sine at the new rate.
        let input: Vec<f32> = (0..8000)
            .map(|i| (2.0 * std::f32::consts::PI * 100.0 * i as f32 / 8000.0).sin())
            .collect();
        let out = resample(&input, 8000, 16_000);
        for (i, &v) in out.iter().enumerate().take(15_000) {
            let expected = (2.0 * std::f32::consts::PI * 100.0 * i as f32 / 16_000.0).sin();
            assert!((v - expected).abs() < 0.05, "sample {i}: {v} vs {expected}");
        }
    }

    #[test]
    fn empty_input() {
        assert!(resample(&[], 8000, 16_000).is_empty());
    }
}
