//! Channel mixing and sample-rate conversion.
//!
//! STT engines consume **16 kHz mono `f32`**.  Both audio sources run their
//! input through [`downmix`] and then [`resample`] before handing samples
//! to the engine.  Resampling is linear interpolation, which is adequate for
//! speech.

/// Sample rate every STT engine expects.
pub const SAMPLE_RATE: u32 = 16_000;

/// Average interleaved `channels` down to mono.  `0` channels yields an
/// empty vector.
pub fn downmix(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

/// Convert mono `samples` from `from_rate` to `to_rate` Hz.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || from_rate == 0 || to_rate == 0 {
        return samples.to_vec();
    }
    if samples.is_empty() {
        return Vec::new();
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let out_len = (samples.len() as f64 * ratio).ceil() as usize;

    (0..out_len)
        .map(|i| {
            let pos = i as f64 / ratio;
            let idx = pos as usize;
            let frac = (pos - idx as f64) as f32;
            match (samples.get(idx), samples.get(idx + 1)) {
                (Some(a), Some(b)) => a * (1.0 - frac) + b * frac,
                (Some(a), None) => *a,
                _ => 0.0,
            }
        })
        .collect()
}

/// Scale a signed integer PCM sample of `bits` width to `[-1.0, 1.0]`.
pub fn int_to_f32(sample: i32, bits: u16) -> f32 {
    let bits = bits.clamp(1, 32);
    sample as f32 / (1_i64 << (bits - 1)) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_averages_frames() {
        let out = downmix(&[1.0, -1.0, 0.5, 0.5], 2);
        assert_eq!(out, vec![0.0, 0.5]);
        assert_eq!(downmix(&[0.3, 0.4], 1), vec![0.3, 0.4]);
        assert!(downmix(&[1.0], 0).is_empty());
    }

    #[test]
    fn resample_lengths() {
        assert_eq!(resample(&vec![0.5; 480], 48_000, SAMPLE_RATE).len(), 160);
        assert_eq!(resample(&vec![0.0; 80], 8_000, SAMPLE_RATE).len(), 160);
        assert_eq!(resample(&vec![0.1; 160], SAMPLE_RATE, SAMPLE_RATE).len(), 160);
        assert!(resample(&[], 44_100, SAMPLE_RATE).is_empty());
    }

    #[test]
    fn resample_preserves_dc_level() {
        for s in resample(&vec![0.5; 441], 44_100, SAMPLE_RATE) {
            assert!((s - 0.5).abs() < 1e-5, "amplitude drift: {s}");
        }
    }

    #[test]
    fn int_scaling() {
        assert!((int_to_f32(16_384, 16) - 0.5).abs() < 1e-6);
        assert!((int_to_f32(-32_768, 16) + 1.0).abs() < 1e-6);
    }
}
