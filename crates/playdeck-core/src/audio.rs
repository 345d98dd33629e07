// crates/playdeck-core/src/audio.rs
//
// PCM mixing helpers.
//
// Frames carry audio as per-source chunks with gains (see frame.rs);
// consumers call `mix` to flatten them into the one interleaved buffer the
// wire format prescribes. Accumulation is i64 with saturation on the way
// back to i32, so two full-scale layers clip instead of wrapping.

use crate::frame::AudioChunk;

/// An all-zero interleaved buffer for one cadence slot.
pub fn silence(nb_samples: usize, channels: usize) -> Vec<i32> {
    vec![0i32; nb_samples * channels]
}

/// Mix `chunks` into one interleaved buffer of `nb_samples · channels`
/// values, applying each chunk's gain. Chunks shorter than the slot
/// contribute what they have; longer chunks are truncated.
pub fn mix(chunks: &[AudioChunk], nb_samples: usize, channels: usize) -> Vec<i32> {
    let len = nb_samples * channels;
    let mut acc = vec![0i64; len];
    for chunk in chunks {
        let gain = chunk.gain as f64;
        for (dst, &s) in acc.iter_mut().zip(chunk.samples.iter()) {
            *dst += (s as f64 * gain) as i64;
        }
    }
    acc.into_iter()
        .map(|v| v.clamp(i32::MIN as i64, i32::MAX as i64) as i32)
        .collect()
}

/// Peak absolute sample value after mixing — used by tests and level meters.
pub fn peak(chunks: &[AudioChunk], nb_samples: usize, channels: usize) -> i32 {
    mix(chunks, nb_samples, channels)
        .into_iter()
        .map(|v| v.saturating_abs())
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_is_zeroed() {
        let s = silence(4, 2);
        assert_eq!(s.len(), 8);
        assert!(s.iter().all(|&v| v == 0));
    }

    #[test]
    fn mix_applies_gain() {
        let chunk = AudioChunk::new(vec![1000i32; 4]);
        let half = chunk.regained(0.5);
        let out = mix(&[half], 2, 2);
        assert_eq!(out, vec![500; 4]);
    }

    #[test]
    fn mix_sums_sources() {
        let a = AudioChunk::new(vec![100i32; 4]);
        let b = AudioChunk::new(vec![-40i32; 4]);
        assert_eq!(mix(&[a, b], 2, 2), vec![60; 4]);
    }

    #[test]
    fn mix_saturates_instead_of_wrapping() {
        let a = AudioChunk::new(vec![i32::MAX; 2]);
        let b = AudioChunk::new(vec![i32::MAX; 2]);
        assert_eq!(mix(&[a, b], 1, 2), vec![i32::MAX; 2]);
    }

    #[test]
    fn crossfade_gains_preserve_total_level() {
        // At the midpoint of a cross-fade both chunks carry gain 0.5;
        // identical PCM should mix back to the original level.
        let pcm = std::sync::Arc::new(vec![8000i32; 4]);
        let s = AudioChunk::with_gain(std::sync::Arc::clone(&pcm), 0.5);
        let d = AudioChunk::with_gain(pcm, 0.5);
        assert_eq!(mix(&[s, d], 2, 2), vec![8000; 4]);
    }
}
