//! Strings together B→D (spectral analysis, peak detection, hashing) into
//! the single `samples -> fingerprints` step shared by the ingestor, the
//! matcher's query path, and the stream orchestrator.

use crate::config::SAMPLE_RATE;
use crate::hashing::{self, Fingerprint};
use crate::peaks;
use crate::spectral;

/// Fingerprints a waveform already normalized to [`SAMPLE_RATE`].
///
/// Returns an empty set for waveforms shorter than one second (spec §3
/// Waveform invariant) — not an error, since both the matcher and the
/// orchestrator treat an empty fingerprint set as a plain "no match".
pub fn fingerprint_samples(samples: &[f32]) -> Vec<Fingerprint> {
    if samples.len() < SAMPLE_RATE as usize {
        return Vec::new();
    }

    let spectrogram = spectral::stft(samples);
    let peaks = peaks::detect_peaks(&spectrogram);
    hashing::hash_peaks(&peaks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_second_clip_yields_no_fingerprints() {
        let samples = vec![0.5f32; SAMPLE_RATE as usize / 2];
        assert!(fingerprint_samples(&samples).is_empty());
    }

    #[test]
    fn silence_yields_no_fingerprints() {
        let samples = vec![0.0f32; SAMPLE_RATE as usize * 2];
        assert!(fingerprint_samples(&samples).is_empty());
    }

    #[test]
    fn tone_yields_fingerprints() {
        let sr = SAMPLE_RATE as f32;
        let samples: Vec<f32> = (0..(SAMPLE_RATE * 3))
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / sr).sin())
            .collect();
        assert!(!fingerprint_samples(&samples).is_empty());
    }
}
