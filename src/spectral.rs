//! Component B — Spectral Analyzer.
//!
//! Computes an STFT with a Hann window and converts magnitude to decibels
//! relative to the clip's own maximum (spec §4.B): the loudest bin in the
//! whole clip is 0 dB, everything else negative.

use crate::complex::{fft_in_place, hann_window, Complex};
use crate::config::{FFT_SIZE, HOP_LENGTH};

/// `spectrogram[time_frame][freq_bin]`, in dB relative to the clip max.
pub type Spectrogram = Vec<Vec<f32>>;

pub fn stft(samples: &[f32]) -> Spectrogram {
    if samples.is_empty() {
        return Vec::new();
    }

    let window = hann_window(FFT_SIZE);
    let num_bins = FFT_SIZE / 2 + 1;

    let mut raw_magnitudes: Vec<Vec<f32>> = Vec::new();
    let mut position = 0usize;
    loop {
        let available = samples.len().saturating_sub(position);
        let take = available.min(FFT_SIZE);

        let mut buf: Vec<Complex> = Vec::with_capacity(FFT_SIZE);
        for i in 0..FFT_SIZE {
            let sample = if i < take { samples[position + i] } else { 0.0 };
            buf.push(Complex::new(sample * window[i], 0.0));
        }

        fft_in_place(&mut buf);
        let magnitudes: Vec<f32> = buf[..num_bins].iter().map(Complex::norm).collect();
        raw_magnitudes.push(magnitudes);

        if position + FFT_SIZE >= samples.len() {
            break;
        }
        position += HOP_LENGTH;
    }

    let max_mag = raw_magnitudes
        .iter()
        .flatten()
        .copied()
        .fold(0.0f32, f32::max);

    raw_magnitudes
        .into_iter()
        .map(|frame| {
            frame
                .into_iter()
                .map(|mag| to_db(mag, max_mag))
                .collect()
        })
        .collect()
}

fn to_db(magnitude: f32, max_magnitude: f32) -> f32 {
    if magnitude <= 0.0 || max_magnitude <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * (magnitude / max_magnitude).log10()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_empty_spectrogram() {
        assert!(stft(&[]).is_empty());
    }

    #[test]
    fn loudest_bin_of_clip_is_zero_db() {
        let sr = 22_050.0;
        let freq = 1000.0;
        let samples: Vec<f32> = (0..sr as usize * 2)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sr).sin())
            .collect();
        let spec = stft(&samples);
        let max_db = spec
            .iter()
            .flatten()
            .copied()
            .fold(f32::NEG_INFINITY, f32::max);
        assert!((max_db - 0.0).abs() < 1e-3);
    }

    #[test]
    fn silence_has_no_finite_bins() {
        let samples = vec![0.0f32; FFT_SIZE * 2];
        let spec = stft(&samples);
        assert!(spec.iter().flatten().all(|&db| db == f32::NEG_INFINITY));
    }

    #[test]
    fn frame_count_advances_by_hop_length() {
        let samples = vec![0.5f32; FFT_SIZE + HOP_LENGTH * 3];
        let spec = stft(&samples);
        assert!(spec.len() >= 4);
    }
}
