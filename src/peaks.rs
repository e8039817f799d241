//! Component C — Peak Detector.
//!
//! Selects time-frequency landmarks via a local-maximum filter over a
//! `PEAK_NEIGHBORHOOD`-sized rectangular window (spec §4.C). Plateaus
//! (multiple cells tied for the neighborhood max) are all returned.

use crate::config::{AMPLITUDE_THRESHOLD_DB, PEAK_NEIGHBORHOOD};
use crate::spectral::Spectrogram;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Peak {
    pub freq_bin: u32,
    pub time_frame: u32,
}

/// Mirrors `scipy.ndimage.maximum_filter`'s default, origin-0 footprint for
/// an even `size`: offsets run `[-size/2, size - size/2 - 1]` inclusive.
fn window_offsets(neighborhood: usize) -> (isize, isize) {
    let lower = -((neighborhood / 2) as isize);
    let upper = (neighborhood - neighborhood / 2) as isize - 1;
    (lower, upper)
}

pub fn detect_peaks(spectrogram: &Spectrogram) -> Vec<Peak> {
    if spectrogram.is_empty() {
        return Vec::new();
    }

    let num_frames = spectrogram.len();
    let num_bins = spectrogram[0].len();
    if num_bins == 0 {
        return Vec::new();
    }

    let (lower, upper) = window_offsets(PEAK_NEIGHBORHOOD);
    let mut peaks = Vec::new();

    for t in 0..num_frames {
        for f in 0..num_bins {
            let value = spectrogram[t][f];
            if value <= AMPLITUDE_THRESHOLD_DB || !value.is_finite() {
                continue;
            }

            let t_lo = (t as isize + lower).max(0) as usize;
            let t_hi = ((t as isize + upper).min(num_frames as isize - 1)).max(0) as usize;
            let f_lo = (f as isize + lower).max(0) as usize;
            let f_hi = ((f as isize + upper).min(num_bins as isize - 1)).max(0) as usize;

            let mut is_local_max = true;
            'scan: for nt in t_lo..=t_hi {
                for nf in f_lo..=f_hi {
                    if spectrogram[nt][nf] > value {
                        is_local_max = false;
                        break 'scan;
                    }
                }
            }

            if is_local_max {
                peaks.push(Peak {
                    freq_bin: f as u32,
                    time_frame: t as u32,
                });
            }
        }
    }

    peaks.sort_by_key(|p| (p.time_frame, p.freq_bin));
    peaks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_spectrogram(frames: usize, bins: usize, value: f32) -> Spectrogram {
        vec![vec![value; bins]; frames]
    }

    #[test]
    fn no_peaks_below_threshold() {
        let spec = flat_spectrogram(5, 5, -70.0);
        assert!(detect_peaks(&spec).is_empty());
    }

    #[test]
    fn single_spike_is_detected() {
        let mut spec = flat_spectrogram(30, 30, -80.0);
        spec[15][15] = 0.0;
        let peaks = detect_peaks(&spec);
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0], Peak { freq_bin: 15, time_frame: 15 });
    }

    #[test]
    fn peaks_are_sorted_by_time_then_frequency() {
        let mut spec = flat_spectrogram(30, 30, -80.0);
        spec[5][20] = 0.0;
        spec[2][3] = 0.0;
        let peaks = detect_peaks(&spec);
        assert_eq!(peaks[0].time_frame, 2);
        assert_eq!(peaks[1].time_frame, 5);
    }

    #[test]
    fn plateau_returns_all_tied_cells() {
        let mut spec = flat_spectrogram(30, 30, -80.0);
        spec[10][10] = 0.0;
        spec[10][11] = 0.0;
        let peaks = detect_peaks(&spec);
        assert_eq!(peaks.len(), 2);
    }
}
