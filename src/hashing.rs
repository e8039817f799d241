//! Component D — Hash Generator.
//!
//! Combines pairs of peaks into landmark hashes (spec §4.D). Each anchor
//! peak is paired with up to [`FAN_OUT`] peaks that follow it within
//! `[MIN_TIME_DELTA, MAX_TIME_DELTA]` frames, and the triple
//! `(anchor freq, target freq, Δt)` is hashed with SHA-1 so that two
//! independent implementations of this scheme produce byte-identical
//! hashes for the same audio.

use sha1::{Digest, Sha1};

use crate::config::{FAN_OUT, MAX_TIME_DELTA, MIN_TIME_DELTA};
use crate::peaks::Peak;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub hash: String,
    pub anchor_time: u32,
}

/// `peaks` must already be sorted by `(time_frame, freq_bin)`, as returned
/// by [`crate::peaks::detect_peaks`].
pub fn hash_peaks(peaks: &[Peak]) -> Vec<Fingerprint> {
    let mut fingerprints = Vec::new();

    for (i, anchor) in peaks.iter().enumerate() {
        let mut paired = 0usize;
        for target in &peaks[i + 1..] {
            if paired >= FAN_OUT {
                break;
            }
            let delta = target.time_frame as i64 - anchor.time_frame as i64;
            if delta < MIN_TIME_DELTA {
                continue;
            }
            if delta > MAX_TIME_DELTA {
                break;
            }

            fingerprints.push(Fingerprint {
                hash: landmark_hash(anchor.freq_bin, target.freq_bin, delta),
                anchor_time: anchor.time_frame,
            });
            paired += 1;
        }
    }

    fingerprints
}

fn landmark_hash(anchor_freq: u32, target_freq: u32, delta: i64) -> String {
    let payload = format!("{}|{}|{}", anchor_freq, target_freq, delta);
    let digest = Sha1::digest(payload.as_bytes());
    let hex = digest.iter().map(|b| format!("{:02x}", b)).collect::<String>();
    hex[..20].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landmark_hash_is_deterministic() {
        let a = landmark_hash(100, 200, 50);
        let b = landmark_hash(100, 200, 50);
        assert_eq!(a, b);
        assert_eq!(a.len(), 20);
    }

    #[test]
    fn landmark_hash_matches_known_sha1_prefix() {
        // sha1("100|200|50") = ba06c890f45ba32ab376feab187c281681b130fd
        assert_eq!(landmark_hash(100, 200, 50), "ba06c890f45ba32ab376");
    }

    #[test]
    fn no_fingerprints_from_single_peak() {
        let peaks = vec![Peak { freq_bin: 10, time_frame: 0 }];
        assert!(hash_peaks(&peaks).is_empty());
    }

    #[test]
    fn respects_fan_out_limit() {
        let peaks: Vec<Peak> = (0..(FAN_OUT as u32 + 10))
            .map(|i| Peak { freq_bin: i, time_frame: i })
            .collect();
        let fingerprints = hash_peaks(&peaks);
        let from_first_anchor = fingerprints
            .iter()
            .filter(|f| f.anchor_time == 0)
            .count();
        assert_eq!(from_first_anchor, FAN_OUT);
    }

    #[test]
    fn respects_max_time_delta() {
        let peaks = vec![
            Peak { freq_bin: 1, time_frame: 0 },
            Peak { freq_bin: 2, time_frame: MAX_TIME_DELTA as u32 + 1 },
        ];
        assert!(hash_peaks(&peaks).is_empty());
    }
}
