//! Component F — Matcher.
//!
//! Aligns a query's fingerprints against the store via an offset-delta
//! histogram (spec §4.F): the correct temporal offset between query and
//! reference shows up as a sharp spike in the Δ histogram, while random
//! hash collisions spread flatly across offsets. Generalizes the teacher's
//! `vote_best_matches` (a `HashMap<song_id, HashMap<offset_bin, count>>`
//! histogram over quantized bit-packed hashes) to the exact-frame SHA-1
//! fingerprints produced by [`crate::hashing`].

use std::collections::HashMap;

use crate::config::MIN_MATCH_THRESHOLD;
use crate::error::MusicaError;
use crate::hashing::Fingerprint;
use crate::store::Store;

#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    pub song_id: i32,
    /// `min(100, 2 * peak_count)`. Heuristic — not a probability (spec §9).
    pub confidence: f32,
}

/// Runs the histogram-of-offsets alignment described in spec §4.F against
/// `store`. Returns `None` when no candidate clears [`MIN_MATCH_THRESHOLD`].
pub fn match_fingerprints(store: &Store, query_fps: &[Fingerprint]) -> Result<Option<MatchOutcome>, MusicaError> {
    if query_fps.is_empty() {
        return Ok(None);
    }

    let mut by_hash: HashMap<&str, Vec<i64>> = HashMap::new();
    for fp in query_fps {
        by_hash.entry(fp.hash.as_str()).or_default().push(fp.anchor_time as i64);
    }

    let unique_hashes: Vec<String> = by_hash.keys().map(|h| h.to_string()).collect();
    let rows = store.get_matches(&unique_hashes)?;
    if rows.is_empty() {
        return Ok(None);
    }

    // song_id -> offset_delta -> vote count
    let mut histograms: HashMap<i32, HashMap<i64, usize>> = HashMap::new();
    for (hash, matches) in &rows {
        let Some(query_times) = by_hash.get(hash.as_str()) else {
            continue;
        };
        for &(song_id, ref_time) in matches {
            for &query_time in query_times {
                let delta = ref_time as i64 - query_time;
                *histograms.entry(song_id).or_default().entry(delta).or_default() += 1;
            }
        }
    }

    let mut best: Option<(i32, usize)> = None;
    for (song_id, histogram) in &histograms {
        let peak_count = histogram.values().copied().max().unwrap_or(0);
        if best.is_none_or(|(_, best_count)| peak_count > best_count) {
            best = Some((*song_id, peak_count));
        }
    }

    match best {
        Some((song_id, peak_count)) if peak_count >= MIN_MATCH_THRESHOLD => Ok(Some(MatchOutcome {
            song_id,
            confidence: (2.0 * peak_count as f32).min(100.0),
        })),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (Store, tempfile::TempPath) {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.into_temp_path();
        let store = Store::connect(path.to_str().unwrap()).unwrap();
        (store, path)
    }

    #[test]
    fn empty_query_yields_no_match() {
        let (store, _guard) = temp_store();
        assert_eq!(match_fingerprints(&store, &[]).unwrap(), None);
    }

    #[test]
    fn exact_clip_matches_with_high_confidence() {
        let (store, _guard) = temp_store();
        let song_id = store
            .add_song("Hello", Some("A"), None, 180.0, "hash-a", None, 1_700_000_000)
            .unwrap();

        let reference_fps: Vec<Fingerprint> = (0..20)
            .map(|i| Fingerprint { hash: format!("{:020x}", i), anchor_time: i as u32 * 5 })
            .collect();
        store.add_fingerprints(song_id, &reference_fps).unwrap();

        // Same hashes, shifted by a constant offset, as an exact-clip re-query would be.
        let query_fps: Vec<Fingerprint> = reference_fps
            .iter()
            .map(|fp| Fingerprint { hash: fp.hash.clone(), anchor_time: fp.anchor_time - 3 })
            .collect();

        let outcome = match_fingerprints(&store, &query_fps).unwrap().unwrap();
        assert_eq!(outcome.song_id, song_id);
        assert_eq!(outcome.confidence, 40.0);
    }

    #[test]
    fn below_threshold_yields_no_match() {
        let (store, _guard) = temp_store();
        let song_id = store
            .add_song("Hello", Some("A"), None, 180.0, "hash-b", None, 1_700_000_000)
            .unwrap();
        let reference_fps = vec![Fingerprint { hash: "a".repeat(20), anchor_time: 0 }];
        store.add_fingerprints(song_id, &reference_fps).unwrap();

        let query_fps = vec![Fingerprint { hash: "a".repeat(20), anchor_time: 1 }];
        assert_eq!(match_fingerprints(&store, &query_fps).unwrap(), None);
    }

    #[test]
    fn unrelated_query_yields_no_match() {
        let (store, _guard) = temp_store();
        let song_id = store
            .add_song("Hello", Some("A"), None, 180.0, "hash-c", None, 1_700_000_000)
            .unwrap();
        store
            .add_fingerprints(song_id, &[Fingerprint { hash: "b".repeat(20), anchor_time: 0 }])
            .unwrap();

        let query_fps = vec![Fingerprint { hash: "z".repeat(20), anchor_time: 0 }];
        assert_eq!(match_fingerprints(&store, &query_fps).unwrap(), None);
    }
}
