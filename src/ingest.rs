//! Component H — Ingestor.
//!
//! Bulk indexing of reference files (spec §4.H): content-hash dedup, tag-or-
//! filename metadata, the full A→D pipeline, then a single `add_song` +
//! `add_fingerprints` write. A per-file failure is logged and never aborts
//! the containing batch.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Instant;

use md5::{Digest, Md5};
use symphonia::core::meta::{StandardTagKey, Value};

use crate::error::MusicaError;
use crate::pipeline;
use crate::store::Store;
use crate::waveform;

pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "ogg", "m4a", "aac", "wma", "opus"];

/// Caller-supplied metadata overrides; `None` fields fall back to embedded
/// tags, then to the `Artist - Title.ext` filename heuristic.
#[derive(Debug, Clone, Default)]
pub struct MetaOverrides {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
}

#[derive(Debug, Clone)]
pub enum IngestOutcome {
    /// A new song was indexed.
    Indexed { song_id: i32, title: String, fingerprint_count: usize, elapsed_secs: f32 },
    /// `file_hash` was already present — a no-op (spec §8 ingest idempotence).
    AlreadyIndexed { song_id: i32 },
}

/// Indexes a single audio file. Never aborts on decode failure — the error
/// is returned so the caller (CLI batch loop, REST handler) can log it and
/// continue, per spec §7 propagation policy.
pub fn ingest_file(store: &Store, path: &Path, overrides: MetaOverrides) -> Result<IngestOutcome, MusicaError> {
    let file_hash = file_md5_hex(path)?;
    if let Some(existing) = find_by_hash(store, &file_hash)? {
        return Ok(IngestOutcome::AlreadyIndexed { song_id: existing });
    }

    let tags = read_tags(path);
    let (fallback_artist, fallback_title) = filename_fallback(path);
    let title = overrides.title.or_else(|| tags.as_ref().and_then(|t| t.title.clone())).unwrap_or(fallback_title);
    let artist = overrides.artist.or_else(|| tags.as_ref().and_then(|t| t.artist.clone())).or(fallback_artist);
    let album = overrides.album.or_else(|| tags.as_ref().and_then(|t| t.album.clone()));

    let (mono, sr) = waveform::decode_to_mono(path)?;
    index_decoded(store, file_hash, mono, sr, title, artist, album)
}

/// Indexes audio already held in memory (the REST `POST /api/songs`
/// upload path) — same pipeline as [`ingest_file`], minus the filesystem
/// round-trip and tag sniffing a one-off upload doesn't warrant.
pub fn ingest_bytes(
    store: &Store,
    bytes: &[u8],
    extension_hint: Option<&str>,
    title: String,
    artist: Option<String>,
    album: Option<String>,
) -> Result<IngestOutcome, MusicaError> {
    let file_hash = bytes_md5_hex(bytes);
    if let Some(existing) = find_by_hash(store, &file_hash)? {
        return Ok(IngestOutcome::AlreadyIndexed { song_id: existing });
    }

    let (mono, sr) = waveform::decode_bytes_to_mono(bytes.to_vec(), extension_hint)?;
    index_decoded(store, file_hash, mono, sr, title, artist, album)
}

fn index_decoded(
    store: &Store,
    file_hash: String,
    mono: Vec<f32>,
    sr: u32,
    title: String,
    artist: Option<String>,
    album: Option<String>,
) -> Result<IngestOutcome, MusicaError> {
    let start = Instant::now();

    let duration_secs = mono.len() as f32 / sr as f32;
    let resampled = waveform::resample_to_canonical_rate(&mono, sr)?;
    let fingerprints = pipeline::fingerprint_samples(&resampled);

    let created_at = unix_now();
    let song_id = store.add_song(
        &title,
        artist.as_deref(),
        album.as_deref(),
        duration_secs,
        &file_hash,
        None,
        created_at,
    )?;
    let fingerprint_count = fingerprints.len();
    store.add_fingerprints(song_id, &fingerprints)?;

    Ok(IngestOutcome::Indexed {
        song_id,
        title,
        fingerprint_count,
        elapsed_secs: start.elapsed().as_secs_f32(),
    })
}

/// Recursively collects files under `root` with a recognized audio
/// extension (spec §6 Ingest CLI). `root` itself is returned as a
/// single-element list when it is already a file.
pub fn collect_audio_files(root: &Path) -> std::io::Result<Vec<std::path::PathBuf>> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }

    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if is_audio_file(&path) {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| AUDIO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn find_by_hash(store: &Store, file_hash: &str) -> Result<Option<i32>, MusicaError> {
    // `add_song` is itself idempotent on file_hash, but checking first
    // lets ingest report "already indexed" without writing a fingerprint
    // batch for a file we're about to discard.
    for song in store.list_songs()? {
        if song.file_hash == file_hash {
            return Ok(Some(song.id));
        }
    }
    Ok(None)
}

fn file_md5_hex(path: &Path) -> Result<String, MusicaError> {
    let mut file = File::open(path)?;
    let mut hasher = Md5::new();
    let mut buf = [0u8; 8192];
    loop {
        let read = file.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(hasher.finalize().iter().map(|b| format!("{:02x}", b)).collect())
}

fn bytes_md5_hex(bytes: &[u8]) -> String {
    Md5::digest(bytes).iter().map(|b| format!("{:02x}", b)).collect()
}

struct EmbeddedTags {
    title: Option<String>,
    artist: Option<String>,
    album: Option<String>,
}

/// Best-effort ID3/Vorbis tag extraction via symphonia's metadata reader.
/// Returns `None` on any probe/decode failure — the caller falls back to
/// the filename heuristic (spec §4.H).
fn read_tags(path: &Path) -> Option<EmbeddedTags> {
    use symphonia::core::formats::FormatOptions;
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::meta::MetadataOptions;
    use symphonia::core::probe::Hint;

    let file = File::open(path).ok()?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .ok()?;
    let mut format = probed.format;

    let revision = format.metadata().current().map(|rev| rev.tags().to_vec())?;

    let mut tags = EmbeddedTags { title: None, artist: None, album: None };
    for tag in &revision {
        let value = match &tag.value {
            Value::String(s) => s.clone(),
            _ => continue,
        };
        match tag.std_key {
            Some(StandardTagKey::TrackTitle) => tags.title = Some(value),
            Some(StandardTagKey::Artist) => tags.artist = Some(value),
            Some(StandardTagKey::Album) => tags.album = Some(value),
            _ => {}
        }
    }

    if tags.title.is_none() && tags.artist.is_none() && tags.album.is_none() {
        None
    } else {
        Some(tags)
    }
}

/// Parses the `Artist - Title.ext` filename convention (spec §4.H
/// fallback). Returns `(None, stem)` when the pattern doesn't match.
fn filename_fallback(path: &Path) -> (Option<String>, String) {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("Unknown").to_string();
    match stem.split_once(" - ") {
        Some((artist, title)) => (Some(artist.trim().to_string()), title.trim().to_string()),
        None => (None, stem),
    }
}

fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_fallback_splits_artist_and_title() {
        let (artist, title) = filename_fallback(Path::new("A - Hello.wav"));
        assert_eq!(artist.as_deref(), Some("A"));
        assert_eq!(title, "Hello");
    }

    #[test]
    fn filename_fallback_without_separator_keeps_whole_stem_as_title() {
        let (artist, title) = filename_fallback(Path::new("Hello.wav"));
        assert_eq!(artist, None);
        assert_eq!(title, "Hello");
    }

    #[test]
    fn is_audio_file_matches_recognized_extensions_case_insensitively() {
        assert!(is_audio_file(Path::new("track.MP3")));
        assert!(is_audio_file(Path::new("track.flac")));
        assert!(!is_audio_file(Path::new("track.txt")));
    }

    #[test]
    fn collect_audio_files_returns_single_file_path_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("song.wav");
        std::fs::write(&file_path, b"not real audio").unwrap();
        let files = collect_audio_files(&file_path).unwrap();
        assert_eq!(files, vec![file_path]);
    }

    #[test]
    fn collect_audio_files_recurses_and_filters_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("a.wav"), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        std::fs::write(dir.path().join("sub").join("b.mp3"), b"x").unwrap();

        let mut files = collect_audio_files(dir.path()).unwrap();
        files.sort();
        assert_eq!(files.len(), 2);
    }
}
