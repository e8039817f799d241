//! REST surface (spec §6): `/api/recognize`, `/api/songs`, `/api/stats`,
//! `/api/health`. Shares the ingest/matcher/store modules with the CLI
//! and the WS handler — this layer only adapts multipart/JSON framing.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Serialize;
use tracing::warn;

use crate::ingest::{self, IngestOutcome};
use crate::orchestrator::StreamEvent;
use crate::store::SongSummary;

use super::AppState;

#[derive(Serialize)]
struct ErrorBody {
    status: &'static str,
    message: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ErrorBody>) {
    (status, Json(ErrorBody { status: "error", message: message.into() }))
}

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

#[derive(Serialize)]
struct StatsBody {
    songs: i64,
    fingerprints: i64,
}

pub async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.stats() {
        Ok(stats) => Json(StatsBody { songs: stats.song_count, fingerprints: stats.fingerprint_count }).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.status_message()).into_response(),
    }
}

pub async fn list_songs(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.list_songs() {
        Ok(songs) => {
            let summaries: Vec<SongSummary> = songs.iter().map(SongSummary::from).collect();
            Json(summaries).into_response()
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.status_message()).into_response(),
    }
}

pub async fn delete_song(State(state): State<AppState>, Path(id): Path<i32>) -> impl IntoResponse {
    let _guard = state.write_lock.lock().await;
    match state.store.delete_song(id) {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.status_message()).into_response(),
    }
}

struct UploadedFile {
    bytes: Vec<u8>,
    extension_hint: Option<String>,
}

struct SongUpload {
    file: Option<UploadedFile>,
    title: Option<String>,
    artist: Option<String>,
    album: Option<String>,
}

async fn read_upload(mut multipart: Multipart) -> SongUpload {
    let mut upload = SongUpload { file: None, title: None, artist: None, album: None };

    while let Ok(Some(field)) = multipart.next_field().await {
        let Some(name) = field.name().map(|n| n.to_string()) else { continue };
        match name.as_str() {
            "file" => {
                let extension_hint = field
                    .file_name()
                    .and_then(|f| f.rsplit_once('.'))
                    .map(|(_, ext)| ext.to_string());
                if let Ok(bytes) = field.bytes().await {
                    upload.file = Some(UploadedFile { bytes: bytes.to_vec(), extension_hint });
                }
            }
            "title" => upload.title = field.text().await.ok(),
            "artist" => upload.artist = field.text().await.ok(),
            "album" => upload.album = field.text().await.ok(),
            _ => {}
        }
    }

    upload
}

/// `POST /api/recognize` — matches an uploaded clip against the store and
/// returns a document shaped identically to the WS `match_found`/
/// `no_match` events (spec §6).
pub async fn recognize(State(state): State<AppState>, multipart: Multipart) -> impl IntoResponse {
    let upload = read_upload(multipart).await;
    let Some(file) = upload.file else {
        return error_response(StatusCode::BAD_REQUEST, "missing `file` field").into_response();
    };

    let decoded = crate::waveform::decode_bytes_to_mono(file.bytes, file.extension_hint.as_deref());
    let (mono, sr) = match decoded {
        Ok(pair) => pair,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.status_message()).into_response(),
    };

    let resampled = match crate::waveform::resample_to_canonical_rate(&mono, sr) {
        Ok(samples) => samples,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.status_message()).into_response(),
    };
    let fingerprints = crate::pipeline::fingerprint_samples(&resampled);

    match crate::matcher::match_fingerprints(&state.store, &fingerprints) {
        Ok(Some(outcome)) => match state.store.get_song(outcome.song_id) {
            Ok(Some(song)) => Json(StreamEvent::MatchFound {
                song: (&song).into(),
                confidence: outcome.confidence,
                source: "fingerprint",
            })
            .into_response(),
            Ok(None) => error_response(StatusCode::INTERNAL_SERVER_ERROR, "matched song no longer exists").into_response(),
            Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.status_message()).into_response(),
        },
        Ok(None) => Json(StreamEvent::NoMatch { message: "no matching track found".to_string() }).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.status_message()).into_response(),
    }
}

/// `POST /api/songs` — indexes an uploaded file; 409 if `file_hash` is
/// already present (spec §6, §8 scenario 6).
pub async fn add_song(State(state): State<AppState>, multipart: Multipart) -> impl IntoResponse {
    let upload = read_upload(multipart).await;
    let Some(file) = upload.file else {
        return error_response(StatusCode::BAD_REQUEST, "missing `file` field").into_response();
    };
    let Some(title) = upload.title else {
        return error_response(StatusCode::BAD_REQUEST, "missing `title` field").into_response();
    };

    let _guard = state.write_lock.lock().await;
    let outcome = ingest::ingest_bytes(
        &state.store,
        &file.bytes,
        file.extension_hint.as_deref(),
        title,
        upload.artist,
        upload.album,
    );

    match outcome {
        Ok(IngestOutcome::Indexed { song_id, .. }) => match state.store.get_song(song_id) {
            Ok(Some(song)) => (StatusCode::CREATED, Json(SongSummary::from(&song))).into_response(),
            Ok(None) => error_response(StatusCode::INTERNAL_SERVER_ERROR, "song vanished after insert").into_response(),
            Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.status_message()).into_response(),
        },
        Ok(IngestOutcome::AlreadyIndexed { .. }) => {
            error_response(StatusCode::CONFLICT, "a song with this file_hash is already indexed").into_response()
        }
        Err(e) => {
            warn!(error = %e, "ingest via REST failed");
            error_response(StatusCode::UNPROCESSABLE_ENTITY, e.status_message()).into_response()
        }
    }
}
