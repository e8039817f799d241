use diesel::prelude::*;
use serde::Serialize;

use super::schema::{fingerprints, songs};

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = songs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Song {
    pub id: i32,
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_secs: f32,
    pub file_hash: String,
    pub artwork_url: Option<String>,
    pub created_at: i64,
}

/// The song shape serialized at every JSON boundary (WS `match_found`,
/// `GET /api/songs`, `POST /api/recognize`) — spec §6.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SongSummary {
    pub id: i32,
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration: f32,
    pub artwork_url: Option<String>,
}

impl From<&Song> for SongSummary {
    fn from(song: &Song) -> Self {
        SongSummary {
            id: song.id,
            title: song.title.clone(),
            artist: song.artist.clone(),
            album: song.album.clone(),
            duration: song.duration_secs,
            artwork_url: song.artwork_url.clone(),
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = songs)]
pub struct NewSong<'a> {
    pub title: &'a str,
    pub artist: Option<&'a str>,
    pub album: Option<&'a str>,
    pub duration_secs: f32,
    pub file_hash: &'a str,
    pub artwork_url: Option<&'a str>,
    pub created_at: i64,
}

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = fingerprints)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct FingerprintRow {
    pub id: i32,
    pub hash: String,
    pub anchor_time: i32,
    pub song_id: i32,
}

#[derive(Insertable)]
#[diesel(table_name = fingerprints)]
pub struct NewFingerprint<'a> {
    pub hash: &'a str,
    pub anchor_time: i32,
    pub song_id: i32,
}
