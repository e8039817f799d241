//! Component E — Fingerprint Store.
//!
//! A SQLite-backed store reached through `diesel` + `r2d2` pooling (spec
//! §4.E, §9 Open Question 4). Every pooled connection gets `PRAGMA
//! foreign_keys=ON` and `PRAGMA journal_mode=WAL` applied once on checkout.

pub mod models;
pub mod schema;

use std::collections::HashMap;

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection, Pool};
use diesel::sqlite::SqliteConnection;

use crate::config::MATCH_BATCH_SIZE;
use crate::error::MusicaError;
use models::{FingerprintRow, NewFingerprint, NewSong, Song};
pub use models::SongSummary;

#[derive(Debug)]
struct ConnectionCustomizer;

impl CustomizeConnection<SqliteConnection, r2d2::Error> for ConnectionCustomizer {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), r2d2::Error> {
        conn.batch_execute("PRAGMA foreign_keys = ON; PRAGMA journal_mode = WAL;")
            .map_err(r2d2::Error::QueryError)
    }
}

#[derive(Clone)]
pub struct Store {
    pool: Pool<ConnectionManager<SqliteConnection>>,
}

#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    pub song_count: i64,
    pub fingerprint_count: i64,
}

impl Store {
    pub fn connect(db_path: &str) -> Result<Self, MusicaError> {
        let manager = ConnectionManager::<SqliteConnection>::new(db_path);
        let pool = Pool::builder()
            .connection_customizer(Box::new(ConnectionCustomizer))
            .build(manager)
            .map_err(|e| MusicaError::StoreConnection(diesel::ConnectionError::BadConnection(e.to_string())))?;

        let store = Store { pool };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<(), MusicaError> {
        let mut conn = self.pool.get()?;
        conn.batch_execute(
            "CREATE TABLE IF NOT EXISTS songs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                artist TEXT,
                album TEXT,
                duration_secs REAL NOT NULL DEFAULT 0,
                file_hash TEXT NOT NULL UNIQUE,
                artwork_url TEXT,
                created_at BIGINT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS fingerprints (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                hash TEXT NOT NULL,
                anchor_time INTEGER NOT NULL,
                song_id INTEGER NOT NULL REFERENCES songs(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS fingerprints_hash_idx ON fingerprints(hash);",
        )
        .map_err(diesel::result::Error::from)?;
        Ok(())
    }

    /// Inserts a song row, or returns the existing row's id if `file_hash`
    /// was already ingested (spec §4.H ingest idempotence). Mirrors the
    /// reference implementation's `INSERT OR IGNORE` + follow-up `SELECT`
    /// rather than relying on a `RETURNING` clause.
    #[allow(clippy::too_many_arguments)]
    pub fn add_song(
        &self,
        title: &str,
        artist: Option<&str>,
        album: Option<&str>,
        duration_secs: f32,
        file_hash: &str,
        artwork_url: Option<&str>,
        created_at: i64,
    ) -> Result<i32, MusicaError> {
        use schema::songs::dsl;

        let mut conn = self.pool.get()?;

        let new_song = NewSong {
            title,
            artist,
            album,
            duration_secs,
            file_hash,
            artwork_url,
            created_at,
        };

        diesel::insert_into(dsl::songs)
            .values(&new_song)
            .on_conflict(dsl::file_hash)
            .do_nothing()
            .execute(&mut conn)?;

        let id = dsl::songs
            .filter(dsl::file_hash.eq(file_hash))
            .select(dsl::id)
            .first::<i32>(&mut conn)?;

        Ok(id)
    }

    pub fn add_fingerprints(&self, song_id: i32, fingerprints: &[crate::hashing::Fingerprint]) -> Result<usize, MusicaError> {
        use schema::fingerprints::dsl;

        if fingerprints.is_empty() {
            return Ok(0);
        }

        let mut conn = self.pool.get()?;
        let mut inserted = 0usize;

        conn.transaction(|conn| {
            for batch in fingerprints.chunks(MATCH_BATCH_SIZE) {
                let rows: Vec<NewFingerprint> = batch
                    .iter()
                    .map(|f| NewFingerprint {
                        hash: &f.hash,
                        anchor_time: f.anchor_time as i32,
                        song_id,
                    })
                    .collect();
                inserted += diesel::insert_into(dsl::fingerprints)
                    .values(&rows)
                    .execute(conn)?;
            }
            Ok::<(), diesel::result::Error>(())
        })?;

        Ok(inserted)
    }

    /// Looks up every stored fingerprint row whose hash is in `hashes`,
    /// batched at [`MATCH_BATCH_SIZE`] bound parameters per query (spec
    /// §4.E). Returns `hash -> [(song_id, anchor_time)]`.
    pub fn get_matches(&self, hashes: &[String]) -> Result<HashMap<String, Vec<(i32, i32)>>, MusicaError> {
        use schema::fingerprints::dsl;

        let mut conn = self.pool.get()?;
        let mut matches: HashMap<String, Vec<(i32, i32)>> = HashMap::new();

        for batch in hashes.chunks(MATCH_BATCH_SIZE) {
            let rows: Vec<FingerprintRow> = dsl::fingerprints
                .filter(dsl::hash.eq_any(batch))
                .select(FingerprintRow::as_select())
                .load(&mut conn)?;

            for row in rows {
                matches.entry(row.hash).or_default().push((row.song_id, row.anchor_time));
            }
        }

        Ok(matches)
    }

    pub fn get_song(&self, song_id: i32) -> Result<Option<Song>, MusicaError> {
        use schema::songs::dsl;

        let mut conn = self.pool.get()?;
        let song = dsl::songs
            .filter(dsl::id.eq(song_id))
            .select(Song::as_select())
            .first(&mut conn)
            .optional()?;
        Ok(song)
    }

    pub fn list_songs(&self) -> Result<Vec<Song>, MusicaError> {
        use schema::songs::dsl;

        let mut conn = self.pool.get()?;
        let songs = dsl::songs
            .select(Song::as_select())
            .order(dsl::id.asc())
            .load(&mut conn)?;
        Ok(songs)
    }

    /// Deletes a song and its fingerprints atomically. `ON DELETE CASCADE`
    /// handles the fingerprints side, but the explicit delete keeps the
    /// behavior correct even if foreign keys are ever disabled.
    pub fn delete_song(&self, song_id: i32) -> Result<bool, MusicaError> {
        use schema::fingerprints::dsl as fp_dsl;
        use schema::songs::dsl as song_dsl;

        let mut conn = self.pool.get()?;
        let deleted = conn.transaction(|conn| {
            diesel::delete(fp_dsl::fingerprints.filter(fp_dsl::song_id.eq(song_id))).execute(conn)?;
            diesel::delete(song_dsl::songs.filter(song_dsl::id.eq(song_id))).execute(conn)
        })?;

        Ok(deleted > 0)
    }

    pub fn stats(&self) -> Result<StoreStats, MusicaError> {
        use schema::fingerprints::dsl as fp_dsl;
        use schema::songs::dsl as song_dsl;

        let mut conn = self.pool.get()?;
        let song_count = song_dsl::songs.count().get_result(&mut conn)?;
        let fingerprint_count = fp_dsl::fingerprints.count().get_result(&mut conn)?;

        Ok(StoreStats { song_count, fingerprint_count })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::Fingerprint;

    fn temp_store() -> (Store, tempfile::TempPath) {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.into_temp_path();
        let store = Store::connect(path.to_str().unwrap()).unwrap();
        (store, path)
    }

    #[test]
    fn add_song_is_idempotent_on_file_hash() {
        let (store, _guard) = temp_store();
        let id1 = store.add_song("Track", Some("Artist"), None, 180.0, "abc123", None, 1_700_000_000).unwrap();
        let id2 = store.add_song("Track", Some("Artist"), None, 180.0, "abc123", None, 1_700_000_001).unwrap();
        assert_eq!(id1, id2);
        assert_eq!(store.list_songs().unwrap().len(), 1);
    }

    #[test]
    fn fingerprints_round_trip_through_matches() {
        let (store, _guard) = temp_store();
        let song_id = store.add_song("Track", None, None, 180.0, "hash-1", None, 1_700_000_000).unwrap();
        let fps = vec![
            Fingerprint { hash: "aaaaaaaaaaaaaaaaaaaa".to_string(), anchor_time: 5 },
            Fingerprint { hash: "bbbbbbbbbbbbbbbbbbbb".to_string(), anchor_time: 9 },
        ];
        store.add_fingerprints(song_id, &fps).unwrap();

        let matches = store
            .get_matches(&["aaaaaaaaaaaaaaaaaaaa".to_string(), "zzzzzzzzzzzzzzzzzzzz".to_string()])
            .unwrap();
        assert_eq!(matches.get("aaaaaaaaaaaaaaaaaaaa").unwrap(), &vec![(song_id, 5)]);
        assert!(!matches.contains_key("zzzzzzzzzzzzzzzzzzzz"));
    }

    #[test]
    fn delete_song_cascades_fingerprints() {
        let (store, _guard) = temp_store();
        let song_id = store.add_song("Track", None, None, 180.0, "hash-2", None, 1_700_000_000).unwrap();
        let fps = vec![Fingerprint { hash: "cccccccccccccccccccc".to_string(), anchor_time: 0 }];
        store.add_fingerprints(song_id, &fps).unwrap();

        assert!(store.delete_song(song_id).unwrap());
        assert!(store.get_song(song_id).unwrap().is_none());

        let matches = store.get_matches(&["cccccccccccccccccccc".to_string()]).unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn stats_reflects_store_contents() {
        let (store, _guard) = temp_store();
        store.add_song("Track", None, None, 180.0, "hash-3", None, 1_700_000_000).unwrap();
        let stats = store.stats().unwrap();
        assert_eq!(stats.song_count, 1);
        assert_eq!(stats.fingerprint_count, 0);
    }
}
