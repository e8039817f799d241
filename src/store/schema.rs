// Hand-written; SQLite has no `diesel print-schema` counterpart in this
// workspace, so the tables are declared directly (spec §3 data model).

diesel::table! {
    songs (id) {
        id -> Integer,
        title -> Text,
        artist -> Nullable<Text>,
        album -> Nullable<Text>,
        duration_secs -> Float,
        file_hash -> Text,
        artwork_url -> Nullable<Text>,
        created_at -> BigInt,
    }
}

diesel::table! {
    fingerprints (id) {
        id -> Integer,
        hash -> Text,
        anchor_time -> Integer,
        song_id -> Integer,
    }
}

diesel::joinable!(fingerprints -> songs (song_id));
diesel::allow_tables_to_appear_in_same_query!(songs, fingerprints);
