use rusqlite::Connection;

pub mod tables {
    pub const SONGS: &str = "songs";
    pub const REVEALS: &str = "reveals";
}

pub mod columns {
    pub const ID: &str = "id";
    pub const NAME: &str = "name";
    pub const ARTIST: &str = "artist";
    pub const ALBUM: &str = "album";
    pub const COVER_URL: &str = "cover_url";
    pub const PREVIEW_URL: &str = "preview_url";
    pub const ADDED_BY: &str = "added_by";
    pub const PLATFORM: &str = "platform";
    pub const SPOTIFY_ID: &str = "spotify_id";
    pub const SPOTIFY_URL: &str = "spotify_url";
    pub const MEMORY_NOTE: &str = "memory_note";
    pub const ADDED_AT: &str = "added_at";
    pub const REVEALED: &str = "revealed";

    pub const REVEALED_AT: &str = "revealed_at";
    pub const REVEALED_COUNT: &str = "revealed_count";
}

/// `added_at` and `revealed_at` are milliseconds since the unix epoch, UTC
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS songs (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    artist TEXT NOT NULL,
    album TEXT NOT NULL,
    cover_url TEXT NOT NULL,
    preview_url TEXT,
    added_by TEXT NOT NULL CHECK (added_by IN ('Kate', 'Victor', 'Hanhee')),
    platform TEXT NOT NULL CHECK (platform IN ('Spotify')),
    spotify_id TEXT,
    spotify_url TEXT,
    memory_note TEXT CHECK (memory_note IS NULL OR length(memory_note) <= 200),
    added_at INTEGER NOT NULL,
    revealed INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_songs_added_at ON songs(added_at);
CREATE INDEX IF NOT EXISTS idx_songs_revealed ON songs(revealed);

CREATE TABLE IF NOT EXISTS reveals (
    revealed_at INTEGER NOT NULL,
    revealed_count INTEGER NOT NULL
);
"#;

pub fn init(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA)
}
