use chrono::{DateTime, Utc};

use crate::{
    config,
    domain::{
        id::TrackId,
        track::{TrackMetadata, TrackRecord},
    },
    reveal::executor::VisibilityStore,
    storage::{
        db::{self, MillisSinceUnix, from_millis, to_millis},
        error::StorageError,
        schema::{columns, tables},
    },
};

use anyhow::{Context, anyhow};
use columns::*;
use rusqlite::{OptionalExtension, Row, params, params_from_iter};
use tables::*;

/// Which part of the timeline to read
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimelineFilter {
    /// inclusive lower bound on `added_at`
    pub start: Option<DateTime<Utc>>,
    /// exclusive upper bound on `added_at`
    pub end: Option<DateTime<Utc>>,
    pub include_unrevealed: bool,
}

/// A past reveal that flipped at least one track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevealRecord {
    pub revealed_at: DateTime<Utc>,
    pub revealed_count: u64,
}

/// Main structure that implements all storage logic
pub struct Storage {
    pub(crate) db: rusqlite::Connection,
}

fn select_tracks(filter_sql: &str) -> String {
    format!(
        "SELECT {ID}, {NAME}, {ARTIST}, {ALBUM}, {COVER_URL}, {PREVIEW_URL}, {ADDED_BY}, \
         {PLATFORM}, {SPOTIFY_ID}, {SPOTIFY_URL}, {MEMORY_NOTE}, {ADDED_AT}, {REVEALED} \
         FROM {SONGS} {filter_sql}"
    )
}

/// Columns as stored, before parsing into domain types
struct TrackRow {
    id: String,
    name: String,
    artist: String,
    album: String,
    cover_url: String,
    preview_url: Option<String>,
    added_by: String,
    platform: String,
    spotify_id: Option<String>,
    spotify_url: Option<String>,
    memory_note: Option<String>,
    added_at: MillisSinceUnix,
    revealed: bool,
}

impl TrackRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            artist: row.get(2)?,
            album: row.get(3)?,
            cover_url: row.get(4)?,
            preview_url: row.get(5)?,
            added_by: row.get(6)?,
            platform: row.get(7)?,
            spotify_id: row.get(8)?,
            spotify_url: row.get(9)?,
            memory_note: row.get(10)?,
            added_at: row.get(11)?,
            revealed: row.get(12)?,
        })
    }

    fn into_record(self) -> Result<TrackRecord, StorageError> {
        let id = TrackId::parse(&self.id)
            .with_context(|| format!("table {SONGS} contains invalid id {}", self.id))?;

        Ok(TrackRecord {
            id,
            metadata: TrackMetadata {
                name: self.name,
                artist: self.artist,
                album: self.album,
                cover_url: self.cover_url,
                preview_url: self.preview_url,
                added_by: self.added_by.parse().map_err(anyhow::Error::from)?,
                platform: self.platform.parse().map_err(anyhow::Error::from)?,
                spotify_id: self.spotify_id,
                spotify_url: self.spotify_url,
            },
            memory_note: self.memory_note,
            added_at: from_millis(self.added_at)?,
            revealed: self.revealed,
        })
    }
}

impl Storage {
    /// when called, opens a data base connection
    pub fn new(db_config: &config::Database) -> Result<Self, StorageError> {
        let db: rusqlite::Connection = db::open(db_config)?;
        Ok(Self::from_existing_conn(db))
    }

    pub fn from_existing_conn(db: rusqlite::Connection) -> Self {
        Self { db }
    }

    /// Adds a contribution. The track starts hidden and is stamped with the
    /// current server time.
    pub fn insert_track(&mut self, metadata: &TrackMetadata) -> Result<TrackRecord, StorageError> {
        self.insert_track_at(metadata, Utc::now())
    }

    pub(crate) fn insert_track_at(
        &mut self,
        metadata: &TrackMetadata,
        added_at: DateTime<Utc>,
    ) -> Result<TrackRecord, StorageError> {
        let id = TrackId::new_random();

        self.db.execute(
            &format!(
                "INSERT INTO {SONGS} ({ID}, {NAME}, {ARTIST}, {ALBUM}, {COVER_URL}, {PREVIEW_URL}, \
                 {ADDED_BY}, {PLATFORM}, {SPOTIFY_ID}, {SPOTIFY_URL}, {ADDED_AT}, {REVEALED}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 0)"
            ),
            params![
                id.to_string(),
                metadata.name,
                metadata.artist,
                metadata.album,
                metadata.cover_url,
                metadata.preview_url,
                metadata.added_by.as_str(),
                metadata.platform.as_str(),
                metadata.spotify_id,
                metadata.spotify_url,
                to_millis(added_at),
            ],
        )?;

        self.get_track(id)
    }

    pub fn get_track(&mut self, track_id: TrackId) -> Result<TrackRecord, StorageError> {
        let row = self
            .db
            .query_row(
                &select_tracks(&format!("WHERE {ID} = ?1")),
                params![track_id.to_string()],
                TrackRow::read,
            )
            .optional()?;

        match row {
            Some(row) => row.into_record(),
            None => Err(StorageError::TrackNotFound(track_id)),
        }
    }

    /// Timeline view, newest first
    pub fn list_tracks(&mut self, filter: &TimelineFilter) -> Result<Vec<TrackRecord>, StorageError> {
        let mut conditions = Vec::new();
        let mut values: Vec<MillisSinceUnix> = Vec::new();

        if !filter.include_unrevealed {
            conditions.push(format!("{REVEALED} = 1"));
        }
        if let Some(start) = filter.start {
            values.push(to_millis(start));
            conditions.push(format!("{ADDED_AT} >= ?{}", values.len()));
        }
        if let Some(end) = filter.end {
            values.push(to_millis(end));
            conditions.push(format!("{ADDED_AT} < ?{}", values.len()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        self.query_tracks(
            &select_tracks(&format!("{where_clause} ORDER BY {ADDED_AT} DESC, rowid DESC")),
            values,
        )
    }

    /// Every record regardless of visibility, oldest first
    pub fn all_tracks(&mut self) -> Result<Vec<TrackRecord>, StorageError> {
        self.query_tracks(
            &select_tracks(&format!("ORDER BY {ADDED_AT} ASC, rowid ASC")),
            Vec::new(),
        )
    }

    fn query_tracks(
        &mut self,
        sql: &str,
        values: Vec<MillisSinceUnix>,
    ) -> Result<Vec<TrackRecord>, StorageError> {
        let rows = {
            let mut stmt = self.db.prepare(sql)?;
            let rows = stmt
                .query_map(params_from_iter(values), TrackRow::read)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        rows.into_iter().map(TrackRow::into_record).collect()
    }

    /// Overwrites the descriptive fields of a track
    pub fn update_metadata(
        &mut self,
        track_id: TrackId,
        metadata: &TrackMetadata,
    ) -> Result<TrackRecord, StorageError> {
        let changed = self.db.execute(
            &format!(
                "UPDATE {SONGS} SET {NAME} = ?2, {ARTIST} = ?3, {ALBUM} = ?4, {COVER_URL} = ?5, \
                 {PREVIEW_URL} = ?6, {ADDED_BY} = ?7, {PLATFORM} = ?8, {SPOTIFY_ID} = ?9, \
                 {SPOTIFY_URL} = ?10 WHERE {ID} = ?1"
            ),
            params![
                track_id.to_string(),
                metadata.name,
                metadata.artist,
                metadata.album,
                metadata.cover_url,
                metadata.preview_url,
                metadata.added_by.as_str(),
                metadata.platform.as_str(),
                metadata.spotify_id,
                metadata.spotify_url,
            ],
        )?;

        if changed == 0 {
            return Err(StorageError::TrackNotFound(track_id));
        }
        self.get_track(track_id)
    }

    /// note is expected to be validated already
    pub fn update_memory_note(
        &mut self,
        track_id: TrackId,
        note: Option<&str>,
    ) -> Result<TrackRecord, StorageError> {
        let changed = self.db.execute(
            &format!("UPDATE {SONGS} SET {MEMORY_NOTE} = ?2 WHERE {ID} = ?1"),
            params![track_id.to_string(), note],
        )?;

        if changed == 0 {
            return Err(StorageError::TrackNotFound(track_id));
        }
        self.get_track(track_id)
    }

    pub fn delete_track(&mut self, track_id: TrackId) -> Result<(), StorageError> {
        let changed = self.db.execute(
            &format!("DELETE FROM {SONGS} WHERE {ID} = ?1"),
            params![track_id.to_string()],
        )?;

        if changed == 0 {
            Err(StorageError::TrackNotFound(track_id))
        } else {
            Ok(())
        }
    }

    pub fn count_hidden(&mut self) -> Result<u64, StorageError> {
        let count: i64 = self.db.query_row(
            &format!("SELECT COUNT(*) FROM {SONGS} WHERE {REVEALED} = 0"),
            [],
            |row| row.get(0),
        )?;

        u64::try_from(count)
            .map_err(|e| StorageError::Internal(anyhow!("negative count {count}: {e}")))
    }

    /// most recent reveal that flipped something
    pub fn last_reveal(&mut self) -> Result<Option<RevealRecord>, StorageError> {
        let row = self
            .db
            .query_row(
                &format!(
                    "SELECT {REVEALED_AT}, {REVEALED_COUNT} FROM {REVEALS} \
                     ORDER BY {REVEALED_AT} DESC, rowid DESC LIMIT 1"
                ),
                [],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;

        row.map(|(at, count)| -> Result<RevealRecord, StorageError> {
            Ok(RevealRecord {
                revealed_at: from_millis(at)?,
                revealed_count: u64::try_from(count).map_err(|e| anyhow!(e))?,
            })
        })
        .transpose()
    }
}

impl VisibilityStore for Storage {
    fn hidden_track_ids(&mut self) -> Result<Vec<TrackId>, StorageError> {
        let ids = {
            let mut stmt = self
                .db
                .prepare(&format!("SELECT {ID} FROM {SONGS} WHERE {REVEALED} = 0"))?;
            let ids = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            ids
        };

        ids.iter()
            .map(|id| {
                TrackId::parse(id)
                    .map_err(|e| StorageError::Internal(anyhow!("invalid id {id} in {SONGS}: {e}")))
            })
            .collect()
    }

    /// One conditional bulk update plus a reveal log entry, in one transaction.
    fn reveal_hidden(&mut self, now: DateTime<Utc>) -> Result<Vec<TrackId>, StorageError> {
        let tx = self.db.transaction()?;

        let revealed = {
            let mut stmt = tx.prepare(&format!(
                "UPDATE {SONGS} SET {REVEALED} = 1 WHERE {REVEALED} = 0 RETURNING {ID}"
            ))?;
            let ids = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            ids
        };

        if !revealed.is_empty() {
            tx.execute(
                &format!("INSERT INTO {REVEALS} ({REVEALED_AT}, {REVEALED_COUNT}) VALUES (?1, ?2)"),
                params![to_millis(now), revealed.len() as i64],
            )?;
        }

        let ids = revealed
            .iter()
            .map(|id| TrackId::parse(id).with_context(|| format!("invalid id {id} in {SONGS}")))
            .collect::<anyhow::Result<Vec<_>>>()?;

        tx.commit()?;
        Ok(ids)
    }
}
