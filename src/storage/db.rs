use std::path::Path;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::{
    config::Database,
    storage::{error::StorageError, schema},
};

pub type MillisSinceUnix = i64;

fn open_in_memory() -> Result<rusqlite::Connection, rusqlite::Error> {
    Connection::open_in_memory()
}

fn open_from_file(path: &Path) -> Result<rusqlite::Connection, rusqlite::Error> {
    Connection::open(path)
}

pub fn open(config: &Database) -> Result<rusqlite::Connection, StorageError> {
    let db = if config.in_memory {
        open_in_memory()?
    } else {
        let path = config.path.as_ref().ok_or_else(|| {
            StorageError::Internal(anyhow!("database.path is required unless in_memory = true"))
        })?;
        open_from_file(path)?
    };
    schema::init(&db)?;
    Ok(db)
}

pub fn to_millis(time: DateTime<Utc>) -> MillisSinceUnix {
    time.timestamp_millis()
}

/// converts milliseconds since unix epoch back to a UTC date time
pub fn from_millis(millis: MillisSinceUnix) -> anyhow::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| anyhow!("failed to convert {millis} ms timestamp to datetime"))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use tempfile::tempdir;

    use crate::{
        config::Database,
        storage::{
            db::{from_millis, open, to_millis},
            schema,
        },
    };

    fn table_names(db: &rusqlite::Connection) -> Vec<String> {
        let mut stmt = db
            .prepare("SELECT name FROM sqlite_master WHERE type='table'")
            .unwrap();

        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .map(|r| r.unwrap())
            .collect()
    }

    #[test]
    fn open_in_memory_db_initializes_schema() {
        let db = open(&Database {
            in_memory: true,
            path: None,
        })
        .unwrap();

        let tables = table_names(&db);
        for table in [schema::tables::SONGS, schema::tables::REVEALS] {
            assert!(tables.contains(&table.to_string()));
        }
    }

    #[test]
    fn open_on_disk_db_is_reopenable() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let config = Database {
            in_memory: false,
            path: Some(dir.path().join("deck.db")),
        };

        {
            let db = open(&config)?;
            db.execute(
                "INSERT INTO reveals (revealed_at, revealed_count) VALUES (1, 2)",
                [],
            )?;
        }

        let db = open(&config)?;
        let count: i64 = db.query_row("SELECT COUNT(*) FROM reveals", [], |row| row.get(0))?;
        assert_eq!(count, 1);

        Ok(())
    }

    #[test]
    fn open_on_disk_without_path_fails() {
        let result = open(&Database {
            in_memory: false,
            path: None,
        });
        assert!(result.is_err());
    }

    #[test]
    fn millis_conversion_keeps_precision() -> anyhow::Result<()> {
        let t = chrono::Utc
            .with_ymd_and_hms(2024, 3, 10, 12, 0, 0)
            .unwrap()
            + chrono::Duration::milliseconds(123);
        assert_eq!(from_millis(to_millis(t))?, t);
        Ok(())
    }
}
