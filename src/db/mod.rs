// src/db/mod.rs

//! SQLite persistence for the preservation engine.
//!
//! All engine state lives in one database file: checksums, fixity
//! history, format identifications, scan results, the PREMIS event log,
//! packages, and workflow schedules/runs. The `digital_objects` table
//! mirrors the catalog's object metadata; the engine only ever reads
//! it.

pub mod models;
pub mod paths;
pub mod schema;

use crate::error::Result;
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::Connection;
use std::path::Path;

/// Timestamp format used for every datetime column.
///
/// Lexicographic order equals chronological order, so SQL comparisons
/// on these columns are correct without parsing.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format a UTC instant for storage
pub fn format_ts(dt: DateTime<Utc>) -> String {
    dt.format(TIMESTAMP_FORMAT).to_string()
}

/// Current UTC time, formatted for storage
pub fn now_ts() -> String {
    format_ts(Utc::now())
}

/// Parse a stored timestamp back into a UTC instant
pub fn parse_ts(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Initialize a database at the given path, creating parent directories
/// and applying all migrations.
pub fn init(db_path: &str) -> Result<()> {
    if let Some(parent) = Path::new(db_path).parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let conn = open(db_path)?;
    schema::migrate(&conn)?;
    Ok(())
}

/// Open a connection with foreign keys enforced
pub fn open(db_path: &str) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA foreign_keys = ON")?;
    Ok(conn)
}

/// Run a closure inside a transaction, committing on `Ok` and rolling
/// back on `Err`.
pub fn transaction<T, F>(conn: &mut Connection, f: F) -> Result<T>
where
    F: FnOnce(&Connection) -> Result<T>,
{
    let tx = conn.transaction()?;
    let result = f(&tx)?;
    tx.commit()?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_round_trip() {
        let now = Utc::now();
        let stored = format_ts(now);
        let parsed = parse_ts(&stored).unwrap();
        // Sub-second precision is dropped by the storage format
        assert_eq!(parsed.timestamp(), now.timestamp());
    }

    #[test]
    fn test_timestamp_ordering_is_lexicographic() {
        let earlier = format_ts("2026-01-01T00:00:00Z".parse().unwrap());
        let later = format_ts("2026-06-15T12:30:00Z".parse().unwrap());
        assert!(earlier < later);
    }

    #[test]
    fn test_init_creates_schema() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("engine.db");
        let db_path = db_path.to_str().unwrap();

        init(db_path).unwrap();

        let conn = open(db_path).unwrap();
        let version = schema::get_schema_version(&conn).unwrap();
        assert_eq!(version, schema::SCHEMA_VERSION);
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("engine.db");
        let db_path = db_path.to_str().unwrap();
        init(db_path).unwrap();

        let mut conn = open(db_path).unwrap();
        let result: Result<()> = transaction(&mut conn, |tx| {
            tx.execute(
                "INSERT INTO digital_objects (name, path, byte_size) VALUES ('a', 'p', 1)",
                [],
            )?;
            Err(crate::error::Error::Validation("boom".into()))
        });
        assert!(result.is_err());

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM digital_objects", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
