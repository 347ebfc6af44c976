// src/db/models/digital_object.rs

//! Digital object metadata, owned by the catalog.
//!
//! The engine reads these rows to locate object files and report sizes.
//! `insert` exists for seeding and tests; production rows are written
//! by the catalog.

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};

#[derive(Debug, Clone)]
pub struct DigitalObject {
    pub id: Option<i64>,
    pub name: String,
    pub path: String,
    pub mime_type: Option<String>,
    pub byte_size: i64,
    pub created_at: Option<String>,
}

impl DigitalObject {
    pub fn new(name: String, path: String, byte_size: i64) -> Self {
        Self {
            id: None,
            name,
            path,
            mime_type: None,
            byte_size,
            created_at: None,
        }
    }

    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO digital_objects (name, path, mime_type, byte_size)
             VALUES (?1, ?2, ?3, ?4)",
            params![&self.name, &self.path, &self.mime_type, self.byte_size],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, name, path, mime_type, byte_size, created_at
             FROM digital_objects WHERE id = ?1",
        )?;

        let object = stmt.query_row([id], Self::from_row).optional()?;
        Ok(object)
    }

    pub fn count(conn: &Connection) -> Result<i64> {
        let count = conn.query_row("SELECT COUNT(*) FROM digital_objects", [], |row| row.get(0))?;
        Ok(count)
    }

    /// All object ids in id order, capped at `limit`
    pub fn list_ids(conn: &Connection, limit: i64) -> Result<Vec<i64>> {
        let mut stmt =
            conn.prepare("SELECT id FROM digital_objects ORDER BY id LIMIT ?1")?;
        let ids = stmt
            .query_map([limit], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            name: row.get(1)?,
            path: row.get(2)?,
            mime_type: row.get(3)?,
            byte_size: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}
