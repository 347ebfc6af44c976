// src/db/models/package_object.rs

//! Package membership rows joining packages to digital objects.

use crate::db::now_ts;
use crate::error::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};

#[derive(Debug, Clone)]
pub struct PackageObject {
    pub id: Option<i64>,
    pub package_id: i64,
    pub object_id: i64,
    pub relative_path: String,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: Option<String>,
    pub puid: Option<String>,
    pub checksum_value: Option<String>,
    pub sequence: i64,
    pub added_at: String,
}

impl PackageObject {
    pub fn new(package_id: i64, object_id: i64, relative_path: String, file_name: String) -> Self {
        Self {
            id: None,
            package_id,
            object_id,
            relative_path,
            file_name,
            file_size: 0,
            mime_type: None,
            puid: None,
            checksum_value: None,
            sequence: 0,
            added_at: now_ts(),
        }
    }

    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO package_objects
                (package_id, object_id, relative_path, file_name, file_size,
                 mime_type, puid, checksum_value, sequence, added_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                self.package_id,
                self.object_id,
                &self.relative_path,
                &self.file_name,
                self.file_size,
                &self.mime_type,
                &self.puid,
                &self.checksum_value,
                self.sequence,
                &self.added_at,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    pub fn find(conn: &Connection, package_id: i64, object_id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, package_id, object_id, relative_path, file_name, file_size,
                    mime_type, puid, checksum_value, sequence, added_at
             FROM package_objects WHERE package_id = ?1 AND object_id = ?2",
        )?;

        let member = stmt
            .query_row(params![package_id, object_id], Self::from_row)
            .optional()?;
        Ok(member)
    }

    /// Members in their stable bag order
    pub fn list_for_package(conn: &Connection, package_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, package_id, object_id, relative_path, file_name, file_size,
                    mime_type, puid, checksum_value, sequence, added_at
             FROM package_objects WHERE package_id = ?1 ORDER BY sequence, id",
        )?;

        let members = stmt
            .query_map([package_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(members)
    }

    pub fn next_sequence(conn: &Connection, package_id: i64) -> Result<i64> {
        let max: Option<i64> = conn.query_row(
            "SELECT MAX(sequence) FROM package_objects WHERE package_id = ?1",
            [package_id],
            |row| row.get(0),
        )?;
        Ok(max.map_or(0, |m| m + 1))
    }

    pub fn remove(conn: &Connection, package_id: i64, object_id: i64) -> Result<bool> {
        let removed = conn.execute(
            "DELETE FROM package_objects WHERE package_id = ?1 AND object_id = ?2",
            params![package_id, object_id],
        )?;
        Ok(removed > 0)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            package_id: row.get(1)?,
            object_id: row.get(2)?,
            relative_path: row.get(3)?,
            file_name: row.get(4)?,
            file_size: row.get(5)?,
            mime_type: row.get(6)?,
            puid: row.get(7)?,
            checksum_value: row.get(8)?,
            sequence: row.get(9)?,
            added_at: row.get(10)?,
        })
    }
}
