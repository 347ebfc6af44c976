// src/db/models/format_identification.rs

//! Current format identification per object.
//!
//! Re-identification overwrites the row; the event log preserves the
//! history.

use crate::db::models::column_parse_error;
use crate::error::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::str::FromStr;

/// Identification confidence, derived from the matching basis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    Certain,
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Certain => "certain",
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        }
    }
}

impl FromStr for Confidence {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "certain" => Ok(Confidence::Certain),
            "high" => Ok(Confidence::High),
            "medium" => Ok(Confidence::Medium),
            "low" => Ok(Confidence::Low),
            _ => Err(format!("Invalid confidence: {s}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FormatIdentification {
    pub id: Option<i64>,
    pub object_id: i64,
    pub format_id: Option<i64>,
    pub puid: Option<String>,
    pub format_name: String,
    pub format_version: Option<String>,
    pub mime_type: Option<String>,
    pub confidence: Confidence,
    pub basis: Option<String>,
    pub warning: Option<String>,
    pub tool: String,
    pub identification_date: String,
}

impl FormatIdentification {
    /// Insert or overwrite the identification for this object
    pub fn upsert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO format_identifications
                (object_id, format_id, puid, format_name, format_version, mime_type,
                 confidence, basis, warning, tool, identification_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(object_id) DO UPDATE SET
                format_id = excluded.format_id,
                puid = excluded.puid,
                format_name = excluded.format_name,
                format_version = excluded.format_version,
                mime_type = excluded.mime_type,
                confidence = excluded.confidence,
                basis = excluded.basis,
                warning = excluded.warning,
                tool = excluded.tool,
                identification_date = excluded.identification_date",
            params![
                self.object_id,
                self.format_id,
                &self.puid,
                &self.format_name,
                &self.format_version,
                &self.mime_type,
                self.confidence.as_str(),
                &self.basis,
                &self.warning,
                &self.tool,
                &self.identification_date,
            ],
        )?;

        let id = conn.query_row(
            "SELECT id FROM format_identifications WHERE object_id = ?1",
            [self.object_id],
            |row| row.get(0),
        )?;
        self.id = Some(id);
        Ok(id)
    }

    pub fn find_by_object(conn: &Connection, object_id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, object_id, format_id, puid, format_name, format_version, mime_type,
                    confidence, basis, warning, tool, identification_date
             FROM format_identifications WHERE object_id = ?1",
        )?;

        let identification = stmt.query_row([object_id], Self::from_row).optional()?;
        Ok(identification)
    }

    pub fn count(conn: &Connection) -> Result<i64> {
        let count = conn.query_row(
            "SELECT COUNT(*) FROM format_identifications",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn count_with_warnings(conn: &Connection) -> Result<i64> {
        let count = conn.query_row(
            "SELECT COUNT(*) FROM format_identifications WHERE warning IS NOT NULL AND warning != ''",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let confidence_str: String = row.get(7)?;
        let confidence = confidence_str
            .parse::<Confidence>()
            .map_err(|e| column_parse_error(7, e))?;

        Ok(Self {
            id: Some(row.get(0)?),
            object_id: row.get(1)?,
            format_id: row.get(2)?,
            puid: row.get(3)?,
            format_name: row.get(4)?,
            format_version: row.get(5)?,
            mime_type: row.get(6)?,
            confidence,
            basis: row.get(8)?,
            warning: row.get(9)?,
            tool: row.get(10)?,
            identification_date: row.get(11)?,
        })
    }
}
