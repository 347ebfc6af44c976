// src/db/models/fixity_check.rs

//! Fixity check history. Append-only: rows are never mutated.

use crate::db::models::column_parse_error;
use crate::error::Result;
use rusqlite::{Connection, Row, params};
use std::str::FromStr;

/// Outcome of a single fixity check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixityStatus {
    Pass,
    Fail,
    Error,
}

impl FixityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FixityStatus::Pass => "pass",
            FixityStatus::Fail => "fail",
            FixityStatus::Error => "error",
        }
    }
}

impl FromStr for FixityStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pass" => Ok(FixityStatus::Pass),
            "fail" => Ok(FixityStatus::Fail),
            "error" => Ok(FixityStatus::Error),
            _ => Err(format!("Invalid fixity status: {s}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FixityCheck {
    pub id: Option<i64>,
    pub object_id: i64,
    pub algorithm: String,
    pub status: FixityStatus,
    pub expected_value: Option<String>,
    pub actual_value: Option<String>,
    pub error_message: Option<String>,
    pub checked_by: String,
    pub duration_ms: i64,
    pub checked_at: String,
}

impl FixityCheck {
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO fixity_checks
                (object_id, algorithm, status, expected_value, actual_value,
                 error_message, checked_by, duration_ms, checked_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                self.object_id,
                &self.algorithm,
                self.status.as_str(),
                &self.expected_value,
                &self.actual_value,
                &self.error_message,
                &self.checked_by,
                self.duration_ms,
                &self.checked_at,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    pub fn list_for_object(conn: &Connection, object_id: i64, limit: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, object_id, algorithm, status, expected_value, actual_value,
                    error_message, checked_by, duration_ms, checked_at
             FROM fixity_checks WHERE object_id = ?1
             ORDER BY checked_at DESC LIMIT ?2",
        )?;

        let checks = stmt
            .query_map(params![object_id, limit], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(checks)
    }

    /// Recent checks, optionally filtered by status
    pub fn recent(conn: &Connection, limit: i64, status: Option<FixityStatus>) -> Result<Vec<Self>> {
        let checks = match status {
            Some(s) => {
                let mut stmt = conn.prepare(
                    "SELECT id, object_id, algorithm, status, expected_value, actual_value,
                            error_message, checked_by, duration_ms, checked_at
                     FROM fixity_checks WHERE status = ?1
                     ORDER BY checked_at DESC LIMIT ?2",
                )?;
                stmt.query_map(params![s.as_str(), limit], Self::from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT id, object_id, algorithm, status, expected_value, actual_value,
                            error_message, checked_by, duration_ms, checked_at
                     FROM fixity_checks ORDER BY checked_at DESC LIMIT ?1",
                )?;
                stmt.query_map([limit], Self::from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
        };
        Ok(checks)
    }

    pub fn count_by_status(conn: &Connection, status: FixityStatus) -> Result<i64> {
        let count = conn.query_row(
            "SELECT COUNT(*) FROM fixity_checks WHERE status = ?1",
            [status.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let status_str: String = row.get(3)?;
        let status = status_str
            .parse::<FixityStatus>()
            .map_err(|e| column_parse_error(3, e))?;

        Ok(Self {
            id: Some(row.get(0)?),
            object_id: row.get(1)?,
            algorithm: row.get(2)?,
            status,
            expected_value: row.get(4)?,
            actual_value: row.get(5)?,
            error_message: row.get(6)?,
            checked_by: row.get(7)?,
            duration_ms: row.get(8)?,
            checked_at: row.get(9)?,
        })
    }
}
