// src/db/models/virus_scan.rs

//! Virus scan results.
//!
//! `infected` is a successful scan that found something, not a
//! processing failure; only `error` means the scan itself went wrong.

use crate::db::models::column_parse_error;
use crate::error::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStatus {
    Clean,
    Infected,
    Error,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Clean => "clean",
            ScanStatus::Infected => "infected",
            ScanStatus::Error => "error",
        }
    }
}

impl FromStr for ScanStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "clean" => Ok(ScanStatus::Clean),
            "infected" => Ok(ScanStatus::Infected),
            "error" => Ok(ScanStatus::Error),
            _ => Err(format!("Invalid scan status: {s}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VirusScan {
    pub id: Option<i64>,
    pub object_id: i64,
    pub status: ScanStatus,
    pub threat_name: Option<String>,
    pub scanner_name: String,
    pub engine_version: Option<String>,
    pub scanned_by: String,
    pub duration_ms: i64,
    pub error_message: Option<String>,
    pub scanned_at: String,
}

impl VirusScan {
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO virus_scans
                (object_id, status, threat_name, scanner_name, engine_version,
                 scanned_by, duration_ms, error_message, scanned_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                self.object_id,
                self.status.as_str(),
                &self.threat_name,
                &self.scanner_name,
                &self.engine_version,
                &self.scanned_by,
                self.duration_ms,
                &self.error_message,
                &self.scanned_at,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    pub fn latest_for_object(conn: &Connection, object_id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, object_id, status, threat_name, scanner_name, engine_version,
                    scanned_by, duration_ms, error_message, scanned_at
             FROM virus_scans WHERE object_id = ?1
             ORDER BY scanned_at DESC, id DESC LIMIT 1",
        )?;

        let scan = stmt.query_row([object_id], Self::from_row).optional()?;
        Ok(scan)
    }

    pub fn count_by_status(conn: &Connection, status: ScanStatus) -> Result<i64> {
        let count = conn.query_row(
            "SELECT COUNT(*) FROM virus_scans WHERE status = ?1",
            [status.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let status_str: String = row.get(2)?;
        let status = status_str
            .parse::<ScanStatus>()
            .map_err(|e| column_parse_error(2, e))?;

        Ok(Self {
            id: Some(row.get(0)?),
            object_id: row.get(1)?,
            status,
            threat_name: row.get(3)?,
            scanner_name: row.get(4)?,
            engine_version: row.get(5)?,
            scanned_by: row.get(6)?,
            duration_ms: row.get(7)?,
            error_message: row.get(8)?,
            scanned_at: row.get(9)?,
        })
    }
}
