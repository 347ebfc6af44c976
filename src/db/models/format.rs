// src/db/models/format.rs

//! Format risk registry entries, keyed by PUID.

use crate::db::models::column_parse_error;
use crate::error::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::str::FromStr;

/// Preservation risk classification for a format
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            "critical" => Ok(RiskLevel::Critical),
            _ => Err(format!("Invalid risk level: {s}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FormatEntry {
    pub id: Option<i64>,
    pub puid: Option<String>,
    pub format_name: String,
    pub format_version: Option<String>,
    pub mime_type: Option<String>,
    pub risk_level: RiskLevel,
    pub is_preservation_format: bool,
    pub preservation_action: Option<String>,
}

impl FormatEntry {
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO formats
                (puid, format_name, format_version, mime_type, risk_level,
                 is_preservation_format, preservation_action)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                &self.puid,
                &self.format_name,
                &self.format_version,
                &self.mime_type,
                self.risk_level.as_str(),
                self.is_preservation_format as i64,
                &self.preservation_action,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    pub fn find_by_puid(conn: &Connection, puid: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, puid, format_name, format_version, mime_type, risk_level,
                    is_preservation_format, preservation_action
             FROM formats WHERE puid = ?1",
        )?;

        let format = stmt.query_row([puid], Self::from_row).optional()?;
        Ok(format)
    }

    pub fn find_by_mime(conn: &Connection, mime_type: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, puid, format_name, format_version, mime_type, risk_level,
                    is_preservation_format, preservation_action
             FROM formats WHERE mime_type = ?1 ORDER BY id LIMIT 1",
        )?;

        let format = stmt.query_row([mime_type], Self::from_row).optional()?;
        Ok(format)
    }

    /// Backfill a PUID onto an entry that was created without one
    pub fn set_puid(&mut self, conn: &Connection, puid: &str) -> Result<()> {
        let id = self.id.ok_or_else(|| {
            crate::error::Error::Validation("Cannot update format without ID".to_string())
        })?;

        conn.execute("UPDATE formats SET puid = ?1 WHERE id = ?2", params![puid, id])?;
        self.puid = Some(puid.to_string());
        Ok(())
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let risk_str: String = row.get(5)?;
        let risk_level = risk_str
            .parse::<RiskLevel>()
            .map_err(|e| column_parse_error(5, e))?;

        let preservation_flag: i64 = row.get(6)?;

        Ok(Self {
            id: Some(row.get(0)?),
            puid: row.get(1)?,
            format_name: row.get(2)?,
            format_version: row.get(3)?,
            mime_type: row.get(4)?,
            risk_level,
            is_preservation_format: preservation_flag != 0,
            preservation_action: row.get(7)?,
        })
    }
}
