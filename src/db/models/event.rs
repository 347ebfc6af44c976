// src/db/models/event.rs

//! PREMIS event log.
//!
//! Append-only and the single source of audit truth: every workflow
//! action writes exactly one event per unit of work attempted, success
//! or failure. There is deliberately no update or delete method on this
//! model, and the table carries no foreign keys so audit rows outlive
//! the objects and packages they describe.

use crate::db::models::column_parse_error;
use crate::db::now_ts;
use crate::error::Result;
use rusqlite::{Connection, Row, params};
use std::fmt;
use std::str::FromStr;

/// Kinds of preservation events the engine records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    ChecksumGeneration,
    FixityCheck,
    FormatIdentification,
    VirusScan,
    PackageCreate,
    PackageBuild,
    PackageValidate,
    PackageExport,
    PackageConvert,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::ChecksumGeneration => "checksum_generation",
            EventType::FixityCheck => "fixity_check",
            EventType::FormatIdentification => "format_identification",
            EventType::VirusScan => "virus_scan",
            EventType::PackageCreate => "package_create",
            EventType::PackageBuild => "package_build",
            EventType::PackageValidate => "package_validate",
            EventType::PackageExport => "package_export",
            EventType::PackageConvert => "package_convert",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "checksum_generation" => Ok(EventType::ChecksumGeneration),
            "fixity_check" => Ok(EventType::FixityCheck),
            "format_identification" => Ok(EventType::FormatIdentification),
            "virus_scan" => Ok(EventType::VirusScan),
            "package_create" => Ok(EventType::PackageCreate),
            "package_build" => Ok(EventType::PackageBuild),
            "package_validate" => Ok(EventType::PackageValidate),
            "package_export" => Ok(EventType::PackageExport),
            "package_convert" => Ok(EventType::PackageConvert),
            _ => Err(format!("Invalid event type: {s}")),
        }
    }
}

/// PREMIS event outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Success,
    Failure,
    Warning,
}

impl EventOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventOutcome::Success => "success",
            EventOutcome::Failure => "failure",
            EventOutcome::Warning => "warning",
        }
    }
}

impl FromStr for EventOutcome {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "success" => Ok(EventOutcome::Success),
            "failure" => Ok(EventOutcome::Failure),
            "warning" => Ok(EventOutcome::Warning),
            _ => Err(format!("Invalid event outcome: {s}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PreservationEvent {
    pub id: Option<i64>,
    pub object_id: Option<i64>,
    pub package_id: Option<i64>,
    pub event_type: EventType,
    pub event_detail: String,
    pub event_outcome: EventOutcome,
    pub event_outcome_detail: Option<String>,
    pub linking_agent_value: String,
    pub event_datetime: String,
}

impl PreservationEvent {
    /// Event linked to a digital object
    pub fn object(
        object_id: i64,
        event_type: EventType,
        detail: impl Into<String>,
        outcome: EventOutcome,
        agent: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            object_id: Some(object_id),
            package_id: None,
            event_type,
            event_detail: detail.into(),
            event_outcome: outcome,
            event_outcome_detail: None,
            linking_agent_value: agent.into(),
            event_datetime: now_ts(),
        }
    }

    /// Event linked to a package
    pub fn package(
        package_id: i64,
        event_type: EventType,
        detail: impl Into<String>,
        outcome: EventOutcome,
        agent: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            object_id: None,
            package_id: Some(package_id),
            event_type,
            event_detail: detail.into(),
            event_outcome: outcome,
            event_outcome_detail: None,
            linking_agent_value: agent.into(),
            event_datetime: now_ts(),
        }
    }

    pub fn with_outcome_detail(mut self, detail: impl Into<String>) -> Self {
        self.event_outcome_detail = Some(detail.into());
        self
    }

    /// Append this event to the log
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO events
                (object_id, package_id, event_type, event_detail, event_outcome,
                 event_outcome_detail, linking_agent_value, event_datetime)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                self.object_id,
                self.package_id,
                self.event_type.as_str(),
                &self.event_detail,
                self.event_outcome.as_str(),
                &self.event_outcome_detail,
                &self.linking_agent_value,
                &self.event_datetime,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    pub fn list_for_object(conn: &Connection, object_id: i64, limit: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, object_id, package_id, event_type, event_detail, event_outcome,
                    event_outcome_detail, linking_agent_value, event_datetime
             FROM events WHERE object_id = ?1
             ORDER BY event_datetime DESC, id DESC LIMIT ?2",
        )?;

        let events = stmt
            .query_map(params![object_id, limit], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(events)
    }

    pub fn list_for_package(conn: &Connection, package_id: i64, limit: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, object_id, package_id, event_type, event_detail, event_outcome,
                    event_outcome_detail, linking_agent_value, event_datetime
             FROM events WHERE package_id = ?1
             ORDER BY event_datetime DESC, id DESC LIMIT ?2",
        )?;

        let events = stmt
            .query_map(params![package_id, limit], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(events)
    }

    pub fn count(conn: &Connection) -> Result<i64> {
        let count = conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(count)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let type_str: String = row.get(3)?;
        let event_type = type_str
            .parse::<EventType>()
            .map_err(|e| column_parse_error(3, e))?;

        let outcome_str: String = row.get(5)?;
        let event_outcome = outcome_str
            .parse::<EventOutcome>()
            .map_err(|e| column_parse_error(5, e))?;

        Ok(Self {
            id: Some(row.get(0)?),
            object_id: row.get(1)?,
            package_id: row.get(2)?,
            event_type,
            event_detail: row.get(4)?,
            event_outcome,
            event_outcome_detail: row.get(6)?,
            linking_agent_value: row.get(7)?,
            event_datetime: row.get(8)?,
        })
    }
}
