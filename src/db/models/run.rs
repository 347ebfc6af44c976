// src/db/models/run.rs

//! Workflow run history.
//!
//! Starting a run inserts a `running` row; the partial unique index on
//! (schedule_id) WHERE status = 'running' makes the non-overlap check
//! race-safe, so a lost race surfaces here as `ConcurrencyConflict`.

use crate::db::models::column_parse_error;
use crate::db::now_ts;
use crate::error::{Error, Result};
use crate::workflow::WorkflowKind;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::fmt;
use std::str::FromStr;

/// Terminal and in-flight run states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Partial,
    Failed,
    Timeout,
    Cancelled,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Partial => "partial",
            RunStatus::Failed => "failed",
            RunStatus::Timeout => "timeout",
            RunStatus::Cancelled => "cancelled",
        }
    }

    /// Whether this outcome should trigger failure notifications
    pub fn is_notifiable_failure(&self) -> bool {
        matches!(self, RunStatus::Failed | RunStatus::Timeout)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "running" => Ok(RunStatus::Running),
            "completed" => Ok(RunStatus::Completed),
            "partial" => Ok(RunStatus::Partial),
            "failed" => Ok(RunStatus::Failed),
            "timeout" => Ok(RunStatus::Timeout),
            "cancelled" => Ok(RunStatus::Cancelled),
            _ => Err(format!("Invalid run status: {s}")),
        }
    }
}

/// How a run was started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggeredBy {
    Cron,
    Manual,
}

impl TriggeredBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggeredBy::Cron => "cron",
            TriggeredBy::Manual => "manual",
        }
    }
}

impl FromStr for TriggeredBy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "cron" => Ok(TriggeredBy::Cron),
            "manual" => Ok(TriggeredBy::Manual),
            _ => Err(format!("Invalid trigger source: {s}")),
        }
    }
}

const SELECT_COLUMNS: &str = "id, schedule_id, workflow_type, started_at, completed_at, \
     duration_ms, status, objects_processed, objects_succeeded, objects_failed, triggered_by, \
     triggered_by_user, error_message, summary";

#[derive(Debug, Clone)]
pub struct WorkflowRun {
    pub id: Option<i64>,
    pub schedule_id: i64,
    pub workflow_type: WorkflowKind,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub duration_ms: Option<i64>,
    pub status: RunStatus,
    pub objects_processed: i64,
    pub objects_succeeded: i64,
    pub objects_failed: i64,
    pub triggered_by: TriggeredBy,
    pub triggered_by_user: Option<String>,
    pub error_message: Option<String>,
    pub summary: Option<String>,
}

impl WorkflowRun {
    /// Insert a new `running` row for the schedule.
    ///
    /// Returns `ConcurrencyConflict` when another run for the same
    /// schedule is already in flight.
    pub fn start(
        conn: &Connection,
        schedule_id: i64,
        workflow_type: WorkflowKind,
        triggered_by: TriggeredBy,
        triggered_by_user: Option<String>,
    ) -> Result<Self> {
        let started_at = now_ts();

        let inserted = conn.execute(
            "INSERT INTO workflow_runs
                (schedule_id, workflow_type, started_at, status, triggered_by, triggered_by_user)
             VALUES (?1, ?2, ?3, 'running', ?4, ?5)",
            params![
                schedule_id,
                workflow_type.as_str(),
                &started_at,
                triggered_by.as_str(),
                &triggered_by_user,
            ],
        );

        match inserted {
            Ok(_) => Ok(Self {
                id: Some(conn.last_insert_rowid()),
                schedule_id,
                workflow_type,
                started_at,
                completed_at: None,
                duration_ms: None,
                status: RunStatus::Running,
                objects_processed: 0,
                objects_succeeded: 0,
                objects_failed: 0,
                triggered_by,
                triggered_by_user,
                error_message: None,
                summary: None,
            }),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::ConcurrencyConflict(schedule_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Finalize the run with its terminal status and counts
    pub fn complete(
        &mut self,
        conn: &Connection,
        status: RunStatus,
        processed: i64,
        succeeded: i64,
        failed: i64,
        error_message: Option<String>,
        summary: Option<String>,
    ) -> Result<()> {
        let id = self
            .id
            .ok_or_else(|| Error::Validation("run has no ID".to_string()))?;

        let completed_at = now_ts();
        let duration_ms = crate::db::parse_ts(&self.started_at)
            .and_then(|started| {
                crate::db::parse_ts(&completed_at).map(|done| (done - started).num_milliseconds())
            })
            .unwrap_or(0);

        conn.execute(
            "UPDATE workflow_runs SET
                status = ?1, completed_at = ?2, duration_ms = ?3,
                objects_processed = ?4, objects_succeeded = ?5, objects_failed = ?6,
                error_message = ?7, summary = ?8
             WHERE id = ?9",
            params![
                status.as_str(),
                &completed_at,
                duration_ms,
                processed,
                succeeded,
                failed,
                &error_message,
                &summary,
                id,
            ],
        )?;

        self.status = status;
        self.completed_at = Some(completed_at);
        self.duration_ms = Some(duration_ms);
        self.objects_processed = processed;
        self.objects_succeeded = succeeded;
        self.objects_failed = failed;
        self.error_message = error_message;
        self.summary = summary;
        Ok(())
    }

    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM workflow_runs WHERE id = ?1"
        ))?;

        let run = stmt.query_row([id], Self::from_row).optional()?;
        Ok(run)
    }

    /// The currently running row for a schedule, if any
    pub fn running_for_schedule(conn: &Connection, schedule_id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM workflow_runs
             WHERE schedule_id = ?1 AND status = 'running'"
        ))?;

        let run = stmt.query_row([schedule_id], Self::from_row).optional()?;
        Ok(run)
    }

    pub fn list_for_schedule(conn: &Connection, schedule_id: i64, limit: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM workflow_runs
             WHERE schedule_id = ?1 ORDER BY started_at DESC, id DESC LIMIT ?2"
        ))?;

        let runs = stmt
            .query_map(params![schedule_id, limit], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(runs)
    }

    pub fn list_recent(conn: &Connection, limit: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM workflow_runs
             ORDER BY started_at DESC, id DESC LIMIT ?1"
        ))?;

        let runs = stmt
            .query_map([limit], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(runs)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let type_str: String = row.get(2)?;
        let workflow_type = type_str
            .parse::<WorkflowKind>()
            .map_err(|e| column_parse_error(2, e))?;

        let status_str: String = row.get(6)?;
        let status = status_str
            .parse::<RunStatus>()
            .map_err(|e| column_parse_error(6, e))?;

        let trigger_str: String = row.get(10)?;
        let triggered_by = trigger_str
            .parse::<TriggeredBy>()
            .map_err(|e| column_parse_error(10, e))?;

        Ok(Self {
            id: Some(row.get(0)?),
            schedule_id: row.get(1)?,
            workflow_type,
            started_at: row.get(3)?,
            completed_at: row.get(4)?,
            duration_ms: row.get(5)?,
            status,
            objects_processed: row.get(7)?,
            objects_succeeded: row.get(8)?,
            objects_failed: row.get(9)?,
            triggered_by,
            triggered_by_user: row.get(11)?,
            error_message: row.get(12)?,
            summary: row.get(13)?,
        })
    }
}
