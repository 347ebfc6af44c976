// src/db/models/schedule.rs

//! Workflow schedules: which preservation job runs, when, and with what
//! batch bounds.

use crate::db::models::column_parse_error;
use crate::db::now_ts;
use crate::error::{Error, Result};
use crate::workflow::WorkflowKind;
use rusqlite::{Connection, OptionalExtension, Row, params};

const SELECT_COLUMNS: &str = "id, name, description, workflow_type, cron_expression, batch_limit, \
     timeout_minutes, is_enabled, notify_on_failure, notify_email, last_run_at, last_run_status, \
     last_run_processed, next_run_at, total_runs, total_processed, created_by, created_at";

#[derive(Debug, Clone)]
pub struct WorkflowSchedule {
    pub id: Option<i64>,
    pub name: String,
    pub description: Option<String>,
    pub workflow_type: WorkflowKind,
    pub cron_expression: String,
    pub batch_limit: i64,
    pub timeout_minutes: i64,
    pub is_enabled: bool,
    pub notify_on_failure: bool,
    pub notify_email: Option<String>,
    pub last_run_at: Option<String>,
    pub last_run_status: Option<String>,
    pub last_run_processed: Option<i64>,
    pub next_run_at: Option<String>,
    pub total_runs: i64,
    pub total_processed: i64,
    pub created_by: Option<String>,
    pub created_at: String,
}

impl WorkflowSchedule {
    pub fn new(name: String, workflow_type: WorkflowKind, cron_expression: String) -> Self {
        Self {
            id: None,
            name,
            description: None,
            workflow_type,
            cron_expression,
            batch_limit: 100,
            timeout_minutes: 60,
            is_enabled: true,
            notify_on_failure: true,
            notify_email: None,
            last_run_at: None,
            last_run_status: None,
            last_run_processed: None,
            next_run_at: None,
            total_runs: 0,
            total_processed: 0,
            created_by: None,
            created_at: now_ts(),
        }
    }

    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO workflow_schedules
                (name, description, workflow_type, cron_expression, batch_limit,
                 timeout_minutes, is_enabled, notify_on_failure, notify_email,
                 next_run_at, created_by, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                &self.name,
                &self.description,
                self.workflow_type.as_str(),
                &self.cron_expression,
                self.batch_limit,
                self.timeout_minutes,
                self.is_enabled as i64,
                self.notify_on_failure as i64,
                &self.notify_email,
                &self.next_run_at,
                &self.created_by,
                &self.created_at,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM workflow_schedules WHERE id = ?1"
        ))?;

        let schedule = stmt.query_row([id], Self::from_row).optional()?;
        Ok(schedule)
    }

    pub fn list(conn: &Connection, enabled_only: bool) -> Result<Vec<Self>> {
        let sql = if enabled_only {
            format!(
                "SELECT {SELECT_COLUMNS} FROM workflow_schedules WHERE is_enabled = 1
                 ORDER BY workflow_type, name"
            )
        } else {
            format!("SELECT {SELECT_COLUMNS} FROM workflow_schedules ORDER BY workflow_type, name")
        };

        let mut stmt = conn.prepare(&sql)?;
        let schedules = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(schedules)
    }

    /// Enabled schedules whose next run time has arrived
    pub fn due(conn: &Connection, now: &str) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM workflow_schedules
             WHERE is_enabled = 1 AND next_run_at IS NOT NULL AND next_run_at <= ?1
             ORDER BY next_run_at"
        ))?;

        let schedules = stmt
            .query_map([now], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(schedules)
    }

    /// Enable or disable. Disabling clears next_run_at.
    pub fn set_enabled(
        &mut self,
        conn: &Connection,
        enabled: bool,
        next_run_at: Option<String>,
    ) -> Result<()> {
        let id = self.require_id()?;
        let next = if enabled { next_run_at } else { None };

        conn.execute(
            "UPDATE workflow_schedules SET is_enabled = ?1, next_run_at = ?2 WHERE id = ?3",
            params![enabled as i64, &next, id],
        )?;

        self.is_enabled = enabled;
        self.next_run_at = next;
        Ok(())
    }

    pub fn set_next_run(&mut self, conn: &Connection, next_run_at: Option<String>) -> Result<()> {
        let id = self.require_id()?;

        conn.execute(
            "UPDATE workflow_schedules SET next_run_at = ?1 WHERE id = ?2",
            params![&next_run_at, id],
        )?;

        self.next_run_at = next_run_at;
        Ok(())
    }

    /// Fold a finished run into the schedule's rolling state
    pub fn record_completion(
        &mut self,
        conn: &Connection,
        last_run_at: &str,
        last_run_status: &str,
        processed: i64,
        next_run_at: Option<String>,
    ) -> Result<()> {
        let id = self.require_id()?;

        conn.execute(
            "UPDATE workflow_schedules SET
                last_run_at = ?1, last_run_status = ?2, last_run_processed = ?3,
                total_runs = total_runs + 1, total_processed = total_processed + ?3,
                next_run_at = ?4
             WHERE id = ?5",
            params![last_run_at, last_run_status, processed, &next_run_at, id],
        )?;

        self.last_run_at = Some(last_run_at.to_string());
        self.last_run_status = Some(last_run_status.to_string());
        self.last_run_processed = Some(processed);
        self.total_runs += 1;
        self.total_processed += processed;
        self.next_run_at = next_run_at;
        Ok(())
    }

    pub fn delete(&self, conn: &Connection) -> Result<()> {
        let id = self.require_id()?;
        conn.execute("DELETE FROM workflow_schedules WHERE id = ?1", [id])?;
        Ok(())
    }

    fn require_id(&self) -> Result<i64> {
        self.id
            .ok_or_else(|| Error::Validation("schedule has no ID".to_string()))
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let type_str: String = row.get(3)?;
        let workflow_type = type_str
            .parse::<WorkflowKind>()
            .map_err(|e| column_parse_error(3, e))?;

        let enabled: i64 = row.get(7)?;
        let notify: i64 = row.get(8)?;

        Ok(Self {
            id: Some(row.get(0)?),
            name: row.get(1)?,
            description: row.get(2)?,
            workflow_type,
            cron_expression: row.get(4)?,
            batch_limit: row.get(5)?,
            timeout_minutes: row.get(6)?,
            is_enabled: enabled != 0,
            notify_on_failure: notify != 0,
            notify_email: row.get(9)?,
            last_run_at: row.get(10)?,
            last_run_status: row.get(11)?,
            last_run_processed: row.get(12)?,
            next_run_at: row.get(13)?,
            total_runs: row.get(14)?,
            total_processed: row.get(15)?,
            created_by: row.get(16)?,
            created_at: row.get(17)?,
        })
    }
}
