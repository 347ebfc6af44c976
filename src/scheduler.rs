// src/scheduler.rs

//! Workflow scheduler.
//!
//! The tick is the only autonomous actor in the engine: an external
//! cron entry invokes it every minute, and it starts a run for every
//! enabled schedule whose `next_run_at` has arrived. The non-overlap
//! guarantee (at most one running run per schedule) rests on the
//! database's partial unique index, so concurrent ticks and manual
//! triggers race safely; the loser's trigger is a logged no-op.
//!
//! `next_run_at` is always recomputed from *now* after a run finishes,
//! never from the previous scheduled time, so downtime does not build
//! up a backlog of immediate re-fires.

use crate::cron::CronExpression;
use crate::db::models::{RunStatus, TriggeredBy, WorkflowRun, WorkflowSchedule};
use crate::db::{format_ts, now_ts, parse_ts};
use crate::error::{Error, Result};
use crate::notify::Notifier;
use crate::workflow::{self, WorkflowContext, WorkflowKind};
use chrono::{Duration, Utc};
use rusqlite::Connection;
use tracing::{info, warn};

/// Fields accepted when creating a schedule
#[derive(Debug, Clone)]
pub struct NewSchedule {
    pub name: String,
    pub workflow_type: WorkflowKind,
    pub cron_expression: String,
    pub description: Option<String>,
    pub batch_limit: i64,
    pub timeout_minutes: i64,
    pub notify_on_failure: bool,
    pub notify_email: Option<String>,
    pub created_by: Option<String>,
    pub enabled: bool,
}

impl NewSchedule {
    pub fn new(name: String, workflow_type: WorkflowKind, cron_expression: String) -> Self {
        Self {
            name,
            workflow_type,
            cron_expression,
            description: None,
            batch_limit: 100,
            timeout_minutes: 60,
            notify_on_failure: true,
            notify_email: None,
            created_by: None,
            enabled: true,
        }
    }
}

/// Create a schedule, validating the cron expression and computing the
/// first `next_run_at` when enabled.
pub fn create_schedule(conn: &Connection, new: NewSchedule) -> Result<WorkflowSchedule> {
    if new.name.trim().is_empty() {
        return Err(Error::Validation("schedule name is required".to_string()));
    }
    if new.batch_limit <= 0 {
        return Err(Error::Validation("batch_limit must be positive".to_string()));
    }
    if new.timeout_minutes <= 0 {
        return Err(Error::Validation("timeout_minutes must be positive".to_string()));
    }

    let cron = CronExpression::parse(&new.cron_expression)?;

    let mut schedule = WorkflowSchedule::new(new.name, new.workflow_type, new.cron_expression);
    schedule.description = new.description;
    schedule.batch_limit = new.batch_limit;
    schedule.timeout_minutes = new.timeout_minutes;
    schedule.notify_on_failure = new.notify_on_failure;
    schedule.notify_email = new.notify_email;
    schedule.created_by = new.created_by;
    schedule.is_enabled = new.enabled;
    if new.enabled {
        schedule.next_run_at = cron.next_after(Utc::now()).map(format_ts);
    }

    schedule.insert(conn)?;
    info!(
        schedule = %schedule.name,
        workflow = schedule.workflow_type.as_str(),
        next_run = schedule.next_run_at.as_deref().unwrap_or("-"),
        "schedule created"
    );
    Ok(schedule)
}

/// Flip a schedule between enabled and disabled. Enabling recomputes
/// `next_run_at`; disabling clears it.
pub fn toggle_schedule(conn: &Connection, schedule_id: i64) -> Result<WorkflowSchedule> {
    let mut schedule = WorkflowSchedule::find_by_id(conn, schedule_id)?
        .ok_or_else(|| Error::NotFound(format!("schedule {schedule_id}")))?;

    let enabling = !schedule.is_enabled;
    let next_run = if enabling {
        CronExpression::parse(&schedule.cron_expression)?
            .next_after(Utc::now())
            .map(format_ts)
    } else {
        None
    };

    schedule.set_enabled(conn, enabling, next_run)?;
    info!(
        schedule = %schedule.name,
        enabled = schedule.is_enabled,
        "schedule toggled"
    );
    Ok(schedule)
}

pub fn delete_schedule(conn: &Connection, schedule_id: i64) -> Result<()> {
    let schedule = WorkflowSchedule::find_by_id(conn, schedule_id)?
        .ok_or_else(|| Error::NotFound(format!("schedule {schedule_id}")))?;
    schedule.delete(conn)?;
    info!(schedule = %schedule.name, "schedule deleted");
    Ok(())
}

/// Outcome of one scheduler tick
#[derive(Debug, Default)]
pub struct TickReport {
    pub due: usize,
    pub completed: Vec<i64>,
    pub conflicts: usize,
    pub failures: Vec<(i64, String)>,
}

/// Run every due schedule once. Intended to be invoked once a minute by
/// an external scheduler.
pub fn tick(
    ctx: &WorkflowContext<'_>,
    notifier: &dyn Notifier,
) -> Result<TickReport> {
    let now = now_ts();
    let due = WorkflowSchedule::due(ctx.conn, &now)?;

    let mut report = TickReport {
        due: due.len(),
        ..Default::default()
    };

    for schedule in &due {
        let schedule_id = schedule.id.unwrap_or(0);
        match run_schedule(ctx, schedule_id, TriggeredBy::Cron, None, notifier) {
            Ok(run) => report.completed.push(run.id.unwrap_or(0)),
            Err(Error::ConcurrencyConflict(_)) => {
                // Another worker got there first; this trigger is a no-op
                info!(schedule_id, "run already in progress, skipping");
                report.conflicts += 1;
            }
            Err(e) => {
                warn!(schedule_id, error = %e, "schedule execution failed");
                report.failures.push((schedule_id, e.to_string()));
            }
        }
    }

    Ok(report)
}

/// Execute one schedule now: start a run, dispatch the workflow, and
/// finalize run and schedule bookkeeping.
///
/// Manual triggers go through this same path as cron ones, including
/// the non-overlap check.
pub fn run_schedule(
    ctx: &WorkflowContext<'_>,
    schedule_id: i64,
    triggered_by: TriggeredBy,
    triggered_by_user: Option<String>,
    notifier: &dyn Notifier,
) -> Result<WorkflowRun> {
    let mut schedule = WorkflowSchedule::find_by_id(ctx.conn, schedule_id)?
        .ok_or_else(|| Error::NotFound(format!("schedule {schedule_id}")))?;

    // Race-safe: the insert either claims the running slot or fails
    let mut run = WorkflowRun::start(
        ctx.conn,
        schedule_id,
        schedule.workflow_type,
        triggered_by,
        triggered_by_user,
    )?;

    info!(
        schedule = %schedule.name,
        run_id = run.id.unwrap_or(0),
        workflow = schedule.workflow_type.as_str(),
        "workflow run started"
    );

    let deadline = parse_ts(&run.started_at)
        .map(|started| started + Duration::minutes(schedule.timeout_minutes));

    let outcome = workflow::execute(
        schedule.workflow_type,
        ctx,
        schedule.batch_limit,
        deadline,
    );

    let (status, processed, succeeded, failed, error_message, summary) = match outcome {
        Ok(result) => {
            let status = if result.timed_out {
                RunStatus::Timeout
            } else if result.failed > 0 {
                RunStatus::Partial
            } else {
                RunStatus::Completed
            };
            (
                status,
                result.processed,
                result.succeeded,
                result.failed,
                None,
                Some(result.summary.to_string()),
            )
        }
        Err(e) => (RunStatus::Failed, 0, 0, 0, Some(e.to_string()), None),
    };

    run.complete(
        ctx.conn,
        status,
        processed,
        succeeded,
        failed,
        error_message,
        summary,
    )?;

    // Always recompute from now, not from the missed slot
    let next_run = if schedule.is_enabled {
        CronExpression::parse(&schedule.cron_expression)
            .ok()
            .and_then(|cron| cron.next_after(Utc::now()))
            .map(format_ts)
    } else {
        None
    };

    schedule.record_completion(
        ctx.conn,
        run.completed_at.as_deref().unwrap_or(&run.started_at),
        status.as_str(),
        processed,
        next_run,
    )?;

    if schedule.notify_on_failure && status.is_notifiable_failure() {
        notifier.notify_failure(&schedule, &run)?;
    }

    info!(
        schedule = %schedule.name,
        run_id = run.id.unwrap_or(0),
        status = status.as_str(),
        processed,
        succeeded,
        failed,
        "workflow run finished"
    );
    Ok(run)
}
