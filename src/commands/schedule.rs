// src/commands/schedule.rs
//! Workflow schedule management commands

use super::{open_engine, tool_timeout};
use crate::cli::CommonArgs;
use crate::db::models::{TriggeredBy, WorkflowRun, WorkflowSchedule};
use crate::db::paths;
use crate::error::Error;
use crate::identify::SiegfriedIdentifier;
use crate::notify::LogNotifier;
use crate::scan::ClamAvScanner;
use crate::scheduler::{self, NewSchedule};
use crate::workflow::{WorkflowContext, WorkflowKind};
use anyhow::Result;
use tracing::info;

pub fn cmd_schedule_create(
    common: &CommonArgs,
    name: &str,
    workflow: &str,
    cron: &str,
    description: Option<String>,
    batch_limit: i64,
    timeout_minutes: i64,
    notify_email: Option<String>,
    disabled: bool,
) -> Result<()> {
    let engine = open_engine(common)?;

    let workflow_type = workflow
        .parse::<WorkflowKind>()
        .map_err(anyhow::Error::msg)?;

    let schedule = scheduler::create_schedule(
        &engine.conn,
        NewSchedule {
            description,
            batch_limit,
            timeout_minutes,
            notify_email,
            enabled: !disabled,
            ..NewSchedule::new(name.to_string(), workflow_type, cron.to_string())
        },
    )?;

    println!("Created schedule {}", schedule.name);
    println!("  ID:       {}", schedule.id.unwrap_or(0));
    println!("  Workflow: {}", schedule.workflow_type.label());
    println!("  Cron:     {}", schedule.cron_expression);
    println!(
        "  Next run: {}",
        schedule.next_run_at.as_deref().unwrap_or("disabled")
    );
    Ok(())
}

pub fn cmd_schedule_list(common: &CommonArgs) -> Result<()> {
    let engine = open_engine(common)?;

    let schedules = WorkflowSchedule::list(&engine.conn, false)?;
    if schedules.is_empty() {
        println!("No schedules configured.");
        return Ok(());
    }

    println!(
        "{:>4}  {:3}  {:22}  {:14}  {:19}  {:>5}  NAME",
        "ID", "ON", "WORKFLOW", "CRON", "NEXT RUN", "RUNS"
    );
    println!("{}", "-".repeat(90));
    for s in &schedules {
        println!(
            "{:>4}  {:3}  {:22}  {:14}  {:19}  {:>5}  {}",
            s.id.unwrap_or(0),
            if s.is_enabled { "yes" } else { "no" },
            s.workflow_type.as_str(),
            s.cron_expression,
            s.next_run_at.as_deref().unwrap_or("-"),
            s.total_runs,
            s.name
        );
    }
    println!();
    println!("Total: {} schedule(s)", schedules.len());
    Ok(())
}

pub fn cmd_schedule_toggle(common: &CommonArgs, schedule_id: i64) -> Result<()> {
    let engine = open_engine(common)?;
    let schedule = scheduler::toggle_schedule(&engine.conn, schedule_id)?;

    if schedule.is_enabled {
        println!(
            "Schedule {} enabled; next run at {}",
            schedule.name,
            schedule.next_run_at.as_deref().unwrap_or("-")
        );
    } else {
        println!("Schedule {} disabled", schedule.name);
    }
    Ok(())
}

pub fn cmd_schedule_run_now(common: &CommonArgs, schedule_id: i64) -> Result<()> {
    let engine = open_engine(common)?;
    let conn = engine.conn;
    let store = engine.store;
    let config = engine.config;

    let identifier = SiegfriedIdentifier::new(tool_timeout(&config));
    let scanner = ClamAvScanner::new(tool_timeout(&config));
    let ctx = WorkflowContext {
        conn: &conn,
        store: &store,
        config: &config,
        identifier: &identifier,
        scanner: &scanner,
        packages_dir: paths::packages_dir(&common.db_path),
    };

    info!(schedule_id, "manual schedule trigger");
    let run = match scheduler::run_schedule(
        &ctx,
        schedule_id,
        TriggeredBy::Manual,
        whoami(),
        &LogNotifier,
    ) {
        Ok(run) => run,
        // A run is already in flight; the manual trigger is a no-op
        Err(Error::ConcurrencyConflict(_)) => {
            println!("A run is already in progress for schedule {schedule_id}; nothing to do.");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    println!("Run {} finished: {}", run.id.unwrap_or(0), run.status.as_str());
    println!(
        "  Processed: {} ({} succeeded, {} failed)",
        run.objects_processed, run.objects_succeeded, run.objects_failed
    );
    if let Some(error) = &run.error_message {
        println!("  Error:     {error}");
    }

    if run.status.is_notifiable_failure() {
        anyhow::bail!("run ended {}", run.status.as_str());
    }
    if run.objects_failed > 0 {
        anyhow::bail!(
            "{} of {} object(s) failed",
            run.objects_failed,
            run.objects_processed
        );
    }
    Ok(())
}

pub fn cmd_schedule_delete(common: &CommonArgs, schedule_id: i64) -> Result<()> {
    let engine = open_engine(common)?;
    scheduler::delete_schedule(&engine.conn, schedule_id)?;
    println!("Deleted schedule {schedule_id}");
    Ok(())
}

pub fn cmd_schedule_runs(
    common: &CommonArgs,
    schedule_id: Option<i64>,
    limit: i64,
) -> Result<()> {
    let engine = open_engine(common)?;

    let runs = match schedule_id {
        Some(id) => WorkflowRun::list_for_schedule(&engine.conn, id, limit)?,
        None => WorkflowRun::list_recent(&engine.conn, limit)?,
    };

    if runs.is_empty() {
        println!("No workflow runs recorded.");
        return Ok(());
    }

    println!(
        "{:>6}  {:>6}  {:22}  {:9}  {:>9}  {:>6}  {:19}  TRIGGER",
        "RUN", "SCHED", "WORKFLOW", "STATUS", "PROCESSED", "FAILED", "STARTED"
    );
    println!("{}", "-".repeat(100));
    for run in &runs {
        println!(
            "{:>6}  {:>6}  {:22}  {:9}  {:>9}  {:>6}  {:19}  {}",
            run.id.unwrap_or(0),
            run.schedule_id,
            run.workflow_type.as_str(),
            run.status.as_str(),
            run.objects_processed,
            run.objects_failed,
            run.started_at,
            run.triggered_by.as_str()
        );
    }
    println!();
    println!("Total: {} run(s)", runs.len());
    Ok(())
}

/// Operator name recorded on manual triggers, when the OS provides one
fn whoami() -> Option<String> {
    std::env::var("USER").or_else(|_| std::env::var("USERNAME")).ok()
}
