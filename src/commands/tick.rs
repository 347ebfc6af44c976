// src/commands/tick.rs
//! Scheduler tick command

use super::{open_engine, tool_timeout};
use crate::cli::CommonArgs;
use crate::db::paths;
use crate::identify::SiegfriedIdentifier;
use crate::notify::LogNotifier;
use crate::scan::ClamAvScanner;
use crate::scheduler;
use crate::workflow::WorkflowContext;
use anyhow::Result;
use tracing::info;

/// Run one scheduler pass. Meant to be invoked every minute from an
/// external cron entry.
pub fn cmd_tick(common: &CommonArgs) -> Result<()> {
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

    let report = scheduler::tick(&ctx, &LogNotifier)?;

    info!(
        due = report.due,
        completed = report.completed.len(),
        conflicts = report.conflicts,
        failures = report.failures.len(),
        "scheduler tick finished"
    );

    if report.due == 0 {
        println!("No schedules due.");
        return Ok(());
    }

    println!(
        "Tick: {} due, {} completed, {} skipped (already running)",
        report.due,
        report.completed.len(),
        report.conflicts
    );
    for (schedule_id, error) in &report.failures {
        println!("  schedule {schedule_id} failed: {error}");
    }

    if !report.failures.is_empty() {
        anyhow::bail!("{} schedule(s) failed to run", report.failures.len());
    }
    Ok(())
}
