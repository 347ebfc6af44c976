// src/commands/fixity.rs
//! Fixity verification commands

use super::{CLI_AGENT, open_engine};
use crate::cli::{BatchArgs, CommonArgs};
use crate::db::models::{DigitalObject, FixityStatus};
use crate::fixity;
use anyhow::Result;
use tracing::info;

/// Run fixity verification over due objects, or report status.
pub fn cmd_fixity(
    common: &CommonArgs,
    batch: &BatchArgs,
    stale_days: Option<i64>,
) -> Result<()> {
    let engine = open_engine(common)?;
    let mut config = engine.config;
    if let Some(days) = stale_days {
        config.staleness_days = days;
    }
    let conn = engine.conn;
    let store = engine.store;

    if batch.status {
        return print_status(&conn, &config);
    }

    // Single-object mode bypasses selection entirely
    if let Some(object_id) = batch.object_id {
        info!(object_id, "running fixity check");
        let outcome = fixity::check_object(&conn, &store, &config, object_id, CLI_AGENT)?;
        println!(
            "Object {}: {} ({} checksum(s) verified)",
            object_id,
            if outcome.all_passed { "PASS" } else { "FAIL" },
            outcome.checks
        );
        if !outcome.all_passed {
            anyhow::bail!("fixity check failed for object {object_id}");
        }
        return Ok(());
    }

    let cutoff = fixity::staleness_cutoff(&config);
    let cutoff = if batch.all { None } else { Some(cutoff.as_str()) };

    if batch.dry_run {
        let due = fixity::select_due(&conn, cutoff, batch.limit)?;
        if due.is_empty() {
            println!("No objects due for fixity verification.");
            return Ok(());
        }
        println!("Objects due for fixity verification ({}):", due.len());
        println!("{:>8}  LAST VERIFIED", "OBJECT");
        for item in &due {
            println!(
                "{:>8}  {}",
                item.object_id,
                item.last_verified.as_deref().unwrap_or("never")
            );
        }
        return Ok(());
    }

    info!(limit = batch.limit, all = batch.all, "running fixity batch");
    let result =
        fixity::run_selection(&conn, &store, &config, cutoff, batch.limit, None, CLI_AGENT)?;

    println!(
        "Fixity run complete: {} processed, {} passed, {} failed",
        result.processed, result.succeeded, result.failed
    );
    if result.failed > 0 {
        anyhow::bail!(
            "{} of {} object(s) failed fixity verification",
            result.failed,
            result.processed
        );
    }
    Ok(())
}

fn print_status(conn: &rusqlite::Connection, config: &crate::config::EngineConfig) -> Result<()> {
    let objects = DigitalObject::count(conn)?;
    let passed = crate::db::models::FixityCheck::count_by_status(conn, FixityStatus::Pass)?;
    let failed = crate::db::models::FixityCheck::count_by_status(conn, FixityStatus::Fail)?;
    let errors = crate::db::models::FixityCheck::count_by_status(conn, FixityStatus::Error)?;

    let cutoff = fixity::staleness_cutoff(config);
    let due = fixity::select_due(conn, Some(&cutoff), i64::MAX)?;

    println!("Fixity status");
    println!("{}", "=".repeat(40));
    println!("Digital objects:     {objects}");
    println!("Checks passed:       {passed}");
    println!("Checks failed:       {failed}");
    println!("Check errors:        {errors}");
    println!("Staleness window:    {} day(s)", config.staleness_days);
    println!("Due for verification: {}", due.len());
    Ok(())
}
