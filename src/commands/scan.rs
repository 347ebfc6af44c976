// src/commands/scan.rs
//! Virus scan commands

use super::{CLI_AGENT, open_engine, tool_timeout};
use crate::cli::{BatchArgs, CommonArgs};
use crate::db::models::{DigitalObject, ScanStatus, VirusScan};
use crate::error::Error;
use crate::scan::{self, ClamAvScanner, Scanner};
use anyhow::Result;
use tracing::{info, warn};

/// Scan files with the external antivirus engine.
pub fn cmd_scan(common: &CommonArgs, batch: &BatchArgs) -> Result<()> {
    let engine = open_engine(common)?;
    let conn = engine.conn;
    let store = engine.store;
    let config = engine.config;

    let scanner = ClamAvScanner::new(tool_timeout(&config));

    if batch.status {
        let objects = DigitalObject::count(&conn)?;
        let clean = VirusScan::count_by_status(&conn, ScanStatus::Clean)?;
        let infected = VirusScan::count_by_status(&conn, ScanStatus::Infected)?;
        let errors = VirusScan::count_by_status(&conn, ScanStatus::Error)?;

        println!("Virus scan status");
        println!("{}", "=".repeat(40));
        println!("Digital objects:   {objects}");
        println!("Clean results:     {clean}");
        println!("Infected results:  {infected}");
        println!("Scan errors:       {errors}");
        println!(
            "Scanner:           {} ({})",
            scanner.name(),
            if scanner.is_available() {
                "available"
            } else {
                "unavailable"
            }
        );
        return Ok(());
    }

    let ids = match batch.object_id {
        Some(id) => vec![id],
        None if batch.all => DigitalObject::list_ids(&conn, batch.limit)?,
        None => scan::select_unscanned(&conn, batch.limit)?,
    };

    if batch.dry_run {
        if ids.is_empty() {
            println!("No objects selected for scanning.");
            return Ok(());
        }
        println!("Objects selected for scanning ({}):", ids.len());
        for id in &ids {
            println!("{id:>8}");
        }
        return Ok(());
    }

    info!(count = ids.len(), "running virus scan batch");

    let mut clean = 0i64;
    let mut infected = 0i64;
    let mut errors = 0i64;
    for object_id in &ids {
        match scan::scan_object(&conn, &store, &scanner, *object_id, CLI_AGENT, &config.agent) {
            Ok(scan) => match scan.status {
                ScanStatus::Clean => {
                    clean += 1;
                    println!("{object_id:>8}  clean");
                }
                ScanStatus::Infected => {
                    infected += 1;
                    println!(
                        "{:>8}  INFECTED: {}",
                        object_id,
                        scan.threat_name.as_deref().unwrap_or("unknown threat")
                    );
                }
                ScanStatus::Error => {
                    errors += 1;
                    println!(
                        "{:>8}  error: {}",
                        object_id,
                        scan.error_message.as_deref().unwrap_or("unknown")
                    );
                }
            },
            Err(Error::ToolUnavailable(tool)) => {
                anyhow::bail!("antivirus engine unavailable: {tool}");
            }
            Err(e) => {
                warn!(object_id, error = %e, "virus scan failed");
                errors += 1;
            }
        }
    }

    println!("Scan complete: {clean} clean, {infected} infected, {errors} error(s)");
    // An infection is a successful scan; only engine errors fail the run
    if errors > 0 {
        anyhow::bail!("{errors} of {} object(s) could not be scanned", ids.len());
    }
    Ok(())
}
