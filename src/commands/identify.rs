// src/commands/identify.rs
//! Format identification commands

use super::{open_engine, tool_timeout};
use crate::cli::{BatchArgs, CommonArgs};
use crate::db::models::{DigitalObject, FormatIdentification};
use crate::error::Error;
use crate::identify::{self, Identifier, SiegfriedIdentifier};
use anyhow::Result;
use tracing::{info, warn};

/// Identify file formats with the external signature matcher.
pub fn cmd_identify(common: &CommonArgs, batch: &BatchArgs, reidentify: bool) -> Result<()> {
    let engine = open_engine(common)?;
    let conn = engine.conn;
    let store = engine.store;
    let config = engine.config;

    let identifier = SiegfriedIdentifier::new(tool_timeout(&config));

    if batch.status {
        let objects = DigitalObject::count(&conn)?;
        let identified = FormatIdentification::count(&conn)?;
        let with_warnings = FormatIdentification::count_with_warnings(&conn)?;

        println!("Format identification status");
        println!("{}", "=".repeat(40));
        println!("Digital objects:   {objects}");
        println!("Identified:        {identified}");
        println!("With warnings:     {with_warnings}");
        println!("Unidentified:      {}", objects - identified);
        println!(
            "Tool:              {} ({})",
            identifier.name(),
            if identifier.is_available() {
                "available"
            } else {
                "unavailable"
            }
        );
        return Ok(());
    }

    // --all re-runs the tool over every object; otherwise only objects
    // with no current identification are selected
    let reidentify = reidentify || batch.all;
    let ids = match batch.object_id {
        Some(id) => vec![id],
        None if batch.all => DigitalObject::list_ids(&conn, batch.limit)?,
        None => identify::select_unidentified(&conn, batch.limit)?,
    };

    if batch.dry_run {
        if ids.is_empty() {
            println!("No objects selected for identification.");
            return Ok(());
        }
        println!("Objects selected for identification ({}):", ids.len());
        for id in &ids {
            println!("{id:>8}");
        }
        return Ok(());
    }

    info!(count = ids.len(), reidentify, "running identification batch");

    let mut identified = 0i64;
    let mut failed = 0i64;
    for object_id in &ids {
        match identify::identify_object(
            &conn,
            &store,
            &identifier,
            *object_id,
            reidentify,
            &config.agent,
        ) {
            Ok(row) => {
                identified += 1;
                println!(
                    "{:>8}  {} {}  [{}]{}",
                    object_id,
                    row.format_name,
                    row.puid.as_deref().unwrap_or("-"),
                    row.confidence.as_str(),
                    row.warning
                        .as_deref()
                        .map(|w| format!("  warning: {w}"))
                        .unwrap_or_default()
                );
            }
            // The tool will not come back mid-batch
            Err(Error::ToolUnavailable(tool)) => {
                anyhow::bail!("identification tool unavailable: {tool}");
            }
            Err(e) => {
                warn!(object_id, error = %e, "identification failed");
                failed += 1;
            }
        }
    }

    println!("Identification complete: {identified} identified, {failed} failed");
    if failed > 0 {
        anyhow::bail!("{failed} of {} object(s) failed identification", ids.len());
    }
    Ok(())
}
