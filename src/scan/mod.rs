// src/scan/mod.rs

//! Virus scanning.
//!
//! The external scanner sits behind the [`Scanner`] capability trait.
//! `clean` and `infected` are both terminal successful outcomes: an
//! infection is valid, important data and emits a success-outcome event
//! carrying the threat name. Only an engine crash or missing scanner is
//! a failure. The adapter never deletes or quarantines files;
//! remediation belongs to a human operator.

pub mod mock;
mod clamav;

pub use clamav::ClamAvScanner;

use crate::db::models::{
    DigitalObject, EventOutcome, EventType, PreservationEvent, ScanStatus, VirusScan,
};
use crate::db::now_ts;
use crate::error::{Error, Result};
use crate::store::ObjectStore;
use crate::workflow::{RunResult, WorkflowContext, deadline_exceeded};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde_json::json;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

/// Raw outcome of one scanner invocation
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub status: ScanStatus,
    pub threat_name: Option<String>,
    pub engine_version: Option<String>,
    pub error_message: Option<String>,
}

/// Capability interface over an external antivirus engine
pub trait Scanner {
    fn name(&self) -> &str;

    /// Probe whether the engine can actually be invoked
    fn is_available(&self) -> bool;

    /// Scan one file. Engine-level problems are reported in the
    /// outcome's `error` status, not as an `Err`; `Err` is reserved for
    /// failures to invoke the engine at all.
    fn scan(&self, path: &Path) -> Result<ScanOutcome>;
}

/// Scan one object and record the result and its event.
pub fn scan_object(
    conn: &Connection,
    store: &ObjectStore,
    scanner: &dyn Scanner,
    object_id: i64,
    scanned_by: &str,
    agent: &str,
) -> Result<VirusScan> {
    let object = DigitalObject::find_by_id(conn, object_id)?
        .ok_or_else(|| Error::NotFound(format!("digital object {object_id}")))?;

    if !scanner.is_available() {
        PreservationEvent::object(
            object_id,
            EventType::VirusScan,
            format!("Virus scan failed: {} unavailable", scanner.name()),
            EventOutcome::Failure,
            agent,
        )
        .insert(conn)?;
        return Err(Error::ToolUnavailable(scanner.name().to_string()));
    }

    let started = Instant::now();

    let outcome = match store.existing_path_for(&object) {
        Ok(path) => match scanner.scan(&path) {
            Ok(outcome) => outcome,
            Err(e) => ScanOutcome {
                status: ScanStatus::Error,
                threat_name: None,
                engine_version: None,
                error_message: Some(e.to_string()),
            },
        },
        Err(e) => ScanOutcome {
            status: ScanStatus::Error,
            threat_name: None,
            engine_version: None,
            error_message: Some(e.to_string()),
        },
    };

    let duration_ms = started.elapsed().as_millis() as i64;

    let mut scan = VirusScan {
        id: None,
        object_id,
        status: outcome.status,
        threat_name: outcome.threat_name.clone(),
        scanner_name: scanner.name().to_string(),
        engine_version: outcome.engine_version.clone(),
        scanned_by: scanned_by.to_string(),
        duration_ms,
        error_message: outcome.error_message.clone(),
        scanned_at: now_ts(),
    };
    scan.insert(conn)?;

    match outcome.status {
        ScanStatus::Clean => {
            PreservationEvent::object(
                object_id,
                EventType::VirusScan,
                "Virus scan completed: clean",
                EventOutcome::Success,
                agent,
            )
            .insert(conn)?;
        }
        ScanStatus::Infected => {
            let threat = outcome.threat_name.as_deref().unwrap_or("unknown threat");
            warn!(object_id, threat, "virus scan found an infection");
            // The scan itself succeeded; the infection is the finding
            PreservationEvent::object(
                object_id,
                EventType::VirusScan,
                format!("Virus scan completed: infected ({threat})"),
                EventOutcome::Success,
                agent,
            )
            .with_outcome_detail(format!("threat: {threat}"))
            .insert(conn)?;
        }
        ScanStatus::Error => {
            PreservationEvent::object(
                object_id,
                EventType::VirusScan,
                "Virus scan error",
                EventOutcome::Failure,
                agent,
            )
            .with_outcome_detail(outcome.error_message.clone().unwrap_or_default())
            .insert(conn)?;
        }
    }

    info!(object_id, status = scan.status.as_str(), "virus scan recorded");
    Ok(scan)
}

/// Objects never scanned, in id order
pub fn select_unscanned(conn: &Connection, limit: i64) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT do.id FROM digital_objects do
         LEFT JOIN virus_scans vs ON vs.object_id = do.id
         WHERE vs.id IS NULL
         ORDER BY do.id
         LIMIT ?1",
    )?;

    let ids = stmt
        .query_map([limit], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ids)
}

/// Workflow handler: scan never-scanned objects in a bounded batch.
///
/// An infected result counts as a successfully processed object; only
/// engine errors count as failures.
pub fn run_batch(
    ctx: &WorkflowContext<'_>,
    batch_limit: i64,
    deadline: Option<DateTime<Utc>>,
) -> Result<RunResult> {
    let ids = select_unscanned(ctx.conn, batch_limit)?;
    let mut result = RunResult::new();
    let mut clean = 0i64;
    let mut infected = 0i64;
    let mut threats: Vec<String> = Vec::new();

    for object_id in &ids {
        if deadline_exceeded(deadline) {
            warn!(processed = result.processed, "scan batch hit its deadline");
            result.timed_out = true;
            break;
        }

        match scan_object(
            ctx.conn,
            ctx.store,
            ctx.scanner,
            *object_id,
            "scheduler",
            &ctx.config.agent,
        ) {
            Ok(scan) => match scan.status {
                ScanStatus::Clean => {
                    clean += 1;
                    result.record_success();
                }
                ScanStatus::Infected => {
                    infected += 1;
                    if let Some(threat) = scan.threat_name {
                        threats.push(format!("{object_id}: {threat}"));
                    }
                    result.record_success();
                }
                ScanStatus::Error => result.record_failure(),
            },
            Err(e) => {
                warn!(object_id, error = %e, "virus scan failed");
                result.record_failure();
            }
        }
    }

    result.summary = json!({
        "selected": ids.len(),
        "clean": clean,
        "infected": infected,
        "errors": result.failed,
        "threats": threats,
    });
    Ok(result)
}
