// src/workflow.rs

//! Workflow kinds and generic dispatch.
//!
//! The scheduler invokes workflows through a fixed table mapping each
//! kind to a handler with a uniform signature. Adding a workflow means
//! adding a variant, a handler, and a table entry; the scheduler itself
//! never changes.

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::identify::Identifier;
use crate::scan::Scanner;
use crate::store::ObjectStore;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde_json::json;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// The workflows the scheduler can dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowKind {
    FixityCheck,
    FormatIdentification,
    VirusScan,
    PackageConversion,
    Replication,
}

impl WorkflowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowKind::FixityCheck => "fixity_check",
            WorkflowKind::FormatIdentification => "format_identification",
            WorkflowKind::VirusScan => "virus_scan",
            WorkflowKind::PackageConversion => "package_conversion",
            WorkflowKind::Replication => "replication",
        }
    }

    /// Human-readable label for CLI output
    pub fn label(&self) -> &'static str {
        match self {
            WorkflowKind::FixityCheck => "Fixity Check",
            WorkflowKind::FormatIdentification => "Format Identification",
            WorkflowKind::VirusScan => "Virus Scan",
            WorkflowKind::PackageConversion => "Package Conversion",
            WorkflowKind::Replication => "Replication",
        }
    }

    pub const ALL: [WorkflowKind; 5] = [
        Self::FixityCheck,
        Self::FormatIdentification,
        Self::VirusScan,
        Self::PackageConversion,
        Self::Replication,
    ];
}

impl fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WorkflowKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "fixity_check" | "fixity" => Ok(WorkflowKind::FixityCheck),
            "format_identification" | "identify" => Ok(WorkflowKind::FormatIdentification),
            "virus_scan" | "scan" => Ok(WorkflowKind::VirusScan),
            "package_conversion" | "convert" => Ok(WorkflowKind::PackageConversion),
            "replication" => Ok(WorkflowKind::Replication),
            _ => Err(format!("Invalid workflow type: {s}")),
        }
    }
}

/// Aggregate outcome of one batch run.
///
/// Counts are per object: a processed object either succeeded or
/// failed. `timed_out` is set when the deadline expired before the
/// selection was exhausted; the counts gathered so far stay intact.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub processed: i64,
    pub succeeded: i64,
    pub failed: i64,
    pub timed_out: bool,
    pub summary: serde_json::Value,
}

impl RunResult {
    pub fn new() -> Self {
        Self {
            processed: 0,
            succeeded: 0,
            failed: 0,
            timed_out: false,
            summary: json!({}),
        }
    }

    pub fn record_success(&mut self) {
        self.processed += 1;
        self.succeeded += 1;
    }

    pub fn record_failure(&mut self) {
        self.processed += 1;
        self.failed += 1;
    }
}

impl Default for RunResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything a workflow handler may need, threaded through dispatch
pub struct WorkflowContext<'a> {
    pub conn: &'a Connection,
    pub store: &'a ObjectStore,
    pub config: &'a EngineConfig,
    pub identifier: &'a dyn Identifier,
    pub scanner: &'a dyn Scanner,
    /// Base directory for package trees built by conversion jobs
    pub packages_dir: PathBuf,
}

/// Uniform handler signature: bounded batch, cooperative deadline
pub type Handler =
    fn(&WorkflowContext<'_>, i64, Option<DateTime<Utc>>) -> Result<RunResult>;

/// Fixed dispatch table. Order matches `WorkflowKind::ALL`.
const HANDLERS: &[(WorkflowKind, Handler)] = &[
    (WorkflowKind::FixityCheck, crate::fixity::run_batch),
    (WorkflowKind::FormatIdentification, crate::identify::run_batch),
    (WorkflowKind::VirusScan, crate::scan::run_batch),
    (WorkflowKind::PackageConversion, crate::package::run_conversion_batch),
    (WorkflowKind::Replication, run_replication),
];

/// Dispatch a workflow by kind
pub fn execute(
    kind: WorkflowKind,
    ctx: &WorkflowContext<'_>,
    batch_limit: i64,
    deadline: Option<DateTime<Utc>>,
) -> Result<RunResult> {
    let handler = HANDLERS
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, h)| *h)
        .ok_or_else(|| Error::Validation(format!("no handler for workflow {kind}")))?;

    handler(ctx, batch_limit, deadline)
}

/// Replication requires target configuration that lives with an
/// external collaborator; without targets the run completes empty.
fn run_replication(
    _ctx: &WorkflowContext<'_>,
    _batch_limit: i64,
    _deadline: Option<DateTime<Utc>>,
) -> Result<RunResult> {
    let mut result = RunResult::new();
    result.summary = json!({ "message": "no replication targets configured" });
    Ok(result)
}

/// True when the deadline has passed
pub fn deadline_exceeded(deadline: Option<DateTime<Utc>>) -> bool {
    deadline.is_some_and(|d| Utc::now() >= d)
}
