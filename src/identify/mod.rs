// src/identify/mod.rs

//! Format identification.
//!
//! An external signature matcher is wrapped behind the [`Identifier`]
//! capability trait with an explicit availability probe, so everything
//! above the subprocess boundary is testable with fakes. Raw tool
//! matches are normalized against the format risk registry and stored
//! as one current identification per object; re-identification
//! overwrites the row and the event log keeps the history.
//!
//! Ambiguity is a data-quality signal, not a failure: low confidence
//! or competing matches still produce a completed identification with
//! a warning and a success-outcome event.

pub mod mock;
pub mod registry;
mod siegfried;

pub use siegfried::SiegfriedIdentifier;

use crate::db::models::{
    Confidence, DigitalObject, EventOutcome, EventType, FormatIdentification, PreservationEvent,
};
use crate::db::now_ts;
use crate::error::{Error, Result};
use crate::store::ObjectStore;
use crate::workflow::{RunResult, WorkflowContext, deadline_exceeded};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde_json::json;
use std::path::Path;
use tracing::{debug, info, warn};

/// One candidate match from the signature tool
#[derive(Debug, Clone)]
pub struct ToolMatch {
    pub puid: Option<String>,
    pub format_name: String,
    pub format_version: Option<String>,
    pub mime_type: Option<String>,
    pub basis: Option<String>,
    pub warning: Option<String>,
}

/// Raw identification result from a tool invocation
#[derive(Debug, Clone)]
pub struct ToolIdentification {
    /// Tool name with version, e.g. "siegfried 1.11.0"
    pub tool: String,
    pub matches: Vec<ToolMatch>,
}

/// Capability interface over an external signature-identification tool
pub trait Identifier {
    fn name(&self) -> &str;

    /// Probe whether the tool can actually be invoked
    fn is_available(&self) -> bool;

    fn identify(&self, path: &Path) -> Result<ToolIdentification>;
}

/// Map a match basis and warning onto a confidence level.
///
/// Container matches are definitive; byte/signature matches are strong;
/// anything extension-driven is weak. Competing matches cap the result
/// at medium.
pub fn determine_confidence(
    basis: Option<&str>,
    warning: Option<&str>,
    competing: bool,
) -> Confidence {
    if let Some(w) = warning
        && w.to_lowercase().contains("extension mismatch")
    {
        return Confidence::Low;
    }

    let confidence = match basis {
        None => Confidence::Medium,
        Some(b) => {
            let b = b.to_lowercase();
            if b.contains("container") {
                Confidence::Certain
            } else if b.contains("byte match") || b.contains("signature") {
                Confidence::High
            } else if b.contains("extension") {
                Confidence::Low
            } else {
                Confidence::Medium
            }
        }
    };

    if competing && matches!(confidence, Confidence::Certain | Confidence::High) {
        Confidence::Medium
    } else {
        confidence
    }
}

/// Identify one object and store the result.
///
/// With `reidentify` false an existing identification is returned
/// untouched; with it true the tool runs again and overwrites the row.
/// Re-identification over unchanged bytes is idempotent.
pub fn identify_object(
    conn: &Connection,
    store: &ObjectStore,
    identifier: &dyn Identifier,
    object_id: i64,
    reidentify: bool,
    agent: &str,
) -> Result<FormatIdentification> {
    if !reidentify
        && let Some(existing) = FormatIdentification::find_by_object(conn, object_id)?
    {
        debug!(object_id, "identification exists, skipping");
        return Ok(existing);
    }

    let object = DigitalObject::find_by_id(conn, object_id)?
        .ok_or_else(|| Error::NotFound(format!("digital object {object_id}")))?;

    if !identifier.is_available() {
        PreservationEvent::object(
            object_id,
            EventType::FormatIdentification,
            format!("Identification failed: {} unavailable", identifier.name()),
            EventOutcome::Failure,
            agent,
        )
        .insert(conn)?;
        return Err(Error::ToolUnavailable(identifier.name().to_string()));
    }

    let path = match store.existing_path_for(&object) {
        Ok(p) => p,
        Err(e) => {
            PreservationEvent::object(
                object_id,
                EventType::FormatIdentification,
                "Identification failed: object file missing",
                EventOutcome::Failure,
                agent,
            )
            .with_outcome_detail(e.to_string())
            .insert(conn)?;
            return Err(e);
        }
    };

    let identification = match identifier.identify(&path) {
        Ok(i) => i,
        Err(e) => {
            PreservationEvent::object(
                object_id,
                EventType::FormatIdentification,
                format!("Identification failed: {} error", identifier.name()),
                EventOutcome::Failure,
                agent,
            )
            .with_outcome_detail(e.to_string())
            .insert(conn)?;
            return Err(e);
        }
    };

    if identification.matches.is_empty() {
        PreservationEvent::object(
            object_id,
            EventType::FormatIdentification,
            "Identification failed: no format matches",
            EventOutcome::Failure,
            agent,
        )
        .insert(conn)?;
        return Err(Error::NotFound(format!(
            "no format matches for object {object_id}"
        )));
    }

    let competing = identification.matches.len() > 1;
    let best = &identification.matches[0];

    let confidence = determine_confidence(best.basis.as_deref(), best.warning.as_deref(), competing);
    let warning = if competing {
        // Ambiguity must be visible even when the tool itself is silent
        Some(best.warning.clone().unwrap_or_else(|| {
            format!("{} competing format matches", identification.matches.len())
        }))
    } else {
        best.warning.clone()
    };

    let mime_type = best.mime_type.clone().or(object.mime_type.clone());
    let format_id = registry::find_or_create(
        conn,
        best.puid.as_deref(),
        mime_type.as_deref(),
        &best.format_name,
        best.format_version.as_deref(),
    )?;

    let mut row = FormatIdentification {
        id: None,
        object_id,
        format_id,
        puid: best.puid.clone(),
        format_name: best.format_name.clone(),
        format_version: best.format_version.clone(),
        mime_type,
        confidence,
        basis: best.basis.clone(),
        warning,
        tool: identification.tool.clone(),
        identification_date: now_ts(),
    };
    row.upsert(conn)?;

    PreservationEvent::object(
        object_id,
        EventType::FormatIdentification,
        format!(
            "Format identified as {}{}",
            row.format_name,
            row.puid.as_deref().map(|p| format!(" ({p})")).unwrap_or_default()
        ),
        EventOutcome::Success,
        agent,
    )
    .with_outcome_detail(
        json!({
            "tool": row.tool,
            "puid": row.puid,
            "mime_type": row.mime_type,
            "confidence": row.confidence.as_str(),
            "basis": row.basis,
            "warning": row.warning,
        })
        .to_string(),
    )
    .insert(conn)?;

    info!(
        object_id,
        format = %row.format_name,
        confidence = row.confidence.as_str(),
        "format identified"
    );
    Ok(row)
}

/// Objects with no current identification, in id order
pub fn select_unidentified(conn: &Connection, limit: i64) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT do.id FROM digital_objects do
         LEFT JOIN format_identifications fi ON fi.object_id = do.id
         WHERE fi.id IS NULL
         ORDER BY do.id
         LIMIT ?1",
    )?;

    let ids = stmt
        .query_map([limit], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ids)
}

/// Workflow handler: identify unidentified objects in a bounded batch.
pub fn run_batch(
    ctx: &WorkflowContext<'_>,
    batch_limit: i64,
    deadline: Option<DateTime<Utc>>,
) -> Result<RunResult> {
    let ids = select_unidentified(ctx.conn, batch_limit)?;
    let mut result = RunResult::new();
    let mut with_warnings = 0i64;

    for object_id in &ids {
        if deadline_exceeded(deadline) {
            warn!(processed = result.processed, "identification batch hit its deadline");
            result.timed_out = true;
            break;
        }

        match identify_object(
            ctx.conn,
            ctx.store,
            ctx.identifier,
            *object_id,
            false,
            &ctx.config.agent,
        ) {
            Ok(row) => {
                if row.warning.is_some() {
                    with_warnings += 1;
                }
                result.record_success();
            }
            Err(e) => {
                warn!(object_id, error = %e, "identification failed");
                result.record_failure();
            }
        }
    }

    result.summary = json!({
        "selected": ids.len(),
        "identified": result.succeeded,
        "failed": result.failed,
        "with_warnings": with_warnings,
    });
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use mock::MockIdentifier;

    fn setup() -> (tempfile::TempDir, Connection, ObjectStore, i64) {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("engine.db");
        db::init(db_path.to_str().unwrap()).unwrap();
        let conn = db::open(db_path.to_str().unwrap()).unwrap();

        let store_root = dir.path().join("uploads");
        std::fs::create_dir_all(&store_root).unwrap();
        std::fs::write(store_root.join("image.jpg"), b"\xff\xd8\xff\xe0 not a real jpeg").unwrap();

        let mut object = DigitalObject::new("image.jpg".to_string(), "".to_string(), 20);
        let object_id = object.insert(&conn).unwrap();

        (dir, conn, ObjectStore::new(store_root), object_id)
    }

    #[test]
    fn test_confidence_mapping() {
        assert_eq!(
            determine_confidence(Some("container name match"), None, false),
            Confidence::Certain
        );
        assert_eq!(
            determine_confidence(Some("byte match at 0, 14"), None, false),
            Confidence::High
        );
        assert_eq!(
            determine_confidence(Some("extension match jpg"), None, false),
            Confidence::Low
        );
        assert_eq!(determine_confidence(None, None, false), Confidence::Medium);
        assert_eq!(
            determine_confidence(Some("byte match"), Some("extension mismatch"), false),
            Confidence::Low
        );
        // Competing matches cap at medium
        assert_eq!(
            determine_confidence(Some("byte match"), None, true),
            Confidence::Medium
        );
    }

    #[test]
    fn test_identify_stores_row_and_success_event() {
        let (_dir, conn, store, object_id) = setup();
        let identifier = MockIdentifier::single("fmt/43", "JPEG File Interchange Format", "image/jpeg");

        let row = identify_object(&conn, &store, &identifier, object_id, false, "test").unwrap();
        assert_eq!(row.puid.as_deref(), Some("fmt/43"));
        assert_eq!(row.confidence, Confidence::High);
        assert!(row.warning.is_none());

        // Registry entry created
        assert!(row.format_id.is_some());

        let events = PreservationEvent::list_for_object(&conn, object_id, 10).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_outcome, EventOutcome::Success);
    }

    #[test]
    fn test_ambiguous_match_is_completed_with_warning() {
        let (_dir, conn, store, object_id) = setup();
        let identifier = MockIdentifier::ambiguous();

        let row = identify_object(&conn, &store, &identifier, object_id, false, "test").unwrap();
        assert_eq!(row.confidence, Confidence::Medium);
        assert!(row.warning.as_deref().is_some_and(|w| !w.is_empty()));

        // Ambiguity is not a failure: the event outcome is success
        let events = PreservationEvent::list_for_object(&conn, object_id, 10).unwrap();
        assert_eq!(events[0].event_outcome, EventOutcome::Success);
    }

    #[test]
    fn test_unavailable_tool_fails_fast_without_row() {
        let (_dir, conn, store, object_id) = setup();
        let identifier = MockIdentifier::unavailable();

        let result = identify_object(&conn, &store, &identifier, object_id, false, "test");
        assert!(matches!(result, Err(Error::ToolUnavailable(_))));

        // No identification row, but the unavailability is on record
        assert!(FormatIdentification::find_by_object(&conn, object_id)
            .unwrap()
            .is_none());
        let events = PreservationEvent::list_for_object(&conn, object_id, 10).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_outcome, EventOutcome::Failure);
    }

    #[test]
    fn test_reidentify_is_idempotent_and_overwrites() {
        let (_dir, conn, store, object_id) = setup();
        let identifier = MockIdentifier::single("fmt/43", "JPEG File Interchange Format", "image/jpeg");

        let first = identify_object(&conn, &store, &identifier, object_id, false, "test").unwrap();
        let second = identify_object(&conn, &store, &identifier, object_id, true, "test").unwrap();

        // Same PUID and confidence on unchanged bytes, same single row
        assert_eq!(first.puid, second.puid);
        assert_eq!(first.confidence, second.confidence);
        assert_eq!(first.id, second.id);

        // Both runs are in the audit log
        let events = PreservationEvent::list_for_object(&conn, object_id, 10).unwrap();
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_existing_row_short_circuits_without_reidentify() {
        let (_dir, conn, store, object_id) = setup();
        let identifier = MockIdentifier::single("fmt/43", "JPEG File Interchange Format", "image/jpeg");

        identify_object(&conn, &store, &identifier, object_id, false, "test").unwrap();
        identify_object(&conn, &store, &identifier, object_id, false, "test").unwrap();

        // Second call did not re-run the tool: still one event
        let events = PreservationEvent::list_for_object(&conn, object_id, 10).unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_batch_selects_only_unidentified() {
        let (_dir, conn, store, object_id) = setup();
        let identifier = MockIdentifier::single("fmt/43", "JPEG File Interchange Format", "image/jpeg");

        identify_object(&conn, &store, &identifier, object_id, false, "test").unwrap();

        let remaining = select_unidentified(&conn, 10).unwrap();
        assert!(remaining.is_empty());
    }
}
