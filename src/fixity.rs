// src/fixity.rs

//! Fixity manager: selects which objects are due for verification and
//! drives the checksum service over them in bounded batches.
//!
//! Selection policy: objects never verified, or whose most recent
//! verification is older than the staleness window, oldest first,
//! capped at the batch limit. A single object's failure is recorded
//! and the batch continues; nothing is retried automatically, an
//! object just stays due until the next pass re-selects it.

use crate::checksum;
use crate::config::EngineConfig;
use crate::db::models::{Checksum, DigitalObject, FixityStatus};
use crate::db::{format_ts, now_ts};
use crate::error::{Error, Result};
use crate::store::ObjectStore;
use crate::workflow::{RunResult, WorkflowContext, deadline_exceeded};
use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use serde_json::json;
use tracing::{debug, warn};

/// An object selected for fixity work
#[derive(Debug, Clone)]
pub struct DueObject {
    pub object_id: i64,
    pub last_verified: Option<String>,
}

/// Select objects due for verification, oldest first.
///
/// `cutoff` of `None` ignores the staleness window and selects every
/// object (the `--all` path).
pub fn select_due(conn: &Connection, cutoff: Option<&str>, limit: i64) -> Result<Vec<DueObject>> {
    let sql = match cutoff {
        Some(_) => {
            "SELECT do.id, MAX(c.verified_at) AS last_verified
             FROM digital_objects do
             LEFT JOIN checksums c ON c.object_id = do.id
             GROUP BY do.id
             HAVING last_verified IS NULL OR last_verified < ?1
             ORDER BY (last_verified IS NULL) DESC, last_verified ASC, do.id ASC
             LIMIT ?2"
        }
        None => {
            "SELECT do.id, MAX(c.verified_at) AS last_verified
             FROM digital_objects do
             LEFT JOIN checksums c ON c.object_id = do.id
             GROUP BY do.id
             ORDER BY (last_verified IS NULL) DESC, last_verified ASC, do.id ASC
             LIMIT ?1"
        }
    };

    let mut stmt = conn.prepare(sql)?;
    let map = |row: &rusqlite::Row| {
        Ok(DueObject {
            object_id: row.get(0)?,
            last_verified: row.get(1)?,
        })
    };

    let due = match cutoff {
        Some(c) => stmt
            .query_map(rusqlite::params![c, limit], map)?
            .collect::<std::result::Result<Vec<_>, _>>()?,
        None => stmt
            .query_map([limit], map)?
            .collect::<std::result::Result<Vec<_>, _>>()?,
    };

    Ok(due)
}

/// The staleness cutoff for a configuration, as a stored timestamp
pub fn staleness_cutoff(config: &EngineConfig) -> String {
    staleness_cutoff_at(config, Utc::now())
}

fn staleness_cutoff_at(config: &EngineConfig, now: DateTime<Utc>) -> String {
    format_ts(now - Duration::days(config.staleness_days))
}

/// Outcome of fixity work on one object
#[derive(Debug)]
pub struct ObjectOutcome {
    pub object_id: i64,
    pub all_passed: bool,
    pub checks: usize,
}

/// Run fixity for a single object: verify every stored algorithm,
/// generating the configured defaults first when none exist yet.
pub fn check_object(
    conn: &Connection,
    store: &ObjectStore,
    config: &EngineConfig,
    object_id: i64,
    checked_by: &str,
) -> Result<ObjectOutcome> {
    DigitalObject::find_by_id(conn, object_id)?
        .ok_or_else(|| Error::NotFound(format!("digital object {object_id}")))?;

    let mut stored = Checksum::list_for_object(conn, object_id)?;
    if stored.is_empty() {
        let defaults = config.parsed_default_algorithms()?;
        checksum::generate(conn, store, object_id, &defaults, &config.agent)?;
        stored = Checksum::list_for_object(conn, object_id)?;
    }

    let mut all_passed = true;
    let mut checks = 0;
    for entry in &stored {
        let check = checksum::verify(
            conn,
            store,
            object_id,
            entry.algorithm,
            checked_by,
            &config.agent,
        )?;
        checks += 1;
        if check.status != FixityStatus::Pass {
            all_passed = false;
        }
    }

    Ok(ObjectOutcome {
        object_id,
        all_passed,
        checks,
    })
}

/// Workflow handler: bounded batch with cooperative deadline checks.
pub fn run_batch(
    ctx: &WorkflowContext<'_>,
    batch_limit: i64,
    deadline: Option<DateTime<Utc>>,
) -> Result<RunResult> {
    let cutoff = staleness_cutoff(ctx.config);
    run_selection(
        ctx.conn,
        ctx.store,
        ctx.config,
        Some(&cutoff),
        batch_limit,
        deadline,
        "scheduler",
    )
}

/// Drive fixity over a selection. Shared by the workflow handler and
/// the CLI, which may bypass the staleness filter.
pub fn run_selection(
    conn: &Connection,
    store: &ObjectStore,
    config: &EngineConfig,
    cutoff: Option<&str>,
    limit: i64,
    deadline: Option<DateTime<Utc>>,
    checked_by: &str,
) -> Result<RunResult> {
    let due = select_due(conn, cutoff, limit)?;
    debug!(count = due.len(), "fixity selection");

    let mut result = RunResult::new();
    let mut errors = 0i64;

    for item in &due {
        if deadline_exceeded(deadline) {
            warn!(
                processed = result.processed,
                remaining = due.len() as i64 - result.processed,
                "fixity batch hit its deadline"
            );
            result.timed_out = true;
            break;
        }

        match check_object(conn, store, config, item.object_id, checked_by) {
            Ok(outcome) if outcome.all_passed => result.record_success(),
            Ok(_) => result.record_failure(),
            Err(e) => {
                warn!(object_id = item.object_id, error = %e, "fixity check errored");
                errors += 1;
                result.record_failure();
            }
        }
    }

    result.summary = json!({
        "selected": due.len(),
        "passed": result.succeeded,
        "failed": result.failed - errors,
        "errors": errors,
        "checked_at": now_ts(),
    });
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::hash::HashAlgorithm;

    fn setup() -> (tempfile::TempDir, Connection, ObjectStore, EngineConfig) {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("engine.db");
        db::init(db_path.to_str().unwrap()).unwrap();
        let conn = db::open(db_path.to_str().unwrap()).unwrap();

        let store_root = dir.path().join("uploads");
        std::fs::create_dir_all(&store_root).unwrap();

        let mut config = EngineConfig::default();
        config.storage_root = store_root.clone();

        (dir, conn, ObjectStore::new(store_root), config)
    }

    fn seed_object(conn: &Connection, store: &ObjectStore, name: &str, content: &[u8]) -> i64 {
        std::fs::write(store.root().join(name), content).unwrap();
        let mut object = DigitalObject::new(name.to_string(), "".to_string(), content.len() as i64);
        object.insert(conn).unwrap()
    }

    fn backdate_verification(conn: &Connection, object_id: i64, stamp: &str) {
        conn.execute(
            "UPDATE checksums SET verified_at = ?1 WHERE object_id = ?2",
            rusqlite::params![stamp, object_id],
        )
        .unwrap();
    }

    #[test]
    fn test_never_checked_objects_are_selected_first() {
        let (_dir, conn, store, config) = setup();

        let fresh = seed_object(&conn, &store, "fresh.bin", b"fresh");
        let never = seed_object(&conn, &store, "never.bin", b"never");

        // fresh has a recent verification; never has no checksums at all
        checksum::generate(&conn, &store, fresh, &[HashAlgorithm::Sha256], "test").unwrap();

        let cutoff = staleness_cutoff(&config);
        let due = select_due(&conn, Some(&cutoff), 10).unwrap();

        assert_eq!(due.len(), 1);
        assert_eq!(due[0].object_id, never);
        assert!(due[0].last_verified.is_none());
    }

    #[test]
    fn test_selection_is_oldest_first_and_capped() {
        let (_dir, conn, store, config) = setup();

        let a = seed_object(&conn, &store, "a.bin", b"aaa");
        let b = seed_object(&conn, &store, "b.bin", b"bbb");
        let c = seed_object(&conn, &store, "c.bin", b"ccc");

        for id in [a, b, c] {
            checksum::generate(&conn, &store, id, &[HashAlgorithm::Sha256], "test").unwrap();
        }
        backdate_verification(&conn, a, "2026-01-10 00:00:00");
        backdate_verification(&conn, b, "2026-01-01 00:00:00");
        backdate_verification(&conn, c, "2026-01-05 00:00:00");

        let cutoff = staleness_cutoff(&config);
        let due = select_due(&conn, Some(&cutoff), 2).unwrap();

        // Oldest-first ordering, capped at the limit
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].object_id, b);
        assert_eq!(due[1].object_id, c);
    }

    #[test]
    fn test_check_object_generates_defaults_when_missing() {
        let (_dir, conn, store, config) = setup();
        let id = seed_object(&conn, &store, "new.bin", b"new object");

        let outcome = check_object(&conn, &store, &config, id, "test").unwrap();
        assert!(outcome.all_passed);
        assert_eq!(outcome.checks, 1);

        let stored = Checksum::list_for_object(&conn, id).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].algorithm, HashAlgorithm::Sha256);
    }

    #[test]
    fn test_batch_continues_past_failures() {
        let (_dir, conn, store, config) = setup();

        let good = seed_object(&conn, &store, "good.bin", b"good");
        let bad = seed_object(&conn, &store, "bad.bin", b"bad");
        for id in [good, bad] {
            checksum::generate(&conn, &store, id, &[HashAlgorithm::Sha256], "test").unwrap();
        }
        backdate_verification(&conn, good, "2026-01-02 00:00:00");
        backdate_verification(&conn, bad, "2026-01-01 00:00:00");

        // Corrupt one object
        std::fs::write(store.root().join("bad.bin"), b"tampered").unwrap();

        let cutoff = staleness_cutoff(&config);
        let result =
            run_selection(&conn, &store, &config, Some(&cutoff), 10, None, "test").unwrap();

        assert_eq!(result.processed, 2);
        assert_eq!(result.succeeded, 1);
        assert_eq!(result.failed, 1);
        assert!(!result.timed_out);
    }

    #[test]
    fn test_expired_deadline_stops_batch_with_partial_counts() {
        let (_dir, conn, store, config) = setup();

        for name in ["x.bin", "y.bin"] {
            seed_object(&conn, &store, name, b"data");
        }

        let expired = Utc::now() - Duration::seconds(5);
        let result =
            run_selection(&conn, &store, &config, None, 10, Some(expired), "test").unwrap();

        assert!(result.timed_out);
        assert_eq!(result.processed, 0);
    }
}
