// src/db/schema.rs

//! Database schema definitions and migrations.
//!
//! Defines the SQLite schema for all engine tables and a migration
//! system to evolve it over time.

use crate::error::Result;
use rusqlite::Connection;
use tracing::{debug, info};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the schema version tracking table
fn init_schema_version(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    init_schema_version(conn)?;

    let version = conn
        .query_row(
            "SELECT version FROM schema_version ORDER BY version DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    Ok(version)
}

/// Set the schema version
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

/// Apply all pending migrations to bring the database up to date
pub fn migrate(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;
    debug!("Current schema version: {}", current_version);

    if current_version >= SCHEMA_VERSION {
        debug!("Schema is up to date");
        return Ok(());
    }

    for version in (current_version + 1)..=SCHEMA_VERSION {
        info!("Applying migration to version {}", version);
        apply_migration(conn, version)?;
        set_schema_version(conn, version)?;
    }

    info!("Schema migration complete. Now at version {}", SCHEMA_VERSION);
    Ok(())
}

/// Apply a specific migration version
fn apply_migration(conn: &Connection, version: i32) -> Result<()> {
    match version {
        1 => migrate_v1(conn),
        _ => panic!("Unknown migration version: {}", version),
    }
}

/// Initial schema - Version 1
///
/// Creates all engine tables:
/// - digital_objects: catalog-owned object metadata (read-only here)
/// - checksums / fixity_checks: integrity state and history
/// - formats / format_identifications: risk registry and current IDs
/// - virus_scans: scan outcomes
/// - events: append-only PREMIS event log
/// - packages / package_objects: OAIS package lifecycle
/// - workflow_schedules / workflow_runs: scheduler state
fn migrate_v1(conn: &Connection) -> Result<()> {
    debug!("Creating schema version 1");

    conn.execute_batch(
        "
        -- Digital objects: owned by the catalog, mirrored here so the
        -- engine and its tests run against one self-contained file
        CREATE TABLE digital_objects (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            path TEXT NOT NULL,
            mime_type TEXT,
            byte_size INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        -- Checksums: one row per (object, algorithm), mutated only by
        -- verification
        CREATE TABLE checksums (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            object_id INTEGER NOT NULL REFERENCES digital_objects(id) ON DELETE CASCADE,
            algorithm TEXT NOT NULL CHECK(algorithm IN ('md5', 'sha1', 'sha256', 'sha512')),
            value TEXT NOT NULL,
            file_size INTEGER,
            verification_status TEXT NOT NULL DEFAULT 'pending'
                CHECK(verification_status IN ('pending', 'valid', 'invalid')),
            generated_at TEXT NOT NULL,
            verified_at TEXT,
            UNIQUE(object_id, algorithm)
        );

        CREATE INDEX idx_checksums_object ON checksums(object_id);
        CREATE INDEX idx_checksums_verified_at ON checksums(verified_at);

        -- Fixity checks: append-only history, one row per check
        CREATE TABLE fixity_checks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            object_id INTEGER NOT NULL REFERENCES digital_objects(id) ON DELETE CASCADE,
            algorithm TEXT NOT NULL,
            status TEXT NOT NULL CHECK(status IN ('pass', 'fail', 'error')),
            expected_value TEXT,
            actual_value TEXT,
            error_message TEXT,
            checked_by TEXT NOT NULL,
            duration_ms INTEGER NOT NULL DEFAULT 0,
            checked_at TEXT NOT NULL
        );

        CREATE INDEX idx_fixity_checks_object ON fixity_checks(object_id);
        CREATE INDEX idx_fixity_checks_status ON fixity_checks(status);
        CREATE INDEX idx_fixity_checks_checked_at ON fixity_checks(checked_at);

        -- Format risk registry
        CREATE TABLE formats (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            puid TEXT UNIQUE,
            format_name TEXT NOT NULL,
            format_version TEXT,
            mime_type TEXT,
            risk_level TEXT NOT NULL DEFAULT 'medium'
                CHECK(risk_level IN ('low', 'medium', 'high', 'critical')),
            is_preservation_format INTEGER NOT NULL DEFAULT 0,
            preservation_action TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE INDEX idx_formats_mime ON formats(mime_type);

        -- Current format identification, one row per object; history is
        -- preserved in the event log
        CREATE TABLE format_identifications (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            object_id INTEGER NOT NULL UNIQUE REFERENCES digital_objects(id) ON DELETE CASCADE,
            format_id INTEGER REFERENCES formats(id),
            puid TEXT,
            format_name TEXT NOT NULL,
            format_version TEXT,
            mime_type TEXT,
            confidence TEXT NOT NULL CHECK(confidence IN ('certain', 'high', 'medium', 'low')),
            basis TEXT,
            warning TEXT,
            tool TEXT NOT NULL,
            identification_date TEXT NOT NULL
        );

        -- Virus scan outcomes
        CREATE TABLE virus_scans (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            object_id INTEGER NOT NULL REFERENCES digital_objects(id) ON DELETE CASCADE,
            status TEXT NOT NULL CHECK(status IN ('clean', 'infected', 'error')),
            threat_name TEXT,
            scanner_name TEXT NOT NULL,
            engine_version TEXT,
            scanned_by TEXT NOT NULL,
            duration_ms INTEGER NOT NULL DEFAULT 0,
            error_message TEXT,
            scanned_at TEXT NOT NULL
        );

        CREATE INDEX idx_virus_scans_object ON virus_scans(object_id);
        CREATE INDEX idx_virus_scans_status ON virus_scans(status);

        -- PREMIS event log: append-only, the single source of audit
        -- truth. No foreign keys: audit rows outlive their subjects.
        CREATE TABLE events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            object_id INTEGER,
            package_id INTEGER,
            event_type TEXT NOT NULL,
            event_detail TEXT NOT NULL,
            event_outcome TEXT NOT NULL CHECK(event_outcome IN ('success', 'failure', 'warning')),
            event_outcome_detail TEXT,
            linking_agent_value TEXT NOT NULL,
            event_datetime TEXT NOT NULL
        );

        CREATE INDEX idx_events_object ON events(object_id);
        CREATE INDEX idx_events_package ON events(package_id);
        CREATE INDEX idx_events_type ON events(event_type);
        CREATE INDEX idx_events_datetime ON events(event_datetime);

        -- OAIS packages
        CREATE TABLE packages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            uuid TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            description TEXT,
            package_type TEXT NOT NULL CHECK(package_type IN ('sip', 'aip', 'dip')),
            package_format TEXT NOT NULL DEFAULT 'bagit'
                CHECK(package_format IN ('bagit', 'zip', 'tar')),
            bagit_version TEXT NOT NULL DEFAULT '1.0',
            manifest_algorithm TEXT NOT NULL DEFAULT 'sha256',
            status TEXT NOT NULL DEFAULT 'draft'
                CHECK(status IN ('draft', 'building', 'complete', 'validated', 'exported', 'error')),
            object_count INTEGER NOT NULL DEFAULT 0,
            total_size INTEGER NOT NULL DEFAULT 0,
            package_checksum TEXT,
            source_path TEXT,
            export_path TEXT,
            originator TEXT,
            submission_agreement TEXT,
            retention_period TEXT,
            parent_package_id INTEGER REFERENCES packages(id),
            created_by TEXT,
            created_at TEXT NOT NULL,
            built_at TEXT,
            validated_at TEXT,
            exported_at TEXT
        );

        CREATE INDEX idx_packages_type ON packages(package_type);
        CREATE INDEX idx_packages_status ON packages(status);
        CREATE INDEX idx_packages_parent ON packages(parent_package_id);

        -- Package membership
        CREATE TABLE package_objects (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            package_id INTEGER NOT NULL REFERENCES packages(id) ON DELETE CASCADE,
            object_id INTEGER NOT NULL REFERENCES digital_objects(id),
            relative_path TEXT NOT NULL,
            file_name TEXT NOT NULL,
            file_size INTEGER NOT NULL DEFAULT 0,
            mime_type TEXT,
            puid TEXT,
            checksum_value TEXT,
            sequence INTEGER NOT NULL DEFAULT 0,
            added_at TEXT NOT NULL,
            UNIQUE(package_id, object_id)
        );

        CREATE INDEX idx_package_objects_package ON package_objects(package_id);

        -- Workflow schedules
        CREATE TABLE workflow_schedules (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT,
            workflow_type TEXT NOT NULL CHECK(workflow_type IN
                ('fixity_check', 'format_identification', 'virus_scan',
                 'package_conversion', 'replication')),
            cron_expression TEXT NOT NULL,
            batch_limit INTEGER NOT NULL DEFAULT 100,
            timeout_minutes INTEGER NOT NULL DEFAULT 60,
            is_enabled INTEGER NOT NULL DEFAULT 1,
            notify_on_failure INTEGER NOT NULL DEFAULT 1,
            notify_email TEXT,
            last_run_at TEXT,
            last_run_status TEXT,
            last_run_processed INTEGER,
            next_run_at TEXT,
            total_runs INTEGER NOT NULL DEFAULT 0,
            total_processed INTEGER NOT NULL DEFAULT 0,
            created_by TEXT,
            created_at TEXT NOT NULL
        );

        CREATE INDEX idx_workflow_schedules_next_run ON workflow_schedules(next_run_at);

        -- Workflow run history
        CREATE TABLE workflow_runs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            schedule_id INTEGER NOT NULL REFERENCES workflow_schedules(id) ON DELETE CASCADE,
            workflow_type TEXT NOT NULL,
            started_at TEXT NOT NULL,
            completed_at TEXT,
            duration_ms INTEGER,
            status TEXT NOT NULL CHECK(status IN
                ('running', 'completed', 'partial', 'failed', 'timeout', 'cancelled')),
            objects_processed INTEGER NOT NULL DEFAULT 0,
            objects_succeeded INTEGER NOT NULL DEFAULT 0,
            objects_failed INTEGER NOT NULL DEFAULT 0,
            triggered_by TEXT NOT NULL CHECK(triggered_by IN ('cron', 'manual')),
            triggered_by_user TEXT,
            error_message TEXT,
            summary TEXT
        );

        CREATE INDEX idx_workflow_runs_schedule ON workflow_runs(schedule_id);
        CREATE INDEX idx_workflow_runs_started_at ON workflow_runs(started_at);

        -- The authoritative non-overlap marker: at most one running row
        -- per schedule, enforced by the database so the check-and-insert
        -- is race-safe across processes
        CREATE UNIQUE INDEX idx_workflow_runs_active
            ON workflow_runs(schedule_id) WHERE status = 'running';
        ",
    )?;

    debug!("Schema version 1 created");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_test_db() -> (NamedTempFile, Connection) {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = Connection::open(temp_file.path()).unwrap();
        (temp_file, conn)
    }

    #[test]
    fn test_schema_version_tracking() {
        let (_temp, conn) = create_test_db();

        let version = get_schema_version(&conn).unwrap();
        assert_eq!(version, 0);

        set_schema_version(&conn, 1).unwrap();
        let version = get_schema_version(&conn).unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn test_migrate_creates_all_tables() {
        let (_temp, conn) = create_test_db();

        migrate(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        for table in [
            "digital_objects",
            "checksums",
            "fixity_checks",
            "formats",
            "format_identifications",
            "virus_scans",
            "events",
            "packages",
            "package_objects",
            "workflow_schedules",
            "workflow_runs",
        ] {
            assert!(tables.contains(&table.to_string()), "missing table {table}");
        }
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let (_temp, conn) = create_test_db();

        migrate(&conn).unwrap();
        let version1 = get_schema_version(&conn).unwrap();

        migrate(&conn).unwrap();
        let version2 = get_schema_version(&conn).unwrap();

        assert_eq!(version1, version2);
        assert_eq!(version1, SCHEMA_VERSION);
    }

    #[test]
    fn test_checksum_unique_per_object_algorithm() {
        let (_temp, conn) = create_test_db();
        migrate(&conn).unwrap();

        conn.execute(
            "INSERT INTO digital_objects (name, path, byte_size) VALUES ('f.tif', 'uploads', 10)",
            [],
        )
        .unwrap();

        conn.execute(
            "INSERT INTO checksums (object_id, algorithm, value, generated_at)
             VALUES (1, 'sha256', 'aa', '2026-01-01 00:00:00')",
            [],
        )
        .unwrap();

        let result = conn.execute(
            "INSERT INTO checksums (object_id, algorithm, value, generated_at)
             VALUES (1, 'sha256', 'bb', '2026-01-01 00:00:00')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_one_running_run_per_schedule() {
        let (_temp, conn) = create_test_db();
        migrate(&conn).unwrap();

        conn.execute(
            "INSERT INTO workflow_schedules (name, workflow_type, cron_expression, created_at)
             VALUES ('nightly fixity', 'fixity_check', '0 2 * * *', '2026-01-01 00:00:00')",
            [],
        )
        .unwrap();

        conn.execute(
            "INSERT INTO workflow_runs (schedule_id, workflow_type, started_at, status, triggered_by)
             VALUES (1, 'fixity_check', '2026-01-01 02:00:00', 'running', 'cron')",
            [],
        )
        .unwrap();

        // Second running row for the same schedule must be rejected
        let result = conn.execute(
            "INSERT INTO workflow_runs (schedule_id, workflow_type, started_at, status, triggered_by)
             VALUES (1, 'fixity_check', '2026-01-01 02:00:01', 'running', 'manual')",
            [],
        );
        assert!(result.is_err());

        // A completed row is fine
        conn.execute(
            "INSERT INTO workflow_runs (schedule_id, workflow_type, started_at, status, triggered_by)
             VALUES (1, 'fixity_check', '2026-01-01 01:00:00', 'completed', 'cron')",
            [],
        )
        .unwrap();
    }

    #[test]
    fn test_status_check_constraints() {
        let (_temp, conn) = create_test_db();
        migrate(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO packages (uuid, name, package_type, created_at, status)
             VALUES ('u1', 'p1', 'sip', '2026-01-01 00:00:00', 'bogus')",
            [],
        );
        assert!(result.is_err());

        let result = conn.execute(
            "INSERT INTO packages (uuid, name, package_type, created_at)
             VALUES ('u1', 'p1', 'zip_bomb', '2026-01-01 00:00:00')",
            [],
        );
        assert!(result.is_err());
    }
}
