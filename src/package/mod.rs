// src/package/mod.rs

//! OAIS package management.
//!
//! Packages move through a forward-only lifecycle:
//! draft -> building -> complete -> validated -> exported, with error
//! as the failure terminal. Draft packages are mutable (rename,
//! add/remove objects, delete); everything after `draft` is frozen
//! except for the lifecycle operations themselves. Derivation runs
//! SIP -> AIP -> DIP via parent pointers, enforced at creation.

pub mod builder;
pub mod convert;
pub mod export;
pub mod validate;

pub use builder::{BuildReport, build};
pub use convert::convert;
pub use export::{ExportFormat, ExportReport, export};
pub use validate::{ValidationReport, validate};

use crate::db::models::{
    Checksum, DigitalObject, EventOutcome, EventType, FormatIdentification, Package,
    PackageObject, PackageStatus, PackageType, PreservationEvent,
};
use crate::error::{Error, Result};
use crate::hash::HashAlgorithm;
use crate::store::ObjectStore;
use crate::workflow::{RunResult, WorkflowContext, deadline_exceeded};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde_json::json;
use tracing::{info, warn};

/// Fields accepted when creating a package
#[derive(Debug, Clone, Default)]
pub struct NewPackage {
    pub name: String,
    pub description: Option<String>,
    pub package_type: Option<PackageType>,
    pub manifest_algorithm: Option<String>,
    pub originator: Option<String>,
    pub submission_agreement: Option<String>,
    pub retention_period: Option<String>,
    pub parent_package_id: Option<i64>,
    pub created_by: Option<String>,
}

/// Create a new draft package.
///
/// A parent, when given, must precede the new package's type in the
/// SIP -> AIP -> DIP derivation order.
pub fn create(conn: &Connection, new: NewPackage, agent: &str) -> Result<Package> {
    if new.name.trim().is_empty() {
        return Err(Error::Validation("package name is required".to_string()));
    }

    let package_type = new.package_type.unwrap_or(PackageType::Sip);

    if let Some(algo) = &new.manifest_algorithm {
        algo.parse::<HashAlgorithm>()?;
    }

    if let Some(parent_id) = new.parent_package_id {
        let parent = Package::find_by_id(conn, parent_id)?
            .ok_or_else(|| Error::NotFound(format!("parent package {parent_id}")))?;
        if parent.package_type.derivation_rank() >= package_type.derivation_rank() {
            return Err(Error::Validation(format!(
                "a {} cannot derive from a {}",
                package_type, parent.package_type
            )));
        }
    }

    let mut package = Package::new(new.name, package_type);
    package.description = new.description;
    if let Some(algo) = new.manifest_algorithm {
        package.manifest_algorithm = algo.to_lowercase();
    }
    package.originator = new.originator;
    package.submission_agreement = new.submission_agreement;
    package.retention_period = new.retention_period;
    package.parent_package_id = new.parent_package_id;
    package.created_by = new.created_by;

    let id = package.insert(conn)?;

    PreservationEvent::package(
        id,
        EventType::PackageCreate,
        format!("{} package created", package.package_type.as_str().to_uppercase()),
        EventOutcome::Success,
        agent,
    )
    .insert(conn)?;

    info!(package_id = id, uuid = %package.uuid, "package created");
    Ok(package)
}

/// Add a digital object to a draft package.
///
/// Metadata (size, mime type, PUID, checksum) is snapshotted from what
/// the engine already knows. Adding an object twice is a no-op that
/// returns the existing membership row.
pub fn add_object(
    conn: &Connection,
    store: &ObjectStore,
    package_id: i64,
    object_id: i64,
    relative_path: Option<String>,
) -> Result<PackageObject> {
    let mut package = Package::find_by_id(conn, package_id)?
        .ok_or_else(|| Error::NotFound(format!("package {package_id}")))?;

    if package.status != PackageStatus::Draft {
        return Err(Error::Validation(format!(
            "can only add objects to draft packages (package is {})",
            package.status
        )));
    }

    let object = DigitalObject::find_by_id(conn, object_id)?
        .ok_or_else(|| Error::NotFound(format!("digital object {object_id}")))?;

    if let Some(existing) = PackageObject::find(conn, package_id, object_id)? {
        return Ok(existing);
    }

    let file_name = object.name.clone();
    let relative_path = relative_path.unwrap_or_else(|| format!("data/{file_name}"));

    // Prefer the actual on-disk size; fall back to catalog metadata
    let file_size = store
        .path_for(&object)
        .metadata()
        .map(|m| m.len() as i64)
        .unwrap_or(object.byte_size);

    let algorithm = package.manifest_algorithm.parse::<HashAlgorithm>()?;
    let checksum_value = Checksum::find(conn, object_id, algorithm)?.map(|c| c.value);
    let puid = FormatIdentification::find_by_object(conn, object_id)?.and_then(|fi| fi.puid);

    let mut member = PackageObject::new(package_id, object_id, relative_path, file_name);
    member.file_size = file_size;
    member.mime_type = object.mime_type;
    member.puid = puid;
    member.checksum_value = checksum_value;
    member.sequence = PackageObject::next_sequence(conn, package_id)?;
    member.insert(conn)?;

    package.refresh_counts(conn)?;
    Ok(member)
}

/// Remove an object from a draft package
pub fn remove_object(conn: &Connection, package_id: i64, object_id: i64) -> Result<()> {
    let mut package = Package::find_by_id(conn, package_id)?
        .ok_or_else(|| Error::NotFound(format!("package {package_id}")))?;

    if package.status != PackageStatus::Draft {
        return Err(Error::Validation(format!(
            "can only remove objects from draft packages (package is {})",
            package.status
        )));
    }

    if !PackageObject::remove(conn, package_id, object_id)? {
        return Err(Error::NotFound(format!(
            "object {object_id} is not in package {package_id}"
        )));
    }

    package.refresh_counts(conn)?;
    Ok(())
}

/// Delete a package. Permitted only while the package is a draft.
pub fn delete(conn: &Connection, package_id: i64) -> Result<()> {
    let package = Package::find_by_id(conn, package_id)?
        .ok_or_else(|| Error::NotFound(format!("package {package_id}")))?;

    if package.status != PackageStatus::Draft {
        return Err(Error::Validation(format!(
            "only draft packages may be deleted (package is {})",
            package.status
        )));
    }

    package.delete(conn)?;
    info!(package_id, uuid = %package.uuid, "package deleted");
    Ok(())
}

/// SIPs eligible for automatic conversion: validated or exported, with
/// no derived package yet.
pub fn select_convertible_sips(conn: &Connection, limit: i64) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT p.id FROM packages p
         WHERE p.package_type = 'sip'
           AND p.status IN ('validated', 'exported')
           AND NOT EXISTS (SELECT 1 FROM packages c WHERE c.parent_package_id = p.id)
         ORDER BY p.id
         LIMIT ?1",
    )?;

    let ids = stmt
        .query_map([limit], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ids)
}

/// Workflow handler: derive AIPs from eligible SIPs in a bounded batch.
pub fn run_conversion_batch(
    ctx: &WorkflowContext<'_>,
    batch_limit: i64,
    deadline: Option<DateTime<Utc>>,
) -> Result<RunResult> {
    let ids = select_convertible_sips(ctx.conn, batch_limit)?;
    let mut result = RunResult::new();
    let mut converted: Vec<String> = Vec::new();

    for package_id in &ids {
        if deadline_exceeded(deadline) {
            warn!(processed = result.processed, "conversion batch hit its deadline");
            result.timed_out = true;
            break;
        }

        match convert(ctx.conn, *package_id, PackageType::Aip, None, &ctx.config.agent) {
            Ok(aip) => {
                converted.push(aip.uuid);
                result.record_success();
            }
            Err(e) => {
                warn!(package_id, error = %e, "conversion failed");
                result.record_failure();
            }
        }
    }

    result.summary = json!({
        "selected": ids.len(),
        "converted": converted,
        "failed": result.failed,
    });
    Ok(result)
}

/// Human-readable byte size for bag-info and CLI output
pub(crate) fn format_bytes(bytes: i64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.2} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    pub(crate) fn setup() -> (tempfile::TempDir, Connection, ObjectStore) {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("engine.db");
        db::init(db_path.to_str().unwrap()).unwrap();
        let conn = db::open(db_path.to_str().unwrap()).unwrap();

        let store_root = dir.path().join("uploads");
        std::fs::create_dir_all(&store_root).unwrap();

        (dir, conn, ObjectStore::new(store_root))
    }

    pub(crate) fn seed_object(
        conn: &Connection,
        store: &ObjectStore,
        name: &str,
        content: &[u8],
    ) -> i64 {
        std::fs::write(store.root().join(name), content).unwrap();
        let mut object = DigitalObject::new(name.to_string(), "".to_string(), content.len() as i64);
        object.insert(conn).unwrap()
    }

    fn draft(conn: &Connection) -> Package {
        create(
            conn,
            NewPackage {
                name: "Accession 2026-001 SIP".to_string(),
                ..Default::default()
            },
            "test",
        )
        .unwrap()
    }

    #[test]
    fn test_create_defaults() {
        let (_dir, conn, _store) = setup();
        let package = draft(&conn);

        assert_eq!(package.package_type, PackageType::Sip);
        assert_eq!(package.status, PackageStatus::Draft);
        assert_eq!(package.manifest_algorithm, "sha256");
        assert_eq!(package.object_count, 0);

        let events = PreservationEvent::list_for_package(&conn, package.id.unwrap(), 10).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::PackageCreate);
    }

    #[test]
    fn test_parent_type_ordering_enforced() {
        let (_dir, conn, _store) = setup();
        let sip = draft(&conn);

        // aip under sip: fine
        let aip = create(
            &conn,
            NewPackage {
                name: "AIP".to_string(),
                package_type: Some(PackageType::Aip),
                parent_package_id: sip.id,
                ..Default::default()
            },
            "test",
        )
        .unwrap();

        // sip under aip: forward-only ordering violated
        let result = create(
            &conn,
            NewPackage {
                name: "Backwards".to_string(),
                package_type: Some(PackageType::Sip),
                parent_package_id: aip.id,
                ..Default::default()
            },
            "test",
        );
        assert!(matches!(result, Err(Error::Validation(_))));

        // dip under sip: skipping a rank is allowed, ordering holds
        assert!(create(
            &conn,
            NewPackage {
                name: "DIP".to_string(),
                package_type: Some(PackageType::Dip),
                parent_package_id: sip.id,
                ..Default::default()
            },
            "test",
        )
        .is_ok());
    }

    #[test]
    fn test_add_object_snapshots_metadata_and_counts() {
        let (_dir, conn, store) = setup();
        let package = draft(&conn);
        let package_id = package.id.unwrap();
        let object_id = seed_object(&conn, &store, "letter.pdf", b"%PDF-1.4 content");

        let member = add_object(&conn, &store, package_id, object_id, None).unwrap();
        assert_eq!(member.relative_path, "data/letter.pdf");
        assert_eq!(member.file_size, 16);
        assert_eq!(member.sequence, 0);

        // Derived counts track membership
        let package = Package::find_by_id(&conn, package_id).unwrap().unwrap();
        assert_eq!(package.object_count, 1);
        assert_eq!(package.total_size, 16);

        // Adding again is a no-op
        let again = add_object(&conn, &store, package_id, object_id, None).unwrap();
        assert_eq!(again.id, member.id);
        let package = Package::find_by_id(&conn, package_id).unwrap().unwrap();
        assert_eq!(package.object_count, 1);
    }

    #[test]
    fn test_remove_object_updates_counts() {
        let (_dir, conn, store) = setup();
        let package = draft(&conn);
        let package_id = package.id.unwrap();
        let a = seed_object(&conn, &store, "a.bin", b"aaaa");
        let b = seed_object(&conn, &store, "b.bin", b"bb");

        add_object(&conn, &store, package_id, a, None).unwrap();
        add_object(&conn, &store, package_id, b, None).unwrap();

        remove_object(&conn, package_id, a).unwrap();

        let package = Package::find_by_id(&conn, package_id).unwrap().unwrap();
        assert_eq!(package.object_count, 1);
        assert_eq!(package.total_size, 2);
    }

    #[test]
    fn test_delete_only_while_draft() {
        let (_dir, conn, _store) = setup();
        let package = draft(&conn);
        let package_id = package.id.unwrap();

        let mut frozen = Package::find_by_id(&conn, package_id).unwrap().unwrap();
        frozen.update_status(&conn, PackageStatus::Complete).unwrap();

        assert!(matches!(delete(&conn, package_id), Err(Error::Validation(_))));

        frozen.update_status(&conn, PackageStatus::Draft).unwrap();
        delete(&conn, package_id).unwrap();
        assert!(Package::find_by_id(&conn, package_id).unwrap().is_none());
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.00 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.00 MB");
    }
}
