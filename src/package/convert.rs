// src/package/convert.rs

//! Package derivation: SIP -> AIP -> DIP.
//!
//! Conversion creates a new draft package of the next type whose
//! membership rows are copied from the source (object references, not
//! bytes) and whose parent pointer links back to it. The source package
//! is never mutated; its audit log just gains a conversion event.

use crate::db::models::{
    EventOutcome, EventType, Package, PackageObject, PackageStatus, PackageType,
    PreservationEvent,
};
use crate::error::{Error, Result};
use rusqlite::Connection;
use tracing::info;

/// Derive a new package of `target_type` from the given source.
pub fn convert(
    conn: &Connection,
    source_id: i64,
    target_type: PackageType,
    created_by: Option<String>,
    agent: &str,
) -> Result<Package> {
    let source = Package::find_by_id(conn, source_id)?
        .ok_or_else(|| Error::NotFound(format!("package {source_id}")))?;

    if source.package_type.derives_into() != Some(target_type) {
        return Err(Error::Validation(format!(
            "a {} does not derive into a {}",
            source.package_type, target_type
        )));
    }

    if !matches!(
        source.status,
        PackageStatus::Validated | PackageStatus::Exported
    ) {
        return Err(Error::Validation(format!(
            "source must be validated or exported before conversion (package is {})",
            source.status
        )));
    }

    let mut child = Package::new(derived_name(&source.name, source.package_type, target_type), target_type);
    child.description = Some(format!(
        "{} derived from {} {}",
        match target_type {
            PackageType::Aip => "Archival Information Package",
            PackageType::Dip => "Dissemination Information Package",
            PackageType::Sip => "Submission Information Package",
        },
        source.package_type.as_str().to_uppercase(),
        source.uuid
    ));
    child.package_format = source.package_format.clone();
    child.bagit_version = source.bagit_version.clone();
    child.manifest_algorithm = source.manifest_algorithm.clone();
    child.originator = source.originator.clone();
    if target_type == PackageType::Aip {
        // Submission terms travel with the archival copy
        child.submission_agreement = source.submission_agreement.clone();
        child.retention_period = source.retention_period.clone();
    }
    child.parent_package_id = Some(source_id);
    child.created_by = created_by;

    let child_id = child.insert(conn)?;

    // Copy the object set: references and layout, not bytes
    for member in PackageObject::list_for_package(conn, source_id)? {
        let mut copy = PackageObject::new(
            child_id,
            member.object_id,
            member.relative_path.clone(),
            member.file_name.clone(),
        );
        copy.file_size = member.file_size;
        copy.mime_type = member.mime_type.clone();
        copy.puid = member.puid.clone();
        copy.checksum_value = member.checksum_value.clone();
        copy.sequence = member.sequence;
        copy.insert(conn)?;
    }
    child.refresh_counts(conn)?;

    PreservationEvent::package(
        child_id,
        EventType::PackageCreate,
        format!(
            "{} created from {} {}",
            target_type.as_str().to_uppercase(),
            source.package_type.as_str().to_uppercase(),
            source.uuid
        ),
        EventOutcome::Success,
        agent,
    )
    .insert(conn)?;

    PreservationEvent::package(
        source_id,
        EventType::PackageConvert,
        format!(
            "Converted to {} {}",
            target_type.as_str().to_uppercase(),
            child.uuid
        ),
        EventOutcome::Success,
        agent,
    )
    .insert(conn)?;

    info!(
        source_id,
        child_id,
        target = target_type.as_str(),
        "package converted"
    );
    Ok(child)
}

/// Derive a child name from the source: swap the type token when it
/// appears, append otherwise.
fn derived_name(source_name: &str, from: PackageType, to: PackageType) -> String {
    let from_token = from.as_str().to_uppercase();
    let to_token = to.as_str().to_uppercase();

    if source_name.contains(&from_token) {
        source_name.replace(&from_token, &to_token)
    } else {
        format!("{source_name} - {to_token}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::tests::{seed_object, setup};
    use crate::package::{NewPackage, add_object, builder, create, validate};
    use crate::store::ObjectStore;
    use std::path::Path;

    fn validated_sip(conn: &Connection, store: &ObjectStore, base: &Path) -> Package {
        let package = create(
            conn,
            NewPackage {
                name: "Accession 7 SIP".to_string(),
                originator: Some("Donor Estate".to_string()),
                submission_agreement: Some("SA-2026-07".to_string()),
                retention_period: Some("permanent".to_string()),
                ..Default::default()
            },
            "test",
        )
        .unwrap();
        let package_id = package.id.unwrap();

        let a = seed_object(conn, store, "diary.pdf", b"%PDF diary");
        let b = seed_object(conn, store, "photo.tif", b"II* photo");
        add_object(conn, store, package_id, a, None).unwrap();
        add_object(conn, store, package_id, b, None).unwrap();

        builder::build(conn, store, base, package_id, "test").unwrap();
        validate(conn, package_id, "test").unwrap();
        Package::find_by_id(conn, package_id).unwrap().unwrap()
    }

    #[test]
    fn test_sip_to_aip_links_parent_and_copies_objects() {
        let (dir, conn, store) = setup();
        let base = dir.path().join("packages");
        let sip = validated_sip(&conn, &store, &base);
        let sip_id = sip.id.unwrap();

        let aip = convert(&conn, sip_id, PackageType::Aip, None, "test").unwrap();

        assert_eq!(aip.package_type, PackageType::Aip);
        assert_eq!(aip.status, PackageStatus::Draft);
        assert_eq!(aip.parent_package_id, Some(sip_id));
        assert_eq!(aip.name, "Accession 7 AIP");
        assert_eq!(aip.submission_agreement.as_deref(), Some("SA-2026-07"));

        // Object sets match
        let sip_members = PackageObject::list_for_package(&conn, sip_id).unwrap();
        let aip_members = PackageObject::list_for_package(&conn, aip.id.unwrap()).unwrap();
        assert_eq!(sip_members.len(), aip_members.len());
        for (s, a) in sip_members.iter().zip(&aip_members) {
            assert_eq!(s.object_id, a.object_id);
            assert_eq!(s.relative_path, a.relative_path);
        }
        assert_eq!(aip.object_count, sip.object_count);

        // Source untouched apart from its audit event
        let source = Package::find_by_id(&conn, sip_id).unwrap().unwrap();
        assert_eq!(source.status, PackageStatus::Validated);
        assert_eq!(source.object_count, sip.object_count);

        let events = PreservationEvent::list_for_package(&conn, sip_id, 10).unwrap();
        assert!(events
            .iter()
            .any(|e| e.event_type == EventType::PackageConvert));
    }

    #[test]
    fn test_aip_to_dip_chain() {
        let (dir, conn, store) = setup();
        let base = dir.path().join("packages");
        let sip = validated_sip(&conn, &store, &base);

        let aip = convert(&conn, sip.id.unwrap(), PackageType::Aip, None, "test").unwrap();
        let aip_id = aip.id.unwrap();

        // DIP requires the AIP itself to be validated first
        let early = convert(&conn, aip_id, PackageType::Dip, None, "test");
        assert!(matches!(early, Err(Error::Validation(_))));

        builder::build(&conn, &store, &base, aip_id, "test").unwrap();
        validate(&conn, aip_id, "test").unwrap();

        let dip = convert(&conn, aip_id, PackageType::Dip, None, "test").unwrap();
        assert_eq!(dip.package_type, PackageType::Dip);
        assert_eq!(dip.parent_package_id, Some(aip_id));
        // Submission terms stay with the AIP, not the dissemination copy
        assert!(dip.submission_agreement.is_none());
    }

    #[test]
    fn test_conversion_requires_validated_or_exported_source() {
        let (dir, conn, store) = setup();
        let base = dir.path().join("packages");

        let package = create(
            &conn,
            NewPackage {
                name: "Unfinished SIP".to_string(),
                ..Default::default()
            },
            "test",
        )
        .unwrap();
        let package_id = package.id.unwrap();
        let a = seed_object(&conn, &store, "x.bin", b"x");
        add_object(&conn, &store, package_id, a, None).unwrap();
        builder::build(&conn, &store, &base, package_id, "test").unwrap();

        // complete, but not validated
        let result = convert(&conn, package_id, PackageType::Aip, None, "test");
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_conversion_direction_is_forward_only() {
        let (dir, conn, store) = setup();
        let base = dir.path().join("packages");
        let sip = validated_sip(&conn, &store, &base);
        let sip_id = sip.id.unwrap();

        // sip -> dip skips a stage
        assert!(matches!(
            convert(&conn, sip_id, PackageType::Dip, None, "test"),
            Err(Error::Validation(_))
        ));
        // sip -> sip is no derivation at all
        assert!(matches!(
            convert(&conn, sip_id, PackageType::Sip, None, "test"),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_derived_name() {
        assert_eq!(
            derived_name("Accession 7 SIP", PackageType::Sip, PackageType::Aip),
            "Accession 7 AIP"
        );
        assert_eq!(
            derived_name("Quarterly transfer", PackageType::Sip, PackageType::Aip),
            "Quarterly transfer - AIP"
        );
    }
}
