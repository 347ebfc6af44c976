// src/package/builder.rs

//! BagIt tree construction.
//!
//! Build copies every payload file into `<base>/<uuid>/data/...`,
//! digesting while copying, then writes the bag declaration, bag info,
//! payload manifest, and tag manifest, and finally digests the payload
//! manifest as the package checksum. The build is atomic per package:
//! any failure removes the partial tree, moves the package to `error`,
//! and leaves the membership rows untouched.

use crate::db::models::{
    DigitalObject, EventOutcome, EventType, Package, PackageObject, PackageStatus,
    PreservationEvent,
};
use crate::error::{Error, Result};
use crate::hash::{self, HashAlgorithm, Hasher};
use crate::package::format_bytes;
use crate::store::ObjectStore;
use chrono::Utc;
use rusqlite::Connection;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Component, Path, PathBuf};
use tracing::{error, info};

/// Outcome of a successful build
#[derive(Debug)]
pub struct BuildReport {
    pub path: PathBuf,
    pub files_copied: usize,
    pub total_size: i64,
    pub package_checksum: String,
}

/// Build a draft package into a BagIt tree under `base_dir`.
pub fn build(
    conn: &Connection,
    store: &ObjectStore,
    base_dir: &Path,
    package_id: i64,
    agent: &str,
) -> Result<BuildReport> {
    let mut package = Package::find_by_id(conn, package_id)?
        .ok_or_else(|| Error::NotFound(format!("package {package_id}")))?;

    if package.status != PackageStatus::Draft {
        return Err(Error::Validation(format!(
            "can only build draft packages (package is {})",
            package.status
        )));
    }

    let members = PackageObject::list_for_package(conn, package_id)?;
    if members.is_empty() {
        // Rejected before any transition: the package stays draft
        return Err(Error::Validation(format!(
            "package {} has no objects to build",
            package.uuid
        )));
    }

    let algorithm = package.manifest_algorithm.parse::<HashAlgorithm>()?;
    let package_dir = base_dir.join(&package.uuid);

    package.update_status(conn, PackageStatus::Building)?;
    info!(package_id, uuid = %package.uuid, "building package");

    match build_tree(conn, store, &package, &members, &package_dir, algorithm) {
        Ok(report) => {
            package.set_built(
                conn,
                &package_dir.to_string_lossy(),
                report.total_size,
                &report.package_checksum,
            )?;

            PreservationEvent::package(
                package_id,
                EventType::PackageBuild,
                format!(
                    "Package built: {} files, {}",
                    report.files_copied,
                    format_bytes(report.total_size)
                ),
                EventOutcome::Success,
                agent,
            )
            .insert(conn)?;

            Ok(report)
        }
        Err(e) => {
            // Leave no partially-built tree behind
            if package_dir.exists() {
                let _ = fs::remove_dir_all(&package_dir);
            }
            package.update_status(conn, PackageStatus::Error)?;

            error!(package_id, error = %e, "package build failed");
            PreservationEvent::package(
                package_id,
                EventType::PackageBuild,
                "Package build failed",
                EventOutcome::Failure,
                agent,
            )
            .with_outcome_detail(e.to_string())
            .insert(conn)?;

            Err(Error::BuildFailure(e.to_string()))
        }
    }
}

fn build_tree(
    conn: &Connection,
    store: &ObjectStore,
    package: &Package,
    members: &[PackageObject],
    package_dir: &Path,
    algorithm: HashAlgorithm,
) -> Result<BuildReport> {
    if package_dir.exists() {
        fs::remove_dir_all(package_dir)?;
    }
    fs::create_dir_all(package_dir.join("data"))?;

    let mut manifest_lines = Vec::with_capacity(members.len());
    let mut total_size: i64 = 0;

    for member in members {
        let relative = sanitize_relative_path(&member.relative_path)?;

        let object = DigitalObject::find_by_id(conn, member.object_id)?.ok_or_else(|| {
            Error::BuildFailure(format!("digital object {} vanished", member.object_id))
        })?;
        let source = store.existing_path_for(&object).map_err(|_| {
            Error::BuildFailure(format!(
                "source file missing for {}",
                member.relative_path
            ))
        })?;

        let dest = package_dir.join(&relative);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        let (digest, size) = copy_and_digest(&source, &dest, algorithm)?;
        total_size += size as i64;

        // Two spaces between digest and path, per the BagIt convention
        manifest_lines.push(format!("{digest}  {}", member.relative_path));
    }

    // Bag declaration
    fs::write(
        package_dir.join("bagit.txt"),
        format!(
            "BagIt-Version: {}\nTag-File-Character-Encoding: UTF-8\n",
            package.bagit_version
        ),
    )?;

    // Payload manifest
    let manifest_name = format!("manifest-{}.txt", algorithm.name());
    fs::write(
        package_dir.join(&manifest_name),
        format!("{}\n", manifest_lines.join("\n")),
    )?;

    // Bag metadata
    let bag_info = [
        format!(
            "Source-Organization: {}",
            package.originator.as_deref().unwrap_or("Unknown")
        ),
        format!(
            "External-Description: {}",
            package.description.as_deref().unwrap_or("")
        ),
        format!("Bagging-Date: {}", Utc::now().format("%Y-%m-%d")),
        format!("External-Identifier: {}", package.uuid),
        format!("Bag-Size: {}", format_bytes(total_size)),
        format!("Payload-Oxum: {}.{}", total_size, members.len()),
        format!(
            "Bag-Group-Identifier: {}",
            package.package_type.as_str().to_uppercase()
        ),
        "Bag-Count: 1 of 1".to_string(),
        format!("Internal-Sender-Identifier: {}", package.name),
    ];
    fs::write(
        package_dir.join("bag-info.txt"),
        format!("{}\n", bag_info.join("\n")),
    )?;

    // Tag manifest over the tag files just written
    let mut tag_lines = Vec::new();
    for tag_file in ["bagit.txt", "bag-info.txt", manifest_name.as_str()] {
        let digest = hash::hash_file(algorithm, &package_dir.join(tag_file))?;
        tag_lines.push(format!("{digest}  {tag_file}"));
    }
    fs::write(
        package_dir.join(format!("tagmanifest-{}.txt", algorithm.name())),
        format!("{}\n", tag_lines.join("\n")),
    )?;

    // One aggregate digest over the payload manifest
    let package_checksum = hash::hash_file(algorithm, &package_dir.join(&manifest_name))?;

    Ok(BuildReport {
        path: package_dir.to_path_buf(),
        files_copied: members.len(),
        total_size,
        package_checksum,
    })
}

/// Reject absolute or parent-escaping member paths before writing
fn sanitize_relative_path(relative: &str) -> Result<PathBuf> {
    let path = Path::new(relative);
    if path.is_absolute()
        || path
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
    {
        return Err(Error::BuildFailure(format!(
            "unsafe relative path in package: {relative}"
        )));
    }
    Ok(path.to_path_buf())
}

/// Stream-copy a file while computing its digest
fn copy_and_digest(source: &Path, dest: &Path, algorithm: HashAlgorithm) -> Result<(String, u64)> {
    let mut input = File::open(source)?;
    let mut output = File::create(dest)?;
    let mut hasher = Hasher::new(algorithm);
    let mut buffer = [0u8; 65536];
    let mut total: u64 = 0;

    loop {
        let n = input.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        output.write_all(&buffer[..n])?;
        hasher.update(&buffer[..n]);
        total += n as u64;
    }
    output.flush()?;

    Ok((hasher.finalize(), total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::tests::{seed_object, setup};
    use crate::package::{NewPackage, add_object, create};

    fn built_package(
        conn: &Connection,
        store: &ObjectStore,
        base: &Path,
    ) -> (i64, BuildReport) {
        let package = create(
            conn,
            NewPackage {
                name: "Transfer 42".to_string(),
                originator: Some("City Archive".to_string()),
                ..Default::default()
            },
            "test",
        )
        .unwrap();
        let package_id = package.id.unwrap();

        let a = seed_object(conn, store, "report.pdf", b"%PDF-1.4 report body");
        let b = seed_object(conn, store, "scan.tif", b"II*\x00 image bytes here");
        add_object(conn, store, package_id, a, None).unwrap();
        add_object(conn, store, package_id, b, None).unwrap();

        let report = build(conn, store, base, package_id, "test").unwrap();
        (package_id, report)
    }

    #[test]
    fn test_build_produces_complete_bag() {
        let (dir, conn, store) = setup();
        let base = dir.path().join("packages");

        let (package_id, report) = built_package(&conn, &store, &base);

        assert_eq!(report.files_copied, 2);
        assert!(report.path.join("data/report.pdf").is_file());
        assert!(report.path.join("data/scan.tif").is_file());
        assert!(report.path.join("bagit.txt").is_file());
        assert!(report.path.join("bag-info.txt").is_file());
        assert!(report.path.join("manifest-sha256.txt").is_file());
        assert!(report.path.join("tagmanifest-sha256.txt").is_file());

        let package = Package::find_by_id(&conn, package_id).unwrap().unwrap();
        assert_eq!(package.status, PackageStatus::Complete);
        assert!(package.built_at.is_some());
        assert_eq!(package.package_checksum.as_deref(), Some(report.package_checksum.as_str()));

        // Manifest digests match the copied payload
        let manifest = fs::read_to_string(report.path.join("manifest-sha256.txt")).unwrap();
        for line in manifest.lines() {
            let (digest, rel) = line.split_once("  ").unwrap();
            let actual = hash::hash_file(HashAlgorithm::Sha256, &report.path.join(rel)).unwrap();
            assert_eq!(digest, actual);
        }

        // Payload-Oxum records bytes.count
        let bag_info = fs::read_to_string(report.path.join("bag-info.txt")).unwrap();
        assert!(bag_info.contains(&format!("Payload-Oxum: {}.2", report.total_size)));
    }

    #[test]
    fn test_build_empty_package_is_rejected_and_stays_draft() {
        let (dir, conn, _store) = setup();
        let base = dir.path().join("packages");

        let package = create(
            &conn,
            NewPackage {
                name: "Empty".to_string(),
                ..Default::default()
            },
            "test",
        )
        .unwrap();
        let package_id = package.id.unwrap();

        let store = ObjectStore::new(dir.path().join("uploads"));
        let result = build(&conn, &store, &base, package_id, "test");
        assert!(matches!(result, Err(Error::Validation(_))));

        let package = Package::find_by_id(&conn, package_id).unwrap().unwrap();
        assert_eq!(package.status, PackageStatus::Draft);
        assert!(!base.join(&package.uuid).exists());
    }

    #[test]
    fn test_missing_source_aborts_whole_build() {
        let (dir, conn, store) = setup();
        let base = dir.path().join("packages");

        let package = create(
            &conn,
            NewPackage {
                name: "Partial".to_string(),
                ..Default::default()
            },
            "test",
        )
        .unwrap();
        let package_id = package.id.unwrap();

        let ok = seed_object(&conn, &store, "ok.bin", b"fine");
        let gone = seed_object(&conn, &store, "gone.bin", b"soon deleted");
        add_object(&conn, &store, package_id, ok, None).unwrap();
        add_object(&conn, &store, package_id, gone, None).unwrap();

        std::fs::remove_file(store.root().join("gone.bin")).unwrap();

        let result = build(&conn, &store, &base, package_id, "test");
        assert!(matches!(result, Err(Error::BuildFailure(_))));

        // Error status, no partial tree left behind
        let package = Package::find_by_id(&conn, package_id).unwrap().unwrap();
        assert_eq!(package.status, PackageStatus::Error);
        assert!(!base.join(&package.uuid).exists());

        let events = PreservationEvent::list_for_package(&conn, package_id, 10).unwrap();
        assert!(events
            .iter()
            .any(|e| e.event_type == EventType::PackageBuild
                && e.event_outcome == EventOutcome::Failure));
    }

    #[test]
    fn test_build_refuses_non_draft() {
        let (dir, conn, store) = setup();
        let base = dir.path().join("packages");

        let (package_id, _) = built_package(&conn, &store, &base);

        // Already complete; a second build is a validation error
        let result = build(&conn, &store, &base, package_id, "test");
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_unsafe_relative_paths_rejected() {
        assert!(sanitize_relative_path("data/ok.bin").is_ok());
        assert!(sanitize_relative_path("../escape.bin").is_err());
        assert!(sanitize_relative_path("data/../../escape.bin").is_err());
        assert!(sanitize_relative_path("/etc/passwd").is_err());
    }
}
