// src/package/validate.rs

//! Built-tree validation.
//!
//! Recomputes every manifest digest from the tree and compares it to
//! the manifest, checks the tag manifest, and verifies the bag
//! declaration. Any mismatch is reported; the package only moves to
//! `validated` on a clean pass and otherwise keeps its current status.

use crate::db::models::{
    EventOutcome, EventType, Package, PackageStatus, PreservationEvent,
};
use crate::error::{Error, Result};
use crate::hash::{self, HashAlgorithm};
use rusqlite::Connection;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Result of validating a built package
#[derive(Debug)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub files_verified: usize,
}

/// Validate a built package against its manifests.
pub fn validate(conn: &Connection, package_id: i64, agent: &str) -> Result<ValidationReport> {
    let mut package = Package::find_by_id(conn, package_id)?
        .ok_or_else(|| Error::NotFound(format!("package {package_id}")))?;

    if !matches!(
        package.status,
        PackageStatus::Complete | PackageStatus::Validated
    ) {
        return Err(Error::Validation(format!(
            "package must be built before validation (package is {})",
            package.status
        )));
    }

    let source_path = package
        .source_path
        .clone()
        .ok_or_else(|| Error::Validation("package has no built tree".to_string()))?;
    let package_dir = Path::new(&source_path);
    if !package_dir.is_dir() {
        return Err(Error::Validation(format!(
            "built tree missing: {source_path}"
        )));
    }

    let algorithm = package.manifest_algorithm.parse::<HashAlgorithm>()?;
    let manifest_name = format!("manifest-{}.txt", algorithm.name());

    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut files_verified = 0usize;

    // Required tag files
    for required in ["bagit.txt", "bag-info.txt", manifest_name.as_str()] {
        if !package_dir.join(required).is_file() {
            errors.push(format!("missing required file: {required}"));
        }
    }

    if errors.is_empty() {
        // Bag declaration sanity
        let declaration = fs::read_to_string(package_dir.join("bagit.txt"))?;
        if !declaration.lines().any(|l| l.starts_with("BagIt-Version:")) {
            errors.push("invalid bagit.txt: missing BagIt-Version".to_string());
        }

        // Payload manifest
        verify_manifest(
            package_dir,
            &package_dir.join(&manifest_name),
            algorithm,
            &mut errors,
            &mut files_verified,
        )?;

        // Tag manifest, when present
        let tag_manifest = package_dir.join(format!("tagmanifest-{}.txt", algorithm.name()));
        if tag_manifest.is_file() {
            let mut tag_verified = 0usize;
            verify_manifest(
                package_dir,
                &tag_manifest,
                algorithm,
                &mut errors,
                &mut tag_verified,
            )?;
        } else {
            warnings.push("no tag manifest present".to_string());
        }
    }

    let valid = errors.is_empty();

    if valid {
        package.update_status(conn, PackageStatus::Validated)?;
        PreservationEvent::package(
            package_id,
            EventType::PackageValidate,
            format!("Validation passed: {files_verified} files verified"),
            EventOutcome::Success,
            agent,
        )
        .insert(conn)?;
        info!(package_id, files_verified, "package validated");
    } else {
        // The package stays unvalidated; the findings go to the log
        warn!(package_id, errors = errors.len(), "package validation failed");
        PreservationEvent::package(
            package_id,
            EventType::PackageValidate,
            format!("Validation failed: {} errors", errors.len()),
            EventOutcome::Failure,
            agent,
        )
        .with_outcome_detail(errors.join("\n"))
        .insert(conn)?;
    }

    Ok(ValidationReport {
        valid,
        errors,
        warnings,
        files_verified,
    })
}

/// Check every `digest  path` line of a manifest against the tree
fn verify_manifest(
    package_dir: &Path,
    manifest_path: &Path,
    algorithm: HashAlgorithm,
    errors: &mut Vec<String>,
    verified: &mut usize,
) -> Result<()> {
    let content = fs::read_to_string(manifest_path)?;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let Some((expected, relative)) = line.split_once("  ") else {
            errors.push(format!("malformed manifest line: {line}"));
            continue;
        };

        let file_path = package_dir.join(relative);
        if !file_path.is_file() {
            errors.push(format!("file in manifest not found: {relative}"));
            continue;
        }

        match hash::verify_file(&file_path, expected, algorithm) {
            Ok(()) => *verified += 1,
            Err(Error::ChecksumMismatch { actual, .. }) => {
                errors.push(format!(
                    "checksum mismatch for {relative}: expected {expected}, got {actual}"
                ));
            }
            Err(e) => {
                errors.push(format!("could not verify {relative}: {e}"));
            }
        }
    }

    Ok(())
}
