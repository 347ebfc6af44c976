// src/checksum.rs

//! Checksum generation and verification for digital objects.
//!
//! Generation reads the object's bytes once and feeds every requested
//! digest. Verification recomputes a single digest and compares it to
//! the stored value; the stored value is never rewritten by
//! verification, no matter the outcome. Both operations append exactly
//! one PREMIS event.

use crate::db::models::{
    Checksum, DigitalObject, EventOutcome, EventType, FixityCheck, FixityStatus,
    PreservationEvent, VerificationStatus,
};
use crate::db::now_ts;
use crate::error::{Error, Result};
use crate::hash::{self, HashAlgorithm};
use crate::store::ObjectStore;
use rusqlite::Connection;
use std::time::Instant;
use tracing::{error, info};

/// Generate checksums for an object, one streaming read for all
/// algorithms. Each row is written with status `valid` and counts as
/// freshly verified.
pub fn generate(
    conn: &Connection,
    store: &ObjectStore,
    object_id: i64,
    algorithms: &[HashAlgorithm],
    agent: &str,
) -> Result<Vec<Checksum>> {
    let object = DigitalObject::find_by_id(conn, object_id)?
        .ok_or_else(|| Error::NotFound(format!("digital object {object_id}")))?;

    if algorithms.is_empty() {
        return Err(Error::Validation("no algorithms requested".to_string()));
    }

    let path = match store.existing_path_for(&object) {
        Ok(p) => p,
        Err(e) => {
            PreservationEvent::object(
                object_id,
                EventType::ChecksumGeneration,
                "Checksum generation failed: object file missing",
                EventOutcome::Failure,
                agent,
            )
            .with_outcome_detail(e.to_string())
            .insert(conn)?;
            return Err(e);
        }
    };

    let (digests, file_size) = match hash::hash_file_multi(algorithms, &path) {
        Ok(result) => result,
        Err(e) => {
            PreservationEvent::object(
                object_id,
                EventType::ChecksumGeneration,
                "Checksum generation failed: object unreadable",
                EventOutcome::Failure,
                agent,
            )
            .with_outcome_detail(e.to_string())
            .insert(conn)?;
            return Err(e.into());
        }
    };

    let now = now_ts();
    let mut results = Vec::with_capacity(digests.len());

    for (algorithm, value) in digests {
        let mut checksum = Checksum {
            id: None,
            object_id,
            algorithm,
            value,
            file_size: Some(file_size as i64),
            verification_status: VerificationStatus::Valid,
            generated_at: now.clone(),
            verified_at: Some(now.clone()),
        };
        checksum.upsert(conn)?;
        results.push(checksum);
    }

    let names: Vec<&str> = algorithms.iter().map(|a| a.name()).collect();
    PreservationEvent::object(
        object_id,
        EventType::ChecksumGeneration,
        format!("Checksums generated: {}", names.join(", ")),
        EventOutcome::Success,
        agent,
    )
    .insert(conn)?;

    info!(
        object_id,
        algorithms = names.join(","),
        "generated checksums"
    );
    Ok(results)
}

/// Verify one stored checksum against the object's current bytes.
///
/// Appends a fixity check row and one event. A mismatch marks the
/// stored checksum `invalid`; a read failure leaves it untouched.
pub fn verify(
    conn: &Connection,
    store: &ObjectStore,
    object_id: i64,
    algorithm: HashAlgorithm,
    checked_by: &str,
    agent: &str,
) -> Result<FixityCheck> {
    let object = DigitalObject::find_by_id(conn, object_id)?
        .ok_or_else(|| Error::NotFound(format!("digital object {object_id}")))?;

    let mut stored = Checksum::find(conn, object_id, algorithm)?.ok_or_else(|| {
        Error::NotFound(format!(
            "no {algorithm} checksum stored for object {object_id}"
        ))
    })?;

    let started = Instant::now();
    let path = store.path_for(&object);

    let (status, actual_value, error_message) = if !path.is_file() {
        (FixityStatus::Error, None, Some("file not found".to_string()))
    } else {
        match hash::hash_file(algorithm, &path) {
            Ok(actual) => {
                if actual == stored.value {
                    (FixityStatus::Pass, Some(actual), None)
                } else {
                    (
                        FixityStatus::Fail,
                        Some(actual),
                        Some("checksum mismatch".to_string()),
                    )
                }
            }
            Err(e) => (FixityStatus::Error, None, Some(e.to_string())),
        }
    };

    let duration_ms = started.elapsed().as_millis() as i64;
    let now = now_ts();

    let mut check = FixityCheck {
        id: None,
        object_id,
        algorithm: algorithm.name().to_string(),
        status,
        expected_value: Some(stored.value.clone()),
        actual_value: actual_value.clone(),
        error_message,
        checked_by: checked_by.to_string(),
        duration_ms,
        checked_at: now.clone(),
    };
    check.insert(conn)?;

    match status {
        FixityStatus::Pass => {
            stored.mark_verified(conn, VerificationStatus::Valid, &now)?;
            PreservationEvent::object(
                object_id,
                EventType::FixityCheck,
                format!("Fixity verified ({algorithm})"),
                EventOutcome::Success,
                agent,
            )
            .insert(conn)?;
        }
        FixityStatus::Fail => {
            // The stored value stays as the reference; only its status
            // flips. Adopting the new digest would destroy the evidence.
            stored.mark_verified(conn, VerificationStatus::Invalid, &now)?;
            error!(
                object_id,
                algorithm = algorithm.name(),
                expected = %stored.value,
                actual = actual_value.as_deref().unwrap_or(""),
                "FIXITY FAILURE: checksum mismatch"
            );
            PreservationEvent::object(
                object_id,
                EventType::FixityCheck,
                format!("Fixity FAILED ({algorithm}): checksum mismatch"),
                EventOutcome::Failure,
                agent,
            )
            .with_outcome_detail(format!(
                "expected {}, got {}",
                stored.value,
                actual_value.as_deref().unwrap_or("<unreadable>")
            ))
            .insert(conn)?;
        }
        FixityStatus::Error => {
            // Read failure: the stored checksum row is left untouched,
            // so the object stays due for the next pass.
            PreservationEvent::object(
                object_id,
                EventType::FixityCheck,
                format!("Fixity check error ({algorithm})"),
                EventOutcome::Failure,
                agent,
            )
            .with_outcome_detail(check.error_message.clone().unwrap_or_default())
            .insert(conn)?;
        }
    }

    Ok(check)
}
