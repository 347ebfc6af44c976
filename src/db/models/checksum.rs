// src/db/models/checksum.rs

//! Stored checksums, one per (object, algorithm).
//!
//! Created by generation with status `valid`; afterwards only
//! verification may touch the row, and it never rewrites the stored
//! value. A mismatch flips the status to `invalid` and stays that way
//! until an operator intervenes.

use crate::db::models::column_parse_error;
use crate::error::Result;
use crate::hash::HashAlgorithm;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::str::FromStr;

/// Verification status of a stored checksum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStatus {
    Pending,
    Valid,
    Invalid,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::Valid => "valid",
            VerificationStatus::Invalid => "invalid",
        }
    }
}

impl FromStr for VerificationStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(VerificationStatus::Pending),
            "valid" => Ok(VerificationStatus::Valid),
            "invalid" => Ok(VerificationStatus::Invalid),
            _ => Err(format!("Invalid verification status: {s}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Checksum {
    pub id: Option<i64>,
    pub object_id: i64,
    pub algorithm: HashAlgorithm,
    pub value: String,
    pub file_size: Option<i64>,
    pub verification_status: VerificationStatus,
    pub generated_at: String,
    pub verified_at: Option<String>,
}

impl Checksum {
    /// Insert or replace the checksum for (object, algorithm).
    ///
    /// Regeneration is an explicit operator action; it resets the row
    /// to freshly-verified state.
    pub fn upsert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO checksums
                (object_id, algorithm, value, file_size, verification_status, generated_at, verified_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(object_id, algorithm) DO UPDATE SET
                value = excluded.value,
                file_size = excluded.file_size,
                verification_status = excluded.verification_status,
                generated_at = excluded.generated_at,
                verified_at = excluded.verified_at",
            params![
                self.object_id,
                self.algorithm.name(),
                &self.value,
                self.file_size,
                self.verification_status.as_str(),
                &self.generated_at,
                &self.verified_at,
            ],
        )?;

        let id = conn.query_row(
            "SELECT id FROM checksums WHERE object_id = ?1 AND algorithm = ?2",
            params![self.object_id, self.algorithm.name()],
            |row| row.get(0),
        )?;
        self.id = Some(id);
        Ok(id)
    }

    pub fn find(conn: &Connection, object_id: i64, algorithm: HashAlgorithm) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, object_id, algorithm, value, file_size, verification_status, generated_at, verified_at
             FROM checksums WHERE object_id = ?1 AND algorithm = ?2",
        )?;

        let checksum = stmt
            .query_row(params![object_id, algorithm.name()], Self::from_row)
            .optional()?;
        Ok(checksum)
    }

    pub fn list_for_object(conn: &Connection, object_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, object_id, algorithm, value, file_size, verification_status, generated_at, verified_at
             FROM checksums WHERE object_id = ?1 ORDER BY algorithm",
        )?;

        let checksums = stmt
            .query_map([object_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(checksums)
    }

    /// Record a verification outcome. Only the status and timestamp
    /// change; the stored value is untouched.
    pub fn mark_verified(
        &mut self,
        conn: &Connection,
        status: VerificationStatus,
        verified_at: &str,
    ) -> Result<()> {
        let id = self.id.ok_or_else(|| {
            crate::error::Error::Validation("Cannot update checksum without ID".to_string())
        })?;

        conn.execute(
            "UPDATE checksums SET verification_status = ?1, verified_at = ?2 WHERE id = ?3",
            params![status.as_str(), verified_at, id],
        )?;

        self.verification_status = status;
        self.verified_at = Some(verified_at.to_string());
        Ok(())
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let algorithm_str: String = row.get(2)?;
        let algorithm = algorithm_str
            .parse::<HashAlgorithm>()
            .map_err(|e| column_parse_error(2, e.to_string()))?;

        let status_str: String = row.get(5)?;
        let verification_status = status_str
            .parse::<VerificationStatus>()
            .map_err(|e| column_parse_error(5, e))?;

        Ok(Self {
            id: Some(row.get(0)?),
            object_id: row.get(1)?,
            algorithm,
            value: row.get(3)?,
            file_size: row.get(4)?,
            verification_status,
            generated_at: row.get(6)?,
            verified_at: row.get(7)?,
        })
    }
}
