// src/db/models/package.rs

//! OAIS package records.
//!
//! A package moves forward through draft -> building -> complete ->
//! validated -> exported, or drops to error. `object_count` and
//! `total_size` are derived from the membership rows and refreshed on
//! every add/remove.

use crate::db::models::column_parse_error;
use crate::db::now_ts;
use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::fmt;
use std::str::FromStr;

/// OAIS package role. The derivation chain runs SIP -> AIP -> DIP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageType {
    Sip,
    Aip,
    Dip,
}

impl PackageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageType::Sip => "sip",
            PackageType::Aip => "aip",
            PackageType::Dip => "dip",
        }
    }

    /// Position in the derivation chain; a parent must precede its child
    pub fn derivation_rank(&self) -> u8 {
        match self {
            PackageType::Sip => 0,
            PackageType::Aip => 1,
            PackageType::Dip => 2,
        }
    }

    /// The type this one derives into, if any
    pub fn derives_into(&self) -> Option<PackageType> {
        match self {
            PackageType::Sip => Some(PackageType::Aip),
            PackageType::Aip => Some(PackageType::Dip),
            PackageType::Dip => None,
        }
    }
}

impl fmt::Display for PackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PackageType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "sip" => Ok(PackageType::Sip),
            "aip" => Ok(PackageType::Aip),
            "dip" => Ok(PackageType::Dip),
            _ => Err(format!("Invalid package type: {s}")),
        }
    }
}

/// Package lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageStatus {
    Draft,
    Building,
    Complete,
    Validated,
    Exported,
    Error,
}

impl PackageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageStatus::Draft => "draft",
            PackageStatus::Building => "building",
            PackageStatus::Complete => "complete",
            PackageStatus::Validated => "validated",
            PackageStatus::Exported => "exported",
            PackageStatus::Error => "error",
        }
    }
}

impl fmt::Display for PackageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PackageStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "draft" => Ok(PackageStatus::Draft),
            "building" => Ok(PackageStatus::Building),
            "complete" => Ok(PackageStatus::Complete),
            "validated" => Ok(PackageStatus::Validated),
            "exported" => Ok(PackageStatus::Exported),
            "error" => Ok(PackageStatus::Error),
            _ => Err(format!("Invalid package status: {s}")),
        }
    }
}

const SELECT_COLUMNS: &str = "id, uuid, name, description, package_type, package_format, \
     bagit_version, manifest_algorithm, status, object_count, total_size, package_checksum, \
     source_path, export_path, originator, submission_agreement, retention_period, \
     parent_package_id, created_by, created_at, built_at, validated_at, exported_at";

#[derive(Debug, Clone)]
pub struct Package {
    pub id: Option<i64>,
    pub uuid: String,
    pub name: String,
    pub description: Option<String>,
    pub package_type: PackageType,
    pub package_format: String,
    pub bagit_version: String,
    pub manifest_algorithm: String,
    pub status: PackageStatus,
    pub object_count: i64,
    pub total_size: i64,
    pub package_checksum: Option<String>,
    pub source_path: Option<String>,
    pub export_path: Option<String>,
    pub originator: Option<String>,
    pub submission_agreement: Option<String>,
    pub retention_period: Option<String>,
    pub parent_package_id: Option<i64>,
    pub created_by: Option<String>,
    pub created_at: String,
    pub built_at: Option<String>,
    pub validated_at: Option<String>,
    pub exported_at: Option<String>,
}

impl Package {
    pub fn new(name: String, package_type: PackageType) -> Self {
        Self {
            id: None,
            uuid: uuid::Uuid::new_v4().to_string(),
            name,
            description: None,
            package_type,
            package_format: "bagit".to_string(),
            bagit_version: "1.0".to_string(),
            manifest_algorithm: "sha256".to_string(),
            status: PackageStatus::Draft,
            object_count: 0,
            total_size: 0,
            package_checksum: None,
            source_path: None,
            export_path: None,
            originator: None,
            submission_agreement: None,
            retention_period: None,
            parent_package_id: None,
            created_by: None,
            created_at: now_ts(),
            built_at: None,
            validated_at: None,
            exported_at: None,
        }
    }

    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO packages
                (uuid, name, description, package_type, package_format, bagit_version,
                 manifest_algorithm, status, object_count, total_size, originator,
                 submission_agreement, retention_period, parent_package_id, created_by, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                &self.uuid,
                &self.name,
                &self.description,
                self.package_type.as_str(),
                &self.package_format,
                &self.bagit_version,
                &self.manifest_algorithm,
                self.status.as_str(),
                self.object_count,
                self.total_size,
                &self.originator,
                &self.submission_agreement,
                &self.retention_period,
                self.parent_package_id,
                &self.created_by,
                &self.created_at,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM packages WHERE id = ?1"
        ))?;

        let package = stmt.query_row([id], Self::from_row).optional()?;
        Ok(package)
    }

    pub fn find_by_uuid(conn: &Connection, uuid: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM packages WHERE uuid = ?1"
        ))?;

        let package = stmt.query_row([uuid], Self::from_row).optional()?;
        Ok(package)
    }

    pub fn list(
        conn: &Connection,
        package_type: Option<PackageType>,
        status: Option<PackageStatus>,
        limit: i64,
    ) -> Result<Vec<Self>> {
        let mut sql = format!("SELECT {SELECT_COLUMNS} FROM packages WHERE 1=1");
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(t) = package_type {
            sql.push_str(" AND package_type = ?");
            args.push(Box::new(t.as_str().to_string()));
        }
        if let Some(s) = status {
            sql.push_str(" AND status = ?");
            args.push(Box::new(s.as_str().to_string()));
        }
        sql.push_str(" ORDER BY created_at DESC, id DESC LIMIT ?");
        args.push(Box::new(limit));

        let mut stmt = conn.prepare(&sql)?;
        let packages = stmt
            .query_map(rusqlite::params_from_iter(args.iter()), Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(packages)
    }

    /// Direct children in the derivation chain
    pub fn find_children(conn: &Connection, parent_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM packages WHERE parent_package_id = ?1 ORDER BY id"
        ))?;

        let packages = stmt
            .query_map([parent_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(packages)
    }

    /// Move to a new status, stamping the matching lifecycle timestamp
    pub fn update_status(&mut self, conn: &Connection, new_status: PackageStatus) -> Result<()> {
        let id = self.require_id()?;
        let now = now_ts();

        let timestamp_field = match new_status {
            PackageStatus::Complete => Some("built_at"),
            PackageStatus::Validated => Some("validated_at"),
            PackageStatus::Exported => Some("exported_at"),
            _ => None,
        };

        match timestamp_field {
            Some(field) => {
                conn.execute(
                    &format!("UPDATE packages SET status = ?1, {field} = ?2 WHERE id = ?3"),
                    params![new_status.as_str(), &now, id],
                )?;
                match new_status {
                    PackageStatus::Complete => self.built_at = Some(now),
                    PackageStatus::Validated => self.validated_at = Some(now),
                    PackageStatus::Exported => self.exported_at = Some(now),
                    _ => {}
                }
            }
            None => {
                conn.execute(
                    "UPDATE packages SET status = ?1 WHERE id = ?2",
                    params![new_status.as_str(), id],
                )?;
            }
        }

        self.status = new_status;
        Ok(())
    }

    /// Record a successful build
    pub fn set_built(
        &mut self,
        conn: &Connection,
        source_path: &str,
        total_size: i64,
        package_checksum: &str,
    ) -> Result<()> {
        let id = self.require_id()?;
        let now = now_ts();

        conn.execute(
            "UPDATE packages SET status = 'complete', source_path = ?1, total_size = ?2,
                package_checksum = ?3, built_at = ?4 WHERE id = ?5",
            params![source_path, total_size, package_checksum, &now, id],
        )?;

        self.status = PackageStatus::Complete;
        self.source_path = Some(source_path.to_string());
        self.total_size = total_size;
        self.package_checksum = Some(package_checksum.to_string());
        self.built_at = Some(now);
        Ok(())
    }

    /// Record a successful export
    pub fn set_exported(&mut self, conn: &Connection, export_path: &str) -> Result<()> {
        let id = self.require_id()?;
        let now = now_ts();

        conn.execute(
            "UPDATE packages SET status = 'exported', export_path = ?1, exported_at = ?2 WHERE id = ?3",
            params![export_path, &now, id],
        )?;

        self.status = PackageStatus::Exported;
        self.export_path = Some(export_path.to_string());
        self.exported_at = Some(now);
        Ok(())
    }

    /// Rename and update descriptive fields. Draft packages only.
    pub fn update_details(
        &mut self,
        conn: &Connection,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<()> {
        let id = self.require_id()?;

        if self.status != PackageStatus::Draft {
            return Err(Error::Validation(format!(
                "package {} is {}; only draft packages are editable",
                self.uuid, self.status
            )));
        }

        if let Some(n) = name {
            conn.execute("UPDATE packages SET name = ?1 WHERE id = ?2", params![n, id])?;
            self.name = n.to_string();
        }
        if let Some(d) = description {
            conn.execute(
                "UPDATE packages SET description = ?1 WHERE id = ?2",
                params![d, id],
            )?;
            self.description = Some(d.to_string());
        }
        Ok(())
    }

    /// Recompute derived object_count/total_size from membership rows
    pub fn refresh_counts(&mut self, conn: &Connection) -> Result<()> {
        let id = self.require_id()?;

        let (count, size): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(file_size), 0) FROM package_objects WHERE package_id = ?1",
            [id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        conn.execute(
            "UPDATE packages SET object_count = ?1, total_size = ?2 WHERE id = ?3",
            params![count, size, id],
        )?;

        self.object_count = count;
        self.total_size = size;
        Ok(())
    }

    /// Delete this package. Callers enforce the draft-only rule.
    pub fn delete(&self, conn: &Connection) -> Result<()> {
        let id = self.require_id()?;
        conn.execute("DELETE FROM packages WHERE id = ?1", [id])?;
        Ok(())
    }

    fn require_id(&self) -> Result<i64> {
        self.id
            .ok_or_else(|| Error::Validation("package has no ID".to_string()))
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let type_str: String = row.get(4)?;
        let package_type = type_str
            .parse::<PackageType>()
            .map_err(|e| column_parse_error(4, e))?;

        let status_str: String = row.get(8)?;
        let status = status_str
            .parse::<PackageStatus>()
            .map_err(|e| column_parse_error(8, e))?;

        Ok(Self {
            id: Some(row.get(0)?),
            uuid: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            package_type,
            package_format: row.get(5)?,
            bagit_version: row.get(6)?,
            manifest_algorithm: row.get(7)?,
            status,
            object_count: row.get(9)?,
            total_size: row.get(10)?,
            package_checksum: row.get(11)?,
            source_path: row.get(12)?,
            export_path: row.get(13)?,
            originator: row.get(14)?,
            submission_agreement: row.get(15)?,
            retention_period: row.get(16)?,
            parent_package_id: row.get(17)?,
            created_by: row.get(18)?,
            created_at: row.get(19)?,
            built_at: row.get(20)?,
            validated_at: row.get(21)?,
            exported_at: row.get(22)?,
        })
    }
}
