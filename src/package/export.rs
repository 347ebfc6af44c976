// src/package/export.rs

//! Package export.
//!
//! Serializes a built tree into a zip, tar, or tar.gz archive under the
//! exports directory. The archive contains the tree under a top-level
//! directory named after the package UUID, and the archive itself is
//! digested with the package's manifest algorithm.

use crate::db::models::{
    EventOutcome, EventType, Package, PackageStatus, PreservationEvent,
};
use crate::error::{Error, Result};
use crate::hash::{self, HashAlgorithm};
use crate::package::format_bytes;
use flate2::Compression;
use flate2::write::GzEncoder;
use rusqlite::Connection;
use std::fmt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;
use walkdir::WalkDir;
use zip::ZipWriter;
use zip::write::FileOptions;

/// Supported archive formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Zip,
    Tar,
    TarGz,
}

impl ExportFormat {
    /// File extension for the exported archive
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Zip => "zip",
            ExportFormat::Tar => "tar",
            ExportFormat::TarGz => "tar.gz",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "zip" => Ok(ExportFormat::Zip),
            "tar" => Ok(ExportFormat::Tar),
            "tar.gz" | "targz" | "tgz" => Ok(ExportFormat::TarGz),
            _ => Err(Error::Validation(format!("unsupported export format: {s}"))),
        }
    }
}

/// Outcome of a successful export
#[derive(Debug)]
pub struct ExportReport {
    pub path: PathBuf,
    pub format: ExportFormat,
    pub size: i64,
    pub checksum: String,
}

/// Export a built (and optionally validated) package.
pub fn export(
    conn: &Connection,
    package_id: i64,
    format: ExportFormat,
    exports_dir: &Path,
    agent: &str,
) -> Result<ExportReport> {
    let mut package = Package::find_by_id(conn, package_id)?
        .ok_or_else(|| Error::NotFound(format!("package {package_id}")))?;

    if !matches!(
        package.status,
        PackageStatus::Complete | PackageStatus::Validated
    ) {
        return Err(Error::Validation(format!(
            "package must be built before export (package is {})",
            package.status
        )));
    }

    let source_path = package
        .source_path
        .clone()
        .ok_or_else(|| Error::Validation("package has no built tree".to_string()))?;
    let source_dir = PathBuf::from(&source_path);
    if !source_dir.is_dir() {
        return Err(Error::Validation(format!(
            "built tree missing: {source_path}"
        )));
    }

    std::fs::create_dir_all(exports_dir)?;
    let export_path = exports_dir.join(format!("{}.{}", package.uuid, format.extension()));

    let archive_result = match format {
        ExportFormat::Zip => write_zip(&source_dir, &export_path, &package.uuid),
        ExportFormat::Tar => write_tar(&source_dir, &export_path, &package.uuid),
        ExportFormat::TarGz => write_tar_gz(&source_dir, &export_path, &package.uuid),
    };

    if let Err(e) = archive_result {
        let _ = std::fs::remove_file(&export_path);
        PreservationEvent::package(
            package_id,
            EventType::PackageExport,
            format!("Export to {format} failed"),
            EventOutcome::Failure,
            agent,
        )
        .with_outcome_detail(e.to_string())
        .insert(conn)?;
        return Err(e);
    }

    let algorithm = package.manifest_algorithm.parse::<HashAlgorithm>()?;
    let checksum = hash::hash_file(algorithm, &export_path)?;
    let size = export_path.metadata()?.len() as i64;

    package.set_exported(conn, &export_path.to_string_lossy())?;

    PreservationEvent::package(
        package_id,
        EventType::PackageExport,
        format!("Exported to {format}: {}", format_bytes(size)),
        EventOutcome::Success,
        agent,
    )
    .insert(conn)?;

    info!(package_id, path = %export_path.display(), "package exported");
    Ok(ExportReport {
        path: export_path,
        format,
        size,
        checksum,
    })
}

/// Walk the built tree, yielding (absolute, archive-relative) pairs
fn tree_entries(source_dir: &Path, prefix: &str) -> Result<Vec<(PathBuf, String)>> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(source_dir).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::Io(io::Error::other(e)))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(source_dir)
            .map_err(|e| Error::Io(io::Error::other(e)))?;
        entries.push((
            entry.path().to_path_buf(),
            format!("{prefix}/{}", relative.to_string_lossy()),
        ));
    }
    Ok(entries)
}

fn write_zip(source_dir: &Path, dest: &Path, prefix: &str) -> Result<()> {
    let file = File::create(dest)?;
    let mut writer = ZipWriter::new(file);
    let options: FileOptions =
        FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for (absolute, name) in tree_entries(source_dir, prefix)? {
        writer
            .start_file(name, options)
            .map_err(|e| Error::Io(io::Error::other(e)))?;
        let mut input = File::open(absolute)?;
        io::copy(&mut input, &mut writer)?;
    }

    writer
        .finish()
        .map_err(|e| Error::Io(io::Error::other(e)))?;
    Ok(())
}

fn write_tar(source_dir: &Path, dest: &Path, prefix: &str) -> Result<()> {
    let file = File::create(dest)?;
    let mut builder = tar::Builder::new(file);
    builder.append_dir_all(prefix, source_dir)?;
    builder.finish()?;
    Ok(())
}

fn write_tar_gz(source_dir: &Path, dest: &Path, prefix: &str) -> Result<()> {
    let file = File::create(dest)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.append_dir_all(prefix, source_dir)?;
    builder.into_inner()?.finish()?;
    Ok(())
}
