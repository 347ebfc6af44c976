// src/commands/package.rs
//! OAIS package management commands

use super::open_engine;
use crate::cli::CommonArgs;
use crate::db::models::{Package, PackageObject, PackageStatus, PackageType, PreservationEvent};
use crate::db::paths;
use crate::package::{self, ExportFormat, NewPackage};
use anyhow::{Context, Result};
use tracing::info;

pub fn cmd_package_create(
    common: &CommonArgs,
    name: &str,
    package_type: &str,
    description: Option<String>,
    algorithm: &str,
    originator: Option<String>,
    submission_agreement: Option<String>,
    retention_period: Option<String>,
) -> Result<()> {
    let engine = open_engine(common)?;

    let package_type = package_type
        .parse::<PackageType>()
        .map_err(anyhow::Error::msg)?;

    let package = package::create(
        &engine.conn,
        NewPackage {
            name: name.to_string(),
            description,
            package_type: Some(package_type),
            manifest_algorithm: Some(algorithm.to_string()),
            originator,
            submission_agreement,
            retention_period,
            ..Default::default()
        },
        &engine.config.agent,
    )?;

    println!("Created {} package {}", package.package_type, package.name);
    println!("  ID:        {}", package.id.unwrap_or(0));
    println!("  UUID:      {}", package.uuid);
    println!("  Algorithm: {}", package.manifest_algorithm);
    Ok(())
}

pub fn cmd_package_add_object(
    common: &CommonArgs,
    package_id: i64,
    object_id: i64,
    relative_path: Option<String>,
) -> Result<()> {
    let engine = open_engine(common)?;

    let member = package::add_object(
        &engine.conn,
        &engine.store,
        package_id,
        object_id,
        relative_path,
    )?;

    println!(
        "Added object {} to package {} as {}",
        object_id, package_id, member.relative_path
    );
    Ok(())
}

pub fn cmd_package_remove_object(
    common: &CommonArgs,
    package_id: i64,
    object_id: i64,
) -> Result<()> {
    let engine = open_engine(common)?;
    package::remove_object(&engine.conn, package_id, object_id)?;
    println!("Removed object {object_id} from package {package_id}");
    Ok(())
}

pub fn cmd_package_build(common: &CommonArgs, package_id: i64) -> Result<()> {
    let engine = open_engine(common)?;
    let base_dir = paths::packages_dir(&common.db_path);

    info!(package_id, "building package");
    let report = package::build(
        &engine.conn,
        &engine.store,
        &base_dir,
        package_id,
        &engine.config.agent,
    )?;

    println!("Package built successfully");
    println!("  Path:     {}", report.path.display());
    println!("  Files:    {}", report.files_copied);
    println!("  Size:     {}", package::format_bytes(report.total_size));
    println!("  Checksum: {}", report.package_checksum);
    Ok(())
}

pub fn cmd_package_validate(common: &CommonArgs, package_id: i64) -> Result<()> {
    let engine = open_engine(common)?;

    info!(package_id, "validating package");
    let report = package::validate(&engine.conn, package_id, &engine.config.agent)?;

    for warning in &report.warnings {
        println!("warning: {warning}");
    }

    if report.valid {
        println!(
            "Package {} is valid ({} file(s) verified)",
            package_id, report.files_verified
        );
        Ok(())
    } else {
        println!("Package {package_id} failed validation:");
        for error in &report.errors {
            println!("  {error}");
        }
        anyhow::bail!("{} validation error(s)", report.errors.len());
    }
}

pub fn cmd_package_export(common: &CommonArgs, package_id: i64, format: &str) -> Result<()> {
    let engine = open_engine(common)?;
    let format = format.parse::<ExportFormat>()?;
    let exports_dir = paths::exports_dir(&common.db_path);

    info!(package_id, %format, "exporting package");
    let report = package::export(
        &engine.conn,
        package_id,
        format,
        &exports_dir,
        &engine.config.agent,
    )?;

    println!("Package exported as {}", report.format);
    println!("  Path:     {}", report.path.display());
    println!("  Size:     {}", package::format_bytes(report.size));
    println!("  Checksum: {}", report.checksum);
    Ok(())
}

pub fn cmd_package_convert(
    common: &CommonArgs,
    package_id: i64,
    target: Option<&str>,
) -> Result<()> {
    let engine = open_engine(common)?;

    let source = Package::find_by_id(&engine.conn, package_id)?
        .with_context(|| format!("Package {package_id} not found"))?;

    let target_type = match target {
        Some(t) => t.parse::<PackageType>().map_err(anyhow::Error::msg)?,
        None => source
            .package_type
            .derives_into()
            .with_context(|| format!("a {} has no derived package type", source.package_type))?,
    };

    info!(package_id, target = target_type.as_str(), "converting package");
    let derived = package::convert(
        &engine.conn,
        package_id,
        target_type,
        None,
        &engine.config.agent,
    )?;

    println!(
        "Derived {} package from {} {}",
        derived.package_type, source.package_type, source.uuid
    );
    println!("  ID:      {}", derived.id.unwrap_or(0));
    println!("  UUID:    {}", derived.uuid);
    println!("  Objects: {}", derived.object_count);
    println!("  Status:  {}", derived.status);
    Ok(())
}

pub fn cmd_package_delete(common: &CommonArgs, package_id: i64) -> Result<()> {
    let engine = open_engine(common)?;
    package::delete(&engine.conn, package_id)?;
    println!("Deleted package {package_id}");
    Ok(())
}

pub fn cmd_package_list(
    common: &CommonArgs,
    package_type: Option<&str>,
    status: Option<&str>,
    limit: i64,
) -> Result<()> {
    let engine = open_engine(common)?;

    let package_type = package_type
        .map(|t| t.parse::<PackageType>().map_err(anyhow::Error::msg))
        .transpose()?;
    let status = status
        .map(|s| s.parse::<PackageStatus>().map_err(anyhow::Error::msg))
        .transpose()?;

    let packages = Package::list(&engine.conn, package_type, status, limit)?;
    if packages.is_empty() {
        println!("No packages found.");
        return Ok(());
    }

    println!(
        "{:>6}  {:4}  {:10}  {:>7}  {:>10}  NAME",
        "ID", "TYPE", "STATUS", "OBJECTS", "SIZE"
    );
    println!("{}", "-".repeat(70));
    for p in &packages {
        println!(
            "{:>6}  {:4}  {:10}  {:>7}  {:>10}  {}",
            p.id.unwrap_or(0),
            p.package_type.as_str(),
            p.status.as_str(),
            p.object_count,
            package::format_bytes(p.total_size),
            p.name
        );
    }
    println!();
    println!("Total: {} package(s)", packages.len());
    Ok(())
}

pub fn cmd_package_show(common: &CommonArgs, package_id: i64) -> Result<()> {
    let engine = open_engine(common)?;

    let package = Package::find_by_id(&engine.conn, package_id)?
        .with_context(|| format!("Package {package_id} not found"))?;

    println!("Package {}", package.id.unwrap_or(0));
    println!("{}", "=".repeat(40));
    println!("Name:        {}", package.name);
    println!("UUID:        {}", package.uuid);
    println!("Type:        {}", package.package_type);
    println!("Status:      {}", package.status);
    println!("Format:      {} {}", package.package_format, package.bagit_version);
    println!("Algorithm:   {}", package.manifest_algorithm);
    println!("Objects:     {}", package.object_count);
    println!("Size:        {}", package::format_bytes(package.total_size));
    if let Some(desc) = &package.description {
        println!("Description: {desc}");
    }
    if let Some(originator) = &package.originator {
        println!("Originator:  {originator}");
    }
    if let Some(parent) = package.parent_package_id {
        println!("Parent:      {parent}");
    }
    if let Some(checksum) = &package.package_checksum {
        println!("Checksum:    {checksum}");
    }
    if let Some(path) = &package.source_path {
        println!("Built tree:  {path}");
    }
    if let Some(path) = &package.export_path {
        println!("Export:      {path}");
    }
    println!("Created:     {}", package.created_at);
    if let Some(at) = &package.built_at {
        println!("Built:       {at}");
    }
    if let Some(at) = &package.validated_at {
        println!("Validated:   {at}");
    }
    if let Some(at) = &package.exported_at {
        println!("Exported:    {at}");
    }

    let children = Package::find_children(&engine.conn, package_id)?;
    if !children.is_empty() {
        println!("\nDerived packages:");
        for child in &children {
            println!(
                "  {:>6}  {:4}  {:10}  {}",
                child.id.unwrap_or(0),
                child.package_type.as_str(),
                child.status.as_str(),
                child.name
            );
        }
    }

    let members = PackageObject::list_for_package(&engine.conn, package_id)?;
    if !members.is_empty() {
        println!("\nObjects ({}):", members.len());
        for m in &members {
            println!(
                "  {:>6}  {:>10}  {}",
                m.object_id,
                package::format_bytes(m.file_size),
                m.relative_path
            );
        }
    }

    let events = PreservationEvent::list_for_package(&engine.conn, package_id, 10)?;
    if !events.is_empty() {
        println!("\nRecent events:");
        for e in &events {
            println!(
                "  {}  {:22}  {:7}  {}",
                e.event_datetime,
                e.event_type.as_str(),
                e.event_outcome.as_str(),
                e.event_detail
            );
        }
    }

    Ok(())
}
