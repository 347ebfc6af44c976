// src/commands/checksum.rs
//! Checksum generation command

use super::open_engine;
use crate::cli::CommonArgs;
use crate::hash::HashAlgorithm;
use anyhow::Result;
use tracing::info;

/// Generate checksums for one digital object.
pub fn cmd_checksum(common: &CommonArgs, object_id: i64, algorithms: &str) -> Result<()> {
    let engine = open_engine(common)?;

    let algorithms = algorithms
        .split(',')
        .map(|s| s.trim().parse::<HashAlgorithm>())
        .collect::<crate::Result<Vec<_>>>()?;

    info!(object_id, ?algorithms, "generating checksums");
    let results = crate::checksum::generate(
        &engine.conn,
        &engine.store,
        object_id,
        &algorithms,
        &engine.config.agent,
    )?;

    println!("Checksums for object {object_id}:");
    for checksum in &results {
        println!("  {:8} {}", checksum.algorithm.name(), checksum.value);
    }
    Ok(())
}
