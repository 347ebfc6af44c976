// src/commands/mod.rs
//! Command handlers for the custodia CLI

mod checksum;
mod fixity;
mod identify;
mod package;
mod scan;
mod schedule;
mod tick;

// Re-export all command handlers
pub use checksum::cmd_checksum;
pub use fixity::cmd_fixity;
pub use identify::cmd_identify;
pub use package::{
    cmd_package_add_object, cmd_package_build, cmd_package_convert, cmd_package_create,
    cmd_package_delete, cmd_package_export, cmd_package_list, cmd_package_remove_object,
    cmd_package_show, cmd_package_validate,
};
pub use scan::cmd_scan;
pub use schedule::{
    cmd_schedule_create, cmd_schedule_delete, cmd_schedule_list, cmd_schedule_run_now,
    cmd_schedule_runs, cmd_schedule_toggle,
};
pub use tick::cmd_tick;

use crate::cli::CommonArgs;
use crate::config::EngineConfig;
use crate::store::ObjectStore;
use anyhow::{Context, Result};
use rusqlite::Connection;
use std::time::Duration;

/// Shared handles every command needs
pub(crate) struct Engine {
    pub conn: Connection,
    pub config: EngineConfig,
    pub store: ObjectStore,
}

pub(crate) fn open_engine(common: &CommonArgs) -> Result<Engine> {
    let config = EngineConfig::load(common.config.as_deref())
        .context("Failed to load engine configuration")?;
    let conn =
        crate::db::open(&common.db_path).context("Failed to open engine database")?;
    let store = ObjectStore::from_config(&config);
    Ok(Engine {
        conn,
        config,
        store,
    })
}

/// Agent string recorded for CLI-triggered work
pub(crate) const CLI_AGENT: &str = "cli";

pub(crate) fn tool_timeout(config: &EngineConfig) -> Duration {
    Duration::from_secs(config.tool_timeout_secs)
}
