// src/cli.rs
//! CLI definitions for the preservation engine
//!
//! This module contains all command-line interface definitions using
//! clap. The actual command implementations are in the `commands`
//! module.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Default database location
pub const DEFAULT_DB_PATH: &str = "/var/lib/custodia/custodia.db";

#[derive(Parser)]
#[command(name = "custodia")]
#[command(author = "Custodia Project")]
#[command(version)]
#[command(about = "Digital preservation workflow engine", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Options shared by every command
#[derive(Args)]
pub struct CommonArgs {
    /// Path to the database file
    #[arg(short, long, default_value = DEFAULT_DB_PATH)]
    pub db_path: String,

    /// Path to the engine config file
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Options shared by the batch workflow commands
#[derive(Args)]
pub struct BatchArgs {
    /// Show a status summary instead of running
    #[arg(long)]
    pub status: bool,

    /// Select objects without executing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Maximum number of objects to process
    #[arg(long, default_value_t = 100)]
    pub limit: i64,

    /// Process a single object by id
    #[arg(long)]
    pub object_id: Option<i64>,

    /// Ignore the staleness / already-processed filter
    #[arg(long)]
    pub all: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the engine database
    Init {
        #[command(flatten)]
        common: CommonArgs,
    },

    /// Verify file integrity using checksums
    Fixity {
        #[command(flatten)]
        common: CommonArgs,

        #[command(flatten)]
        batch: BatchArgs,

        /// Staleness window in days (overrides config)
        #[arg(long)]
        stale_days: Option<i64>,
    },

    /// Generate checksums for a digital object
    Checksum {
        #[command(flatten)]
        common: CommonArgs,

        /// Digital object to digest
        #[arg(long)]
        object_id: i64,

        /// Comma-separated algorithms (md5, sha1, sha256, sha512)
        #[arg(long, default_value = "sha256")]
        algorithms: String,
    },

    /// Identify file formats using the external signature matcher
    Identify {
        #[command(flatten)]
        common: CommonArgs,

        #[command(flatten)]
        batch: BatchArgs,

        /// Re-identify even when an identification exists
        #[arg(long)]
        reidentify: bool,
    },

    /// Scan files for malware using the external antivirus engine
    Scan {
        #[command(flatten)]
        common: CommonArgs,

        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Manage OAIS packages
    Package {
        #[command(flatten)]
        common: CommonArgs,

        #[command(subcommand)]
        command: PackageCommands,
    },

    /// Manage workflow schedules
    Schedule {
        #[command(flatten)]
        common: CommonArgs,

        #[command(subcommand)]
        command: ScheduleCommands,
    },

    /// Run one scheduler pass over all due schedules
    ///
    /// Intended to be invoked every minute from an external cron entry.
    Tick {
        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Subcommand)]
pub enum PackageCommands {
    /// Create a new draft package
    Create {
        /// Package name
        name: String,

        /// Package type: sip, aip, or dip
        #[arg(long, default_value = "sip")]
        package_type: String,

        #[arg(long)]
        description: Option<String>,

        /// Manifest algorithm (md5, sha1, sha256, sha512)
        #[arg(long, default_value = "sha256")]
        algorithm: String,

        #[arg(long)]
        originator: Option<String>,

        #[arg(long)]
        submission_agreement: Option<String>,

        #[arg(long)]
        retention_period: Option<String>,
    },

    /// Add a digital object to a draft package
    AddObject {
        package_id: i64,
        object_id: i64,

        /// Path inside the bag (default: data/<filename>)
        #[arg(long)]
        relative_path: Option<String>,
    },

    /// Remove an object from a draft package
    RemoveObject { package_id: i64, object_id: i64 },

    /// Build a draft package into a BagIt tree
    Build { package_id: i64 },

    /// Validate a built package against its manifests
    Validate { package_id: i64 },

    /// Export a built package as an archive
    Export {
        package_id: i64,

        /// Archive format: zip, tar, or tar.gz
        #[arg(long, default_value = "zip")]
        format: String,
    },

    /// Derive the next package type (sip->aip, aip->dip)
    Convert {
        package_id: i64,

        /// Target type; defaults to the next in the chain
        #[arg(long)]
        target: Option<String>,
    },

    /// Delete a draft package
    Delete { package_id: i64 },

    /// List packages
    List {
        /// Filter by type: sip, aip, dip
        #[arg(long)]
        package_type: Option<String>,

        /// Filter by status
        #[arg(long)]
        status: Option<String>,

        #[arg(long, default_value_t = 50)]
        limit: i64,
    },

    /// Show one package with its objects and recent events
    Show { package_id: i64 },
}

#[derive(Subcommand)]
pub enum ScheduleCommands {
    /// Create a workflow schedule
    Create {
        /// Schedule name
        name: String,

        /// Workflow type: fixity_check, format_identification,
        /// virus_scan, package_conversion, replication
        #[arg(long)]
        workflow: String,

        /// Five-field cron expression, e.g. "0 2 * * *"
        #[arg(long)]
        cron: String,

        #[arg(long)]
        description: Option<String>,

        #[arg(long, default_value_t = 100)]
        batch_limit: i64,

        #[arg(long, default_value_t = 60)]
        timeout_minutes: i64,

        /// Email to notify on failed or timed-out runs
        #[arg(long)]
        notify_email: Option<String>,

        /// Create the schedule disabled
        #[arg(long)]
        disabled: bool,
    },

    /// List schedules
    List,

    /// Enable or disable a schedule
    Toggle { schedule_id: i64 },

    /// Trigger a schedule immediately, bypassing the cron clock
    RunNow { schedule_id: i64 },

    /// Delete a schedule and its run history
    Delete { schedule_id: i64 },

    /// Show recent runs, optionally for one schedule
    Runs {
        #[arg(long)]
        schedule_id: Option<i64>,

        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
}
