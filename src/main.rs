// src/main.rs

use anyhow::Result;
use clap::Parser;
use custodia::cli::{Cli, Commands, PackageCommands, ScheduleCommands};
use custodia::commands;
use tracing::info;

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Init { common }) => {
            info!("Initializing engine database at: {}", common.db_path);
            custodia::db::init(&common.db_path)?;
            println!("Database initialized successfully at: {}", common.db_path);
            Ok(())
        }
        Some(Commands::Fixity {
            common,
            batch,
            stale_days,
        }) => commands::cmd_fixity(&common, &batch, stale_days),
        Some(Commands::Checksum {
            common,
            object_id,
            algorithms,
        }) => commands::cmd_checksum(&common, object_id, &algorithms),
        Some(Commands::Identify {
            common,
            batch,
            reidentify,
        }) => commands::cmd_identify(&common, &batch, reidentify),
        Some(Commands::Scan { common, batch }) => commands::cmd_scan(&common, &batch),
        Some(Commands::Package { common, command }) => match command {
            PackageCommands::Create {
                name,
                package_type,
                description,
                algorithm,
                originator,
                submission_agreement,
                retention_period,
            } => commands::cmd_package_create(
                &common,
                &name,
                &package_type,
                description,
                &algorithm,
                originator,
                submission_agreement,
                retention_period,
            ),
            PackageCommands::AddObject {
                package_id,
                object_id,
                relative_path,
            } => commands::cmd_package_add_object(&common, package_id, object_id, relative_path),
            PackageCommands::RemoveObject {
                package_id,
                object_id,
            } => commands::cmd_package_remove_object(&common, package_id, object_id),
            PackageCommands::Build { package_id } => {
                commands::cmd_package_build(&common, package_id)
            }
            PackageCommands::Validate { package_id } => {
                commands::cmd_package_validate(&common, package_id)
            }
            PackageCommands::Export { package_id, format } => {
                commands::cmd_package_export(&common, package_id, &format)
            }
            PackageCommands::Convert { package_id, target } => {
                commands::cmd_package_convert(&common, package_id, target.as_deref())
            }
            PackageCommands::Delete { package_id } => {
                commands::cmd_package_delete(&common, package_id)
            }
            PackageCommands::List {
                package_type,
                status,
                limit,
            } => commands::cmd_package_list(&common, package_type.as_deref(), status.as_deref(), limit),
            PackageCommands::Show { package_id } => {
                commands::cmd_package_show(&common, package_id)
            }
        },
        Some(Commands::Schedule { common, command }) => match command {
            ScheduleCommands::Create {
                name,
                workflow,
                cron,
                description,
                batch_limit,
                timeout_minutes,
                notify_email,
                disabled,
            } => commands::cmd_schedule_create(
                &common,
                &name,
                &workflow,
                &cron,
                description,
                batch_limit,
                timeout_minutes,
                notify_email,
                disabled,
            ),
            ScheduleCommands::List => commands::cmd_schedule_list(&common),
            ScheduleCommands::Toggle { schedule_id } => {
                commands::cmd_schedule_toggle(&common, schedule_id)
            }
            ScheduleCommands::RunNow { schedule_id } => {
                commands::cmd_schedule_run_now(&common, schedule_id)
            }
            ScheduleCommands::Delete { schedule_id } => {
                commands::cmd_schedule_delete(&common, schedule_id)
            }
            ScheduleCommands::Runs { schedule_id, limit } => {
                commands::cmd_schedule_runs(&common, schedule_id, limit)
            }
        },
        Some(Commands::Tick { common }) => commands::cmd_tick(&common),
        None => {
            // No command provided, show help
            println!("Custodia Preservation Engine v{}", env!("CARGO_PKG_VERSION"));
            println!("Run 'custodia --help' for usage information");
            Ok(())
        }
    }
}
