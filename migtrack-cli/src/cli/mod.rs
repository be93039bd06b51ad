//! Command-line surface

pub mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand};

use crate::config::Config;
use crate::import::ImportKind;

#[derive(Debug, Parser)]
#[command(name = "migtrack", version, about = "Import and validate migration-tracking workbooks")]
pub struct Cli {
    /// Increase log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// SQLite database for committed records (overrides config and MIGTRACK_DB)
    #[arg(long, global = true, value_name = "PATH")]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Import a workbook, report valid/invalid/duplicate rows and optionally commit
    Import(ImportArgs),
    /// Print stored records as JSON lines
    Records(RecordsArgs),
    /// Delete stored records of one type
    Clear(ClearArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ImportArgs {
    /// Workbook to import (.xlsx, .xlsm, .xls, .xlsb, .ods)
    pub file: PathBuf,

    /// Which record type the workbook holds
    #[arg(short, long, value_enum)]
    pub kind: ImportKind,

    /// Worksheet name (defaults to the first sheet)
    #[arg(long)]
    pub sheet: Option<String>,

    /// Save the valid rows to the database
    #[arg(long, conflicts_with = "dry_run")]
    pub commit: bool,

    /// Run the batched save against an in-memory store instead of the database
    #[arg(long)]
    pub dry_run: bool,

    /// Records per save batch (overrides config)
    #[arg(long, value_name = "N")]
    pub batch_size: Option<usize>,

    /// List invalid and flagged rows
    #[arg(long)]
    pub show_invalid: bool,

    /// List duplicate rows
    #[arg(long)]
    pub show_duplicates: bool,

    /// Print the full report as JSON
    #[arg(long)]
    pub json: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

#[derive(Debug, Clone, Args)]
pub struct RecordsArgs {
    #[arg(value_enum)]
    pub kind: ImportKind,

    /// Maximum number of records to print
    #[arg(long, value_name = "N")]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Args)]
pub struct ClearArgs {
    #[arg(value_enum)]
    pub kind: ImportKind,

    /// Confirm deletion
    #[arg(short, long)]
    pub yes: bool,
}

/// Apply global flags to the loaded config and dispatch
pub async fn run(cli: Cli, mut config: Config) -> Result<()> {
    if let Some(database) = cli.database {
        config.database_path = database;
    }

    match cli.command {
        Commands::Import(args) => commands::import::handle_import_command(args, &config).await,
        Commands::Records(args) => commands::records::handle_records_command(args, &config).await,
        Commands::Clear(args) => commands::records::handle_clear_command(args, &config).await,
    }
}
