//! Import command handler

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result, bail};
use colored::*;
use is_terminal::IsTerminal;
use tokio::sync::mpsc;

use crate::cli::ImportArgs;
use crate::config::Config;
use crate::import::{
    ClusterSchema, IdentityGroupSchema, ImportContext, ImportKind, ImportOptions, ImportOutcome, ImportReport,
    MigrationSchema, PackagingSchema, PersonnelSchema, Progress, ProgressReporter, Schema, TestingSchema, run_import,
};
use crate::store::{
    BatchProgress, MemoryStore, RecordStore, SqliteStore, StorableRecord, persist_in_batches,
};

/// Handle `migtrack import`
pub async fn handle_import_command(args: ImportArgs, config: &Config) -> Result<()> {
    if args.no_color {
        colored::control::set_override(false);
    }

    if !args.file.exists() {
        bail!("Workbook does not exist: {}", args.file.display());
    }

    let batch_size = args.batch_size.unwrap_or(config.batch_size);
    if batch_size == 0 {
        bail!("--batch-size must be at least 1");
    }

    match args.kind {
        ImportKind::IdentityGroup => run::<IdentityGroupSchema>(&args, config, batch_size).await,
        ImportKind::Personnel => run::<PersonnelSchema>(&args, config, batch_size).await,
        ImportKind::Packaging => run::<PackagingSchema>(&args, config, batch_size).await,
        ImportKind::Testing => run::<TestingSchema>(&args, config, batch_size).await,
        ImportKind::Migration => run::<MigrationSchema>(&args, config, batch_size).await,
        ImportKind::Cluster => run::<ClusterSchema>(&args, config, batch_size).await,
    }
}

async fn run<S: Schema>(args: &ImportArgs, config: &Config, batch_size: usize) -> Result<()> {
    let interactive = !args.json && std::io::stderr().is_terminal();

    let cancel_flag = Arc::new(AtomicBool::new(false));
    let (tx, rx) = mpsc::channel::<Progress>(64);
    let ctx = ImportContext::new(ProgressReporter::new(tx), cancel_flag.clone());

    // Ctrl-C requests a cooperative stop; the partial report is still printed
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_flag.store(true, Ordering::Relaxed);
            eprintln!("\n{}", "Cancelling import...".yellow());
        }
    });
    let renderer = tokio::spawn(render_import_progress(rx, interactive));

    let options = ImportOptions {
        sheet: args.sheet.clone(),
        progress_interval: config.progress_interval,
    };
    let result = run_import::<S>(&args.file, &options, &ctx).await;

    drop(ctx);
    interrupt.abort();
    let _ = renderer.await;

    let report = match result {
        Ok(report) => report,
        Err(err) => {
            if err.is_structural() {
                eprintln!(
                    "{} the sheet needs a data-start marker row (e.g. '=== DATA STARTS BELOW ===') with the {} header row below it",
                    "Hint:".yellow().bold(),
                    args.kind.label()
                );
            }
            return Err(err).with_context(|| format!("Failed to import {}", args.file.display()));
        }
    };

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize import report")?
        );
    } else {
        print_summary(&report, args);
    }

    if !(args.commit || args.dry_run) {
        return Ok(());
    }

    if report.is_cancelled() {
        println!("{}", "Import was cancelled; nothing was saved.".yellow());
        return Ok(());
    }

    let records = report.valid_records();
    if records.is_empty() {
        println!("{}", "No valid rows to save.".yellow());
        return Ok(());
    }

    if args.dry_run {
        let store = MemoryStore::new();
        commit(&store, &records, batch_size, interactive, "in-memory store (dry run)").await
    } else {
        let store = SqliteStore::open(&config.database_path)
            .await
            .with_context(|| format!("Failed to open database {}", config.database_path.display()))?;
        let target = config.database_path.display().to_string();
        commit(&store, &records, batch_size, interactive, &target).await
    }
}

async fn commit<T: StorableRecord>(
    store: &dyn RecordStore,
    records: &[T],
    batch_size: usize,
    interactive: bool,
    target: &str,
) -> Result<()> {
    let (tx, rx) = mpsc::channel::<BatchProgress>(64);
    let renderer = tokio::spawn(render_batch_progress(rx, interactive));

    let result = persist_in_batches(store, records, batch_size, Some(&tx)).await;
    drop(tx);
    let _ = renderer.await;

    match result {
        Ok(report) => {
            println!(
                "{} Saved {} record(s) to {} ({} already present, {} batch(es))",
                "✓".bright_green().bold(),
                report.saved.to_string().bright_green(),
                target.cyan(),
                report.skipped,
                report.batch_count
            );
            Ok(())
        }
        Err(err) => {
            println!(
                "{} {} of {} batch(es) committed before the failure ({} saved, {} skipped)",
                "✗".bright_red().bold(),
                err.batches_committed,
                err.batch_count,
                err.saved,
                err.skipped
            );
            Err(err).context("Failed to save records")
        }
    }
}

async fn render_import_progress(mut rx: mpsc::Receiver<Progress>, interactive: bool) {
    let mut drawn = false;
    while let Some(update) = rx.recv().await {
        if interactive {
            let mut stderr = std::io::stderr();
            let _ = write!(
                stderr,
                "\r\x1b[2K{:>5.1}% {}",
                update.fraction * 100.0,
                update.description
            );
            let _ = stderr.flush();
            drawn = true;
        } else {
            log::info!("[{:>5.1}%] {}", update.fraction * 100.0, update.description);
        }
    }
    if drawn {
        eprintln!();
    }
}

async fn render_batch_progress(mut rx: mpsc::Receiver<BatchProgress>, interactive: bool) {
    let mut drawn = false;
    while let Some(update) = rx.recv().await {
        if interactive {
            let mut stderr = std::io::stderr();
            let _ = write!(stderr, "\r\x1b[2K{:>5.1}% {}", update.fraction * 100.0, update.description);
            let _ = stderr.flush();
            drawn = true;
        } else {
            log::info!("{}", update.description);
        }
    }
    if drawn {
        eprintln!();
    }
}

fn print_summary<T>(report: &ImportReport<T>, args: &ImportArgs) {
    println!(
        "{} {} from {}",
        "Import".bold(),
        report.kind.label().cyan(),
        args.file.display().to_string().cyan()
    );
    if let Some(sheet) = &report.sheet_name {
        let rows = match (report.sentinel_row, report.header_row) {
            (Some(sentinel), Some(header)) => format!(" (marker row {}, header row {})", sentinel + 1, header + 1),
            _ => String::new(),
        };
        println!("  Sheet: {}{}", sheet, rows.dimmed());
    }
    println!("  Import set: {}", report.stamp.import_set.dimmed());
    println!();

    let flagged = report.valid.iter().filter(|row| !row.flags.is_empty()).count();
    println!("  {:<12}{}", "Valid:", report.valid.len().to_string().bright_green().bold());
    println!("  {:<12}{}", "Invalid:", colour_count(report.invalid.len(), Color::BrightRed));
    println!("  {:<12}{}", "Duplicate:", colour_count(report.duplicates.len(), Color::Yellow));
    if flagged > 0 {
        println!("  {:<12}{}", "Flagged:", flagged.to_string().yellow());
    }

    match report.outcome {
        ImportOutcome::Completed => println!("  {:<12}{}", "Outcome:", "completed".bright_green()),
        ImportOutcome::Cancelled { rows_decoded } => println!(
            "  {:<12}{}",
            "Outcome:",
            format!("cancelled after {} row(s)", rows_decoded).yellow()
        ),
    }

    if args.show_invalid {
        if !report.invalid.is_empty() {
            println!();
            println!("{}", "Invalid rows:".bright_red().bold());
            for row in &report.invalid {
                println!("  row {}: {}", row.row_index + 1, row.violations.join("; "));
                for flag in &row.flags {
                    println!("    {}", flag.dimmed());
                }
            }
        }
        if flagged > 0 {
            println!();
            println!("{}", "Flagged rows:".yellow().bold());
            for row in report.valid.iter().filter(|row| !row.flags.is_empty()) {
                println!("  row {}: {}", row.row_index + 1, row.flags.join("; "));
            }
        }
    }

    if args.show_duplicates && !report.duplicates.is_empty() {
        println!();
        println!("{}", "Duplicate rows:".yellow().bold());
        for row in &report.duplicates {
            println!("  {}", row.message());
            for flag in &row.flags {
                println!("    {}", flag.dimmed());
            }
        }
    }
}

fn colour_count(count: usize, colour: Color) -> ColoredString {
    if count == 0 {
        count.to_string().normal()
    } else {
        count.to_string().color(colour).bold()
    }
}
