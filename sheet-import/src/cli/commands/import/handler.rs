//! Import command handler

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use anyhow::{Context, Result};
use colored::*;
use serde::Serialize;
use uuid::Uuid;

use super::ImportCommands;
use crate::cli::commands::map::print_mapping_report;
use crate::config::ImportSettings;
use crate::error::ImportError;
use crate::schema::EntitySchema;
use crate::services::matching::MappingReport;
use crate::transfer::{
    BatchResult, ImportProgress, ImportSession, MemoryStorage, RowFailure, SqliteStorage, Storage,
    read_table_file,
};

/// JSON report written by `--report`
#[derive(Debug, Serialize)]
struct ImportReport<'a> {
    session_id: Uuid,
    schema: &'a str,
    file: String,
    mapping: &'a MappingReport,
    removed_rows: usize,
    invalid_rows: &'a [RowFailure],
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a BatchResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fatal_error: Option<String>,
}

pub async fn handle_import_command(args: ImportCommands, settings: &ImportSettings) -> Result<()> {
    let schema = EntitySchema::load(&args.schema)?;

    let mut options = settings.session_options();
    if let Some(mode) = args.mode {
        options.executor.mode = mode;
    }
    if let Some(chunk_size) = args.chunk_size {
        options.executor.chunk_size = chunk_size;
    }
    if let Some(concurrency) = args.concurrency {
        options.executor.max_concurrent_chunks = concurrency;
    }
    if let Some(hint) = args.date_format {
        options.date_hint = hint;
    }
    options.overrides.extend(args.overrides);
    options.accept_mapping_warnings = args.accept_mapping_warnings;
    options.executor.validate()?;

    let session = ImportSession::new(schema, options);
    let table = read_table_file(&args.file, &session.options().limits)?;

    println!(
        "Importing {} into {} ({} mode)",
        args.file.display().to_string().cyan(),
        session.schema().name.bright_green().bold(),
        session.options().executor.mode
    );
    println!();
    print_mapping_report(&session.map_headers(&table), session.schema());
    println!();

    let prepared = session.prepare(&table)?;
    print_invalid_rows(&prepared.invalid);
    println!(
        "{} valid, {} invalid, {} empty rows skipped",
        prepared.valid.len().to_string().green(),
        prepared.invalid.len().to_string().yellow(),
        prepared.removed_rows
    );

    let report = ImportReport {
        session_id: session.id(),
        schema: &session.schema().name,
        file: args.file.display().to_string(),
        mapping: &prepared.report,
        removed_rows: prepared.removed_rows,
        invalid_rows: &prepared.invalid,
        result: None,
        fatal_error: None,
    };

    if args.dry_run {
        println!("{}", "Dry run, nothing written".dimmed());
        if let Some(path) = &args.report {
            write_report(path, &report)?;
        }
        return Ok(());
    }

    let storage: Box<dyn Storage> = match args.database.or_else(ImportSettings::database_url) {
        Some(url) => Box::new(SqliteStorage::connect(&url, &session.schema().name).await?),
        None => {
            println!(
                "{}",
                "No database configured, rehearsing against in-memory storage".yellow()
            );
            Box::new(MemoryStorage::new())
        }
    };

    let cancel = Arc::new(AtomicBool::new(false));
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("Interrupt received, stopping after the current chunk");
                cancel.store(true, Ordering::SeqCst);
            }
        })
    };

    let observer = |progress: &ImportProgress| {
        println!(
            "  chunk {}/{}: {}/{} rows ({} created, {} updated, {} failed)",
            progress.chunks_done,
            progress.total_chunks,
            progress.rows_submitted,
            progress.total_rows,
            progress.created,
            progress.updated,
            progress.failed
        );
    };

    let start = Instant::now();
    let outcome = session
        .executor(&*storage)
        .with_observer(&observer)
        .with_cancel_flag(cancel)
        .run(&prepared.valid)
        .await;
    ctrl_c.abort();

    match outcome {
        Ok(result) => {
            println!();
            print_result(&result, prepared.valid.len(), start.elapsed().as_secs_f64());
            if let Some(path) = &args.report {
                let report = ImportReport {
                    result: Some(&result),
                    ..report
                };
                write_report(path, &report)?;
            }
            Ok(())
        }
        Err(ImportError::FatalStorage { message, partial }) => {
            if let Some(path) = &args.report {
                let report = ImportReport {
                    result: Some(&partial),
                    fatal_error: Some(message.clone()),
                    ..report
                };
                write_report(path, &report)?;
            }
            Err(ImportError::FatalStorage { message, partial }.into())
        }
        Err(other) => Err(other.into()),
    }
}

fn print_invalid_rows(invalid: &[RowFailure]) {
    if invalid.is_empty() {
        return;
    }
    println!("{}", "Rows skipped by validation:".yellow().bold());
    for failure in invalid {
        println!(
            "  row {}: {}",
            failure.row_number,
            failure.messages.join("; ")
        );
    }
    println!();
}

fn print_result(result: &BatchResult, total_rows: usize, seconds: f64) {
    println!(
        "{} created, {} updated, {} failed in {:.2}s",
        result.created.to_string().green().bold(),
        result.updated.to_string().cyan().bold(),
        result.failed.to_string().red().bold(),
        seconds
    );
    if result.has_failures() {
        println!("{}", "Rows rejected by storage:".red().bold());
    }
    for failure in &result.errors {
        println!(
            "  {} row {}: {}",
            "✗".red(),
            failure.row_number,
            failure.messages.join("; ")
        );
    }
    if result.cancelled {
        println!(
            "{}",
            format!(
                "Cancelled after {} of {} rows; the rest were not written",
                result.submitted, total_rows
            )
            .yellow()
        );
    }
}

fn write_report(path: &Path, report: &ImportReport<'_>) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize import report")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write report: {}", path.display()))?;
    println!("Report written to {}", path.display().to_string().cyan());
    Ok(())
}
