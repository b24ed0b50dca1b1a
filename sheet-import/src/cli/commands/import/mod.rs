mod handler;

pub use handler::handle_import_command;

use std::path::PathBuf;

use clap::Args;

use crate::transfer::{DateHint, ImportMode};

#[derive(Args, Debug)]
pub struct ImportCommands {
    /// Target schema (TOML)
    #[arg(short, long)]
    pub schema: PathBuf,

    /// Upload to import (xlsx, xls, ods or csv)
    #[arg(short, long)]
    pub file: PathBuf,

    /// SQLite URL; falls back to SHEET_IMPORT_DATABASE, then an in-memory rehearsal
    #[arg(long)]
    pub database: Option<String>,

    /// insert, upsert or update
    #[arg(long)]
    pub mode: Option<ImportMode>,

    /// Rows per bulk write
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Chunks written at once
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Day order of slash-separated dates: auto, dmy, mdy or ymd
    #[arg(long)]
    pub date_format: Option<DateHint>,

    /// Force a header onto a field, HEADER=FIELD (repeatable)
    #[arg(long = "map", value_name = "HEADER=FIELD", value_parser = crate::cli::parse_override)]
    pub overrides: Vec<(String, String)>,

    /// Continue when a required field has no confident column match
    #[arg(long)]
    pub accept_mapping_warnings: bool,

    /// Stop after validation; nothing is written
    #[arg(long)]
    pub dry_run: bool,

    /// Write a JSON report of the run
    #[arg(long)]
    pub report: Option<PathBuf>,
}
