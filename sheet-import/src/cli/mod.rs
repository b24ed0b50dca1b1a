//! Command-line interface

pub mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::ImportSettings;
use commands::import::{ImportCommands, handle_import_command};
use commands::map::{MapCommands, handle_map_command};

#[derive(Parser)]
#[command(name = "sheet-import")]
#[command(about = "Reconcile spreadsheet uploads against a record schema")]
#[command(version)]
pub struct Cli {
    /// Settings file (defaults to <config dir>/sheet-import/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show how the upload's headers map onto the schema
    Map(MapCommands),
    /// Validate an upload and write its rows to storage
    Import(ImportCommands),
}

pub async fn run(cli: Cli) -> Result<()> {
    if cli.no_color {
        colored::control::set_override(false);
    }

    let settings = ImportSettings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Map(args) => handle_map_command(args, &settings),
        Commands::Import(args) => handle_import_command(args, &settings).await,
    }
}

/// Parse a `HEADER=FIELD` override
pub(crate) fn parse_override(raw: &str) -> Result<(String, String), String> {
    let (header, field) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected HEADER=FIELD, got '{}'", raw))?;
    let (header, field) = (header.trim(), field.trim());
    if header.is_empty() || field.is_empty() {
        return Err(format!("expected HEADER=FIELD, got '{}'", raw));
    }
    Ok((header.to_string(), field.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::{DateHint, ImportMode};

    #[test]
    fn test_parse_override() {
        assert_eq!(
            parse_override("Vị trí = tt").unwrap(),
            ("Vị trí".to_string(), "tt".to_string())
        );
        assert!(parse_override("no-equals").is_err());
        assert!(parse_override("=tt").is_err());
    }

    #[test]
    fn test_import_arguments() {
        let cli = Cli::try_parse_from([
            "sheet-import",
            "-vv",
            "import",
            "--schema",
            "schemas/nguoi_than.toml",
            "--file",
            "relatives.xlsx",
            "--mode",
            "upsert",
            "--date-format",
            "dd/mm/yyyy",
            "--map",
            "SĐT người thân=so_dien_thoai",
            "--dry-run",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        let Commands::Import(args) = cli.command else {
            panic!("expected import command");
        };
        assert_eq!(args.mode, Some(ImportMode::Upsert));
        assert_eq!(args.date_format, Some(DateHint::Dmy));
        assert_eq!(
            args.overrides,
            vec![("SĐT người thân".to_string(), "so_dien_thoai".to_string())]
        );
        assert!(args.dry_run);
    }

    #[test]
    fn test_bad_mode_rejected() {
        assert!(
            Cli::try_parse_from([
                "sheet-import",
                "import",
                "-s",
                "a.toml",
                "-f",
                "b.csv",
                "--mode",
                "merge"
            ])
            .is_err()
        );
    }
}
