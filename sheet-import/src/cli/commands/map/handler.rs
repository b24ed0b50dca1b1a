//! Map command handler

use anyhow::{Context, Result};
use colored::*;

use super::MapCommands;
use crate::config::ImportSettings;
use crate::schema::EntitySchema;
use crate::services::matching::{MappingReport, MatchType};
use crate::transfer::{ImportSession, read_table_file};

pub fn handle_map_command(args: MapCommands, settings: &ImportSettings) -> Result<()> {
    let schema = EntitySchema::load(&args.schema)?;

    let mut options = settings.session_options();
    options.overrides.extend(args.overrides);
    let session = ImportSession::new(schema, options);

    let table = read_table_file(&args.file, &session.options().limits)?;
    let report = session.map_headers(&table);

    if args.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize mapping report")?;
        println!("{}", json);
        return Ok(());
    }

    println!(
        "Mapping {} onto {}",
        args.file.display().to_string().cyan(),
        session.schema().name.bright_green().bold()
    );
    println!();
    print_mapping_report(&report, session.schema());
    Ok(())
}

/// Mapped columns, review candidates, leftovers and missing required fields
pub fn print_mapping_report(report: &MappingReport, schema: &EntitySchema) {
    for column in &report.mapping.columns {
        let label = column.info.match_type.label();
        let label = match column.info.match_type {
            MatchType::Exact | MatchType::Manual => label.green(),
            MatchType::Substring => label.cyan(),
            MatchType::Fuzzy => label.yellow(),
        };
        let field_type = schema
            .field(&column.info.field)
            .map(|f| f.field_type.label())
            .unwrap_or("?");
        println!(
            "  {} {} {} {} {} ({:.2})",
            column.header.bold(),
            "->".dimmed(),
            column.info.field,
            format!("<{}>", field_type).dimmed(),
            label,
            column.info.score
        );
    }

    for candidate in &report.low_confidence {
        println!(
            "  {} {} {} {} ({:.2})",
            candidate.header.bold(),
            "~>".dimmed(),
            candidate.field,
            "[Possible]".yellow(),
            candidate.score
        );
    }

    let leftover: Vec<&String> = report
        .unmapped_headers
        .iter()
        .filter(|h| !report.low_confidence.iter().any(|c| &c.header == *h))
        .collect();
    if !leftover.is_empty() {
        println!();
        println!("{}", "Ignored columns:".dimmed());
        for header in leftover {
            println!("  {}", header.dimmed());
        }
    }

    let ambiguities = report.ambiguities(schema);
    if !ambiguities.is_empty() {
        println!();
        println!("{}", "Required fields without a confident match:".red().bold());
        for ambiguity in ambiguities {
            println!("  {}", ambiguity.to_string().red());
        }
    }
}
