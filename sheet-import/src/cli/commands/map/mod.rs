mod handler;

pub use handler::{handle_map_command, print_mapping_report};

use std::path::PathBuf;

use clap::Args;

#[derive(Args, Debug)]
pub struct MapCommands {
    /// Target schema (TOML)
    #[arg(short, long)]
    pub schema: PathBuf,

    /// Upload to inspect (xlsx, xls, ods or csv)
    #[arg(short, long)]
    pub file: PathBuf,

    /// Force a header onto a field, HEADER=FIELD (repeatable)
    #[arg(long = "map", value_name = "HEADER=FIELD", value_parser = crate::cli::parse_override)]
    pub overrides: Vec<(String, String)>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}
