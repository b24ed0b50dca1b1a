//! Spreadsheet upload parsing

pub mod reader;

pub use reader::{SheetFormat, UploadLimits, cell_to_value, read_table, read_table_file};
