//! Spreadsheet import reconciliation
//!
//! Maps loosely labelled spreadsheet columns onto a target schema, cleans
//! and validates the rows, and writes them to storage in chunks that fall
//! back to per-row writes when a bulk call is rejected.

pub mod cli;
pub mod config;
pub mod error;
pub mod schema;
pub mod services;
pub mod transfer;

pub use error::ImportError;
pub use schema::{EntitySchema, FieldSchema, FieldType, SchemaRule};
pub use transfer::{BatchResult, ImportSession, PreparedImport, SessionOptions};
