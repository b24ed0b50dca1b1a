//! Spreadsheet import pipeline
//!
//! This module takes an uploaded table through cleaning, date parsing,
//! validation and duplicate detection, then writes the surviving rows to
//! a storage backend in chunks.

pub mod types;
pub mod clean;
pub mod dates;
pub mod validate;
pub mod duplicates;
pub mod excel;
pub mod storage;
pub mod queue;
pub mod session;

pub use types::*;
pub use dates::{DateHint, parse_date};
pub use duplicates::DuplicateKey;
pub use excel::{SheetFormat, UploadLimits, read_table, read_table_file};
pub use queue::{BatchExecutor, BatchResult, ExecutorOptions, ImportMode, ImportProgress};
pub use session::{ImportSession, PreparedImport, SessionOptions};
pub use storage::{MemoryStorage, SqliteStorage, Storage, StorageError};
pub use validate::{RowRule, RowValidator};
