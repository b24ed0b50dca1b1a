//! Read uploaded spreadsheets into a RawTable
//!
//! Workbooks (xlsx, xls, ods) go through calamine, CSV through the csv
//! crate. Size is checked before parsing; row and column caps after.

use anyhow::{Context, Result};
use calamine::{Data, Reader, open_workbook_auto_from_rs};
use std::io::Cursor;
use std::path::Path;

use crate::error::ImportError;
use crate::transfer::dates::{DateHint, parse_naive_date, serial_to_date};
use crate::transfer::{RawTable, Value};

/// Upload caps
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct UploadLimits {
    pub max_bytes: usize,
    /// Includes the header row
    pub max_rows: usize,
    pub max_columns: usize,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_bytes: 10 * 1024 * 1024,
            max_rows: 10_000,
            max_columns: 100,
        }
    }
}

/// Container format of an upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    /// xlsx, xlsm, xls, xlsb or ods; detected from content
    Workbook,
    Csv,
}

impl SheetFormat {
    /// Guess the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => Some(SheetFormat::Workbook),
            "csv" | "txt" => Some(SheetFormat::Csv),
            _ => None,
        }
    }
}

/// Convert a calamine cell into a Value
pub fn cell_to_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::String(s) => Value::String(s.clone()),
        Data::Int(i) => Value::Int(*i),
        Data::Float(f) => {
            // If it's a whole number, use integer
            if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                Value::Int(*f as i64)
            } else {
                Value::Float(*f)
            }
        }
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => serial_to_date(dt.as_f64())
            .map(Value::Date)
            .unwrap_or(Value::Null),
        Data::DateTimeIso(s) => parse_naive_date(s, DateHint::Ymd)
            .map(Value::Date)
            .unwrap_or_else(|| Value::String(s.clone())),
        Data::DurationIso(s) => Value::String(s.clone()),
        Data::Error(_) => Value::Null,
    }
}

/// Parse an upload held in memory
pub fn read_table(
    bytes: &[u8],
    format: SheetFormat,
    limits: &UploadLimits,
) -> Result<RawTable, ImportError> {
    if bytes.is_empty() {
        return Err(ImportError::FatalInput("file is empty".to_string()));
    }
    if bytes.len() > limits.max_bytes {
        return Err(ImportError::FatalInput(format!(
            "file is {} bytes; the limit is {} bytes",
            bytes.len(),
            limits.max_bytes
        )));
    }

    let rows = match format {
        SheetFormat::Workbook => read_workbook_rows(bytes)?,
        SheetFormat::Csv => read_csv_rows(bytes)?,
    };

    let rows = trim_trailing_empty(rows);
    check_shape(&rows, limits)?;

    log::debug!(
        "Read {} rows x {} columns",
        rows.len(),
        rows.first().map(|r| r.len()).unwrap_or(0)
    );
    Ok(RawTable::new(rows))
}

/// Read an upload from disk, picking the format from the extension
pub fn read_table_file(path: &Path, limits: &UploadLimits) -> Result<RawTable> {
    let format = SheetFormat::from_path(path)
        .with_context(|| format!("Unsupported file type: {}", path.display()))?;

    let size = std::fs::metadata(path)
        .with_context(|| format!("Failed to stat file: {}", path.display()))?
        .len();
    if size > limits.max_bytes as u64 {
        return Err(ImportError::FatalInput(format!(
            "file is {} bytes; the limit is {} bytes",
            size, limits.max_bytes
        ))
        .into());
    }

    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))?;
    let table = read_table(&bytes, format, limits)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    Ok(table)
}

/// Rows of the first worksheet
fn read_workbook_rows(bytes: &[u8]) -> Result<Vec<Vec<Value>>, ImportError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| ImportError::FatalInput(format!("not a readable workbook: {}", e)))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| ImportError::FatalInput("workbook has no sheets".to_string()))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| ImportError::FatalInput(format!("failed to read sheet '{}': {}", sheet_name, e)))?;

    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_to_value).collect())
        .collect())
}

fn read_csv_rows(bytes: &[u8]) -> Result<Vec<Vec<Value>>, ImportError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record
            .map_err(|e| ImportError::FatalInput(format!("CSV line {}: {}", idx + 1, e)))?;
        rows.push(record.iter().map(Value::from).collect());
    }
    Ok(rows)
}

/// Drop trailing empty rows, then trailing empty columns
fn trim_trailing_empty(mut rows: Vec<Vec<Value>>) -> Vec<Vec<Value>> {
    while rows.last().is_some_and(|row| row.iter().all(Value::is_blank)) {
        rows.pop();
    }

    let width = rows
        .iter()
        .map(|row| {
            row.iter()
                .rposition(|cell| !cell.is_blank())
                .map_or(0, |pos| pos + 1)
        })
        .max()
        .unwrap_or(0);

    for row in &mut rows {
        row.truncate(width);
    }
    rows
}

fn check_shape(rows: &[Vec<Value>], limits: &UploadLimits) -> Result<(), ImportError> {
    if rows.is_empty() {
        return Err(ImportError::FatalInput(
            "sheet has no header row".to_string(),
        ));
    }
    if rows.len() > limits.max_rows {
        return Err(ImportError::FatalInput(format!(
            "sheet has {} rows; the limit is {}",
            rows.len(),
            limits.max_rows
        )));
    }
    let columns = rows.iter().map(|r| r.len()).max().unwrap_or(0);
    if columns > limits.max_columns {
        return Err(ImportError::FatalInput(format!(
            "sheet has {} columns; the limit is {}",
            columns, limits.max_columns
        )));
    }
    Ok(())
}
