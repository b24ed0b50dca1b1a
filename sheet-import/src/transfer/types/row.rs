//! Table and row shapes that flow through an import session

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

use super::Value;

static NULL: Value = Value::Null;

/// A parsed upload: row 0 holds the header labels, every later row is data
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub rows: Vec<Vec<Value>>,
}

impl RawTable {
    pub fn new(rows: Vec<Vec<Value>>) -> Self {
        RawTable { rows }
    }

    /// Build a table from a header row and string data rows (handy for tests and CSV)
    pub fn from_strings(headers: &[&str], data: &[Vec<&str>]) -> Self {
        let mut rows = Vec::with_capacity(data.len() + 1);
        rows.push(headers.iter().map(|h| Value::from(*h)).collect());
        for row in data {
            rows.push(row.iter().map(|c| Value::from(*c)).collect());
        }
        RawTable { rows }
    }

    /// Header labels as text; non-text header cells are rendered, nulls become ""
    pub fn headers(&self) -> Vec<String> {
        self.rows
            .first()
            .map(|row| {
                row.iter()
                    .map(|cell| cell.to_text().unwrap_or_default().trim().to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of data rows (excluding the header)
    pub fn data_row_count(&self) -> usize {
        self.rows.len().saturating_sub(1)
    }
}

/// One data row after cleaning, still positional
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRow {
    /// 1-based, counted from the first row below the header
    pub row_number: usize,
    pub cells: Vec<Value>,
}

/// Output of the cell normalizer
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedTable {
    pub headers: Vec<String>,
    pub rows: Vec<SourceRow>,
    /// Rows dropped because every cell was empty
    pub removed_rows: usize,
}

/// One source row keyed by canonical field id
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportRow {
    pub row_number: usize,
    pub values: BTreeMap<String, Value>,
    pub errors: Vec<String>,
}

impl ImportRow {
    pub fn new(row_number: usize) -> Self {
        ImportRow {
            row_number,
            values: BTreeMap::new(),
            errors: Vec::new(),
        }
    }

    /// Builder used by tests and rule authors
    pub fn with_value(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(field.into(), value.into());
        self
    }

    /// Value for a field, `Value::Null` when the field is absent
    pub fn get(&self, field: &str) -> &Value {
        self.values.get(field).unwrap_or(&NULL)
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// A validated row whose values are coerced to their declared field types
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub row_number: usize,
    /// Normalized business key, `None` when the schema declares none
    pub business_key: Option<String>,
    pub fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn new(row_number: usize, business_key: Option<String>) -> Self {
        Record {
            row_number,
            business_key,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> &Value {
        self.fields.get(field).unwrap_or(&NULL)
    }

    /// Flat JSON object of the field values, as written to storage
    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        serde_json::Value::Object(map)
    }

    /// Deserialize the record into a caller-defined entity struct
    pub fn deserialize_into<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.to_json())
    }
}

/// Failure report for a single row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowFailure {
    pub row_number: usize,
    pub messages: Vec<String>,
}

impl RowFailure {
    pub fn new(row_number: usize, messages: Vec<String>) -> Self {
        RowFailure {
            row_number,
            messages,
        }
    }

    pub fn single(row_number: usize, message: impl Into<String>) -> Self {
        RowFailure {
            row_number,
            messages: vec![message.into()],
        }
    }
}
