//! One import run, from raw upload to write result
//!
//! `ImportSession` owns everything a run needs: the target schema, the
//! matching thresholds, manual header overrides, the date hint and the
//! executor settings. Nothing is shared between sessions.
//!
//! Stages: clean → reconcile headers → ambiguity gate → map rows → parse
//! dates → duplicate gate → validate → coerce → write.

use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use crate::error::ImportError;
use crate::schema::{EntitySchema, FieldSchema, FieldType};
use crate::services::matching::{
    MappingReport, MatchThresholds, normalize_label, reconcile_columns,
};
use crate::transfer::clean::clean_table;
use crate::transfer::dates::{DateHint, parse_date_value};
use crate::transfer::duplicates::{business_key, duplicate_report, find_duplicates};
use crate::transfer::excel::{SheetFormat, UploadLimits, read_table};
use crate::transfer::queue::{BatchExecutor, BatchResult, ExecutorOptions};
use crate::transfer::storage::Storage;
use crate::transfer::validate::RowValidator;
use crate::transfer::{CleanedTable, ImportRow, RawTable, Record, RowFailure, Value};

/// Per-session settings
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub executor: ExecutorOptions,
    pub date_hint: DateHint,
    pub thresholds: MatchThresholds,
    pub limits: UploadLimits,
    /// Header label → canonical field id, applied before scoring
    pub overrides: HashMap<String, String>,
    /// Proceed even when required fields map only with low confidence
    pub accept_mapping_warnings: bool,
}

impl SessionOptions {
    pub fn with_executor(mut self, executor: ExecutorOptions) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_date_hint(mut self, hint: DateHint) -> Self {
        self.date_hint = hint;
        self
    }

    pub fn with_thresholds(mut self, thresholds: MatchThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_limits(mut self, limits: UploadLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_override(mut self, header: impl Into<String>, field: impl Into<String>) -> Self {
        self.overrides.insert(header.into(), field.into());
        self
    }

    pub fn accept_mapping_warnings(mut self, accept: bool) -> Self {
        self.accept_mapping_warnings = accept;
        self
    }
}

/// Rows ready to write, plus everything the user should review first
#[derive(Debug, Clone, Serialize)]
pub struct PreparedImport {
    pub report: MappingReport,
    pub valid: Vec<Record>,
    pub invalid: Vec<RowFailure>,
    /// Entirely empty rows dropped during cleaning
    pub removed_rows: usize,
}

impl PreparedImport {
    /// Data rows that survived cleaning
    pub fn row_count(&self) -> usize {
        self.valid.len() + self.invalid.len()
    }
}

#[derive(Debug)]
pub struct ImportSession {
    id: Uuid,
    schema: EntitySchema,
    options: SessionOptions,
    validator: RowValidator,
}

impl ImportSession {
    pub fn new(schema: EntitySchema, options: SessionOptions) -> Self {
        Self {
            id: Uuid::new_v4(),
            schema,
            options,
            validator: RowValidator::new(),
        }
    }

    /// Replace the validator, e.g. to add entity-specific rules
    pub fn with_validator(mut self, validator: RowValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Parse an upload under this session's limits
    pub fn load(&self, bytes: &[u8], format: SheetFormat) -> Result<RawTable, ImportError> {
        read_table(bytes, format, &self.options.limits)
    }

    /// Reconcile the upload's header row without touching the data rows
    pub fn map_headers(&self, table: &RawTable) -> MappingReport {
        reconcile_columns(
            &table.headers(),
            &self.schema,
            &self.options.overrides,
            &self.options.thresholds,
        )
    }

    /// Run every stage short of writing
    pub fn prepare(&self, table: &RawTable) -> Result<PreparedImport, ImportError> {
        let cleaned = clean_table(table);
        log::info!(
            "Session {}: {} data rows ({} empty dropped) for '{}'",
            self.id,
            cleaned.rows.len(),
            cleaned.removed_rows,
            self.schema.name
        );

        let report = reconcile_columns(
            &cleaned.headers,
            &self.schema,
            &self.options.overrides,
            &self.options.thresholds,
        );

        let ambiguities = report.ambiguities(&self.schema);
        if !ambiguities.is_empty() {
            if !self.options.accept_mapping_warnings {
                return Err(ImportError::MappingAmbiguity(ambiguities));
            }
            log::warn!(
                "Session {}: proceeding with {} unresolved required fields",
                self.id,
                ambiguities.len()
            );
        }

        let mut rows = self.map_rows(&cleaned, &report);
        for row in &mut rows {
            self.parse_dates(row);
        }

        let key_fields = self.schema.business_key_fields();
        let duplicates = find_duplicates(&rows, &key_fields);
        if !duplicates.is_empty() {
            log::warn!(
                "Session {}: {} business keys repeat in the upload",
                self.id,
                duplicates.len()
            );
            return Err(ImportError::DuplicateKeys(duplicate_report(&rows, &duplicates)));
        }

        let mut valid = Vec::new();
        let mut invalid = Vec::new();
        for mut row in rows {
            row.errors = self.validator.validate(&row, &self.schema);
            if row.is_valid() {
                valid.push(self.to_record(&row, &key_fields));
            } else {
                log::debug!("Row {} invalid: {}", row.row_number, row.errors.join("; "));
                invalid.push(RowFailure::new(row.row_number, row.errors));
            }
        }

        log::info!(
            "Session {}: {} valid rows, {} invalid",
            self.id,
            valid.len(),
            invalid.len()
        );

        Ok(PreparedImport {
            report,
            valid,
            invalid,
            removed_rows: cleaned.removed_rows,
        })
    }

    /// Executor configured from this session's options
    pub fn executor<'a>(&self, storage: &'a dyn Storage) -> BatchExecutor<'a> {
        BatchExecutor::new(storage, self.options.executor)
    }

    /// Write the valid rows of a prepared import
    pub async fn run(
        &self,
        prepared: &PreparedImport,
        storage: &dyn Storage,
    ) -> Result<BatchResult, ImportError> {
        self.executor(storage).run(&prepared.valid).await
    }

    /// Key each cleaned row by canonical field; unmapped columns are dropped
    fn map_rows(&self, cleaned: &CleanedTable, report: &MappingReport) -> Vec<ImportRow> {
        cleaned
            .rows
            .iter()
            .map(|source| {
                let mut row = ImportRow::new(source.row_number);
                for column in &report.mapping.columns {
                    let value = source.cells.get(column.column).cloned().unwrap_or_default();
                    row.values.insert(column.info.field.clone(), value);
                }
                row
            })
            .collect()
    }

    /// Replace parseable date cells with `Value::Date`; leave the rest for validation to flag
    fn parse_dates(&self, row: &mut ImportRow) {
        for field in self
            .schema
            .fields
            .iter()
            .filter(|f| f.field_type == FieldType::Date)
        {
            if let Some(value) = row.values.get_mut(&field.id) {
                if value.is_blank() {
                    continue;
                }
                if let Some(date) = parse_date_value(value, self.options.date_hint) {
                    *value = Value::Date(date);
                }
            }
        }
    }

    fn to_record(&self, row: &ImportRow, key_fields: &[&str]) -> Record {
        let mut record = Record::new(row.row_number, business_key(row, key_fields));
        for field in &self.schema.fields {
            let value = row.get(&field.id);
            if value.is_blank() {
                continue;
            }
            record.fields.insert(field.id.clone(), coerce(field, value));
        }
        record
    }
}

/// Convert a validated value to its field's declared type
fn coerce(field: &FieldSchema, value: &Value) -> Value {
    match field.field_type {
        FieldType::Text => value.to_text().map(Value::String).unwrap_or(Value::Null),
        FieldType::Number => match value.to_number() {
            Some(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => Value::Int(n as i64),
            Some(n) => Value::Float(n),
            None => value.clone(),
        },
        FieldType::Date => value.clone(),
        FieldType::Enum => {
            let given = normalize_label(&value.to_string());
            field
                .allowed_values
                .iter()
                .find(|allowed| normalize_label(allowed) == given)
                .map(|allowed| Value::String(allowed.clone()))
                .unwrap_or_else(|| value.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::ImportMode;
    use crate::transfer::duplicates::DuplicateKey;
    use crate::transfer::storage::MemoryStorage;
    use chrono::NaiveDate;
    use serde_json::json;

    const STAGES: &str = include_str!("../../schemas/giai_doan_khach_buon.toml");
    const RELATIVES: &str = include_str!("../../schemas/nguoi_than.toml");

    fn session(toml: &str, options: SessionOptions) -> ImportSession {
        ImportSession::new(EntitySchema::from_toml(toml).unwrap(), options)
    }

    #[tokio::test]
    async fn test_stage_import_end_to_end() {
        let table = RawTable::from_strings(
            &["Mã Giai Đoạn", "Ten giai doan", "Thu tu", "Description"],
            &[
                vec!["GD1", " Tiếp cận ", "1", ""],
                vec!["GD2", "Đàm phán", "0", "-"],
                vec!["", "N/A", "", ""],
                vec!["GD3", "Chốt", "3", "Ký hợp đồng"],
            ],
        );
        let session = session(STAGES, SessionOptions::default());

        let prepared = session.prepare(&table).unwrap();
        assert_eq!(prepared.removed_rows, 1);
        assert_eq!(prepared.valid.len(), 2);
        assert_eq!(
            prepared.invalid,
            vec![RowFailure::single(2, "Thứ tự must be at least 1 (got 0)")]
        );
        assert_eq!(prepared.valid[1].row_number, 4);
        assert_eq!(prepared.valid[1].business_key.as_deref(), Some("gd3"));

        let storage = MemoryStorage::new();
        let result = session.run(&prepared, &storage).await.unwrap();
        assert_eq!(result.created, 2);
        assert!(result.is_balanced());

        let stored = storage.records().unwrap();
        assert_eq!(
            stored[0].data,
            json!({"ma_giai_doan": "GD1", "ten_giai_doan": "Tiếp cận", "tt": 1})
        );
        assert_eq!(stored[1].data["mo_ta"], json!("Ký hợp đồng"));
    }

    #[test]
    fn test_duplicate_keys_abort_before_validation() {
        let table = RawTable::from_strings(
            &["Mã giai đoạn", "Tên giai đoạn", "Thứ tự"],
            &[
                vec!["GD1", "Tiếp cận", "1"],
                vec!["gd1 ", "Tiếp cận lại", "abc"],
            ],
        );
        let err = session(STAGES, SessionOptions::default())
            .prepare(&table)
            .unwrap_err();

        match err {
            ImportError::DuplicateKeys(keys) => assert_eq!(
                keys,
                vec![DuplicateKey {
                    key: "gd1".into(),
                    row_numbers: vec![1, 2],
                }]
            ),
            other => panic!("expected duplicate keys, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_required_column_blocks_unless_accepted() {
        let table = RawTable::from_strings(&["Code", "Name"], &[vec!["GD1", "Tiếp cận"]]);

        let err = session(STAGES, SessionOptions::default())
            .prepare(&table)
            .unwrap_err();
        match err {
            ImportError::MappingAmbiguity(items) => {
                assert_eq!(items.len(), 1);
                assert_eq!(items[0].field, "tt");
            }
            other => panic!("expected mapping ambiguity, got {:?}", other),
        }

        let prepared = session(STAGES, SessionOptions::default().accept_mapping_warnings(true))
            .prepare(&table)
            .unwrap();
        assert!(prepared.valid.is_empty());
        assert_eq!(prepared.invalid[0].messages, vec!["Thứ tự is required"]);
    }

    #[test]
    fn test_override_resolves_unknown_header() {
        let table = RawTable::from_strings(
            &["Code", "Name", "Vị trí"],
            &[vec!["GD1", "Tiếp cận", "2"]],
        );
        let session = session(STAGES, SessionOptions::default().with_override("Vị trí", "tt"));

        let prepared = session.prepare(&table).unwrap();
        assert_eq!(prepared.valid[0].get("tt"), &Value::Int(2));
    }

    #[test]
    fn test_relatives_dates_enums_and_conditional_rules() {
        let table = RawTable::from_strings(
            &["Mã NV", "Họ tên", "Relationship", "Ngày sinh", "SĐT"],
            &[
                vec!["7", "Nguyễn Văn A", "vợ/chồng", "28/02/1990", ""],
                vec!["7", "Nguyễn Văn B", "con", "45350", ""],
                vec!["8", "Trần Thị C", "Mẹ", "31/02/2024", ""],
            ],
        );
        let prepared = session(RELATIVES, SessionOptions::default())
            .prepare(&table)
            .unwrap();

        assert_eq!(prepared.valid.len(), 1);
        let child = &prepared.valid[0];
        assert_eq!(child.business_key, None);
        assert_eq!(child.get("ma_nhan_vien"), &Value::Int(7));
        assert_eq!(child.get("moi_quan_he"), &Value::from("Con"));
        assert_eq!(
            child.get("ngay_sinh"),
            &Value::Date(NaiveDate::from_ymd_opt(2024, 2, 28).unwrap())
        );

        assert_eq!(
            prepared.invalid,
            vec![
                RowFailure::single(
                    1,
                    "Số điện thoại is required when Mối quan hệ is 'Vợ/Chồng'"
                ),
                RowFailure::single(3, "Ngày sinh is not a valid date (got '31/02/2024')"),
            ]
        );
    }

    #[test]
    fn test_month_first_hint() {
        let table = RawTable::from_strings(
            &["Mã NV", "Họ tên", "Relationship", "Ngày sinh"],
            &[vec!["7", "Nguyễn Văn B", "Con", "02/28/2010"]],
        );
        let prepared = session(
            RELATIVES,
            SessionOptions::default().with_date_hint(DateHint::Mdy),
        )
        .prepare(&table)
        .unwrap();

        assert_eq!(
            prepared.valid[0].get("ngay_sinh"),
            &Value::Date(NaiveDate::from_ymd_opt(2010, 2, 28).unwrap())
        );
    }

    #[tokio::test]
    async fn test_upsert_second_upload_updates() {
        let storage = MemoryStorage::new();
        let options = SessionOptions::default()
            .with_executor(ExecutorOptions::default().with_mode(ImportMode::Upsert));

        let first = RawTable::from_strings(
            &["Code", "Name", "Order"],
            &[vec!["GD1", "Tiếp cận", "1"], vec!["GD2", "Đàm phán", "2"]],
        );
        let session = session(STAGES, options);
        let prepared = session.prepare(&first).unwrap();
        assert_eq!(session.run(&prepared, &storage).await.unwrap().created, 2);

        let second = RawTable::from_strings(
            &["Code", "Name", "Order"],
            &[vec!["gd2", "Đàm phán lại", "2"], vec!["GD3", "Chốt", "3"]],
        );
        let prepared = session.prepare(&second).unwrap();
        let result = session.run(&prepared, &storage).await.unwrap();

        assert_eq!(result.updated, 1);
        assert_eq!(result.created, 1);
        let stored = storage.records().unwrap();
        assert_eq!(stored.len(), 3);
        assert_eq!(stored[1].data["ten_giai_doan"], json!("Đàm phán lại"));
    }
}
