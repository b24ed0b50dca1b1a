//! Storage backends the batch executor writes to

mod memory;
mod sqlite;

pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::transfer::Record;

/// Identifier assigned by a storage backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(pub i64);

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Storage failure, split by blast radius
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The store refused these rows (constraint, bad data); other rows may still succeed
    Rejected(String),
    /// The store itself is unusable (connection lost, pool closed, IO)
    Fatal(String),
}

impl StorageError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, StorageError::Fatal(_))
    }

    pub fn message(&self) -> &str {
        match self {
            StorageError::Rejected(msg) | StorageError::Fatal(msg) => msg,
        }
    }
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Rejected(msg) => write!(f, "rejected: {}", msg),
            StorageError::Fatal(msg) => write!(f, "storage failure: {}", msg),
        }
    }
}

impl std::error::Error for StorageError {}

/// Write interface for one import target
#[async_trait]
pub trait Storage: Send + Sync {
    /// Create all records or none; returns the number inserted
    async fn bulk_create(&self, records: &[Record]) -> Result<usize, StorageError>;

    async fn create_one(&self, record: &Record) -> Result<(), StorageError>;

    /// Existing ids for the given normalized business keys; unknown keys are absent
    async fn lookup_by_keys(
        &self,
        keys: &[String],
    ) -> Result<HashMap<String, RecordId>, StorageError>;

    /// Merge the record's fields into an existing record
    async fn update_by_id(&self, id: RecordId, record: &Record) -> Result<(), StorageError>;
}

/// A record as held by a backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: RecordId,
    pub business_key: Option<String>,
    pub data: serde_json::Value,
}

/// Shallow merge of a JSON object patch into a stored object
pub(crate) fn merge_json(target: &mut serde_json::Value, patch: serde_json::Value) {
    match (target.as_object_mut(), patch) {
        (Some(existing), serde_json::Value::Object(fields)) => {
            for (key, value) in fields {
                existing.insert(key, value);
            }
        }
        (_, patch) => *target = patch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_json_keeps_untouched_fields() {
        let mut stored = json!({"code": "GD1", "name": "Old", "order": 1});
        merge_json(&mut stored, json!({"name": "New"}));
        assert_eq!(stored, json!({"code": "GD1", "name": "New", "order": 1}));
    }

    #[test]
    fn test_storage_error_kinds() {
        assert!(StorageError::Fatal("io".into()).is_fatal());
        assert!(!StorageError::Rejected("dup".into()).is_fatal());
        assert_eq!(StorageError::Rejected("dup".into()).message(), "dup");
    }
}
