//! In-process storage for rehearsal runs and tests

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::{RecordId, Storage, StorageError, StoredRecord, merge_json};
use crate::transfer::Record;

#[derive(Debug, Default)]
struct MemoryState {
    next_id: i64,
    records: BTreeMap<RecordId, StoredRecord>,
    keys: HashMap<String, RecordId>,
}

impl MemoryState {
    fn insert(&mut self, record: &Record) -> RecordId {
        self.next_id += 1;
        let id = RecordId(self.next_id);
        if let Some(key) = &record.business_key {
            self.keys.insert(key.clone(), id);
        }
        self.records.insert(
            id,
            StoredRecord {
                id,
                business_key: record.business_key.clone(),
                data: record.to_json(),
            },
        );
        id
    }

    fn key_taken<'r>(&self, record: &'r Record) -> Option<&'r str> {
        record
            .business_key
            .as_deref()
            .filter(|key| self.keys.contains_key(*key))
    }
}

/// Mutex-guarded map with a unique business key per record.
/// The lock is never held across an await.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    state: Mutex<MemoryState>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|_| StorageError::Fatal("memory storage lock poisoned".to_string()))
    }

    /// Snapshot of every stored record, in id order
    pub fn records(&self) -> Result<Vec<StoredRecord>, StorageError> {
        Ok(self.lock()?.records.values().cloned().collect())
    }

    pub fn len(&self) -> usize {
        self.lock().map(|s| s.records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn bulk_create(&self, records: &[Record]) -> Result<usize, StorageError> {
        let mut state = self.lock()?;

        let mut batch_keys = HashSet::new();
        for record in records {
            if let Some(key) = state.key_taken(record) {
                return Err(StorageError::Rejected(format!(
                    "business key '{}' already exists",
                    key
                )));
            }
            if let Some(key) = &record.business_key {
                if !batch_keys.insert(key.as_str()) {
                    return Err(StorageError::Rejected(format!(
                        "business key '{}' repeated in batch",
                        key
                    )));
                }
            }
        }

        for record in records {
            state.insert(record);
        }
        Ok(records.len())
    }

    async fn create_one(&self, record: &Record) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        if let Some(key) = state.key_taken(record) {
            return Err(StorageError::Rejected(format!(
                "business key '{}' already exists",
                key
            )));
        }
        state.insert(record);
        Ok(())
    }

    async fn lookup_by_keys(
        &self,
        keys: &[String],
    ) -> Result<HashMap<String, RecordId>, StorageError> {
        let state = self.lock()?;
        Ok(keys
            .iter()
            .filter_map(|key| state.keys.get(key).map(|id| (key.clone(), *id)))
            .collect())
    }

    async fn update_by_id(&self, id: RecordId, record: &Record) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        let stored = state
            .records
            .get_mut(&id)
            .ok_or_else(|| StorageError::Rejected(format!("record {} not found", id)))?;
        merge_json(&mut stored.data, record.to_json());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stage(row: usize, code: &str, name: &str) -> Record {
        Record::new(row, Some(code.to_lowercase()))
            .with_field("code", code)
            .with_field("name", name)
    }

    #[tokio::test]
    async fn test_bulk_create_and_lookup() {
        let storage = MemoryStorage::new();
        let created = storage
            .bulk_create(&[stage(1, "GD1", "A"), stage(2, "GD2", "B")])
            .await
            .unwrap();
        assert_eq!(created, 2);

        let ids = storage
            .lookup_by_keys(&["gd2".to_string(), "gd9".to_string()])
            .await
            .unwrap();
        assert_eq!(ids.len(), 1);
        assert_eq!(ids["gd2"], RecordId(2));
    }

    #[tokio::test]
    async fn test_bulk_create_is_all_or_nothing() {
        let storage = MemoryStorage::new();
        storage.create_one(&stage(1, "GD1", "A")).await.unwrap();

        let err = storage
            .bulk_create(&[stage(2, "GD2", "B"), stage(3, "GD1", "C")])
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Rejected(_)));
        assert_eq!(storage.len(), 1);
    }

    #[tokio::test]
    async fn test_create_one_rejects_taken_key() {
        let storage = MemoryStorage::new();
        storage.create_one(&stage(1, "GD1", "A")).await.unwrap();

        let err = storage.create_one(&stage(2, "GD1", "B")).await.unwrap_err();
        assert_eq!(
            err,
            StorageError::Rejected("business key 'gd1' already exists".into())
        );
        let err = storage
            .bulk_create(&[stage(3, "GD3", "C"), stage(4, "GD3", "D")])
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StorageError::Rejected("business key 'gd3' repeated in batch".into())
        );
        assert_eq!(storage.len(), 1);
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let storage = MemoryStorage::new();
        storage.create_one(&stage(1, "GD1", "Old")).await.unwrap();

        let patch = Record::new(5, Some("gd1".into())).with_field("name", "New");
        storage.update_by_id(RecordId(1), &patch).await.unwrap();

        let records = storage.records().unwrap();
        assert_eq!(records[0].data, json!({"code": "GD1", "name": "New"}));

        let err = storage.update_by_id(RecordId(42), &patch).await.unwrap_err();
        assert_eq!(err, StorageError::Rejected("record 42 not found".into()));
    }
}
