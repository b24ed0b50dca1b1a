//! Chunked batch writer with per-row fallback
//!
//! Valid records are cut into order-preserving chunks. Each chunk gets one
//! bulk create; if the store rejects it, every row of the chunk is retried
//! on its own so one bad record costs only itself. Upsert and update modes
//! first resolve business keys to existing ids for the whole chunk.
//!
//! Rejections are row outcomes and the run carries on. A fatal storage
//! error stops the run and comes back as `ImportError::FatalStorage`
//! together with what had been written so far.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::StreamExt;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::ImportError;
use crate::transfer::storage::{RecordId, Storage, StorageError};
use crate::transfer::{Record, RowFailure};

/// Default rows per bulk call
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// How records are reconciled with what the store already holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// Create every record
    #[default]
    Insert,
    /// Update records whose business key exists, create the rest
    Upsert,
    /// Update records whose business key exists, fail the rest
    Update,
}

impl FromStr for ImportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "insert" => Ok(ImportMode::Insert),
            "upsert" => Ok(ImportMode::Upsert),
            "update" => Ok(ImportMode::Update),
            other => Err(format!(
                "unknown import mode '{}' (expected insert, upsert or update)",
                other
            )),
        }
    }
}

impl std::fmt::Display for ImportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportMode::Insert => write!(f, "insert"),
            ImportMode::Upsert => write!(f, "upsert"),
            ImportMode::Update => write!(f, "update"),
        }
    }
}

/// Executor tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorOptions {
    pub mode: ImportMode,
    pub chunk_size: usize,
    /// Chunks in flight at once; 1 keeps writes strictly ordered
    pub max_concurrent_chunks: usize,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            mode: ImportMode::Insert,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_concurrent_chunks: 1,
        }
    }
}

impl ExecutorOptions {
    pub fn with_mode(mut self, mode: ImportMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_max_concurrent_chunks(mut self, n: usize) -> Self {
        self.max_concurrent_chunks = n;
        self
    }

    pub fn validate(&self) -> Result<(), ImportError> {
        if self.chunk_size == 0 {
            return Err(ImportError::InvalidSettings(
                "chunk_size must be at least 1".to_string(),
            ));
        }
        if self.max_concurrent_chunks == 0 {
            return Err(ImportError::InvalidSettings(
                "max_concurrent_chunks must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Outcome of a write run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
    /// Rows handed to storage
    pub submitted: usize,
    /// The run stopped early on request; unsubmitted rows were never sent
    pub cancelled: bool,
    /// Failed rows, ascending by row number
    pub errors: Vec<RowFailure>,
}

impl BatchResult {
    /// Every submitted row ended up created, updated or failed
    pub fn is_balanced(&self) -> bool {
        self.created + self.updated + self.failed == self.submitted
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    fn absorb(&mut self, chunk: ChunkOutcome) {
        self.created += chunk.created;
        self.updated += chunk.updated;
        self.failed += chunk.errors.len();
        self.submitted += if chunk.fatal.is_some() {
            chunk.created + chunk.updated + chunk.errors.len()
        } else {
            chunk.rows
        };
        self.errors.extend(chunk.errors);
    }
}

/// Progress snapshot passed to the observer after each chunk
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportProgress {
    pub chunks_done: usize,
    pub total_chunks: usize,
    pub rows_submitted: usize,
    pub total_rows: usize,
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
}

/// Chunk lifecycle: Pending → BulkAttempted → BulkSucceeded | BulkFailed,
/// and BulkFailed → PerRowRetry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    Pending,
    BulkAttempted,
    BulkSucceeded,
    BulkFailed,
    PerRowRetry,
}

#[derive(Debug)]
struct ChunkOutcome {
    index: usize,
    rows: usize,
    created: usize,
    updated: usize,
    errors: Vec<RowFailure>,
    state: ChunkState,
    fatal: Option<String>,
}

impl ChunkOutcome {
    fn new(index: usize, rows: usize) -> Self {
        Self {
            index,
            rows,
            created: 0,
            updated: 0,
            errors: Vec::new(),
            state: ChunkState::Pending,
            fatal: None,
        }
    }

    fn fail(&mut self, record: &Record, message: impl Into<String>) {
        self.errors.push(RowFailure::single(record.row_number, message));
    }

    fn transition(&mut self, state: ChunkState) {
        debug!("Chunk {}: {:?} -> {:?}", self.index + 1, self.state, state);
        self.state = state;
    }
}

/// Progress callback
pub type ProgressObserver<'a> = &'a (dyn Fn(&ImportProgress) + Send + Sync);

/// Drives chunked writes against a storage backend
pub struct BatchExecutor<'a> {
    storage: &'a dyn Storage,
    options: ExecutorOptions,
    observer: Option<ProgressObserver<'a>>,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a> BatchExecutor<'a> {
    pub fn new(storage: &'a dyn Storage, options: ExecutorOptions) -> Self {
        Self {
            storage,
            options,
            observer: None,
            cancel: None,
        }
    }

    /// Called after every finished chunk
    pub fn with_observer(mut self, observer: ProgressObserver<'a>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Checked between chunks; a started chunk always finishes
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn cancel_requested(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Write all records. Row failures are reported in the result; only
    /// a fatal storage error returns `Err`.
    pub async fn run(&self, records: &[Record]) -> Result<BatchResult, ImportError> {
        self.options.validate()?;

        let chunks: Vec<&[Record]> = records.chunks(self.options.chunk_size).collect();
        let total_chunks = chunks.len();
        info!(
            "Writing {} rows in {} chunks ({} mode, {} concurrent)",
            records.len(),
            total_chunks,
            self.options.mode,
            self.options.max_concurrent_chunks
        );

        let aborted = AtomicBool::new(false);
        let aborted = &aborted;

        let mut outcomes = futures::stream::iter(chunks.into_iter().enumerate())
            .map(|(index, chunk)| async move {
                if aborted.load(Ordering::SeqCst) || self.cancel_requested() {
                    return None;
                }
                Some(self.process_chunk(index, chunk).await)
            })
            .buffer_unordered(self.options.max_concurrent_chunks);

        let mut result = BatchResult::default();
        let mut fatal: Option<String> = None;
        let mut chunks_done = 0;

        while let Some(outcome) = outcomes.next().await {
            let Some(outcome) = outcome else {
                if fatal.is_none() {
                    result.cancelled = true;
                }
                continue;
            };

            if let Some(message) = &outcome.fatal {
                error!("Chunk {} hit a storage failure: {}", outcome.index + 1, message);
                aborted.store(true, Ordering::SeqCst);
                fatal.get_or_insert_with(|| message.clone());
            }

            result.absorb(outcome);
            chunks_done += 1;

            if let Some(observer) = self.observer {
                observer(&ImportProgress {
                    chunks_done,
                    total_chunks,
                    rows_submitted: result.submitted,
                    total_rows: records.len(),
                    created: result.created,
                    updated: result.updated,
                    failed: result.failed,
                });
            }
        }

        result.errors.sort_by_key(|e| e.row_number);

        if let Some(message) = fatal {
            return Err(ImportError::FatalStorage {
                message,
                partial: result,
            });
        }

        if result.cancelled {
            warn!(
                "Import cancelled after {} of {} rows",
                result.submitted,
                records.len()
            );
        }
        info!(
            "Import finished: {} created, {} updated, {} failed",
            result.created, result.updated, result.failed
        );
        Ok(result)
    }

    async fn process_chunk(&self, index: usize, chunk: &[Record]) -> ChunkOutcome {
        let mut outcome = ChunkOutcome::new(index, chunk.len());
        debug!("Chunk {}: {} rows", index + 1, chunk.len());

        match self.options.mode {
            ImportMode::Insert => self.create_rows(chunk, &mut outcome).await,
            ImportMode::Upsert | ImportMode::Update => self.reconcile_rows(chunk, &mut outcome).await,
        }

        outcome
    }

    /// Resolve business keys, update matches, then create or fail the rest
    async fn reconcile_rows(&self, chunk: &[Record], outcome: &mut ChunkOutcome) {
        let keys: Vec<String> = chunk
            .iter()
            .filter_map(|r| r.business_key.clone())
            .collect();

        let existing: HashMap<String, RecordId> = match self.storage.lookup_by_keys(&keys).await {
            Ok(found) => found,
            Err(StorageError::Fatal(msg)) => {
                outcome.fatal = Some(msg);
                return;
            }
            Err(StorageError::Rejected(msg)) => {
                warn!("Chunk {}: key lookup rejected: {}", outcome.index + 1, msg);
                for record in chunk {
                    outcome.fail(record, format!("Lookup of existing records failed: {}", msg));
                }
                return;
            }
        };

        let mut to_create = Vec::new();
        for record in chunk {
            let existing_id = record
                .business_key
                .as_ref()
                .and_then(|key| existing.get(key));

            match (existing_id, self.options.mode) {
                (Some(id), _) => match self.storage.update_by_id(*id, record).await {
                    Ok(()) => outcome.updated += 1,
                    Err(StorageError::Rejected(msg)) => outcome.fail(record, msg),
                    Err(StorageError::Fatal(msg)) => {
                        outcome.fatal = Some(msg);
                        return;
                    }
                },
                (None, ImportMode::Update) => outcome.fail(
                    record,
                    match &record.business_key {
                        Some(key) => format!("No existing record with key '{}'", key),
                        None => "No business key to match an existing record".to_string(),
                    },
                ),
                (None, _) => to_create.push(record.clone()),
            }
        }

        self.create_rows(&to_create, outcome).await;
    }

    /// One bulk create, falling back to row-by-row on rejection
    async fn create_rows(&self, records: &[Record], outcome: &mut ChunkOutcome) {
        if records.is_empty() {
            return;
        }

        outcome.transition(ChunkState::BulkAttempted);
        match self.storage.bulk_create(records).await {
            Ok(inserted) if inserted == records.len() => {
                outcome.transition(ChunkState::BulkSucceeded);
                outcome.created += inserted;
            }
            Ok(inserted) => {
                outcome.created += inserted;
                outcome.fatal = Some(format!(
                    "bulk create reported {} of {} rows written",
                    inserted,
                    records.len()
                ));
            }
            Err(StorageError::Fatal(msg)) => outcome.fatal = Some(msg),
            Err(StorageError::Rejected(msg)) => {
                outcome.transition(ChunkState::BulkFailed);
                warn!(
                    "Chunk {}: bulk create rejected ({}), retrying {} rows individually",
                    outcome.index + 1,
                    msg,
                    records.len()
                );
                outcome.transition(ChunkState::PerRowRetry);

                for record in records {
                    match self.storage.create_one(record).await {
                        Ok(()) => outcome.created += 1,
                        Err(StorageError::Rejected(msg)) => {
                            debug!("Row {} rejected: {}", record.row_number, msg);
                            outcome.fail(record, msg);
                        }
                        Err(StorageError::Fatal(msg)) => {
                            outcome.fatal = Some(msg);
                            return;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    /// Storage whose failures are scripted per call / per row
    #[derive(Default)]
    struct ScriptedStorage {
        /// 1-based bulk_create call numbers that are rejected
        reject_bulk_calls: HashSet<usize>,
        /// bulk_create call number that fails fatally
        fatal_bulk_call: Option<usize>,
        /// Report one row fewer than sent
        short_count: bool,
        /// Row numbers create_one rejects
        reject_rows: HashSet<usize>,
        /// Row numbers where create_one loses the connection
        fatal_rows: HashSet<usize>,
        /// Row numbers where update_by_id loses the connection
        fatal_update_rows: HashSet<usize>,
        existing: HashMap<String, RecordId>,
        reject_lookup: bool,
        bulk_calls: AtomicUsize,
        created_rows: Mutex<Vec<usize>>,
        updated_rows: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl Storage for ScriptedStorage {
        async fn bulk_create(&self, records: &[Record]) -> Result<usize, StorageError> {
            let call = self.bulk_calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fatal_bulk_call == Some(call) {
                return Err(StorageError::Fatal("connection reset".into()));
            }
            if self.reject_bulk_calls.contains(&call) {
                return Err(StorageError::Rejected("constraint violation".into()));
            }
            self.created_rows
                .lock()
                .unwrap()
                .extend(records.iter().map(|r| r.row_number));
            if self.short_count {
                return Ok(records.len() - 1);
            }
            Ok(records.len())
        }

        async fn create_one(&self, record: &Record) -> Result<(), StorageError> {
            if self.fatal_rows.contains(&record.row_number) {
                return Err(StorageError::Fatal("database is locked".into()));
            }
            if self.reject_rows.contains(&record.row_number) {
                return Err(StorageError::Rejected(format!(
                    "row {} violates constraint",
                    record.row_number
                )));
            }
            self.created_rows.lock().unwrap().push(record.row_number);
            Ok(())
        }

        async fn lookup_by_keys(
            &self,
            keys: &[String],
        ) -> Result<HashMap<String, RecordId>, StorageError> {
            if self.reject_lookup {
                return Err(StorageError::Rejected("too many keys".into()));
            }
            Ok(keys
                .iter()
                .filter_map(|k| self.existing.get(k).map(|id| (k.clone(), *id)))
                .collect())
        }

        async fn update_by_id(&self, _id: RecordId, record: &Record) -> Result<(), StorageError> {
            if self.fatal_update_rows.contains(&record.row_number) {
                return Err(StorageError::Fatal("disk I/O error".into()));
            }
            self.updated_rows.lock().unwrap().push(record.row_number);
            Ok(())
        }
    }

    fn records(n: usize) -> Vec<Record> {
        (1..=n)
            .map(|row| {
                Record::new(row, Some(format!("gd{}", row))).with_field("code", format!("GD{}", row))
            })
            .collect()
    }

    fn options(chunk_size: usize) -> ExecutorOptions {
        ExecutorOptions::default().with_chunk_size(chunk_size)
    }

    #[tokio::test]
    async fn test_all_chunks_succeed() {
        let storage = ScriptedStorage::default();
        let result = BatchExecutor::new(&storage, options(4))
            .run(&records(10))
            .await
            .unwrap();

        assert_eq!(result.created, 10);
        assert_eq!(result.submitted, 10);
        assert!(result.errors.is_empty());
        assert_eq!(storage.bulk_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_bulk_failure_falls_back_to_rows() {
        // 3 chunks of 5; chunk 2 bulk fails and rows 7, 8, 10 fail on retry
        let storage = ScriptedStorage {
            reject_bulk_calls: HashSet::from([2]),
            reject_rows: HashSet::from([7, 8, 10]),
            ..Default::default()
        };

        let result = BatchExecutor::new(&storage, options(5))
            .run(&records(15))
            .await
            .unwrap();

        assert_eq!(result.created, 12);
        assert_eq!(result.failed, 3);
        assert!(result.is_balanced());
        let failed: Vec<usize> = result.errors.iter().map(|e| e.row_number).collect();
        assert_eq!(failed, vec![7, 8, 10]);
        assert_eq!(result.errors[0].messages, vec!["row 7 violates constraint"]);
    }

    #[tokio::test]
    async fn test_concurrent_chunks_merge_sorted() {
        let storage = ScriptedStorage {
            reject_bulk_calls: HashSet::from([1, 2, 3, 4]),
            reject_rows: HashSet::from([19, 2, 11, 5]),
            ..Default::default()
        };

        let result = BatchExecutor::new(&storage, options(5).with_max_concurrent_chunks(3))
            .run(&records(20))
            .await
            .unwrap();

        assert_eq!(result.submitted, 20);
        assert!(result.is_balanced());
        let failed: Vec<usize> = result.errors.iter().map(|e| e.row_number).collect();
        assert_eq!(failed, vec![2, 5, 11, 19]);
    }

    #[tokio::test]
    async fn test_fatal_error_aborts_remaining_chunks() {
        let storage = ScriptedStorage {
            fatal_bulk_call: Some(2),
            ..Default::default()
        };

        let err = BatchExecutor::new(&storage, options(5))
            .run(&records(15))
            .await
            .unwrap_err();

        match err {
            ImportError::FatalStorage { message, partial } => {
                assert_eq!(message, "connection reset");
                assert_eq!(partial.created, 5);
                assert_eq!(partial.submitted, 5);
            }
            other => panic!("expected fatal storage error, got {:?}", other),
        }
        assert_eq!(storage.bulk_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_short_bulk_count_is_fatal() {
        let storage = ScriptedStorage {
            short_count: true,
            ..Default::default()
        };
        let err = BatchExecutor::new(&storage, options(5))
            .run(&records(5))
            .await
            .unwrap_err();

        match err {
            ImportError::FatalStorage { message, partial } => {
                assert_eq!(message, "bulk create reported 4 of 5 rows written");
                assert_eq!(partial.created, 4);
                assert_eq!(partial.submitted, 4);
                assert!(partial.is_balanced());
            }
            other => panic!("expected fatal storage error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fatal_during_row_retry_keeps_partial_counts() {
        // bulk rejected, then row 2 is rejected and row 4 loses the connection
        let storage = ScriptedStorage {
            reject_bulk_calls: HashSet::from([1]),
            reject_rows: HashSet::from([2]),
            fatal_rows: HashSet::from([4]),
            ..Default::default()
        };

        let err = BatchExecutor::new(&storage, options(5))
            .run(&records(10))
            .await
            .unwrap_err();

        match err {
            ImportError::FatalStorage { message, partial } => {
                assert_eq!(message, "database is locked");
                assert_eq!(partial.created, 2);
                assert_eq!(partial.failed, 1);
                assert_eq!(partial.submitted, 3);
                assert_eq!(partial.errors, vec![RowFailure::single(2, "row 2 violates constraint")]);
            }
            other => panic!("expected fatal storage error, got {:?}", other),
        }
        assert_eq!(*storage.created_rows.lock().unwrap(), vec![1, 3]);
        assert_eq!(storage.bulk_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fatal_update_stops_upsert_chunk() {
        let storage = ScriptedStorage {
            existing: HashMap::from([
                ("gd1".to_string(), RecordId(10)),
                ("gd2".to_string(), RecordId(20)),
            ]),
            fatal_update_rows: HashSet::from([2]),
            ..Default::default()
        };

        let err = BatchExecutor::new(&storage, options(10).with_mode(ImportMode::Upsert))
            .run(&records(4))
            .await
            .unwrap_err();

        match err {
            ImportError::FatalStorage { message, partial } => {
                assert_eq!(message, "disk I/O error");
                assert_eq!(partial.updated, 1);
                assert_eq!(partial.created, 0);
                assert_eq!(partial.submitted, 1);
            }
            other => panic!("expected fatal storage error, got {:?}", other),
        }
        assert_eq!(*storage.updated_rows.lock().unwrap(), vec![1]);
        assert_eq!(storage.bulk_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_concurrent_fatal_reports_what_was_written() {
        let storage = ScriptedStorage {
            reject_bulk_calls: (1..=4).collect(),
            reject_rows: HashSet::from([3]),
            fatal_rows: HashSet::from([8]),
            ..Default::default()
        };

        let err = BatchExecutor::new(&storage, options(5).with_max_concurrent_chunks(2))
            .run(&records(20))
            .await
            .unwrap_err();

        let ImportError::FatalStorage { partial, .. } = err else {
            panic!("expected fatal storage error");
        };
        let written = storage.created_rows.lock().unwrap().clone();
        assert!(!written.contains(&8));
        assert!(written.contains(&6) && written.contains(&7));
        assert_eq!(partial.created, written.len());
        assert_eq!(partial.failed, 1);
        assert_eq!(partial.errors[0].row_number, 3);
        assert!(partial.is_balanced());
        assert!(partial.submitted < 20);
    }

    #[tokio::test]
    async fn test_upsert_updates_existing_and_creates_rest() {
        let storage = ScriptedStorage {
            existing: HashMap::from([("gd2".to_string(), RecordId(20))]),
            ..Default::default()
        };

        let result = BatchExecutor::new(&storage, options(10).with_mode(ImportMode::Upsert))
            .run(&records(3))
            .await
            .unwrap();

        assert_eq!(result.updated, 1);
        assert_eq!(result.created, 2);
        assert_eq!(*storage.updated_rows.lock().unwrap(), vec![2]);
        assert_eq!(*storage.created_rows.lock().unwrap(), vec![1, 3]);
    }

    #[tokio::test]
    async fn test_update_mode_fails_unknown_keys() {
        let storage = ScriptedStorage {
            existing: HashMap::from([("gd1".to_string(), RecordId(1))]),
            ..Default::default()
        };

        let result = BatchExecutor::new(&storage, options(10).with_mode(ImportMode::Update))
            .run(&records(2))
            .await
            .unwrap();

        assert_eq!(result.updated, 1);
        assert_eq!(result.failed, 1);
        assert_eq!(
            result.errors[0],
            RowFailure::single(2, "No existing record with key 'gd2'")
        );
        assert_eq!(storage.bulk_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rejected_lookup_fails_chunk() {
        let storage = ScriptedStorage {
            reject_lookup: true,
            ..Default::default()
        };

        let result = BatchExecutor::new(&storage, options(2).with_mode(ImportMode::Upsert))
            .run(&records(3))
            .await
            .unwrap();

        assert_eq!(result.failed, 3);
        assert_eq!(result.submitted, 3);
        assert!(result.errors[0].messages[0].contains("too many keys"));
    }

    #[tokio::test]
    async fn test_cancel_between_chunks() {
        let storage = ScriptedStorage::default();
        let cancel = Arc::new(AtomicBool::new(false));
        let flag = cancel.clone();
        let observer = move |_: &ImportProgress| flag.store(true, Ordering::SeqCst);

        let result = BatchExecutor::new(&storage, options(5))
            .with_observer(&observer)
            .with_cancel_flag(cancel)
            .run(&records(15))
            .await
            .unwrap();

        assert!(result.cancelled);
        assert_eq!(result.created, 5);
        assert_eq!(result.submitted, 5);
        assert!(result.is_balanced());
    }

    #[tokio::test]
    async fn test_observer_sees_each_chunk() {
        let storage = ScriptedStorage::default();
        let seen = Mutex::new(Vec::new());
        let observer = |p: &ImportProgress| seen.lock().unwrap().push((p.chunks_done, p.rows_submitted));

        BatchExecutor::new(&storage, options(4))
            .with_observer(&observer)
            .run(&records(10))
            .await
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![(1, 4), (2, 8), (3, 10)]);
    }

    #[tokio::test]
    async fn test_zero_chunk_size_rejected() {
        let storage = ScriptedStorage::default();
        let err = BatchExecutor::new(&storage, options(0))
            .run(&records(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::InvalidSettings(_)));
    }
}
