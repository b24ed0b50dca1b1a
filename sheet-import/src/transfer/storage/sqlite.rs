//! SQLite-backed storage

use std::collections::HashMap;
use std::str::FromStr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::error::ErrorKind;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use super::{RecordId, Storage, StorageError, StoredRecord};
use crate::transfer::Record;

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS import_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    entity TEXT NOT NULL,
    business_key TEXT,
    data TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(entity, business_key)
)
"#;

/// Map a sqlx error to a storage error.
/// Constraint violations concern the rows sent; any other database
/// error (missing table, locked or read-only file) and every
/// connection or pool error is fatal.
fn classify(err: sqlx::Error) -> StorageError {
    match err {
        sqlx::Error::Database(db) => match db.kind() {
            ErrorKind::UniqueViolation
            | ErrorKind::ForeignKeyViolation
            | ErrorKind::NotNullViolation
            | ErrorKind::CheckViolation => StorageError::Rejected(db.message().to_string()),
            _ => StorageError::Fatal(db.message().to_string()),
        },
        sqlx::Error::RowNotFound => StorageError::Rejected("row not found".to_string()),
        other => StorageError::Fatal(other.to_string()),
    }
}

/// Records for one entity in the shared `import_records` table
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
    entity: String,
}

impl SqliteStorage {
    /// Open (creating if needed) the database at `url` and prepare the table
    pub async fn connect(url: &str, entity: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("Invalid database URL: {}", url))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to connect to database: {}", url))?;

        Self::new(pool, entity).await
    }

    /// Wrap an existing pool
    pub async fn new(pool: SqlitePool, entity: &str) -> Result<Self> {
        sqlx::query(CREATE_TABLE)
            .execute(&pool)
            .await
            .context("Failed to create import_records table")?;

        log::debug!("SQLite storage ready for entity '{}'", entity);
        Ok(Self {
            pool,
            entity: entity.to_string(),
        })
    }

    /// All records of this entity, in id order
    pub async fn records(&self) -> Result<Vec<StoredRecord>> {
        let rows = sqlx::query(
            "SELECT id, business_key, data FROM import_records WHERE entity = ? ORDER BY id",
        )
        .bind(&self.entity)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list import records")?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let data: String = row.try_get("data")?;
            records.push(StoredRecord {
                id: RecordId(row.try_get("id")?),
                business_key: row.try_get("business_key")?,
                data: serde_json::from_str(&data).context("Failed to decode stored record")?,
            });
        }
        Ok(records)
    }

    fn insert_query<'q>(
        &'q self,
        record: &'q Record,
        now: &'q str,
    ) -> sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
        sqlx::query(
            "INSERT INTO import_records (entity, business_key, data, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&self.entity)
        .bind(record.business_key.as_deref())
        .bind(record.to_json().to_string())
        .bind(now)
        .bind(now)
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn bulk_create(&self, records: &[Record]) -> Result<usize, StorageError> {
        let now = chrono::Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await.map_err(classify)?;

        for record in records {
            self.insert_query(record, &now)
                .execute(&mut *tx)
                .await
                .map_err(classify)?;
        }

        tx.commit().await.map_err(classify)?;
        Ok(records.len())
    }

    async fn create_one(&self, record: &Record) -> Result<(), StorageError> {
        let now = chrono::Utc::now().to_rfc3339();
        self.insert_query(record, &now)
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn lookup_by_keys(
        &self,
        keys: &[String],
    ) -> Result<HashMap<String, RecordId>, StorageError> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT id, business_key FROM import_records WHERE entity = ");
        query.push_bind(&self.entity);
        query.push(" AND business_key IN (");
        let mut separated = query.separated(", ");
        for key in keys {
            separated.push_bind(key);
        }
        separated.push_unseparated(")");

        let rows = query
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(classify)?;

        let mut found = HashMap::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.try_get("id").map_err(classify)?;
            let key: String = row.try_get("business_key").map_err(classify)?;
            found.insert(key, RecordId(id));
        }
        Ok(found)
    }

    async fn update_by_id(&self, id: RecordId, record: &Record) -> Result<(), StorageError> {
        let result = sqlx::query(
            "UPDATE import_records SET data = json_patch(data, ?), updated_at = ?
             WHERE id = ? AND entity = ?",
        )
        .bind(record.to_json().to_string())
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(id.0)
        .bind(&self.entity)
        .execute(&self.pool)
        .await
        .map_err(classify)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::Rejected(format!("record {} not found", id)));
        }
        Ok(())
    }
}
