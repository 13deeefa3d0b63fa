use std::collections::BTreeMap;

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::{Row, SqlitePool};

use super::{StorageError, StorageResult, TableEntity, TableStore};

/// Table storage on SQLite. Properties are kept as a JSON object per row.
#[derive(Clone)]
pub struct SqliteTableStore {
    pool: SqlitePool,
}

impl SqliteTableStore {
    /// Wraps `pool` and creates the backing schema.
    pub async fn open(pool: SqlitePool) -> StorageResult<Self> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS storage_tables (
                name TEXT PRIMARY KEY COLLATE NOCASE,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
            )"#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS storage_entities (
                table_name TEXT NOT NULL COLLATE NOCASE,
                partition_key TEXT NOT NULL,
                row_key TEXT NOT NULL,
                properties TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
                PRIMARY KEY (table_name, partition_key, row_key),
                FOREIGN KEY(table_name) REFERENCES storage_tables(name) ON DELETE CASCADE
            )"#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    async fn table_exists(&self, table: &str) -> StorageResult<bool> {
        let row = sqlx::query("SELECT 1 FROM storage_tables WHERE name = ?1")
            .bind(table)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }
}

#[async_trait]
impl TableStore for SqliteTableStore {
    async fn create_table_if_not_exists(&self, table: &str) -> StorageResult<()> {
        sqlx::query("INSERT OR IGNORE INTO storage_tables (name) VALUES (?1)")
            .bind(table)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn add_entity(&self, table: &str, entity: TableEntity) -> StorageResult<()> {
        if !self.table_exists(table).await? {
            return Err(StorageError::not_found("table", table));
        }
        let properties = serde_json::to_string(&entity.properties)?;
        let result = sqlx::query(
            r#"INSERT INTO storage_entities (table_name, partition_key, row_key, properties)
               VALUES (?1, ?2, ?3, ?4)"#,
        )
        .bind(table)
        .bind(&entity.partition_key)
        .bind(&entity.row_key)
        .bind(properties)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(StorageError::conflict(
                "entity",
                format!("{}/{}", entity.partition_key, entity.row_key),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn query_entities(&self, table: &str) -> StorageResult<Vec<TableEntity>> {
        if !self.table_exists(table).await? {
            return Err(StorageError::not_found("table", table));
        }
        let mut rows = sqlx::query(
            r#"SELECT partition_key, row_key, properties FROM storage_entities
               WHERE table_name = ?1
               ORDER BY partition_key, row_key"#,
        )
        .bind(table)
        .fetch(&self.pool);

        let mut entities = Vec::new();
        while let Some(row) = rows.try_next().await? {
            let properties: String = row.try_get("properties")?;
            entities.push(TableEntity {
                partition_key: row.try_get("partition_key")?,
                row_key: row.try_get("row_key")?,
                properties: serde_json::from_str::<BTreeMap<String, String>>(&properties)?,
            });
        }
        Ok(entities)
    }
}
