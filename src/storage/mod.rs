//! Storage backends behind the request handlers.
//!
//! Three async traits describe the remote stores the retail front-end talks to:
//!
//! - [`TableStore`]: schemaless entities keyed by partition and row key
//! - [`QueueStore`]: text messages with receive/delete and pop receipts
//! - [`BlobStore`]: named binary objects grouped into containers
//!
//! Each trait has drivers selected by connection string:
//!
//! | Scheme            | Table | Queue | Blob |
//! |-------------------|-------|-------|------|
//! | `sqlite://...`    | yes   | yes   |      |
//! | `file://...`      |       |       | yes  |
//! | `memory`          | yes   | yes   | yes  |
//!
//! Handles are opened once at startup and shared across requests.

pub mod blob;
pub mod memory;
pub mod naming;
pub mod queue;
pub mod table;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use blob::LocalBlobStore;
pub use memory::{MemoryBlobStore, MemoryQueueStore, MemoryTableStore};
pub use queue::SqliteQueueStore;
pub use table::SqliteTableStore;

/// Upper bound on messages a single receive call may claim.
pub const MAX_RECEIVE_BATCH: usize = 32;
/// Upper bound on a queue message body, in bytes.
pub const MAX_MESSAGE_BYTES: usize = 64 * 1024;
/// Longest time a received message may stay hidden (7 days).
pub const MAX_VISIBILITY_TIMEOUT_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },
    #[error("{kind} '{name}' already exists")]
    Conflict { kind: &'static str, name: String },
    #[error("invalid {kind} name '{name}': {reason}")]
    InvalidName { kind: &'static str, name: String, reason: String },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("unsupported connection string for {kind} storage: {value}")]
    UnsupportedConnection { kind: &'static str, value: String },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StorageError {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        StorageError::NotFound { kind, name: name.into() }
    }

    pub fn conflict(kind: &'static str, name: impl Into<String>) -> Self {
        StorageError::Conflict { kind, name: name.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// A schemaless table row. Property values are strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableEntity {
    pub partition_key: String,
    pub row_key: String,
    pub properties: BTreeMap<String, String>,
}

impl TableEntity {
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>) -> Self {
        Self { partition_key: partition_key.into(), row_key: row_key.into(), properties: BTreeMap::new() }
    }

    /// Entity keyed by two fresh random identifiers.
    pub fn with_random_keys() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), uuid::Uuid::new_v4().to_string())
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

/// A message claimed by [`QueueStore::receive_messages`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub id: String,
    pub text: String,
    pub pop_receipt: String,
    pub dequeue_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlobItem {
    pub name: String,
    pub url: String,
    pub size: u64,
}

#[async_trait]
pub trait TableStore: Send + Sync {
    async fn create_table_if_not_exists(&self, table: &str) -> StorageResult<()>;

    /// Fails with `Conflict` when the key pair is taken and `NotFound` when the
    /// table was never created.
    async fn add_entity(&self, table: &str, entity: TableEntity) -> StorageResult<()>;

    /// All entities ordered by partition key, then row key.
    async fn query_entities(&self, table: &str) -> StorageResult<Vec<TableEntity>>;
}

#[async_trait]
pub trait QueueStore: Send + Sync {
    async fn create_queue_if_not_exists(&self, queue: &str) -> StorageResult<()>;

    /// Returns the new message id.
    async fn send_message(&self, queue: &str, text: &str) -> StorageResult<String>;

    /// Claims up to `max` visible messages (clamped to 1..=32), hiding them for
    /// `visibility_timeout` and issuing a fresh pop receipt for each.
    async fn receive_messages(
        &self,
        queue: &str,
        max: usize,
        visibility_timeout: Duration,
    ) -> StorageResult<Vec<ReceivedMessage>>;

    /// Deletes a claimed message. A stale pop receipt is `NotFound`.
    async fn delete_message(&self, queue: &str, id: &str, pop_receipt: &str) -> StorageResult<()>;
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn create_container_if_not_exists(&self, container: &str) -> StorageResult<()>;

    async fn upload(&self, container: &str, name: &str, data: &[u8], overwrite: bool) -> StorageResult<BlobItem>;

    /// Blobs sorted by name.
    async fn list_blobs(&self, container: &str) -> StorageResult<Vec<BlobItem>>;

    fn blob_url(&self, container: &str, name: &str) -> String;

    /// Directory holding the containers, when blobs live on the local disk and
    /// the server should serve them itself.
    fn local_root(&self) -> Option<&Path> {
        None
    }
}

pub(crate) fn clamp_batch(max: usize) -> usize {
    max.clamp(1, MAX_RECEIVE_BATCH)
}

pub(crate) fn check_visibility_timeout(timeout: Duration) -> StorageResult<()> {
    if timeout > Duration::from_secs(MAX_VISIBILITY_TIMEOUT_SECS) {
        return Err(StorageError::InvalidInput(format!(
            "visibility timeout of {}s exceeds {}s",
            timeout.as_secs(),
            MAX_VISIBILITY_TIMEOUT_SECS
        )));
    }
    Ok(())
}

pub(crate) fn check_message_size(text: &str) -> StorageResult<()> {
    if text.len() > MAX_MESSAGE_BYTES {
        return Err(StorageError::InvalidInput(format!(
            "message is {} bytes, limit is {}",
            text.len(),
            MAX_MESSAGE_BYTES
        )));
    }
    Ok(())
}

/// Joins a URL prefix, a container and a percent-encoded blob name.
pub(crate) fn join_blob_url(public_url: &str, container: &str, name: &str) -> String {
    format!("{}/{}/{}", public_url.trim_end_matches('/'), container, urlencoding::encode(name))
}

/// A parsed backend connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Sqlite(String),
    Local(PathBuf),
    Memory,
}

impl Backend {
    pub fn parse(value: &str) -> Option<Backend> {
        let value = value.trim();
        if value == "memory" || value == "memory://" {
            Some(Backend::Memory)
        } else if value.starts_with("sqlite:") {
            Some(Backend::Sqlite(value.to_string()))
        } else {
            value
                .strip_prefix("file://")
                .filter(|p| !p.is_empty())
                .map(|p| Backend::Local(PathBuf::from(p)))
        }
    }
}

fn unsupported(kind: &'static str, value: &str) -> anyhow::Error {
    StorageError::UnsupportedConnection { kind, value: value.to_string() }.into()
}

pub async fn open_table_store(connection_string: &str) -> anyhow::Result<Arc<dyn TableStore>> {
    match Backend::parse(connection_string) {
        Some(Backend::Sqlite(url)) => {
            let pool = crate::db::connect(&url).await?;
            Ok(Arc::new(SqliteTableStore::open(pool).await?))
        }
        Some(Backend::Memory) => Ok(Arc::new(MemoryTableStore::new())),
        _ => Err(unsupported("table", connection_string)),
    }
}

pub async fn open_queue_store(connection_string: &str) -> anyhow::Result<Arc<dyn QueueStore>> {
    match Backend::parse(connection_string) {
        Some(Backend::Sqlite(url)) => {
            let pool = crate::db::connect(&url).await?;
            Ok(Arc::new(SqliteQueueStore::open(pool).await?))
        }
        Some(Backend::Memory) => Ok(Arc::new(MemoryQueueStore::new())),
        _ => Err(unsupported("queue", connection_string)),
    }
}

pub async fn open_blob_store(connection_string: &str, public_url: &str) -> anyhow::Result<Arc<dyn BlobStore>> {
    match Backend::parse(connection_string) {
        Some(Backend::Local(root)) => Ok(Arc::new(LocalBlobStore::open(root, public_url).await?)),
        Some(Backend::Memory) => Ok(Arc::new(MemoryBlobStore::new(public_url))),
        _ => Err(unsupported("blob", connection_string)),
    }
}
