//! Process-local drivers for the `memory` connection string.
//!
//! Contents are lost on restart. Useful for demos and tests.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::naming::validate_blob_name;
use super::{
    check_message_size, check_visibility_timeout, clamp_batch, join_blob_url, BlobItem, BlobStore, QueueStore,
    ReceivedMessage, StorageError, StorageResult, TableEntity, TableStore,
};

#[derive(Default)]
pub struct MemoryTableStore {
    // table -> (partition_key, row_key) -> properties
    tables: RwLock<HashMap<String, BTreeMap<(String, String), BTreeMap<String, String>>>>,
}

impl MemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TableStore for MemoryTableStore {
    async fn create_table_if_not_exists(&self, table: &str) -> StorageResult<()> {
        self.tables.write().await.entry(table.to_string()).or_default();
        Ok(())
    }

    async fn add_entity(&self, table: &str, entity: TableEntity) -> StorageResult<()> {
        let mut tables = self.tables.write().await;
        let rows = tables.get_mut(table).ok_or_else(|| StorageError::not_found("table", table))?;
        let key = (entity.partition_key, entity.row_key);
        if rows.contains_key(&key) {
            return Err(StorageError::conflict("entity", format!("{}/{}", key.0, key.1)));
        }
        rows.insert(key, entity.properties);
        Ok(())
    }

    async fn query_entities(&self, table: &str) -> StorageResult<Vec<TableEntity>> {
        let tables = self.tables.read().await;
        let rows = tables.get(table).ok_or_else(|| StorageError::not_found("table", table))?;
        Ok(rows
            .iter()
            .map(|((pk, rk), props)| TableEntity {
                partition_key: pk.clone(),
                row_key: rk.clone(),
                properties: props.clone(),
            })
            .collect())
    }
}

struct StoredMessage {
    id: String,
    text: String,
    visible_at: Instant,
    pop_receipt: Option<String>,
    dequeue_count: u32,
}

#[derive(Default)]
pub struct MemoryQueueStore {
    queues: RwLock<HashMap<String, VecDeque<StoredMessage>>>,
}

impl MemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    async fn create_queue_if_not_exists(&self, queue: &str) -> StorageResult<()> {
        self.queues.write().await.entry(queue.to_string()).or_default();
        Ok(())
    }

    async fn send_message(&self, queue: &str, text: &str) -> StorageResult<String> {
        check_message_size(text)?;
        let mut queues = self.queues.write().await;
        let messages = queues.get_mut(queue).ok_or_else(|| StorageError::not_found("queue", queue))?;
        let id = Uuid::new_v4().to_string();
        messages.push_back(StoredMessage {
            id: id.clone(),
            text: text.to_string(),
            visible_at: Instant::now(),
            pop_receipt: None,
            dequeue_count: 0,
        });
        Ok(id)
    }

    async fn receive_messages(
        &self,
        queue: &str,
        max: usize,
        visibility_timeout: Duration,
    ) -> StorageResult<Vec<ReceivedMessage>> {
        check_visibility_timeout(visibility_timeout)?;
        let mut queues = self.queues.write().await;
        let messages = queues.get_mut(queue).ok_or_else(|| StorageError::not_found("queue", queue))?;
        let now = Instant::now();
        let hidden_until = now
            .checked_add(visibility_timeout)
            .ok_or_else(|| StorageError::InvalidInput("visibility timeout out of range".into()))?;
        let mut claimed = Vec::new();
        for msg in messages.iter_mut().filter(|m| m.visible_at <= now).take(clamp_batch(max)) {
            let pop_receipt = Uuid::new_v4().to_string();
            msg.visible_at = hidden_until;
            msg.pop_receipt = Some(pop_receipt.clone());
            msg.dequeue_count += 1;
            claimed.push(ReceivedMessage {
                id: msg.id.clone(),
                text: msg.text.clone(),
                pop_receipt,
                dequeue_count: msg.dequeue_count,
            });
        }
        Ok(claimed)
    }

    async fn delete_message(&self, queue: &str, id: &str, pop_receipt: &str) -> StorageResult<()> {
        let mut queues = self.queues.write().await;
        let messages = queues.get_mut(queue).ok_or_else(|| StorageError::not_found("queue", queue))?;
        let pos = messages
            .iter()
            .position(|m| m.id == id && m.pop_receipt.as_deref() == Some(pop_receipt))
            .ok_or_else(|| StorageError::not_found("message", id))?;
        messages.remove(pos);
        Ok(())
    }
}

pub struct MemoryBlobStore {
    containers: RwLock<HashMap<String, BTreeMap<String, Vec<u8>>>>,
    public_url: String,
}

impl MemoryBlobStore {
    pub fn new(public_url: &str) -> Self {
        Self { containers: RwLock::new(HashMap::new()), public_url: public_url.to_string() }
    }

    /// Stored bytes of a blob, if present.
    pub async fn read(&self, container: &str, name: &str) -> Option<Vec<u8>> {
        self.containers.read().await.get(container).and_then(|c| c.get(name)).cloned()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn create_container_if_not_exists(&self, container: &str) -> StorageResult<()> {
        self.containers.write().await.entry(container.to_string()).or_default();
        Ok(())
    }

    async fn upload(&self, container: &str, name: &str, data: &[u8], overwrite: bool) -> StorageResult<BlobItem> {
        validate_blob_name(name)?;
        let mut containers = self.containers.write().await;
        let blobs =
            containers.get_mut(container).ok_or_else(|| StorageError::not_found("container", container))?;
        if !overwrite && blobs.contains_key(name) {
            return Err(StorageError::conflict("blob", format!("{}/{}", container, name)));
        }
        blobs.insert(name.to_string(), data.to_vec());
        Ok(BlobItem { name: name.to_string(), url: self.blob_url(container, name), size: data.len() as u64 })
    }

    async fn list_blobs(&self, container: &str) -> StorageResult<Vec<BlobItem>> {
        let containers = self.containers.read().await;
        let blobs = containers.get(container).ok_or_else(|| StorageError::not_found("container", container))?;
        Ok(blobs
            .iter()
            .map(|(name, data)| BlobItem {
                name: name.clone(),
                url: self.blob_url(container, name),
                size: data.len() as u64,
            })
            .collect())
    }

    fn blob_url(&self, container: &str, name: &str) -> String {
        join_blob_url(&self.public_url, container, name)
    }
}
