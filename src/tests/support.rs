//! Test doubles and request helpers shared by the API tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use tower::ServiceExt;

use crate::config::AppConfig;
use crate::db::CustomerDirectory;
use crate::routes;
use crate::state::AppState;
use crate::storage::{
    BlobItem, BlobStore, MemoryBlobStore, MemoryQueueStore, MemoryTableStore, QueueStore, ReceivedMessage,
    StorageError, StorageResult, TableEntity, TableStore,
};

fn unreachable_backend() -> StorageError {
    StorageError::Io(std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused"))
}

/// Wraps a store, counting every call and optionally failing all of them,
/// or only queue deletes.
pub struct Recording<S> {
    pub inner: S,
    calls: AtomicUsize,
    fail: bool,
    fail_deletes: bool,
}

impl<S> Recording<S> {
    pub fn new(inner: S) -> Self {
        Self { inner, calls: AtomicUsize::new(0), fail: false, fail_deletes: false }
    }

    pub fn failing(inner: S) -> Self {
        Self { fail: true, ..Self::new(inner) }
    }

    pub fn failing_deletes(inner: S) -> Self {
        Self { fail_deletes: true, ..Self::new(inner) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn enter(&self) -> StorageResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(unreachable_backend())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl<S: TableStore> TableStore for Recording<S> {
    async fn create_table_if_not_exists(&self, table: &str) -> StorageResult<()> {
        self.enter()?;
        self.inner.create_table_if_not_exists(table).await
    }

    async fn add_entity(&self, table: &str, entity: TableEntity) -> StorageResult<()> {
        self.enter()?;
        self.inner.add_entity(table, entity).await
    }

    async fn query_entities(&self, table: &str) -> StorageResult<Vec<TableEntity>> {
        self.enter()?;
        self.inner.query_entities(table).await
    }
}

#[async_trait]
impl<S: QueueStore> QueueStore for Recording<S> {
    async fn create_queue_if_not_exists(&self, queue: &str) -> StorageResult<()> {
        self.enter()?;
        self.inner.create_queue_if_not_exists(queue).await
    }

    async fn send_message(&self, queue: &str, text: &str) -> StorageResult<String> {
        self.enter()?;
        self.inner.send_message(queue, text).await
    }

    async fn receive_messages(
        &self,
        queue: &str,
        max: usize,
        visibility_timeout: Duration,
    ) -> StorageResult<Vec<ReceivedMessage>> {
        self.enter()?;
        self.inner.receive_messages(queue, max, visibility_timeout).await
    }

    async fn delete_message(&self, queue: &str, id: &str, pop_receipt: &str) -> StorageResult<()> {
        self.enter()?;
        if self.fail_deletes {
            return Err(unreachable_backend());
        }
        self.inner.delete_message(queue, id, pop_receipt).await
    }
}

#[async_trait]
impl<S: BlobStore> BlobStore for Recording<S> {
    async fn create_container_if_not_exists(&self, container: &str) -> StorageResult<()> {
        self.enter()?;
        self.inner.create_container_if_not_exists(container).await
    }

    async fn upload(&self, container: &str, name: &str, data: &[u8], overwrite: bool) -> StorageResult<BlobItem> {
        self.enter()?;
        self.inner.upload(container, name, data, overwrite).await
    }

    async fn list_blobs(&self, container: &str) -> StorageResult<Vec<BlobItem>> {
        self.enter()?;
        self.inner.list_blobs(container).await
    }

    fn blob_url(&self, container: &str, name: &str) -> String {
        self.inner.blob_url(container, name)
    }

    fn local_root(&self) -> Option<&std::path::Path> {
        self.inner.local_root()
    }
}

/// Relational reader returning a fixed list, or failing every call.
pub struct StaticCustomers {
    names: Option<Vec<String>>,
}

impl StaticCustomers {
    pub fn new(names: &[&str]) -> Self {
        Self { names: Some(names.iter().map(|n| n.to_string()).collect()) }
    }

    pub fn failing() -> Self {
        Self { names: None }
    }
}

#[async_trait]
impl CustomerDirectory for StaticCustomers {
    async fn customer_names(&self) -> Result<Vec<String>, sqlx::Error> {
        self.names.clone().ok_or_else(|| sqlx::Error::Protocol("server closed the connection".into()))
    }

    async fn ping(&self) -> Result<(), sqlx::Error> {
        match self.names {
            Some(_) => Ok(()),
            None => Err(sqlx::Error::PoolTimedOut),
        }
    }
}

/// Defaults with every backend in memory.
pub fn test_config() -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.storage.table_connection_string = "memory".into();
    cfg.storage.queue_connection_string = "memory".into();
    cfg.storage.blob_connection_string = "memory".into();
    cfg
}

pub struct Harness<B: BlobStore + 'static = MemoryBlobStore> {
    pub app: Router,
    pub state: AppState,
    pub tables: Arc<Recording<MemoryTableStore>>,
    pub queues: Arc<Recording<MemoryQueueStore>>,
    pub blobs: Arc<Recording<B>>,
}

pub fn harness() -> Harness {
    harness_with(
        Recording::new(MemoryTableStore::new()),
        Recording::new(MemoryBlobStore::new("/blobs")),
        StaticCustomers::new(&["Alice", "Bob"]),
    )
}

pub fn harness_with<B: BlobStore + 'static>(
    tables: Recording<MemoryTableStore>,
    blobs: Recording<B>,
    customers: StaticCustomers,
) -> Harness<B> {
    harness_full(tables, Recording::new(MemoryQueueStore::new()), blobs, customers)
}

pub fn harness_full<B: BlobStore + 'static>(
    tables: Recording<MemoryTableStore>,
    queues: Recording<MemoryQueueStore>,
    blobs: Recording<B>,
    customers: StaticCustomers,
) -> Harness<B> {
    let tables = Arc::new(tables);
    let queues = Arc::new(queues);
    let blobs = Arc::new(blobs);
    let state = AppState::new(tables.clone(), queues.clone(), blobs.clone(), Arc::new(customers), test_config());
    let app = routes::router(state.clone());
    Harness { app, state, tables, queues, blobs }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn location(&self) -> Option<&str> {
        self.headers.get(header::LOCATION).and_then(|v| v.to_str().ok())
    }
}

pub async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes().to_vec();
    TestResponse { status, headers, body }
}

pub async fn get(app: &Router, uri: &str) -> TestResponse {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

pub async fn post_form(app: &Router, uri: &str, body: &str) -> TestResponse {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

const BOUNDARY: &str = "----abc-retail-test-boundary";

/// Posts a multipart body with one `file` part. `None` sends the part a
/// browser submits when no file was chosen.
pub async fn post_upload(app: &Router, uri: &str, file: Option<(&str, &[u8])>) -> TestResponse {
    let (file_name, data) = file.unwrap_or(("", &[][..]));
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n", file_name).as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    post_multipart(app, uri, body).await
}

pub async fn post_multipart(app: &Router, uri: &str, body: Vec<u8>) -> TestResponse {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", BOUNDARY))
        .body(Body::from(body))
        .unwrap();
    send(app, request).await
}

pub fn multipart_text_field(name: &str, value: &str) -> Vec<u8> {
    format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n--{b}--\r\n",
        b = BOUNDARY
    )
    .into_bytes()
}
