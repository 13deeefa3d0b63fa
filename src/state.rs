use std::sync::Arc;

use tracing::info;

use crate::config::AppConfig;
use crate::db::{self, CustomerDirectory, SqlCustomerDirectory};
use crate::metrics::Metrics;
use crate::storage::{self, BlobStore, QueueStore, TableStore};

/// The shared application state.
///
/// Holds the backend client handles opened at startup. Handlers clone it
/// per request through Axum's `State` extractor; nothing in it is display
/// state, so requests never observe each other's view models.
#[derive(Clone)]
pub struct AppState {
    /// Table store holding customer/product entities.
    pub tables: Arc<dyn TableStore>,
    /// Queue store holding order messages.
    pub queues: Arc<dyn QueueStore>,
    /// Blob store holding both the image and the file container.
    pub blobs: Arc<dyn BlobStore>,
    /// Relational customer list.
    pub customers: Arc<dyn CustomerDirectory>,
    pub config: Arc<AppConfig>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        tables: Arc<dyn TableStore>,
        queues: Arc<dyn QueueStore>,
        blobs: Arc<dyn BlobStore>,
        customers: Arc<dyn CustomerDirectory>,
        config: AppConfig,
    ) -> Self {
        Self { tables, queues, blobs, customers, config: Arc::new(config), metrics: Metrics::new() }
    }

    /// Opens every backend named in `config`.
    pub async fn connect(config: AppConfig) -> anyhow::Result<Self> {
        let s = &config.storage;
        let tables = storage::open_table_store(&s.table_connection_string).await?;
        let queues = storage::open_queue_store(&s.queue_connection_string).await?;
        let blobs = storage::open_blob_store(&s.blob_connection_string, &s.blob_public_url).await?;
        info!("Storage backends ready (table: {}, queue: {})", s.table_name, s.queue_name);

        let pool = db::connect(&config.database.url).await?;
        if config.database.init_schema {
            db::init_db(&pool).await?;
        }
        let customers = Arc::new(SqlCustomerDirectory::new(pool));

        Ok(Self::new(tables, queues, blobs, customers, config))
    }
}
