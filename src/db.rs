use async_trait::async_trait;
use sqlx::{migrate::MigrateDatabase, sqlite::SqlitePoolOptions, Row, Sqlite, SqlitePool};
use tracing::info;

use crate::config;

/// The fixed read behind the customer database page.
pub const CUSTOMERS_QUERY: &str = "SELECT Name FROM Customers";

/// Opens a SQLite pool, creating the database file (and its directory) when
/// missing.
pub async fn connect(url: &str) -> anyhow::Result<SqlitePool> {
    config::ensure_sqlite_parent_dir(url)?;
    if !Sqlite::database_exists(url).await.unwrap_or(false) {
        info!("Creating SQLite database at {}", url);
        Sqlite::create_database(url).await?;
    }
    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                let _ = sqlx::query("PRAGMA foreign_keys=ON;").execute(&mut *conn).await;
                let _ = sqlx::query("PRAGMA busy_timeout=10000;").execute(&mut *conn).await;
                Ok(())
            })
        })
        .connect(url)
        .await?;

    if let Err(e) = sqlx::query("PRAGMA journal_mode=WAL;").execute(&pool).await {
        tracing::warn!("Failed to set WAL journal mode: {}", e);
    }
    if let Err(e) = sqlx::query("PRAGMA synchronous=NORMAL;").execute(&pool).await {
        tracing::warn!("Failed to set synchronous mode: {}", e);
    }
    Ok(pool)
}

/// Creates the `Customers` table used by the database page.
pub async fn init_db(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS Customers (
            Id INTEGER PRIMARY KEY AUTOINCREMENT,
            Name TEXT NOT NULL
        )"#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Read access to the relational customer list.
#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    /// Every customer name, in result order.
    async fn customer_names(&self) -> Result<Vec<String>, sqlx::Error>;

    async fn ping(&self) -> Result<(), sqlx::Error>;
}

#[derive(Clone)]
pub struct SqlCustomerDirectory {
    pool: SqlitePool,
}

impl SqlCustomerDirectory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CustomerDirectory for SqlCustomerDirectory {
    async fn customer_names(&self) -> Result<Vec<String>, sqlx::Error> {
        let rows = sqlx::query(CUSTOMERS_QUERY).fetch_all(&self.pool).await?;
        rows.iter().map(|row| row.try_get::<String, _>(0)).collect()
    }

    async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}
