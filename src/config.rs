use std::path::Path;

use serde::Deserialize;

use crate::storage::naming::{validate_container_name, validate_queue_name, validate_table_name};
use crate::storage::MAX_VISIBILITY_TIMEOUT_SECS;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

/// Connection strings and resource names for the three storage backends.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub table_connection_string: String,
    pub table_name: String,
    pub queue_connection_string: String,
    pub queue_name: String,
    pub blob_connection_string: String,
    pub blob_container_name: String,
    pub file_container_name: String,
    /// Prefix for blob URLs. A path (`/blobs`) is mounted by the server when the
    /// blob backend is a local directory; an absolute URL is used verbatim.
    pub blob_public_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub init_schema: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    pub receive_batch: usize,
    pub visibility_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SecurityConfig {
    pub enable_hsts: Option<bool>,
    pub hsts_max_age: Option<u64>,
    pub hsts_include_subdomains: Option<bool>,
    pub csp: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub queue: QueueConfig,
    pub security: Option<SecurityConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        // Fallback: parse the embedded default TOML
        let defaults: &str = include_str!("../config/default.toml");
        match ::config::Config::builder()
            .add_source(::config::File::from_str(defaults, ::config::FileFormat::Toml))
            .build()
        {
            Ok(cfg) => match cfg.try_deserialize() {
                Ok(app_cfg) => app_cfg,
                Err(e) => panic!("Failed to deserialize default config: {}", e),
            },
            Err(e) => panic!("Failed to parse default config: {}", e),
        }
    }
}

pub fn load() -> anyhow::Result<AppConfig> {
    // Load .env first (optional)
    let _ = dotenvy::dotenv();

    let defaults: &str = include_str!("../config/default.toml");
    let mut builder = ::config::Config::builder()
        .add_source(::config::File::from_str(defaults, ::config::FileFormat::Toml))
        .add_source(::config::File::with_name("abc_retail").required(false));

    if let Ok(custom_path) = std::env::var("ABC_RETAIL_CONFIG") {
        builder = builder.add_source(::config::File::with_name(&custom_path).required(false));
    }
    // Environment variables last to have highest precedence
    builder = builder.add_source(::config::Environment::with_prefix("ABC_RETAIL").separator("__"));

    let cfg = builder.build()?;
    let app_cfg: AppConfig = cfg.try_deserialize()?;
    validate(&app_cfg)?;
    Ok(app_cfg)
}

pub fn validate(cfg: &AppConfig) -> anyhow::Result<()> {
    // Server
    if cfg.server.port == 0 {
        return Err(anyhow::anyhow!("invalid server.port: {}", cfg.server.port));
    }
    #[cfg(unix)]
    if cfg.server.port < 1024 {
        tracing::warn!("Using privileged port {} - may require elevated permissions", cfg.server.port);
    }
    if cfg.server.max_upload_bytes == 0 {
        return Err(anyhow::anyhow!("server.max_upload_bytes must be > 0"));
    }

    // Storage
    let s = &cfg.storage;
    for (key, value) in [
        ("storage.table_connection_string", &s.table_connection_string),
        ("storage.queue_connection_string", &s.queue_connection_string),
        ("storage.blob_connection_string", &s.blob_connection_string),
        ("database.url", &cfg.database.url),
    ] {
        if value.trim().is_empty() {
            return Err(anyhow::anyhow!("{} must not be empty", key));
        }
    }
    validate_table_name(&s.table_name).map_err(|e| anyhow::anyhow!("storage.table_name: {}", e))?;
    validate_queue_name(&s.queue_name).map_err(|e| anyhow::anyhow!("storage.queue_name: {}", e))?;
    validate_container_name(&s.blob_container_name)
        .map_err(|e| anyhow::anyhow!("storage.blob_container_name: {}", e))?;
    validate_container_name(&s.file_container_name)
        .map_err(|e| anyhow::anyhow!("storage.file_container_name: {}", e))?;
    if s.blob_container_name == s.file_container_name {
        return Err(anyhow::anyhow!(
            "storage.blob_container_name and storage.file_container_name must differ"
        ));
    }
    let url = s.blob_public_url.as_str();
    let is_absolute = url.starts_with("http://") || url.starts_with("https://");
    let is_mount = url.starts_with('/') && url.trim_end_matches('/').len() > 1;
    if !is_absolute && !is_mount {
        return Err(anyhow::anyhow!(
            "storage.blob_public_url must be a path like /blobs or an http(s) URL, got {:?}",
            url
        ));
    }

    // Queue
    if cfg.queue.receive_batch == 0 || cfg.queue.receive_batch > 32 {
        return Err(anyhow::anyhow!("queue.receive_batch must be in 1..=32"));
    }
    let visibility = cfg.queue.visibility_timeout_secs;
    if visibility == 0 || visibility > MAX_VISIBILITY_TIMEOUT_SECS {
        return Err(anyhow::anyhow!(
            "queue.visibility_timeout_secs must be in 1..={}",
            MAX_VISIBILITY_TIMEOUT_SECS
        ));
    }

    Ok(())
}

pub fn ensure_sqlite_parent_dir(url: &str) -> anyhow::Result<()> {
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .map(|p| p.split('?').next().unwrap_or(p));
    if let Some(path) = path {
        if path.is_empty() || path.starts_with(":memory:") {
            return Ok(());
        }
        // sqlite:///C:/data.db on Windows
        #[cfg(windows)]
        let path = {
            let bytes = path.as_bytes();
            if bytes.len() >= 3 && bytes[0] == b'/' && bytes[2] == b':' && bytes[1].is_ascii_alphabetic() {
                &path[1..]
            } else {
                path
            }
        };
        let p = Path::new(path);
        if let Some(parent) = p.parent() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
