use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Request and backend counters for monitoring
#[derive(Clone)]
pub struct Metrics {
    pub index_views: Arc<AtomicU64>,
    pub rows_added: Arc<AtomicU64>,
    pub messages_sent: Arc<AtomicU64>,
    pub messages_received: Arc<AtomicU64>,
    pub images_uploaded: Arc<AtomicU64>,
    pub files_uploaded: Arc<AtomicU64>,
    pub section_failures: Arc<AtomicU64>,
    pub start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            index_views: Arc::new(AtomicU64::new(0)),
            rows_added: Arc::new(AtomicU64::new(0)),
            messages_sent: Arc::new(AtomicU64::new(0)),
            messages_received: Arc::new(AtomicU64::new(0)),
            images_uploaded: Arc::new(AtomicU64::new(0)),
            files_uploaded: Arc::new(AtomicU64::new(0)),
            section_failures: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn inc_index_views(&self) {
        self.index_views.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rows_added(&self) {
        self.rows_added.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_messages_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_messages_received(&self, count: u64) {
        self.messages_received.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_uploads(&self, is_image: bool) {
        if is_image {
            self.images_uploaded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.files_uploaded.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn add_section_failures(&self, count: u64) {
        self.section_failures.fetch_add(count, Ordering::Relaxed);
    }

    pub fn get_snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            index_views: self.index_views.load(Ordering::Relaxed),
            rows_added: self.rows_added.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            images_uploaded: self.images_uploaded.load(Ordering::Relaxed),
            files_uploaded: self.files_uploaded.load(Ordering::Relaxed),
            section_failures: self.section_failures.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
pub struct MetricsSnapshot {
    pub index_views: u64,
    pub rows_added: u64,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub images_uploaded: u64,
    pub files_uploaded: u64,
    pub section_failures: u64,
    pub uptime_seconds: u64,
}
