use serde::{Deserialize, Serialize};

use crate::storage::{BlobItem, StorageError, TableEntity};

/// One customer/product row shown on the index page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerProduct {
    pub name: String,
    pub product: String,
}

impl From<TableEntity> for CustomerProduct {
    fn from(entity: TableEntity) -> Self {
        Self {
            name: entity.get_str("Name").unwrap_or_default().to_string(),
            product: entity.get_str("Product").unwrap_or_default().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedFile {
    pub file_name: String,
    pub url: String,
    pub is_image: bool,
}

impl UploadedFile {
    pub fn from_blob(item: BlobItem, is_image: bool) -> Self {
        Self { file_name: item.name, url: item.url, is_image }
    }
}

/// The outcome of loading one section of the index page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Section<T> {
    Loaded { items: Vec<T> },
    Unavailable { reason: String },
}

impl<T> Section<T> {
    pub fn loaded(items: Vec<T>) -> Self {
        Section::Loaded { items }
    }

    /// Maps a backend result. A resource that was never created is an empty
    /// section rather than a failure.
    pub fn from_result(label: &str, result: Result<Vec<T>, StorageError>) -> Self {
        match result {
            Ok(items) => Section::Loaded { items },
            Err(e) if e.is_not_found() => {
                tracing::debug!("{} not created yet: {}", label, e);
                Section::Loaded { items: Vec::new() }
            }
            Err(e) => {
                tracing::error!("Error loading {}: {}", label, e);
                Section::Unavailable { reason: e.to_string() }
            }
        }
    }

    pub fn items(&self) -> &[T] {
        match self {
            Section::Loaded { items } => items,
            Section::Unavailable { .. } => &[],
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Section::Unavailable { .. })
    }
}

/// Request-scoped state of the index page.
#[derive(Debug, Clone, Serialize)]
pub struct IndexView {
    pub notice: Option<Notice>,
    pub customers: Section<CustomerProduct>,
    pub messages: Section<String>,
    pub images: Section<UploadedFile>,
    pub files: Section<UploadedFile>,
}

/// Success banner carried through the post-redirect-get cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Notice {
    TableAdded,
    QueueAdded,
    ImageUploaded,
    FileUploaded,
}

impl Notice {
    pub fn as_str(&self) -> &'static str {
        match self {
            Notice::TableAdded => "table_added",
            Notice::QueueAdded => "queue_added",
            Notice::ImageUploaded => "image_uploaded",
            Notice::FileUploaded => "file_uploaded",
        }
    }

    pub fn parse(s: &str) -> Option<Notice> {
        match s {
            "table_added" => Some(Notice::TableAdded),
            "queue_added" => Some(Notice::QueueAdded),
            "image_uploaded" => Some(Notice::ImageUploaded),
            "file_uploaded" => Some(Notice::FileUploaded),
            _ => None,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Notice::TableAdded => "Customer & product added to table storage!",
            Notice::QueueAdded => "Order added to the queue!",
            Notice::ImageUploaded => "Image uploaded to blob storage!",
            Notice::FileUploaded => "File uploaded to blob storage!",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IndexQuery {
    pub notice: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddTableForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub product: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddQueueForm {
    #[serde(default)]
    pub message: String,
}
