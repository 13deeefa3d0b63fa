use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, Multipart, Query, State},
    response::{Html, Redirect},
    Form,
};
use tracing::{debug, info, warn};

use crate::{
    error::AppResult,
    state::AppState,
    storage::{naming::blob_name_from_upload, StorageResult, TableEntity},
    types::{AddQueueForm, AddTableForm, CustomerProduct, IndexQuery, IndexView, Notice, Section, UploadedFile},
    views,
};

const INDEX_PATH: &str = "/Home/Index";

fn back_to_index(notice: Option<Notice>) -> Redirect {
    match notice {
        Some(n) => Redirect::to(&format!("{}?notice={}", INDEX_PATH, n.as_str())),
        None => Redirect::to(INDEX_PATH),
    }
}

pub async fn root() -> Redirect {
    back_to_index(None)
}

/// Refreshes every section from its backend and renders the page.
///
/// Sections load one after another; a failing backend only blanks its own
/// section.
pub async fn index(State(state): State<AppState>, Query(query): Query<IndexQuery>) -> Html<String> {
    state.metrics.inc_index_views();
    let cfg = &state.config.storage;

    let customers = Section::from_result("table data", load_customers(&state).await);
    let messages = Section::from_result("queue data", drain_queue(&state).await);
    let images = Section::from_result(
        "image container",
        load_uploads(&state, &cfg.blob_container_name, true).await,
    );
    let files = Section::from_result(
        "file container",
        load_uploads(&state, &cfg.file_container_name, false).await,
    );

    let view = IndexView {
        notice: query.notice.as_deref().and_then(Notice::parse),
        customers,
        messages,
        images,
        files,
    };
    let failed = [
        view.customers.is_unavailable(),
        view.messages.is_unavailable(),
        view.images.is_unavailable(),
        view.files.is_unavailable(),
    ]
    .into_iter()
    .filter(|failed| *failed)
    .count();
    state.metrics.add_section_failures(failed as u64);

    Html(views::render_index(&view))
}

async fn load_customers(state: &AppState) -> StorageResult<Vec<CustomerProduct>> {
    let entities = state.tables.query_entities(&state.config.storage.table_name).await?;
    Ok(entities.into_iter().map(CustomerProduct::from).collect())
}

/// Receives a batch and deletes every message it returns. A message whose
/// delete fails is left out so it reappears after the visibility timeout.
async fn drain_queue(state: &AppState) -> StorageResult<Vec<String>> {
    let queue = &state.config.storage.queue_name;
    let visibility = Duration::from_secs(state.config.queue.visibility_timeout_secs);
    let received = state.queues.receive_messages(queue, state.config.queue.receive_batch, visibility).await?;

    let mut shown = Vec::with_capacity(received.len());
    for msg in received {
        match state.queues.delete_message(queue, &msg.id, &msg.pop_receipt).await {
            Ok(()) => shown.push(msg.text),
            Err(e) => warn!("Failed to delete queue message {}: {}", msg.id, e),
        }
    }
    state.metrics.add_messages_received(shown.len() as u64);
    Ok(shown)
}

async fn load_uploads(state: &AppState, container: &str, is_image: bool) -> StorageResult<Vec<UploadedFile>> {
    let blobs = state.blobs.list_blobs(container).await?;
    Ok(blobs.into_iter().map(|b| UploadedFile::from_blob(b, is_image)).collect())
}

pub async fn add_table(State(state): State<AppState>, Form(form): Form<AddTableForm>) -> AppResult<Redirect> {
    let name = form.name.trim();
    let product = form.product.trim();
    if name.is_empty() || product.is_empty() {
        return Ok(back_to_index(None));
    }

    let table = &state.config.storage.table_name;
    state.tables.create_table_if_not_exists(table).await?;
    let entity = TableEntity::with_random_keys().with_property("Name", name).with_property("Product", product);
    state.tables.add_entity(table, entity).await?;
    state.metrics.inc_rows_added();
    info!("Added customer/product row to table {}", table);

    Ok(back_to_index(Some(Notice::TableAdded)))
}

pub async fn add_queue(State(state): State<AppState>, Form(form): Form<AddQueueForm>) -> AppResult<Redirect> {
    if form.message.trim().is_empty() {
        return Ok(back_to_index(None));
    }

    let queue = &state.config.storage.queue_name;
    state.queues.create_queue_if_not_exists(queue).await?;
    let id = state.queues.send_message(queue, &form.message).await?;
    state.metrics.inc_messages_sent();
    info!("Sent message {} to queue {}", id, queue);

    Ok(back_to_index(Some(Notice::QueueAdded)))
}

pub async fn upload_blob(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Redirect> {
    let container = state.config.storage.blob_container_name.clone();
    upload_into(&state, multipart, &container, true).await
}

pub async fn upload_file(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Redirect> {
    let container = state.config.storage.file_container_name.clone();
    upload_into(&state, multipart, &container, false).await
}

/// Uploaded file pulled out of a multipart body.
struct FilePart {
    file_name: String,
    data: Bytes,
}

/// Finds the `file` field. A field without a file name is the browser's
/// "no file chosen" part and counts as absent.
async fn read_file_part(mut multipart: Multipart) -> AppResult<Option<FilePart>> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = match field.file_name() {
            Some(n) if !n.trim().is_empty() => n.to_string(),
            _ => return Ok(None),
        };
        let data = field.bytes().await?;
        return Ok(Some(FilePart { file_name, data }));
    }
    Ok(None)
}

/// A post without a multipart body carries no file, same as an empty file
/// input, and redirects without touching the blob store.
async fn upload_into(
    state: &AppState,
    multipart: Result<Multipart, MultipartRejection>,
    container: &str,
    is_image: bool,
) -> AppResult<Redirect> {
    let multipart = match multipart {
        Ok(m) => m,
        Err(rejection) => {
            debug!("Upload without multipart body: {}", rejection.body_text());
            return Ok(back_to_index(None));
        }
    };
    let Some(part) = read_file_part(multipart).await? else {
        return Ok(back_to_index(None));
    };
    let blob_name = blob_name_from_upload(&part.file_name)?;

    state.blobs.create_container_if_not_exists(container).await?;
    let item = state.blobs.upload(container, &blob_name, &part.data, true).await?;
    state.metrics.inc_uploads(is_image);
    info!("Uploaded {} ({} bytes) to container {}", item.name, item.size, container);

    let notice = if is_image { Notice::ImageUploaded } else { Notice::FileUploaded };
    Ok(back_to_index(Some(notice)))
}

/// Renders the relational customer list. Failures surface as an error page.
pub async fn database(State(state): State<AppState>) -> AppResult<Html<String>> {
    let customers = state.customers.customer_names().await?;
    Ok(Html(views::render_database(&customers)))
}
