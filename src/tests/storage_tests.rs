#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tempfile::TempDir;

    use crate::db;
    use crate::storage::{
        BlobStore, LocalBlobStore, MemoryQueueStore, QueueStore, SqliteQueueStore, SqliteTableStore, StorageError,
        TableEntity, TableStore, MAX_MESSAGE_BYTES, MAX_VISIBILITY_TIMEOUT_SECS,
    };

    const HIDE: Duration = Duration::from_secs(30);

    async fn sqlite_pool(dir: &TempDir) -> sqlx::SqlitePool {
        let url = format!("sqlite://{}", dir.path().join("storage.db").display());
        db::connect(&url).await.unwrap()
    }

    #[tokio::test]
    async fn test_sqlite_table_roundtrip_and_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteTableStore::open(sqlite_pool(&dir).await).await.unwrap();
        store.create_table_if_not_exists("Customers").await.unwrap();
        store.create_table_if_not_exists("Customers").await.unwrap();

        store.add_entity("Customers", TableEntity::new("b", "1").with_property("Name", "Bea")).await.unwrap();
        store.add_entity("Customers", TableEntity::new("a", "2").with_property("Name", "Al")).await.unwrap();
        store.add_entity("Customers", TableEntity::new("a", "1").with_property("Name", "Ann")).await.unwrap();

        let rows = store.query_entities("customers").await.unwrap();
        let names: Vec<_> = rows.iter().map(|e| e.get_str("Name").unwrap()).collect();
        assert_eq!(names, vec!["Ann", "Al", "Bea"]);
    }

    #[tokio::test]
    async fn test_sqlite_table_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteTableStore::open(sqlite_pool(&dir).await).await.unwrap();

        let err = store.query_entities("Missing").await.unwrap_err();
        assert!(err.is_not_found());
        let err = store.add_entity("Missing", TableEntity::new("p", "r")).await.unwrap_err();
        assert!(err.is_not_found());

        store.create_table_if_not_exists("Orders").await.unwrap();
        store.add_entity("Orders", TableEntity::new("p", "r")).await.unwrap();
        let err = store.add_entity("Orders", TableEntity::new("p", "r")).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict { .. }), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_sqlite_table_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = SqliteTableStore::open(sqlite_pool(&dir).await).await.unwrap();
            store.create_table_if_not_exists("Customers").await.unwrap();
            store.add_entity("Customers", TableEntity::with_random_keys().with_property("Name", "Kim")).await.unwrap();
        }
        let store = SqliteTableStore::open(sqlite_pool(&dir).await).await.unwrap();
        let rows = store.query_entities("Customers").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_str("Name"), Some("Kim"));
    }

    #[tokio::test]
    async fn test_sqlite_queue_receive_hides_and_delete_removes() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteQueueStore::open(sqlite_pool(&dir).await).await.unwrap();
        assert!(store.send_message("orders", "x").await.unwrap_err().is_not_found());

        store.create_queue_if_not_exists("orders").await.unwrap();
        for text in ["one", "two", "three"] {
            store.send_message("orders", text).await.unwrap();
        }

        let batch = store.receive_messages("orders", 2, HIDE).await.unwrap();
        let texts: Vec<_> = batch.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "two"]);
        assert!(batch.iter().all(|m| m.dequeue_count == 1));

        // Claimed messages stay hidden until the timeout
        let rest = store.receive_messages("orders", 32, HIDE).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].text, "three");
        assert!(store.receive_messages("orders", 32, HIDE).await.unwrap().is_empty());

        for m in batch.iter().chain(rest.iter()) {
            store.delete_message("orders", &m.id, &m.pop_receipt).await.unwrap();
        }
        let err = store.delete_message("orders", &batch[0].id, &batch[0].pop_receipt).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_sqlite_queue_stale_pop_receipt() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteQueueStore::open(sqlite_pool(&dir).await).await.unwrap();
        store.create_queue_if_not_exists("orders").await.unwrap();
        store.send_message("orders", "retry me").await.unwrap();

        let first = store.receive_messages("orders", 1, Duration::ZERO).await.unwrap();
        let second = store.receive_messages("orders", 1, HIDE).await.unwrap();
        assert_eq!(first[0].id, second[0].id);
        assert_eq!(second[0].dequeue_count, 2);
        assert_ne!(first[0].pop_receipt, second[0].pop_receipt);

        let err = store.delete_message("orders", &first[0].id, &first[0].pop_receipt).await.unwrap_err();
        assert!(err.is_not_found());
        store.delete_message("orders", &second[0].id, &second[0].pop_receipt).await.unwrap();
    }

    #[tokio::test]
    async fn test_sqlite_queue_batch_is_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteQueueStore::open(sqlite_pool(&dir).await).await.unwrap();
        store.create_queue_if_not_exists("bulk").await.unwrap();
        for i in 0..40 {
            store.send_message("bulk", &i.to_string()).await.unwrap();
        }
        assert_eq!(store.receive_messages("bulk", 100, HIDE).await.unwrap().len(), 32);
        assert_eq!(store.receive_messages("bulk", 0, HIDE).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_queue_rejects_oversized_message() {
        let store = MemoryQueueStore::new();
        store.create_queue_if_not_exists("orders").await.unwrap();
        let big = "x".repeat(MAX_MESSAGE_BYTES + 1);
        let err = store.send_message("orders", &big).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidInput(_)));
        assert!(store.send_message("orders", &"x".repeat(MAX_MESSAGE_BYTES)).await.is_ok());
    }

    #[tokio::test]
    async fn test_queue_rejects_out_of_range_visibility_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let sqlite = SqliteQueueStore::open(sqlite_pool(&dir).await).await.unwrap();
        let memory = MemoryQueueStore::new();
        let stores: [&dyn QueueStore; 2] = [&sqlite, &memory];
        for store in stores {
            store.create_queue_if_not_exists("orders").await.unwrap();
            store.send_message("orders", "hello").await.unwrap();

            for timeout in [Duration::from_secs(u64::MAX), Duration::from_secs(MAX_VISIBILITY_TIMEOUT_SECS + 1)] {
                let err = store.receive_messages("orders", 32, timeout).await.unwrap_err();
                assert!(matches!(err, StorageError::InvalidInput(_)));
            }

            // The rejected receives claimed nothing
            let max = Duration::from_secs(MAX_VISIBILITY_TIMEOUT_SECS);
            let claimed = store.receive_messages("orders", 32, max).await.unwrap();
            assert_eq!(claimed.len(), 1);
            assert_eq!(claimed[0].dequeue_count, 1);
            assert!(store.receive_messages("orders", 32, HIDE).await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_memory_queue_stale_pop_receipt() {
        let store = MemoryQueueStore::new();
        store.create_queue_if_not_exists("orders").await.unwrap();
        store.send_message("orders", "hello").await.unwrap();

        let first = store.receive_messages("orders", 32, Duration::ZERO).await.unwrap();
        let second = store.receive_messages("orders", 32, HIDE).await.unwrap();
        assert_eq!(second.len(), 1);
        assert!(store.delete_message("orders", &first[0].id, &first[0].pop_receipt).await.is_err());
        store.delete_message("orders", &second[0].id, &second[0].pop_receipt).await.unwrap();
        assert!(store.receive_messages("orders", 32, Duration::ZERO).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_local_blob_upload_list_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::open(dir.path(), "/blobs").await.unwrap();

        let err = store.upload("images", "a.png", b"1", true).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(store.list_blobs("images").await.unwrap_err().is_not_found());

        store.create_container_if_not_exists("images").await.unwrap();
        let item = store.upload("images", "b c.png", b"12345", true).await.unwrap();
        assert_eq!(item.url, "/blobs/images/b%20c.png");
        assert_eq!(item.size, 5);
        store.upload("images", "a.png", b"1", true).await.unwrap();

        let err = store.upload("images", "a.png", b"22", false).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict { .. }));
        store.upload("images", "a.png", b"22", true).await.unwrap();

        let listed = store.list_blobs("images").await.unwrap();
        let names: Vec<_> = listed.iter().map(|b| (b.name.as_str(), b.size)).collect();
        assert_eq!(names, vec![("a.png", 2), ("b c.png", 5)]);
        assert_eq!(std::fs::read(dir.path().join("images").join("a.png")).unwrap(), b"22");
    }

    #[tokio::test]
    async fn test_local_blob_rejects_path_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::open(dir.path(), "/blobs").await.unwrap();
        store.create_container_if_not_exists("files").await.unwrap();
        for name in ["../escape.txt", "sub/dir.txt", "..", ""] {
            let err = store.upload("files", name, b"x", true).await.unwrap_err();
            assert!(matches!(err, StorageError::InvalidName { .. }), "{:?} -> {:?}", name, err);
        }
        assert!(!dir.path().join("escape.txt").exists());
    }
}
