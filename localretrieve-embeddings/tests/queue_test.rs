//! Queue processing: progress, retry/backoff bookkeeping, upsert
//! semantics, purge filters.

use localretrieve_core::config::RetrieveConfig;
use localretrieve_core::models::{NewDocument, QueuePriority, QueuePurgeFilter, QueueItemStatus};
use localretrieve_embeddings::{queue, EmbeddingPipeline};
use localretrieve_storage::StorageEngine;

fn setup() -> (StorageEngine, EmbeddingPipeline) {
    let mut config = RetrieveConfig::default();
    config.embedding.dimensions = 16;
    config.embedding.default_provider = "hash".to_string();
    let storage = StorageEngine::open_in_memory(config.clone()).unwrap();
    storage
        .create_collection("notes", Some(16), Some("hash"), None)
        .unwrap();
    let pipeline = EmbeddingPipeline::new(config.embedding, None);
    (storage, pipeline)
}

fn insert_and_enqueue(storage: &StorageEngine, id: &str, text: &str, priority: QueuePriority) {
    storage
        .insert_document(
            "notes",
            &NewDocument {
                id: Some(id.to_string()),
                title: None,
                content: text.to_string(),
                metadata: None,
                vector: None,
            },
        )
        .unwrap();
    storage
        .enqueue_embedding("notes", id, text, priority)
        .unwrap();
}

#[test]
fn process_drains_pending_and_stores_vectors() {
    let (storage, pipeline) = setup();
    for i in 0..4 {
        insert_and_enqueue(
            &storage,
            &format!("d{i}"),
            &format!("document number {i}"),
            QueuePriority::Normal,
        );
    }
    assert_eq!(storage.queue_status(Some("notes")).unwrap().pending, 4);

    let result = queue::process(&pipeline, &storage, Some("notes"), 10, 3).unwrap();
    assert_eq!(result.processed, 4);
    assert_eq!(result.failed, 0);
    assert_eq!(result.remaining_in_queue, 0);

    // Vectors landed at the documents' rowids.
    let count = storage
        .select("SELECT COUNT(*) AS n FROM vec_notes_dense", &[])
        .unwrap();
    assert_eq!(
        count[0]["n"],
        localretrieve_storage::SqlValue::Integer(4)
    );
}

#[test]
fn batch_size_bounds_one_pass() {
    let (storage, pipeline) = setup();
    for i in 0..7 {
        insert_and_enqueue(
            &storage,
            &format!("d{i}"),
            &format!("text {i}"),
            QueuePriority::Normal,
        );
    }

    let result = queue::process(&pipeline, &storage, Some("notes"), 3, 3).unwrap();
    assert_eq!(result.processed, 3);
    assert_eq!(result.remaining_in_queue, 4);
}

#[test]
fn high_priority_processes_first() {
    let (storage, pipeline) = setup();
    insert_and_enqueue(&storage, "low", "low priority text", QueuePriority::Low);
    insert_and_enqueue(&storage, "high", "high priority text", QueuePriority::High);

    let result = queue::process(&pipeline, &storage, Some("notes"), 1, 3).unwrap();
    assert_eq!(result.processed, 1);

    // The high-priority item completed; the low one is still pending.
    let items = storage.fetch_pending_queue(Some("notes"), 10).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].document_id, "low");
}

#[test]
fn missing_document_retries_then_fails() {
    let (storage, pipeline) = setup();
    // Enqueue without inserting the document.
    storage
        .enqueue_embedding("notes", "ghost", "no such document", QueuePriority::Normal)
        .unwrap();

    // max_retries = 2: passes 1..=2 retry, pass 3 marks failed.
    for _ in 0..2 {
        let result = queue::process(&pipeline, &storage, Some("notes"), 10, 2).unwrap();
        assert_eq!(result.processed, 0);
        assert_eq!(result.failed, 0, "still retrying");
        assert_eq!(result.errors.len(), 1);
    }
    let result = queue::process(&pipeline, &storage, Some("notes"), 10, 2).unwrap();
    assert_eq!(result.failed, 1);

    let status = storage.queue_status(Some("notes")).unwrap();
    assert_eq!(status.failed, 1);
    assert_eq!(status.pending, 0);
}

#[test]
fn enqueue_upserts_on_collection_and_document() {
    let (storage, _pipeline) = setup();
    insert_and_enqueue(&storage, "d1", "first text", QueuePriority::Low);
    storage
        .enqueue_embedding("notes", "d1", "replacement text", QueuePriority::High)
        .unwrap();

    let items = storage.fetch_pending_queue(Some("notes"), 10).unwrap();
    assert_eq!(items.len(), 1, "upsert must not duplicate the row");
    assert_eq!(items[0].text_content, "replacement text");
    assert_eq!(items[0].priority, QueuePriority::High);
    assert_eq!(items[0].retry_count, 0);
}

#[test]
fn no_item_stays_processing_across_passes() {
    let (storage, pipeline) = setup();
    insert_and_enqueue(&storage, "d1", "text one", QueuePriority::Normal);
    // Simulate a crashed pass.
    let items = storage.fetch_pending_queue(Some("notes"), 1).unwrap();
    storage.mark_queue_processing(items[0].id).unwrap();
    assert_eq!(storage.queue_status(Some("notes")).unwrap().processing, 1);

    let result = queue::process(&pipeline, &storage, Some("notes"), 10, 3).unwrap();
    assert_eq!(result.processed, 1);
    assert_eq!(storage.queue_status(Some("notes")).unwrap().processing, 0);
}

#[test]
fn purge_by_status() {
    let (storage, pipeline) = setup();
    insert_and_enqueue(&storage, "d1", "will complete", QueuePriority::Normal);
    queue::process(&pipeline, &storage, Some("notes"), 10, 3).unwrap();
    assert_eq!(storage.queue_status(Some("notes")).unwrap().completed, 1);

    let purged = storage
        .purge_queue(&QueuePurgeFilter {
            collection: Some("notes".to_string()),
            status: Some(QueueItemStatus::Completed),
            completed_before: None,
        })
        .unwrap();
    assert_eq!(purged, 1);
    assert_eq!(storage.queue_status(Some("notes")).unwrap().total(), 0);
}
