//! Durability round-trips: snapshot → reopen, export → import, corrupt
//! image handling, quota enforcement.

use localretrieve_core::config::RetrieveConfig;
use localretrieve_core::errors::{PersistenceError, RetrieveError};
use localretrieve_core::models::NewDocument;
use localretrieve_storage::StorageEngine;

fn config_with_base(dir: &std::path::Path) -> RetrieveConfig {
    let mut config = RetrieveConfig::default();
    config.durability.base_dir = dir.display().to_string();
    config.embedding.dimensions = 4;
    config
}

fn doc(id: &str, content: &str) -> NewDocument {
    NewDocument {
        id: Some(id.to_string()),
        title: None,
        content: content.to_string(),
        metadata: Some(serde_json::json!({"origin": id})),
        vector: Some(vec![0.5, 0.5, 0.0, 0.0]),
    }
}

#[test]
fn snapshot_then_reopen_restores_rows() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_with_base(dir.path());

    {
        let mut engine = StorageEngine::open("opfs:/app/data.db", config.clone()).unwrap();
        for i in 0..5 {
            engine
                .insert_document("default", &doc(&format!("d{i}"), &format!("document {i}")))
                .unwrap();
        }
        engine.snapshot().unwrap();
    }

    let engine = StorageEngine::open("opfs:/app/data.db", config).unwrap();
    assert_eq!(engine.count_documents("default").unwrap(), 5);
    let restored = engine.get_document("default", "d3").unwrap().unwrap();
    assert_eq!(restored.content, "document 3");
    assert_eq!(restored.metadata, Some(serde_json::json!({"origin": "d3"})));
}

#[test]
fn close_flushes_a_final_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_with_base(dir.path());

    {
        let mut engine = StorageEngine::open("opfs:/app/flush.db", config.clone()).unwrap();
        engine
            .insert_document("default", &doc("only", "flushed at close"))
            .unwrap();
        engine.close();
    }

    let engine = StorageEngine::open("opfs:/app/flush.db", config).unwrap();
    assert_eq!(engine.count_documents("default").unwrap(), 1);
}

#[test]
fn export_import_roundtrip() {
    let mut source = StorageEngine::open_in_memory({
        let mut c = RetrieveConfig::default();
        c.embedding.dimensions = 4;
        c
    })
    .unwrap();
    source
        .insert_document("default", &doc("d1", "exported document"))
        .unwrap();
    let image = source.export_image().unwrap();
    assert!(!image.is_empty());

    let mut target = StorageEngine::open_in_memory({
        let mut c = RetrieveConfig::default();
        c.embedding.dimensions = 4;
        c
    })
    .unwrap();
    target.import_image(&image).unwrap();
    assert_eq!(target.count_documents("default").unwrap(), 1);
    assert_eq!(
        target.get_document("default", "d1").unwrap().unwrap().content,
        "exported document"
    );
}

#[test]
fn truncated_image_is_fatal_at_open() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_with_base(dir.path());

    // Persist a real image, then truncate it mid-file.
    {
        let mut engine = StorageEngine::open("opfs:/app/broken.db", config.clone()).unwrap();
        engine
            .insert_document("default", &doc("d1", "will be truncated"))
            .unwrap();
        engine.snapshot().unwrap();
    }
    let file = dir.path().join("app").join("broken.db");
    let bytes = std::fs::read(&file).unwrap();
    std::fs::write(&file, &bytes[..16]).unwrap();

    let err = StorageEngine::open("opfs:/app/broken.db", config).unwrap_err();
    assert!(matches!(
        err,
        RetrieveError::Persistence(PersistenceError::CorruptImage { .. })
    ));
}

#[test]
fn quota_blocks_snapshot_when_headroom_is_too_small() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_with_base(dir.path());
    // Far below 2x of any real image.
    config.durability.quota_bytes = Some(1024);

    let mut engine = StorageEngine::open("opfs:/app/quota.db", config).unwrap();
    engine
        .insert_document("default", &doc("d1", "too big for the quota"))
        .unwrap();
    let err = engine.snapshot().unwrap_err();
    assert!(matches!(
        err,
        RetrieveError::Persistence(PersistenceError::QuotaExceeded { .. })
    ));
    assert!(err.suggested_action().contains("export"));
}

#[test]
fn unavailable_store_falls_back_to_memory() {
    // A file path as base_dir cannot be a directory, so the store is
    // unavailable; the engine must still open, volatile.
    let file = tempfile::NamedTempFile::new().unwrap();
    let blocked = file.path().join("sub");
    let mut config = RetrieveConfig::default();
    config.durability.base_dir = blocked.display().to_string();

    let engine = StorageEngine::open("opfs:/app/data.db", config).unwrap();
    assert!(!engine.durability_state().persistent);
}

#[test]
fn volatile_paths_never_touch_disk() {
    let mut engine = StorageEngine::open_in_memory(RetrieveConfig::default()).unwrap();
    assert!(!engine.durability_state().persistent);
    engine.snapshot().unwrap(); // no-op, must not fail
    let (available, used, total) = engine.quota();
    assert_eq!((available, total), (-1, -1));
    assert_eq!(used, 0);
}

#[test]
fn clear_removes_the_persisted_image() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_with_base(dir.path());

    let mut engine = StorageEngine::open("opfs:/app/cleared.db", config).unwrap();
    engine
        .insert_document("default", &doc("d1", "to be cleared"))
        .unwrap();
    engine.snapshot().unwrap();
    let file = dir.path().join("app").join("cleared.db");
    assert!(file.exists());

    engine.clear().unwrap();
    assert!(!file.exists());
    assert_eq!(engine.count_documents("default").unwrap(), 0);
}
