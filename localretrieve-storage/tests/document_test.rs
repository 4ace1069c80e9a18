//! Document CRUD invariants: rowid coherence across docs/FTS/vector rows,
//! byte-exact metadata preservation, dimensionality enforcement.

use localretrieve_core::config::RetrieveConfig;
use localretrieve_core::errors::{RetrieveError, ValidationError};
use localretrieve_core::models::NewDocument;
use localretrieve_storage::adapter::SqlValue;
use localretrieve_storage::StorageEngine;

fn engine() -> StorageEngine {
    let mut config = RetrieveConfig::default();
    config.embedding.dimensions = 4;
    StorageEngine::open_in_memory(config).unwrap()
}

fn doc(id: &str, content: &str) -> NewDocument {
    NewDocument {
        id: Some(id.to_string()),
        title: Some(format!("title of {id}")),
        content: content.to_string(),
        metadata: None,
        vector: None,
    }
}

#[test]
fn insert_creates_coherent_fts_row() {
    let engine = engine();
    let inserted = engine
        .insert_document("default", &doc("d1", "the quick brown fox"))
        .unwrap();
    assert!(inserted.rowid > 0);

    // Exactly one FTS row, joined by the same rowid.
    let rows = engine
        .select(
            "SELECT rowid FROM fts_default WHERE fts_default MATCH ?1",
            &[SqlValue::from("quick")],
        )
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["rowid"], SqlValue::Integer(inserted.rowid));
}

#[test]
fn insert_with_vector_creates_coherent_vector_row() {
    let engine = engine();
    let mut d = doc("d1", "vectorized");
    d.vector = Some(vec![0.1, 0.2, 0.3, 0.4]);
    let inserted = engine.insert_document("default", &d).unwrap();

    let count = engine
        .select(
            "SELECT COUNT(*) AS n FROM vec_default_dense WHERE rowid = ?1",
            &[SqlValue::Integer(inserted.rowid)],
        )
        .unwrap();
    assert_eq!(count[0]["n"], SqlValue::Integer(1));
}

#[test]
fn delete_removes_fts_and_vector_rows() {
    let engine = engine();
    let mut d = doc("d1", "ephemeral zanzibar");
    d.vector = Some(vec![1.0, 0.0, 0.0, 0.0]);
    let inserted = engine.insert_document("default", &d).unwrap();

    engine.delete_document("default", "d1").unwrap();

    assert!(engine.get_document("default", "d1").unwrap().is_none());
    let fts = engine
        .select(
            "SELECT rowid FROM fts_default WHERE fts_default MATCH ?1",
            &[SqlValue::from("zanzibar")],
        )
        .unwrap();
    assert!(fts.is_empty(), "FTS row must not survive the document");
    let vecs = engine
        .select(
            "SELECT COUNT(*) AS n FROM vec_default_dense WHERE rowid = ?1",
            &[SqlValue::Integer(inserted.rowid)],
        )
        .unwrap();
    assert_eq!(vecs[0]["n"], SqlValue::Integer(0));
}

#[test]
fn metadata_is_preserved_exactly() {
    let engine = engine();
    // A user key named `collection` inside metadata is user data, not a
    // reserved key; the logical collection lives in its own column.
    let metadata = serde_json::json!({
        "collection": "user-supplied-value",
        "nested": { "keys": [1, 2, 3] },
        "unicode": "Пушкин"
    });
    let mut d = doc("d1", "metadata carrier");
    d.metadata = Some(metadata.clone());
    engine.insert_document("default", &d).unwrap();

    let loaded = engine.get_document("default", "d1").unwrap().unwrap();
    assert_eq!(loaded.metadata, Some(metadata));
    assert_eq!(loaded.collection, "default");
}

#[test]
fn wrong_dimensionality_is_a_validation_error() {
    let engine = engine();
    let mut d = doc("d1", "bad vector");
    d.vector = Some(vec![1.0, 2.0]); // collection expects 4
    let err = engine.insert_document("default", &d).unwrap_err();
    assert!(matches!(
        err,
        RetrieveError::Validation(ValidationError::DimensionMismatch {
            expected: 4,
            actual: 2
        })
    ));
    // The transaction rolled back: no document, no FTS row.
    assert!(engine.get_document("default", "d1").unwrap().is_none());
    assert_eq!(engine.count_documents("default").unwrap(), 0);
}

#[test]
fn empty_content_is_rejected() {
    let engine = engine();
    let err = engine
        .insert_document("default", &doc("d1", ""))
        .unwrap_err();
    assert!(matches!(
        err,
        RetrieveError::Validation(ValidationError::EmptyContent)
    ));
}

#[test]
fn update_keeps_rowid_and_reindexes() {
    let engine = engine();
    let inserted = engine
        .insert_document("default", &doc("d1", "original wording"))
        .unwrap();

    let updated = engine
        .update_document("default", &doc("d1", "replacement phrasing"))
        .unwrap();
    assert_eq!(updated.rowid, inserted.rowid, "rowid is stable across updates");

    let old_hits = engine
        .select(
            "SELECT rowid FROM fts_default WHERE fts_default MATCH ?1",
            &[SqlValue::from("original")],
        )
        .unwrap();
    assert!(old_hits.is_empty());
    let new_hits = engine
        .select(
            "SELECT rowid FROM fts_default WHERE fts_default MATCH ?1",
            &[SqlValue::from("replacement")],
        )
        .unwrap();
    assert_eq!(new_hits.len(), 1);
}

#[test]
fn store_vector_replaces_on_regeneration() {
    let engine = engine();
    let inserted = engine
        .insert_document("default", &doc("d1", "regenerated"))
        .unwrap();

    engine
        .store_vector("default", inserted.rowid, &[1.0, 0.0, 0.0, 0.0])
        .unwrap();
    engine
        .store_vector("default", inserted.rowid, &[0.0, 1.0, 0.0, 0.0])
        .unwrap();

    let count = engine
        .select(
            "SELECT COUNT(*) AS n FROM vec_default_dense WHERE rowid = ?1",
            &[SqlValue::Integer(inserted.rowid)],
        )
        .unwrap();
    assert_eq!(count[0]["n"], SqlValue::Integer(1), "regeneration replaces, not duplicates");
}

#[test]
fn generated_ids_are_assigned_when_absent() {
    let engine = engine();
    let inserted = engine
        .insert_document(
            "default",
            &NewDocument {
                id: None,
                title: None,
                content: "anonymous".to_string(),
                metadata: None,
                vector: None,
            },
        )
        .unwrap();
    assert!(!inserted.id.is_empty());
    assert!(engine
        .get_document("default", &inserted.id)
        .unwrap()
        .is_some());
}

#[test]
fn cyrillic_content_roundtrips_through_bound_params() {
    let engine = engine();
    engine
        .insert_document("default", &doc("d1", "Александр Пушкин, поэт"))
        .unwrap();

    let hits = engine
        .select(
            "SELECT d.id FROM fts_default f JOIN docs_default d ON d.rowid = f.rowid
             WHERE fts_default MATCH ?1",
            &[SqlValue::from("Пушкин")],
        )
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["id"], SqlValue::Text("d1".to_string()));
}
