//! End-to-end worker tests: lifecycle, dispatch ordering, validation
//! envelopes, document + search round-trips, queue operations, durability
//! operations.

use localretrieve_core::config::RetrieveConfig;
use localretrieve_core::models::{NewDocument, SearchOptions, SearchQuery, SearchRequest};
use localretrieve_llm::{LlmCallOptions, LlmProviderKind};
use localretrieve_worker::{spawn_worker, Request, SearchWithLlmRequest, WorkerHandle};

fn test_config() -> RetrieveConfig {
    let mut config = RetrieveConfig::default();
    config.embedding.dimensions = 8;
    config.embedding.default_provider = "hash".to_string();
    config
}

async fn open_worker() -> WorkerHandle {
    let handle = spawn_worker(test_config());
    let response = handle
        .request(Request::Open {
            path: ":memory:".to_string(),
        })
        .await;
    assert!(response.success, "open failed: {:?}", response.error);
    handle
}

#[tokio::test]
async fn bootstrap_creates_default_collection() {
    let handle = spawn_worker(test_config());
    let response = handle
        .request(Request::Open {
            path: ":memory:".to_string(),
        })
        .await;
    assert!(response.success);

    let response = handle.request(Request::ListCollections).await;
    assert!(response.success);
    let collections = response.result.unwrap();
    assert_eq!(collections.as_array().unwrap().len(), 1);
    assert_eq!(collections[0]["name"], "default");
    assert_eq!(collections[0]["embedding_dimensions"], 8);
}

#[tokio::test]
async fn version_and_ping_work_before_open() {
    let handle = spawn_worker(test_config());
    let ping = handle.request(Request::Ping).await;
    assert!(ping.success);
    assert_eq!(ping.result.unwrap(), serde_json::json!("pong"));

    let version = handle.request(Request::GetVersion).await;
    assert!(version.success);
    assert_eq!(version.result.unwrap()["schema_version"], 3);
}

#[tokio::test]
async fn other_ops_require_open() {
    let handle = spawn_worker(test_config());
    let response = handle.request(Request::ListCollections).await;
    assert!(!response.success);
    let error = response.error.unwrap();
    assert_eq!(error.kind, "validation");
    assert!(error.message.contains("requires an open database"));
}

#[tokio::test]
async fn unknown_json_op_is_method_not_found() {
    let handle = open_worker().await;
    let response = handle
        .request_json(r#"{"op": "teleport", "destination": "mars"}"#)
        .await;
    assert!(!response.success);
    let error = response.error.unwrap();
    assert!(error.message.contains("teleport"));
}

#[tokio::test]
async fn oversized_text_is_rejected_pre_dispatch() {
    let handle = open_worker().await;
    let response = handle
        .request(Request::SearchText {
            collection: None,
            text: "x".repeat(100_001),
            limit: None,
        })
        .await;
    assert!(!response.success);
    assert_eq!(response.error.unwrap().kind, "validation");
}

#[tokio::test]
async fn insert_and_search_cyrillic_roundtrip() {
    let handle = open_worker().await;
    let response = handle
        .request(Request::InsertDocumentWithEmbedding {
            collection: None,
            document: NewDocument {
                id: Some("d1".to_string()),
                title: Some("Пушкин".to_string()),
                content: "Александр Пушкин — величайший русский поэт".to_string(),
                metadata: None,
                vector: None,
            },
        })
        .await;
    assert!(response.success, "{:?}", response.error);
    // Default collection has no provider: no embedding is generated.
    assert_eq!(response.result.unwrap()["embedding"], "none");

    let response = handle
        .request(Request::SearchText {
            collection: None,
            text: "Пушкин".to_string(),
            limit: Some(10),
        })
        .await;
    assert!(response.success, "{:?}", response.error);
    let result = response.result.unwrap();
    let hits = result["hits"].as_array().unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["id"], "d1");
    assert!(hits[0]["score"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn embedding_collection_generates_inline() {
    let handle = open_worker().await;
    let response = handle
        .request(Request::CreateCollection {
            name: "notes".to_string(),
            dimensions: Some(8),
            provider: Some("hash".to_string()),
            config: None,
        })
        .await;
    assert!(response.success);

    let response = handle
        .request(Request::InsertDocumentWithEmbedding {
            collection: Some("notes".to_string()),
            document: NewDocument {
                id: Some("n1".to_string()),
                title: None,
                content: "embedded at insert time".to_string(),
                metadata: None,
                vector: None,
            },
        })
        .await;
    assert!(response.success);
    assert_eq!(response.result.unwrap()["embedding"], "generated");

    // The vector row exists: semantic search finds the document.
    let response = handle
        .request(Request::SearchSemantic {
            collection: Some("notes".to_string()),
            text: "embedded at insert time".to_string(),
            limit: Some(5),
        })
        .await;
    assert!(response.success, "{:?}", response.error);
    let result = response.result.unwrap();
    assert_eq!(result["strategy"], "hybrid");
    assert_eq!(result["hits"][0]["id"], "n1");
}

#[tokio::test]
async fn batch_insert_commits_everything() {
    let handle = open_worker().await;
    let documents: Vec<NewDocument> = (0..50)
        .map(|i| NewDocument {
            id: Some(format!("b{i}")),
            title: Some(format!("Batch {i}")),
            content: format!("batch document {i} ").repeat(64),
            metadata: Some(serde_json::json!({"n": i})),
            vector: None,
        })
        .collect();
    let response = handle
        .request(Request::BatchInsertDocuments {
            collection: None,
            documents,
        })
        .await;
    assert!(response.success, "{:?}", response.error);
    let result = response.result.unwrap();
    assert_eq!(result["inserted"], 50);
    assert!(result["sub_batches"].as_u64().unwrap() >= 1);

    let stats = handle.request(Request::GetStats).await;
    assert_eq!(stats.result.unwrap()["documents"], 50);
}

#[tokio::test]
async fn queue_ops_flow_through_the_worker() {
    let handle = open_worker().await;
    handle
        .request(Request::CreateCollection {
            name: "notes".to_string(),
            dimensions: Some(8),
            provider: Some("hash".to_string()),
            config: None,
        })
        .await;
    handle
        .request(Request::InsertDocumentWithEmbedding {
            collection: Some("notes".to_string()),
            document: NewDocument {
                id: Some("q1".to_string()),
                title: None,
                content: "queued content".to_string(),
                metadata: None,
                vector: Some(vec![0.0; 8]),
            },
        })
        .await;

    let response = handle
        .request(Request::EnqueueEmbedding {
            collection: Some("notes".to_string()),
            document_id: "q1".to_string(),
            text: "regenerate from this text".to_string(),
            priority: None,
        })
        .await;
    assert!(response.success);

    let status = handle
        .request(Request::GetQueueStatus {
            collection: Some("notes".to_string()),
        })
        .await;
    assert_eq!(status.result.unwrap()["pending"], 1);

    let response = handle
        .request(Request::ProcessEmbeddingQueue {
            collection: Some("notes".to_string()),
            batch_size: None,
            max_retries: None,
        })
        .await;
    assert!(response.success);
    let result = response.result.unwrap();
    assert_eq!(result["processed"], 1);
    assert_eq!(result["failed"], 0);
    assert_eq!(result["remaining_in_queue"], 0);
}

#[tokio::test]
async fn export_clear_import_roundtrip() {
    let handle = open_worker().await;
    handle
        .request(Request::InsertDocumentWithEmbedding {
            collection: None,
            document: NewDocument {
                id: Some("keep".to_string()),
                title: None,
                content: "survives the roundtrip".to_string(),
                metadata: None,
                vector: None,
            },
        })
        .await;

    let exported = handle.request(Request::Export).await;
    assert!(exported.success);
    let image: Vec<u8> =
        serde_json::from_value(exported.result.unwrap()["image"].clone()).unwrap();
    assert!(!image.is_empty());

    let cleared = handle.request(Request::Clear).await;
    assert!(cleared.success);
    let stats = handle.request(Request::GetStats).await;
    assert_eq!(stats.result.unwrap()["documents"], 0);

    let imported = handle.request(Request::Import { image }).await;
    assert!(imported.success, "{:?}", imported.error);
    let stats = handle.request(Request::GetStats).await;
    assert_eq!(stats.result.unwrap()["documents"], 1);
}

#[tokio::test]
async fn search_with_llm_orchestrates_without_llm_flags() {
    let handle = open_worker().await;
    handle
        .request(Request::InsertDocumentWithEmbedding {
            collection: None,
            document: NewDocument {
                id: Some("ai".to_string()),
                title: Some("AI".to_string()),
                content: "artificial intelligence overview".to_string(),
                metadata: None,
                vector: None,
            },
        })
        .await;

    let response = handle
        .request(Request::SearchWithLlm {
            request: SearchWithLlmRequest {
                search: SearchRequest {
                    collection: None,
                    query: SearchQuery {
                        text: Some("artificial intelligence".to_string()),
                        vector: None,
                    },
                    limit: Some(5),
                    fusion: None,
                    options: SearchOptions::default(),
                },
                enhance_query: false,
                summarize_results: false,
                llm: LlmCallOptions::new(LlmProviderKind::OpenAi, "gpt-4o-mini", "unused"),
            },
        })
        .await;
    assert!(response.success, "{:?}", response.error);
    let result = response.result.unwrap();
    assert!(result["results"]["hits"].as_array().unwrap().len() == 1);
    assert_eq!(result["llm_time_ms"], 0);
    assert!(result["total_time_ms"].as_u64().unwrap() >= result["search_time_ms"].as_u64().unwrap());
    assert!(result["enhanced_query"].is_null());
    assert!(result["summary"].is_null());
}

#[tokio::test]
async fn invalid_llm_config_is_an_llm_error_envelope() {
    let handle = open_worker().await;
    let response = handle
        .request(Request::CallLlm {
            prompt: "hello".to_string(),
            options: LlmCallOptions::new(LlmProviderKind::Custom, "model", "key"),
        })
        .await;
    assert!(!response.success);
    let error = response.error.unwrap();
    assert_eq!(error.kind, "llm");
    assert!(!error.recoverable);
}

#[tokio::test]
async fn close_stops_the_worker() {
    let handle = open_worker().await;
    let response = handle.request(Request::Close).await;
    assert!(response.success);

    let after = handle.request(Request::Ping).await;
    assert!(!after.success, "requests after close must fail");
}

#[tokio::test]
async fn writes_execute_in_submission_order() {
    let handle = open_worker().await;
    // Interleave inserts and a delete; FIFO ordering makes the outcome
    // deterministic.
    for i in 0..5 {
        handle
            .request(Request::InsertDocumentWithEmbedding {
                collection: None,
                document: NewDocument {
                    id: Some(format!("o{i}")),
                    title: None,
                    content: format!("ordered {i}"),
                    metadata: None,
                    vector: None,
                },
            })
            .await;
    }
    handle
        .request(Request::DeleteDocument {
            collection: None,
            id: "o2".to_string(),
        })
        .await;

    let stats = handle.request(Request::GetStats).await;
    assert_eq!(stats.result.unwrap()["documents"], 4);

    let fetched = handle
        .request(Request::GetDocument {
            collection: None,
            id: "o2".to_string(),
        })
        .await;
    assert!(fetched.success);
    assert!(fetched.result.unwrap().is_null());
}

#[tokio::test]
async fn persistent_path_survives_worker_restart() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config();
    config.durability.base_dir = dir.path().display().to_string();

    {
        let handle = spawn_worker(config.clone());
        let opened = handle
            .request(Request::Open {
                path: "opfs:/app/w.db".to_string(),
            })
            .await;
        assert!(opened.success);
        assert_eq!(opened.result.unwrap()["persistent"], true);
        handle
            .request(Request::InsertDocumentWithEmbedding {
                collection: None,
                document: NewDocument {
                    id: Some("p1".to_string()),
                    title: None,
                    content: "persisted across workers".to_string(),
                    metadata: None,
                    vector: None,
                },
            })
            .await;
        let closed = handle.request(Request::Close).await;
        assert!(closed.success);
    }

    let handle = spawn_worker(config);
    let opened = handle
        .request(Request::Open {
            path: "opfs:/app/w.db".to_string(),
        })
        .await;
    assert!(opened.success);
    let stats = handle.request(Request::GetStats).await;
    assert_eq!(stats.result.unwrap()["documents"], 1);
}
