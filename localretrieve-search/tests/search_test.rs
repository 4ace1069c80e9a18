//! End-to-end search scenarios: keyword (Cyrillic binding), vector-only,
//! hybrid RRF, weighted fusion, idempotence, error conditions.

use localretrieve_core::config::RetrieveConfig;
use localretrieve_core::errors::{RetrieveError, ValidationError};
use localretrieve_core::models::{
    FusionMethod, FusionSpec, FusionWeights, NewDocument, SearchOptions, SearchQuery,
    SearchRequest, SearchStrategy,
};
use localretrieve_embeddings::EmbeddingPipeline;
use localretrieve_search::{global, SearchEngine};
use localretrieve_storage::StorageEngine;

fn setup() -> (StorageEngine, EmbeddingPipeline, SearchEngine) {
    let mut config = RetrieveConfig::default();
    config.embedding.dimensions = 4;
    config.embedding.default_provider = "hash".to_string();
    let storage = StorageEngine::open_in_memory(config.clone()).unwrap();
    let pipeline = EmbeddingPipeline::new(config.embedding.clone(), None);
    let engine = SearchEngine::new(config.search.clone());
    (storage, pipeline, engine)
}

fn insert(storage: &StorageEngine, id: &str, content: &str, vector: Option<Vec<f32>>) {
    storage
        .insert_document(
            "default",
            &NewDocument {
                id: Some(id.to_string()),
                title: Some(format!("Title {id}")),
                content: content.to_string(),
                metadata: None,
                vector,
            },
        )
        .unwrap();
}

fn text_request(text: &str) -> SearchRequest {
    SearchRequest {
        collection: None,
        query: SearchQuery {
            text: Some(text.to_string()),
            vector: None,
        },
        limit: None,
        fusion: None,
        options: SearchOptions::default(),
    }
}

#[test]
fn keyword_search_finds_cyrillic_content() {
    let (storage, pipeline, engine) = setup();
    insert(
        &storage,
        "d1",
        "Александр Пушкин — величайший русский поэт",
        None,
    );
    insert(&storage, "d2", "an unrelated english document", None);

    let response = engine
        .execute(&storage, &pipeline, &text_request("Пушкин"))
        .unwrap();
    assert_eq!(response.strategy, SearchStrategy::Keyword);
    assert_eq!(response.hits.len(), 1);
    assert_eq!(response.hits[0].id, "d1");
    assert!(response.hits[0].score > 0.0, "score must be positive (-bm25)");
}

#[test]
fn inline_non_ascii_literal_fails_where_binding_succeeds() {
    let (storage, _pipeline, _engine) = setup();
    insert(&storage, "d1", "Пушкин", None);

    // The same query as an inline literal is refused by the adapter.
    let err = storage
        .select(
            "SELECT rowid FROM fts_default WHERE fts_default MATCH 'Пушкин'",
            &[],
        )
        .unwrap_err();
    assert!(matches!(
        err,
        RetrieveError::Validation(ValidationError::NonAsciiSqlWithoutParams)
    ));
}

#[test]
fn multi_token_query_matches_any_term() {
    let (storage, pipeline, engine) = setup();
    insert(&storage, "d1", "rust systems programming", None);
    insert(&storage, "d2", "python scripting language", None);

    let response = engine
        .execute(&storage, &pipeline, &text_request("rust python"))
        .unwrap();
    // Implicit OR: both documents match one term each.
    assert_eq!(response.hits.len(), 2);
}

#[test]
fn vector_search_ranks_identical_vector_first() {
    let (storage, pipeline, engine) = setup();
    insert(&storage, "a", "alpha", Some(vec![1.0, 0.0, 0.0, 0.0]));
    insert(&storage, "b", "beta", Some(vec![0.0, 1.0, 0.0, 0.0]));
    insert(&storage, "c", "gamma", Some(vec![0.7, 0.7, 0.0, 0.0]));
    insert(&storage, "d", "delta", Some(vec![0.0, 0.0, 1.0, 0.0]));

    let request = SearchRequest {
        collection: None,
        query: SearchQuery {
            text: None,
            vector: Some(vec![1.0, 0.0, 0.0, 0.0]),
        },
        limit: Some(3),
        fusion: None,
        options: SearchOptions::default(),
    };
    let response = engine.execute(&storage, &pipeline, &request).unwrap();
    assert_eq!(response.strategy, SearchStrategy::Vector);
    assert!(response.hits.len() <= 3);
    assert_eq!(response.hits[0].id, "a");
    // distance ≈ 0 ⇒ score = 1/(1+d) ≈ 1.
    assert!((response.hits[0].score - 1.0).abs() < 1e-4);
}

#[test]
fn vector_dimension_mismatch_is_invalid() {
    let (storage, pipeline, engine) = setup();
    insert(&storage, "a", "alpha", Some(vec![1.0, 0.0, 0.0, 0.0]));
    let request = SearchRequest {
        query: SearchQuery {
            text: None,
            vector: Some(vec![1.0, 0.0]),
        },
        ..Default::default()
    };
    let err = engine.execute(&storage, &pipeline, &request).unwrap_err();
    assert!(matches!(
        err,
        RetrieveError::Validation(ValidationError::DimensionMismatch { expected: 4, actual: 2 })
    ));
}

#[test]
fn empty_query_is_invalid() {
    let (storage, pipeline, engine) = setup();
    let err = engine
        .execute(&storage, &pipeline, &SearchRequest::default())
        .unwrap_err();
    assert!(matches!(
        err,
        RetrieveError::Validation(ValidationError::EmptyQuery)
    ));
}

#[test]
fn hybrid_rrf_returns_both_champions() {
    let (storage, pipeline, engine) = setup();
    // A dominates the lexical side for "machine learning".
    insert(
        &storage,
        "a",
        "machine learning machine learning machine learning",
        Some(vec![0.0, 1.0, 0.0, 0.0]),
    );
    // B dominates the vector side.
    insert(
        &storage,
        "b",
        "statistics and machine intuition",
        Some(vec![1.0, 0.0, 0.0, 0.0]),
    );

    let request = SearchRequest {
        collection: None,
        query: SearchQuery {
            text: Some("machine learning".to_string()),
            vector: Some(vec![1.0, 0.0, 0.0, 0.0]),
        },
        limit: Some(10),
        fusion: Some(FusionSpec {
            method: FusionMethod::Rrf,
            weights: None,
        }),
        options: SearchOptions::default(),
    };
    let response = engine.execute(&storage, &pipeline, &request).unwrap();
    assert_eq!(response.strategy, SearchStrategy::Hybrid);

    let ids: Vec<&str> = response.hits.iter().map(|h| h.id.as_str()).collect();
    assert!(ids.contains(&"a") && ids.contains(&"b"));
    // Both documents appear in both lists; rank sums are computable.
    for hit in &response.hits {
        assert!(hit.score > 0.0 && hit.score <= 2.0 / 61.0 + 1e-12);
    }
}

#[test]
fn hybrid_search_is_idempotent() {
    let (storage, pipeline, engine) = setup();
    for i in 0..8 {
        insert(
            &storage,
            &format!("d{i}"),
            &format!("shared corpus document number {i}"),
            Some(vec![i as f32 * 0.1, 1.0, 0.0, 0.0]),
        );
    }
    let request = SearchRequest {
        query: SearchQuery {
            text: Some("corpus document".to_string()),
            vector: Some(vec![0.3, 1.0, 0.0, 0.0]),
        },
        limit: Some(5),
        ..Default::default()
    };
    let first = engine.execute(&storage, &pipeline, &request).unwrap();
    let second = engine.execute(&storage, &pipeline, &request).unwrap();
    let ids = |r: &localretrieve_core::models::SearchResponse| {
        r.hits.iter().map(|h| h.id.clone()).collect::<Vec<_>>()
    };
    assert_eq!(ids(&first), ids(&second), "same ordered result set");
}

#[test]
fn weighted_fusion_scores_stay_in_unit_interval() {
    let (storage, pipeline, engine) = setup();
    insert(&storage, "a", "weighted fusion target", Some(vec![1.0, 0.0, 0.0, 0.0]));
    insert(&storage, "b", "weighted fusion runner up", Some(vec![0.5, 0.5, 0.0, 0.0]));

    let request = SearchRequest {
        query: SearchQuery {
            text: Some("weighted fusion".to_string()),
            vector: Some(vec![1.0, 0.0, 0.0, 0.0]),
        },
        fusion: Some(FusionSpec {
            method: FusionMethod::Weighted,
            weights: Some(FusionWeights { fts: 0.6, vec: 0.4 }),
        }),
        ..Default::default()
    };
    let response = engine.execute(&storage, &pipeline, &request).unwrap();
    assert!(!response.hits.is_empty());
    for hit in &response.hits {
        assert!(hit.score >= 0.0 && hit.score <= 1.0 + 1e-12);
    }
}

#[test]
fn enable_embedding_upgrades_text_to_hybrid() {
    let (storage, pipeline, engine) = setup();
    // A provider-backed collection; the default one has embeddings
    // disabled.
    storage
        .create_collection("sem", Some(4), Some("hash"), None)
        .unwrap();
    // Give the document a vector in the hash provider's space so the dense
    // side has something to match.
    let doc_vector = pipeline
        .generate(&storage, "sem", "retrieval engines")
        .unwrap();
    storage
        .insert_document(
            "sem",
            &NewDocument {
                id: Some("a".to_string()),
                title: None,
                content: "retrieval engines".to_string(),
                metadata: None,
                vector: Some(doc_vector),
            },
        )
        .unwrap();

    let request = SearchRequest {
        collection: Some("sem".to_string()),
        query: SearchQuery {
            text: Some("retrieval engines".to_string()),
            vector: None,
        },
        options: SearchOptions {
            enable_embedding: true,
            min_score: None,
            threshold: None,
        },
        ..Default::default()
    };
    let response = engine.execute(&storage, &pipeline, &request).unwrap();
    assert_eq!(response.strategy, SearchStrategy::Hybrid);
    assert_eq!(response.hits[0].id, "a");
    assert!(response.hits[0].vec_score.is_some());
}

#[test]
fn min_score_filters_results() {
    let (storage, pipeline, engine) = setup();
    insert(&storage, "a", "alpha", Some(vec![1.0, 0.0, 0.0, 0.0]));
    insert(&storage, "b", "beta", Some(vec![0.0, 1.0, 0.0, 0.0]));

    let request = SearchRequest {
        query: SearchQuery {
            text: None,
            vector: Some(vec![1.0, 0.0, 0.0, 0.0]),
        },
        options: SearchOptions {
            enable_embedding: false,
            min_score: Some(0.9),
            threshold: None,
        },
        ..Default::default()
    };
    let response = engine.execute(&storage, &pipeline, &request).unwrap();
    assert_eq!(response.hits.len(), 1);
    assert_eq!(response.hits[0].id, "a");
}

#[test]
fn global_search_merges_collections() {
    let (storage, pipeline, engine) = setup();
    storage
        .create_collection("wiki", Some(4), None, None)
        .unwrap();
    insert(&storage, "d1", "shared keyword in default", None);
    storage
        .insert_document(
            "wiki",
            &NewDocument {
                id: Some("w1".to_string()),
                title: None,
                content: "shared keyword in wiki".to_string(),
                metadata: None,
                vector: None,
            },
        )
        .unwrap();

    let response = global::search_global(
        &engine,
        &storage,
        &pipeline,
        &text_request("shared keyword"),
        true,
    )
    .unwrap();
    let collections: Vec<&str> = response.hits.iter().map(|(c, _)| c.as_str()).collect();
    assert!(collections.contains(&"default") && collections.contains(&"wiki"));
    let grouped = response.grouped.unwrap();
    assert_eq!(grouped.len(), 2);
}
