//! Case Repository Tests
//!
//! - Repositories share one client and close it exactly once
//! - Free-text search composes a vector stage when a vector is available
//! - Every embedding failure falls back to the structured search

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::future::{self, BoxFuture, FutureExt};
use pipequery::driver::{InMemoryClient, InMemoryCollection};
use pipequery::pipeline::Stage;
use pipequery::render::{AggregateRenderer, CosmosRenderer, Engine};
use pipequery::repository::{
    build_search_pipeline, CasesRepository, CasesSearchPredicate, ClientHandle, Embedder,
    EmbeddingError, EmbeddingResult,
};
use pipequery::{QueryError, StoreConfig};
use serde_json::json;

// =============================================================================
// Helper Functions
// =============================================================================

/// Embedder answering from a fixed result and counting calls
struct CountingEmbedder {
    result: EmbeddingResult<Vec<f64>>,
    calls: AtomicUsize,
}

impl CountingEmbedder {
    fn new(result: EmbeddingResult<Vec<f64>>) -> Arc<Self> {
        Arc::new(Self {
            result,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Embedder for CountingEmbedder {
    fn embed<'a>(&'a self, _text: &'a str) -> BoxFuture<'a, EmbeddingResult<Vec<f64>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        future::ready(self.result.clone()).boxed()
    }
}

fn seeded_client() -> (Arc<InMemoryClient>, Arc<InMemoryCollection>) {
    let client = Arc::new(InMemoryClient::new());
    let cases = client.collection_handle("cams", "cases");
    cases.seed((1..=30).map(|n| {
        json!({
            "documentType": "SYNCED_CASE",
            "caseId": format!("081-24-{:05}", n),
            "caseNumber": format!("24-{:05}", n),
            "chapter": if n % 2 == 0 { "11" } else { "7" },
            "courtDivisionCode": "081",
            "dateFiled": format!("2024-01-{:02}", n)
        })
    }));
    (client, cases)
}

fn repository(
    client: Arc<InMemoryClient>,
    config: StoreConfig,
    embedder: &Arc<CountingEmbedder>,
) -> CasesRepository {
    let embedder: Arc<dyn Embedder> = embedder.clone();
    CasesRepository::new(ClientHandle::new(client), config, Some(embedder)).unwrap()
}

fn name_search(limit: u64) -> CasesSearchPredicate {
    CasesSearchPredicate {
        name: Some("Jane Doe".into()),
        limit: Some(limit),
        offset: Some(0),
        ..Default::default()
    }
}

// =============================================================================
// Client Lifecycle
// =============================================================================

/// Releasing every lease closes the client once; earlier releases do not.
#[test]
fn test_repositories_share_one_client() {
    let client = Arc::new(InMemoryClient::new());
    let handle = ClientHandle::new(client.clone());

    let first = CasesRepository::new(handle.clone(), StoreConfig::new("cams"), None).unwrap();
    let second = CasesRepository::new(handle.clone(), StoreConfig::new("cams"), None).unwrap();
    assert_eq!(handle.lease_count(), 3);

    drop(handle);
    drop(first);
    assert_eq!(client.close_count(), 0);
    assert!(!client.is_closed());

    drop(second);
    assert_eq!(client.close_count(), 1);
    assert!(client.is_closed());
}

/// A repository refuses an invalid configuration.
#[test]
fn test_invalid_config_rejected() {
    let client = Arc::new(InMemoryClient::new());
    let err = CasesRepository::new(ClientHandle::new(client), StoreConfig::new(""), None)
        .err()
        .map(|e| e.code());
    assert_eq!(err, Some("CONFIG_ERROR"));
}

// =============================================================================
// Vector Search Composition
// =============================================================================

/// The candidate pool is twice the page, never below the minimum.
#[test]
fn test_candidate_pool_follows_page_size() {
    let config = StoreConfig::new("cams");
    for (limit, expected) in [(1, 50), (25, 50), (26, 52), (100, 200)] {
        let spec = build_search_pipeline(&name_search(limit), Some(vec![0.5]), &config).unwrap();
        let Stage::VectorSearch(search) = &spec.stages[1] else {
            panic!("expected a vector search stage");
        };
        assert_eq!(search.k, expected, "limit {}", limit);
    }
}

/// The Cosmos engine receives the vector under `cosmosSearch`.
#[tokio::test]
async fn test_cosmos_search_sends_vector() {
    let (client, cases) = seeded_client();
    let embedder = CountingEmbedder::new(Ok(vec![0.1, 0.2, 0.3]));
    let config = StoreConfig::new("cams").with_engine(Engine::Cosmos);
    let repo = repository(client, config.clone(), &embedder);

    let err = repo.search_cases(&name_search(10)).await.unwrap_err();
    assert!(matches!(err, QueryError::Driver { .. }));
    assert_eq!(embedder.calls(), 1);

    let expected = build_search_pipeline(&name_search(10), Some(vec![0.1, 0.2, 0.3]), &config)
        .and_then(|spec| CosmosRenderer.render(&spec))
        .unwrap();
    assert_eq!(cases.last_pipeline().unwrap(), expected);
    assert_eq!(
        expected[1],
        json!({ "$search": { "cosmosSearch": {
            "vector": [0.1, 0.2, 0.3],
            "path": "keywordsVector",
            "k": 50,
            "similarity": "COS"
        } } })
    );
}

/// Any embedding failure runs the structured search instead.
#[tokio::test]
async fn test_embedding_failures_fall_back() {
    let failures = [
        Err(EmbeddingError::unavailable("model not loaded")),
        Err(EmbeddingError::EmptyInput),
        Err(EmbeddingError::EmptyVector),
        Ok(Vec::new()),
    ];

    for failure in failures {
        let (client, cases) = seeded_client();
        let embedder = CountingEmbedder::new(failure);
        let config = StoreConfig::new("cams").with_engine(Engine::Atlas);
        let repo = repository(client, config, &embedder);

        let page = repo.search_cases(&name_search(10)).await.unwrap();
        assert_eq!(embedder.calls(), 1);
        assert_eq!(page.data.len(), 10);
        assert_eq!(page.metadata.map(|m| m.total), Some(30));
        assert_eq!(page.data[0].case_id, "081-24-00030");

        let executed = serde_json::to_string(&cases.last_pipeline().unwrap()).unwrap();
        assert!(!executed.contains("$vectorSearch"));
    }
}

/// Searches without a name never call the embedder.
#[tokio::test]
async fn test_structured_search_skips_embedder() {
    let (client, _cases) = seeded_client();
    let embedder = CountingEmbedder::new(Ok(vec![0.5]));
    let config = StoreConfig::new("cams").with_engine(Engine::Atlas);
    let repo = repository(client, config, &embedder);

    let predicate = CasesSearchPredicate {
        name: Some("   ".into()),
        chapters: Some(vec!["7".into()]),
        limit: Some(5),
        offset: Some(5),
        ..Default::default()
    };
    let page = repo.search_cases(&predicate).await.unwrap();

    assert_eq!(embedder.calls(), 0);
    assert_eq!(page.metadata.map(|m| m.total), Some(15));
    let ids: Vec<_> = page.data.iter().map(|c| c.case_id.as_str()).collect();
    assert_eq!(
        ids,
        vec!["081-24-00019", "081-24-00017", "081-24-00015", "081-24-00013", "081-24-00011"]
    );
}
