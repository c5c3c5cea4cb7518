//! Collection Adapter Integration Tests
//!
//! Adapters running against the in-memory engine:
//! - CRUD round trips and public identifiers
//! - Not-found is distinct from driver failure
//! - Driver failures carry the rendered query
//! - Base pagination end to end
//! - Engine adapters append a default page

use std::sync::Arc;

use pipequery::adapter::{CollectionAdapter, PageMetadata};
use pipequery::document_fields;
use pipequery::driver::{DocumentClient, DriverError, InMemoryClient, InMemoryCollection};
use pipequery::pipeline::{match_stage, paginate, pipeline, sort};
use pipequery::query::{and, ascending, descending, order_by, using, Expr};
use pipequery::{QueryError, StoreConfig};
use serde::{Deserialize, Serialize};
use serde_json::json;

document_fields! {
    enum DocketField {
        Id => "id",
        CaseId => "caseId",
        Chapter => "chapter",
        DateFiled => "dateFiled",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Docket {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    case_id: String,
    chapter: String,
    date_filed: String,
}

// =============================================================================
// Helper Functions
// =============================================================================

fn docket(case_id: &str, chapter: &str, date_filed: &str) -> Docket {
    Docket {
        id: None,
        case_id: case_id.to_string(),
        chapter: chapter.to_string(),
        date_filed: date_filed.to_string(),
    }
}

fn setup() -> (Arc<InMemoryClient>, Arc<InMemoryCollection>, CollectionAdapter<Docket>) {
    let client = Arc::new(InMemoryClient::new());
    let collection = client.collection_handle("cams", "dockets");
    let adapter = CollectionAdapter::open("DOCKETS", &*client, "cams", "dockets");
    (client, collection, adapter)
}

fn seeded() -> (Arc<InMemoryClient>, Arc<InMemoryCollection>, CollectionAdapter<Docket>) {
    let (client, collection, adapter) = setup();
    collection.seed([
        json!({ "id": "a", "caseId": "081-24-00001", "chapter": "7", "dateFiled": "2024-01-15" }),
        json!({ "id": "b", "caseId": "081-24-00002", "chapter": "11", "dateFiled": "2024-03-01" }),
        json!({ "id": "c", "caseId": "091-24-00003", "chapter": "7", "dateFiled": "2024-02-10" }),
    ]);
    (client, collection, adapter)
}

fn chapter(value: &str) -> Expr {
    using::<DocketField>()
        .field(DocketField::Chapter)
        .equals(value)
        .into()
}

// =============================================================================
// CRUD
// =============================================================================

#[tokio::test]
async fn test_insert_assigns_public_id() {
    let (_client, collection, adapter) = setup();
    let mut item = docket("081-24-00001", "7", "2024-01-15");
    item.id = Some("caller-chosen".into());

    let id = adapter.insert_one(&item).await.unwrap();
    assert_ne!(id, "caller-chosen");

    let by_id = using::<DocketField>()
        .field(DocketField::Id)
        .equals(id.as_str());
    let found = adapter.find_one(&by_id.into()).await.unwrap();
    assert_eq!(found.id.as_deref(), Some(id.as_str()));
    assert_eq!(found.case_id, "081-24-00001");

    // the engine keeps its own identifier, reads never see it
    assert!(collection.documents()[0].get("_id").is_some());
}

#[tokio::test]
async fn test_insert_many_and_count() {
    let (_client, _collection, adapter) = setup();
    let ids = adapter
        .insert_many(&[
            docket("081-24-00001", "7", "2024-01-15"),
            docket("081-24-00002", "13", "2024-03-01"),
        ])
        .await
        .unwrap();

    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);
    assert_eq!(adapter.count_all_documents().await.unwrap(), 2);
    assert_eq!(adapter.count_documents(&chapter("13")).await.unwrap(), 1);
}

#[tokio::test]
async fn test_find_sorted() {
    let (_client, _collection, adapter) = seeded();
    let date_filed = using::<DocketField>().field(DocketField::DateFiled);

    let newest_first = adapter
        .find(&chapter("7"), Some(&order_by([descending(&date_filed)])))
        .await
        .unwrap();
    let ids: Vec<_> = newest_first
        .iter()
        .filter_map(|d| d.id.as_deref())
        .collect();
    assert_eq!(ids, vec!["c", "a"]);

    let all = adapter
        .get_all(Some(&order_by([ascending(&date_filed)])))
        .await
        .unwrap();
    let ids: Vec<_> = all.iter().filter_map(|d| d.id.as_deref()).collect();
    assert_eq!(ids, vec!["a", "c", "b"]);
}

#[tokio::test]
async fn test_update_one() {
    let (_client, collection, adapter) = seeded();
    let case_id = using::<DocketField>().field(DocketField::CaseId);

    let modified = adapter
        .update_one(&case_id.equals("081-24-00002").into(), &json!({ "chapter": "7" }))
        .await
        .unwrap();
    assert_eq!(modified, 1);
    assert_eq!(adapter.count_documents(&chapter("7")).await.unwrap(), 3);
    assert_eq!(collection.documents().len(), 3);

    let err = adapter
        .update_one(&case_id.equals("999-99-99999").into(), &json!({ "chapter": "7" }))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_replace_one() {
    let (_client, _collection, adapter) = seeded();
    let case_id = using::<DocketField>().field(DocketField::CaseId);

    let mut replacement = docket("081-24-00001", "13", "2024-01-15");
    replacement.id = Some("a".into());
    let id = adapter
        .replace_one(&case_id.equals("081-24-00001").into(), &replacement, false)
        .await
        .unwrap();
    assert_eq!(id, "a");
    assert_eq!(adapter.count_documents(&chapter("13")).await.unwrap(), 1);

    let missing = docket("999-99-99999", "7", "2024-05-01");
    let query: Expr = case_id.equals("999-99-99999").into();
    let err = adapter
        .replace_one(&query, &missing, false)
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let id = adapter.replace_one(&query, &missing, true).await.unwrap();
    assert!(!id.is_empty());
    assert_eq!(adapter.count_all_documents().await.unwrap(), 4);
}

#[tokio::test]
async fn test_delete() {
    let (_client, _collection, adapter) = seeded();

    assert_eq!(adapter.delete_one(&chapter("11")).await.unwrap(), 1);
    assert!(adapter
        .delete_one(&chapter("11"))
        .await
        .unwrap_err()
        .is_not_found());

    assert_eq!(adapter.delete_many(&chapter("7")).await.unwrap(), 2);
    assert!(adapter
        .delete_many(&chapter("7"))
        .await
        .unwrap_err()
        .is_not_found());
    assert_eq!(adapter.count_all_documents().await.unwrap(), 0);
}

#[tokio::test]
async fn test_find_one_not_found() {
    let (_client, _collection, adapter) = seeded();
    let err = adapter.find_one(&chapter("15")).await.unwrap_err();
    assert!(matches!(err, QueryError::NotFound { .. }));
    assert_eq!(err.code(), "NOT_FOUND");
}

// =============================================================================
// Driver Failures
// =============================================================================

#[tokio::test]
async fn test_driver_failure_carries_filter() {
    let (_client, collection, adapter) = seeded();
    collection.fail_next(DriverError::connection("connection reset"));

    let err = adapter.find(&chapter("7"), None).await.unwrap_err();
    match &err {
        QueryError::Driver { module, query, source } => {
            assert_eq!(module, "DOCKETS");
            assert_eq!(query, &json!({ "chapter": { "$eq": "7" } }));
            assert_eq!(source, &DriverError::connection("connection reset"));
        }
        other => panic!("expected a driver error, got {:?}", other),
    }
    assert!(!err.is_not_found());

    // the failure is consumed
    assert_eq!(adapter.find(&chapter("7"), None).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_closed_client_fails_every_call() {
    let (client, _collection, adapter) = seeded();
    client.close();

    let err = adapter.count_all_documents().await.unwrap_err();
    assert!(matches!(
        err,
        QueryError::Driver {
            source: DriverError::Closed,
            ..
        }
    ));
}

#[tokio::test]
async fn test_malformed_query_never_reaches_driver() {
    let (_client, collection, adapter) = seeded();

    let unpaged = pipeline([match_stage(chapter("7"))]);
    let err = adapter.paginate(&unpaged).await.unwrap_err();
    assert!(matches!(err, QueryError::MalformedIr(_)));
    assert!(collection.last_pipeline().is_none());
}

// =============================================================================
// Aggregation
// =============================================================================

#[tokio::test]
async fn test_base_paginate_end_to_end() {
    let (_client, collection, adapter) = seeded();
    let date_filed = using::<DocketField>().field(DocketField::DateFiled);

    let spec = pipeline([
        match_stage(and([chapter("7")])),
        sort([descending(&date_filed)]),
        paginate(1, 25),
    ]);
    let page = adapter.paginate(&spec).await.unwrap();

    assert_eq!(page.metadata, None);
    assert_eq!(page.data.len(), 1);
    assert_eq!(page.data[0].id.as_deref(), Some("a"));
    assert_eq!(collection.last_pipeline().unwrap().len(), 3);

    let data = adapter.aggregate(&spec).await.unwrap();
    assert_eq!(data, page.data);
}

#[tokio::test]
async fn test_base_aggregate_without_paginate() {
    let (_client, _collection, adapter) = seeded();
    let spec = pipeline([match_stage(chapter("11"))]);

    let found = adapter.aggregate(&spec).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].case_id, "081-24-00002");
}

#[tokio::test]
async fn test_atlas_appends_default_page() {
    let client = Arc::new(InMemoryClient::new());
    let collection = client.collection_handle("cams", "dockets");
    collection.seed([
        json!({ "caseId": "081-24-00001", "chapter": "7", "dateFiled": "2024-01-15" }),
        json!({ "caseId": "091-24-00003", "chapter": "7", "dateFiled": "2024-02-10" }),
    ]);

    let mut config = StoreConfig::new("cams");
    config.default_page_limit = 10;
    let adapter: CollectionAdapter<Docket, _> =
        CollectionAdapter::atlas("DOCKETS", client.collection("cams", "dockets"), &config);

    let page = adapter
        .paginate(&pipeline([match_stage(chapter("7"))]))
        .await
        .unwrap();
    assert_eq!(page.data.len(), 2);
    assert_eq!(page.metadata, Some(PageMetadata { total: 2 }));

    let executed = collection.last_pipeline().unwrap();
    assert_eq!(
        executed[1],
        json!({ "$facet": {
            "metadata": [{ "$count": "total" }],
            "data": [{ "$skip": 0 }, { "$limit": 10 }]
        }})
    );
}

// =============================================================================
// Concurrent Callers
// =============================================================================

/// Run `work` on `threads` OS threads at once, each with its own runtime.
fn on_threads<F, Fut, O>(threads: usize, work: F) -> Vec<O>
where
    F: Fn(usize) -> Fut + Sync,
    Fut: std::future::Future<Output = O>,
    O: Send,
{
    std::thread::scope(|scope| {
        let workers: Vec<_> = (0..threads)
            .map(|n| {
                let work = &work;
                scope.spawn(move || {
                    tokio::runtime::Builder::new_current_thread()
                        .build()
                        .unwrap()
                        .block_on(work(n))
                })
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    })
}

fn numbered_dockets(collection: &InMemoryCollection, count: usize) {
    collection.seed((0..count).map(|n| {
        json!({
            "id": format!("d{}", n),
            "caseId": format!("081-24-{:05}", n),
            "chapter": if n % 2 == 0 { "7" } else { "11" },
            "dateFiled": "2024-01-01"
        })
    }));
}

#[test]
fn test_concurrent_delete_many() {
    for _ in 0..20 {
        let (_client, collection, adapter) = setup();
        numbered_dockets(&collection, 200);

        let adapter = &adapter;
        let deleted = on_threads(8, move |_| async move {
            let mut total = 0;
            for _ in 0..40 {
                match adapter.delete_many(&chapter("7")).await {
                    Ok(count) => total += count,
                    Err(err) => assert!(err.is_not_found(), "{:?}", err),
                }
            }
            total
        });

        assert_eq!(deleted.iter().sum::<u64>(), 100);
        let remaining = collection.documents();
        assert_eq!(remaining.len(), 100);
        assert!(remaining.iter().all(|d| d["chapter"] == "11"));
    }
}

#[test]
fn test_concurrent_updates_touch_their_own_document() {
    let (_client, collection, adapter) = setup();
    numbered_dockets(&collection, 64);
    let case_id = using::<DocketField>().field(DocketField::CaseId);

    let (adapter, case_id, shared) = (&adapter, &case_id, &collection);
    on_threads(8, move |worker| async move {
        for n in (worker..64).step_by(8) {
            let query: Expr = case_id.equals(format!("081-24-{:05}", n)).into();
            let patch = json!({ "dateFiled": format!("2025-01-{:02}", worker + 1) });
            assert_eq!(adapter.update_one(&query, &patch).await.unwrap(), 1);

            // deletes shift positions while updates run
            if n % 2 == 1 {
                shared.seed([json!({ "caseId": "scratch", "chapter": "13" })]);
                adapter.delete_one(&chapter("13")).await.ok();
            }
        }
    });

    let stored = collection.documents();
    assert_eq!(stored.len(), 64);
    for docket in stored {
        let n: usize = docket["caseId"].as_str().unwrap()[7..].parse().unwrap();
        let expected = format!("2025-01-{:02}", n % 8 + 1);
        assert_eq!(docket["dateFiled"], json!(expected), "docket {}", n);
    }
}

#[test]
fn test_concurrent_replace_keeps_identity() {
    let (_client, collection, adapter) = setup();
    numbered_dockets(&collection, 32);
    let case_id = using::<DocketField>().field(DocketField::CaseId);

    let (adapter, case_id) = (&adapter, &case_id);
    on_threads(8, move |worker| async move {
        for n in (worker..32).step_by(8) {
            let number = format!("081-24-{:05}", n);
            let mut replacement = docket(&number, "13", "2025-06-01");
            replacement.id = Some(format!("d{}", n));
            let query: Expr = case_id.equals(number.as_str()).into();
            let id = adapter
                .replace_one(&query, &replacement, false)
                .await
                .unwrap();
            assert_eq!(id, format!("d{}", n));
        }
    });

    let stored = collection.documents();
    assert_eq!(stored.len(), 32);
    for docket in stored {
        let n: usize = docket["caseId"].as_str().unwrap()[7..].parse().unwrap();
        assert_eq!(docket["id"], json!(format!("d{}", n)));
        assert_eq!(docket["chapter"], "13");
    }
}
