//! Collection adapter
//!
//! Typed CRUD and aggregation over one [`DocumentCollection`]. Filters are
//! compiled with the filter renderer, pipelines with the bound aggregate
//! renderer. Every driver failure is wrapped into [`QueryError::Driver`]
//! together with the rendered filter or pipeline.
//!
//! Document identity:
//! - the public identifier is the `id` field, a UUID string
//! - inserts strip any `_id` / `id` and assign a fresh `id`
//! - `replace_one` keeps the caller's `id`, assigning one when absent
//! - reads strip the engine-internal `_id`

use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, error};
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::driver::{DocumentClient, DocumentCollection, DriverError};
use crate::error::{QueryError, QueryResult};
use crate::pipeline::Pipeline;
use crate::query::{Expr, Sort};
use crate::render::{
    to_filter, to_sort, AggregateRenderer, AtlasRenderer, BaseRenderer, CosmosRenderer,
};

use super::response::{split_facet, PaginationResponse};

/// Public identifier field
pub const PUBLIC_ID: &str = "id";
/// Engine-internal identifier field
pub const INTERNAL_ID: &str = "_id";

const NO_MATCH: &str = "No matching item found.";
const NONE_DELETED: &str = "No items deleted";

/// Typed adapter over one collection
pub struct CollectionAdapter<T, R = BaseRenderer> {
    module: String,
    collection: Arc<dyn DocumentCollection>,
    renderer: R,
    default_page_limit: Option<u64>,
    _document: PhantomData<fn() -> T>,
}

impl<T> CollectionAdapter<T, BaseRenderer> {
    /// Generic adapter; pipelines compile with the base renderer
    pub fn new(module: impl Into<String>, collection: Arc<dyn DocumentCollection>) -> Self {
        Self::with_renderer(module, collection, BaseRenderer, None)
    }

    /// Generic adapter for `database.collection` of `client`
    pub fn open(
        module: impl Into<String>,
        client: &dyn DocumentClient,
        database: &str,
        collection: &str,
    ) -> Self {
        Self::new(module, client.collection(database, collection))
    }
}

impl<T> CollectionAdapter<T, AtlasRenderer> {
    /// Atlas-style adapter; pipelines always paginate
    pub fn atlas(
        module: impl Into<String>,
        collection: Arc<dyn DocumentCollection>,
        config: &StoreConfig,
    ) -> Self {
        Self::with_renderer(
            module,
            collection,
            AtlasRenderer::new(config.vector_index.clone()),
            Some(config.default_page_limit),
        )
    }
}

impl<T> CollectionAdapter<T, CosmosRenderer> {
    /// vCore / Cosmos-style adapter; pipelines always paginate
    pub fn cosmos(
        module: impl Into<String>,
        collection: Arc<dyn DocumentCollection>,
        config: &StoreConfig,
    ) -> Self {
        Self::with_renderer(
            module,
            collection,
            CosmosRenderer,
            Some(config.default_page_limit),
        )
    }
}

impl<T, R> CollectionAdapter<T, R> {
    /// Adapter bound to `renderer`. With a `default_page_limit`, pipelines
    /// lacking a Paginate stage get `Paginate(0, limit)` appended.
    pub fn with_renderer(
        module: impl Into<String>,
        collection: Arc<dyn DocumentCollection>,
        renderer: R,
        default_page_limit: Option<u64>,
    ) -> Self {
        Self {
            module: module.into(),
            collection,
            renderer,
            default_page_limit,
            _document: PhantomData,
        }
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }
}

impl<T, R> CollectionAdapter<T, R>
where
    T: Serialize + DeserializeOwned,
    R: AggregateRenderer,
{
    /// Documents matching `query`, optionally sorted
    pub async fn find(&self, query: &Expr, sort: Option<&Sort>) -> QueryResult<Vec<T>> {
        let filter = to_filter(query)?;
        self.find_rendered(filter, sort).await
    }

    /// Every document, optionally sorted
    pub async fn get_all(&self, sort: Option<&Sort>) -> QueryResult<Vec<T>> {
        self.find_rendered(Value::Object(Map::new()), sort).await
    }

    async fn find_rendered(&self, filter: Value, sort: Option<&Sort>) -> QueryResult<Vec<T>> {
        let sort = sort.filter(|sort| !sort.is_empty()).map(to_sort);
        let documents = self
            .collection
            .find(filter.clone(), sort)
            .await
            .map_err(|e| self.driver_error(filter, e))?;
        documents.into_iter().map(from_document).collect()
    }

    /// The first document matching `query`
    pub async fn find_one(&self, query: &Expr) -> QueryResult<T> {
        let filter = to_filter(query)?;
        let found = self
            .collection
            .find_one(filter.clone())
            .await
            .map_err(|e| self.driver_error(filter, e))?;
        match found {
            Some(document) => from_document(document),
            None => Err(QueryError::not_found(&self.module, NO_MATCH)),
        }
    }

    /// Replace the first match of `query` with `item`, returning its `id`
    pub async fn replace_one(&self, query: &Expr, item: &T, upsert: bool) -> QueryResult<String> {
        let filter = to_filter(query)?;
        let (document, id) = with_public_id(to_document(item)?)?;
        let outcome = self
            .collection
            .replace_one(filter.clone(), document, upsert)
            .await
            .map_err(|e| self.driver_error(filter, e))?;

        if !outcome.acknowledged {
            return Err(if upsert {
                QueryError::unknown(&self.module, "Failed to insert document into database.")
            } else {
                QueryError::not_found(&self.module, NO_MATCH)
            });
        }
        if outcome.matched_count == 0 && !outcome.upserted {
            return Err(QueryError::not_found(&self.module, NO_MATCH));
        }
        Ok(id)
    }

    /// Insert `item` under a fresh `id`
    pub async fn insert_one(&self, item: &T) -> QueryResult<String> {
        let (document, id) = with_public_id(without_ids(to_document(item)?))?;
        let outcome = self
            .collection
            .insert_one(document.clone())
            .await
            .map_err(|e| self.driver_error(document, e))?;
        if !outcome.acknowledged {
            return Err(QueryError::unknown(
                &self.module,
                "Failed to insert document into database.",
            ));
        }
        Ok(id)
    }

    /// Insert every item under fresh `id`s, returned in input order
    pub async fn insert_many(&self, items: &[T]) -> QueryResult<Vec<String>> {
        let mut documents = Vec::with_capacity(items.len());
        let mut ids = Vec::with_capacity(items.len());
        for item in items {
            let (document, id) = with_public_id(without_ids(to_document(item)?))?;
            documents.push(document);
            ids.push(id);
        }

        let outcome = self
            .collection
            .insert_many(documents)
            .await
            .map_err(|e| self.driver_error(Value::from(ids.clone()), e))?;
        if outcome.inserted_count != ids.len() as u64 {
            return Err(QueryError::unknown(
                &self.module,
                format!(
                    "Not all items inserted ({} of {})",
                    outcome.inserted_count,
                    ids.len()
                ),
            ));
        }
        Ok(ids)
    }

    /// Set the fields of `patch` on the first match of `query`, returning
    /// the number of modified documents
    pub async fn update_one(&self, query: &Expr, patch: &impl Serialize) -> QueryResult<u64> {
        let filter = to_filter(query)?;
        let mut update = Map::new();
        update.insert("$set".to_string(), without_internal_id(serde_json::to_value(patch)?));
        let outcome = self
            .collection
            .update_one(filter.clone(), Value::Object(update))
            .await
            .map_err(|e| self.driver_error(filter, e))?;
        if outcome.matched_count == 0 {
            return Err(QueryError::not_found(&self.module, NO_MATCH));
        }
        Ok(outcome.modified_count)
    }

    /// Delete exactly one match of `query`
    pub async fn delete_one(&self, query: &Expr) -> QueryResult<u64> {
        let filter = to_filter(query)?;
        let outcome = self
            .collection
            .delete_one(filter.clone())
            .await
            .map_err(|e| self.driver_error(filter, e))?;
        if outcome.deleted_count != 1 {
            return Err(QueryError::not_found(&self.module, NONE_DELETED));
        }
        Ok(outcome.deleted_count)
    }

    /// Delete every match of `query`; at least one must match
    pub async fn delete_many(&self, query: &Expr) -> QueryResult<u64> {
        let filter = to_filter(query)?;
        let outcome = self
            .collection
            .delete_many(filter.clone())
            .await
            .map_err(|e| self.driver_error(filter, e))?;
        if outcome.deleted_count < 1 {
            return Err(QueryError::not_found(&self.module, NONE_DELETED));
        }
        Ok(outcome.deleted_count)
    }

    pub async fn count_documents(&self, query: &Expr) -> QueryResult<u64> {
        let filter = to_filter(query)?;
        self.count_rendered(filter).await
    }

    pub async fn count_all_documents(&self) -> QueryResult<u64> {
        self.count_rendered(Value::Object(Map::new())).await
    }

    async fn count_rendered(&self, filter: Value) -> QueryResult<u64> {
        self.collection
            .count_documents(filter.clone())
            .await
            .map_err(|e| self.driver_error(filter, e))
    }

    /// Run `pipeline`, returning its documents. When the pipeline ends in
    /// Paginate, the facet's `data` branch is returned.
    pub async fn aggregate(&self, pipeline: &Pipeline) -> QueryResult<Vec<T>> {
        let pipeline = self.with_defaults(pipeline);
        let results = self.run(&pipeline).await?;
        let documents = if pipeline.terminal_paginate().is_some() {
            split_facet(results)?.0
        } else {
            results
        };
        documents.into_iter().map(from_document).collect()
    }

    /// Run a paginated pipeline. A terminal Paginate stage is required
    /// unless the adapter appends a default one.
    pub async fn paginate(&self, pipeline: &Pipeline) -> QueryResult<PaginationResponse<T>> {
        let pipeline = self.with_defaults(pipeline);
        if pipeline.terminal_paginate().is_none() {
            return Err(QueryError::malformed(
                "paginate requires a pipeline ending in a PAGINATE stage",
            ));
        }

        let results = self.run(&pipeline).await?;
        let (data, metadata) = split_facet(results)?;
        let data = data
            .into_iter()
            .map(from_document)
            .collect::<QueryResult<Vec<T>>>()?;
        Ok(PaginationResponse::new(data, metadata))
    }

    fn with_defaults(&self, pipeline: &Pipeline) -> Pipeline {
        match self.default_page_limit {
            Some(limit) => pipeline.clone().with_default_pagination(limit),
            None => pipeline.clone(),
        }
    }

    async fn run(&self, pipeline: &Pipeline) -> QueryResult<Vec<Value>> {
        let stages = self.renderer.render(pipeline)?;
        debug!(
            module = %self.module,
            renderer = self.renderer.name(),
            stages = stages.len(),
            "running aggregation"
        );
        self.collection
            .aggregate(stages.clone())
            .await
            .map_err(|e| self.driver_error(Value::Array(stages), e))
    }

    fn driver_error(&self, query: Value, source: DriverError) -> QueryError {
        error!(module = %self.module, error = %source, "database operation failed");
        QueryError::driver(&self.module, query, source)
    }
}

fn to_document<T: Serialize>(item: &T) -> QueryResult<Value> {
    Ok(serde_json::to_value(item)?)
}

fn from_document<T: DeserializeOwned>(document: Value) -> QueryResult<T> {
    Ok(serde_json::from_value(without_internal_id(document))?)
}

fn without_internal_id(mut document: Value) -> Value {
    if let Some(map) = document.as_object_mut() {
        map.remove(INTERNAL_ID);
    }
    document
}

fn without_ids(mut document: Value) -> Value {
    if let Some(map) = document.as_object_mut() {
        map.remove(INTERNAL_ID);
        map.remove(PUBLIC_ID);
    }
    document
}

/// Keep the document's `id` or assign a fresh UUID; returns the id
fn with_public_id(mut document: Value) -> QueryResult<(Value, String)> {
    let map = document
        .as_object_mut()
        .ok_or_else(|| QueryError::malformed("documents must serialize to objects"))?;
    let id = match map.get(PUBLIC_ID).and_then(Value::as_str) {
        Some(id) => id.to_string(),
        None => {
            let id = Uuid::new_v4().to_string();
            map.insert(PUBLIC_ID.to_string(), Value::from(id.as_str()));
            id
        }
    };
    Ok((document, id))
}
