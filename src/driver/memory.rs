//! In-memory document engine
//!
//! Stores JSON documents per collection and executes rendered filters and
//! base-renderer pipelines (`$match`, `$sort`, `$skip`, `$limit`, `$count`,
//! `$facet`, `$project`). Any other stage fails with
//! [`DriverError::UnsupportedStage`].
//!
//! Test hooks: [`InMemoryCollection::fail_next`] injects a driver failure,
//! [`InMemoryCollection::last_pipeline`] and
//! [`InMemoryCollection::last_filter`] expose what was executed, and
//! [`InMemoryClient::close_count`] reports how often the client was closed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use futures_util::future::{self, BoxFuture, FutureExt};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::eval;
use super::{
    DeleteOutcome, DocumentClient, DocumentCollection, DriverError, DriverResult,
    InsertManyOutcome, InsertOneOutcome, WriteOutcome,
};
use crate::render::ObjectId;

/// In-memory client; collections live as long as the client
#[derive(Default)]
pub struct InMemoryClient {
    collections: RwLock<HashMap<String, Arc<InMemoryCollection>>>,
    closed: Arc<AtomicBool>,
    close_count: AtomicUsize,
}

impl InMemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Typed handle to a collection, created on first use
    pub fn collection_handle(&self, database: &str, name: &str) -> Arc<InMemoryCollection> {
        let key = format!("{}.{}", database, name);
        if let Some(existing) = self
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Arc::clone(existing);
        }

        let mut collections = self
            .collections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let collection = collections
            .entry(key)
            .or_insert_with(|| {
                Arc::new(InMemoryCollection::new(name, Arc::clone(&self.closed)))
            });
        Arc::clone(collection)
    }

    /// Number of times `close` was called
    pub fn close_count(&self) -> usize {
        self.close_count.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl DocumentClient for InMemoryClient {
    fn collection(&self, database: &str, name: &str) -> Arc<dyn DocumentCollection> {
        self.collection_handle(database, name)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.close_count.fetch_add(1, Ordering::SeqCst);
    }
}

/// One in-memory collection
pub struct InMemoryCollection {
    name: String,
    documents: RwLock<Vec<Value>>,
    pending_failure: Mutex<Option<DriverError>>,
    last_filter: Mutex<Option<Value>>,
    last_pipeline: Mutex<Option<Vec<Value>>>,
    closed: Arc<AtomicBool>,
}

impl InMemoryCollection {
    fn new(name: &str, closed: Arc<AtomicBool>) -> Self {
        Self {
            name: name.to_string(),
            documents: RwLock::new(Vec::new()),
            pending_failure: Mutex::new(None),
            last_filter: Mutex::new(None),
            last_pipeline: Mutex::new(None),
            closed,
        }
    }

    /// A standalone collection with no owning client
    pub fn detached(name: &str) -> Arc<Self> {
        Arc::new(Self::new(name, Arc::new(AtomicBool::new(false))))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Store documents as-is, assigning `_id` where missing
    pub fn seed(&self, documents: impl IntoIterator<Item = Value>) {
        let mut stored = self.write();
        stored.extend(documents.into_iter().map(with_object_id));
    }

    /// Snapshot of every stored document
    pub fn documents(&self) -> Vec<Value> {
        self.read().clone()
    }

    /// Fail the next driver call with `error`
    pub fn fail_next(&self, error: DriverError) {
        *lock(&self.pending_failure) = Some(error);
    }

    /// Filter document of the most recent filtered call
    pub fn last_filter(&self) -> Option<Value> {
        lock(&self.last_filter).clone()
    }

    /// Stage documents of the most recent aggregation
    pub fn last_pipeline(&self) -> Option<Vec<Value>> {
        lock(&self.last_pipeline).clone()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<Value>> {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Value>> {
        self.documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Common preamble of every call: closed check, injected failure
    fn begin(&self, filter: Option<&Value>) -> DriverResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DriverError::Closed);
        }
        if let Some(filter) = filter {
            *lock(&self.last_filter) = Some(filter.clone());
        }
        match lock(&self.pending_failure).take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn find_sync(&self, filter: &Value, sort: Option<&Value>) -> DriverResult<Vec<Value>> {
        self.begin(Some(filter))?;
        let mut found = {
            let documents = self.read();
            let positions = matching(&documents, filter)?;
            positions
                .into_iter()
                .map(|i| documents[i].clone())
                .collect::<Vec<_>>()
        };
        if let Some(sort) = sort {
            sort_documents(&mut found, sort)?;
        }
        Ok(found)
    }

    fn replace_sync(
        &self,
        filter: &Value,
        replacement: Value,
        upsert: bool,
    ) -> DriverResult<WriteOutcome> {
        self.begin(Some(filter))?;
        let mut documents = self.write();
        match matching(&documents, filter)?.first().copied() {
            Some(position) => {
                let mut replacement = replacement;
                if let (Some(target), Some(id)) = (
                    replacement.as_object_mut(),
                    documents[position].get("_id").cloned(),
                ) {
                    target.insert("_id".to_string(), id);
                }
                let modified = documents[position] != replacement;
                documents[position] = replacement;
                Ok(WriteOutcome {
                    acknowledged: true,
                    matched_count: 1,
                    modified_count: u64::from(modified),
                    upserted: false,
                })
            }
            None if upsert => {
                documents.push(with_object_id(replacement));
                Ok(WriteOutcome {
                    acknowledged: true,
                    matched_count: 0,
                    modified_count: 0,
                    upserted: true,
                })
            }
            None => Ok(WriteOutcome {
                acknowledged: true,
                matched_count: 0,
                modified_count: 0,
                upserted: false,
            }),
        }
    }

    fn update_sync(&self, filter: &Value, update: &Value) -> DriverResult<WriteOutcome> {
        self.begin(Some(filter))?;
        let operators = update
            .as_object()
            .ok_or_else(|| DriverError::command("update must be a document"))?;

        let mut documents = self.write();
        let Some(position) = matching(&documents, filter)?.first().copied() else {
            return Ok(WriteOutcome {
                acknowledged: true,
                matched_count: 0,
                modified_count: 0,
                upserted: false,
            });
        };

        let before = documents[position].clone();
        let target = documents[position]
            .as_object_mut()
            .ok_or_else(|| DriverError::command("stored document is not an object"))?;
        for (operator, fields) in operators {
            let fields = fields.as_object().ok_or_else(|| {
                DriverError::command(format!("{} expects a document", operator))
            })?;
            match operator.as_str() {
                "$set" => {
                    for (key, value) in fields {
                        target.insert(key.clone(), value.clone());
                    }
                }
                "$unset" => {
                    for key in fields.keys() {
                        target.remove(key);
                    }
                }
                other => {
                    return Err(DriverError::command(format!(
                        "unsupported update operator {}",
                        other
                    )))
                }
            }
        }
        let modified = documents[position] != before;
        Ok(WriteOutcome {
            acknowledged: true,
            matched_count: 1,
            modified_count: u64::from(modified),
            upserted: false,
        })
    }

    fn delete_sync(&self, filter: &Value, many: bool) -> DriverResult<DeleteOutcome> {
        self.begin(Some(filter))?;
        let mut documents = self.write();
        let mut positions = matching(&documents, filter)?;
        if !many {
            positions.truncate(1);
        }
        for position in positions.iter().rev() {
            documents.remove(*position);
        }
        Ok(DeleteOutcome {
            acknowledged: true,
            deleted_count: positions.len() as u64,
        })
    }

    fn aggregate_sync(&self, pipeline: Vec<Value>) -> DriverResult<Vec<Value>> {
        *lock(&self.last_pipeline) = Some(pipeline.clone());
        self.begin(None)?;
        let documents = self.read().clone();
        run_pipeline(documents, &pipeline)
    }
}

impl DocumentCollection for InMemoryCollection {
    fn find(&self, filter: Value, sort: Option<Value>) -> BoxFuture<'_, DriverResult<Vec<Value>>> {
        future::ready(self.find_sync(&filter, sort.as_ref())).boxed()
    }

    fn find_one(&self, filter: Value) -> BoxFuture<'_, DriverResult<Option<Value>>> {
        let found = self
            .find_sync(&filter, None)
            .map(|documents| documents.into_iter().next());
        future::ready(found).boxed()
    }

    fn insert_one(&self, document: Value) -> BoxFuture<'_, DriverResult<InsertOneOutcome>> {
        let outcome = self.begin(None).map(|()| {
            self.write().push(with_object_id(document));
            InsertOneOutcome { acknowledged: true }
        });
        future::ready(outcome).boxed()
    }

    fn insert_many(
        &self,
        documents: Vec<Value>,
    ) -> BoxFuture<'_, DriverResult<InsertManyOutcome>> {
        let outcome = self.begin(None).map(|()| {
            let inserted_count = documents.len() as u64;
            self.write()
                .extend(documents.into_iter().map(with_object_id));
            InsertManyOutcome {
                acknowledged: true,
                inserted_count,
            }
        });
        future::ready(outcome).boxed()
    }

    fn replace_one(
        &self,
        filter: Value,
        replacement: Value,
        upsert: bool,
    ) -> BoxFuture<'_, DriverResult<WriteOutcome>> {
        future::ready(self.replace_sync(&filter, replacement, upsert)).boxed()
    }

    fn update_one(
        &self,
        filter: Value,
        update: Value,
    ) -> BoxFuture<'_, DriverResult<WriteOutcome>> {
        future::ready(self.update_sync(&filter, &update)).boxed()
    }

    fn delete_one(&self, filter: Value) -> BoxFuture<'_, DriverResult<DeleteOutcome>> {
        future::ready(self.delete_sync(&filter, false)).boxed()
    }

    fn delete_many(&self, filter: Value) -> BoxFuture<'_, DriverResult<DeleteOutcome>> {
        future::ready(self.delete_sync(&filter, true)).boxed()
    }

    fn count_documents(&self, filter: Value) -> BoxFuture<'_, DriverResult<u64>> {
        let count = self
            .find_sync(&filter, None)
            .map(|documents| documents.len() as u64);
        future::ready(count).boxed()
    }

    fn aggregate(&self, pipeline: Vec<Value>) -> BoxFuture<'_, DriverResult<Vec<Value>>> {
        future::ready(self.aggregate_sync(pipeline)).boxed()
    }
}

/// Positions of the documents matching `filter`; only valid while the
/// caller's guard is held
fn matching(documents: &[Value], filter: &Value) -> DriverResult<Vec<usize>> {
    let mut positions = Vec::new();
    for (position, document) in documents.iter().enumerate() {
        if eval::matches(document, filter)? {
            positions.push(position);
        }
    }
    Ok(positions)
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Assign a fresh `_id` to documents that lack one
fn with_object_id(mut document: Value) -> Value {
    if let Some(map) = document.as_object_mut() {
        if !map.contains_key("_id") {
            let mut bytes = [0u8; 12];
            bytes.copy_from_slice(&Uuid::new_v4().as_bytes()[..12]);
            map.insert("_id".to_string(), ObjectId::from_bytes(bytes).to_wire());
        }
    }
    document
}

fn sort_documents(documents: &mut [Value], sort: &Value) -> DriverResult<()> {
    let keys = sort
        .as_object()
        .ok_or_else(|| DriverError::command("sort must be a document"))?
        .iter()
        .map(|(field, direction)| match direction.as_i64() {
            Some(1) => Ok((field.clone(), false)),
            Some(-1) => Ok((field.clone(), true)),
            _ => Err(DriverError::command(format!(
                "sort direction for {} must be 1 or -1",
                field
            ))),
        })
        .collect::<DriverResult<Vec<_>>>()?;

    documents.sort_by(|a, b| {
        keys.iter()
            .map(|(field, descending)| {
                let ordering = eval::sort_order(eval::resolve(a, field), eval::resolve(b, field));
                if *descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Ok(())
}

fn run_pipeline(mut documents: Vec<Value>, pipeline: &[Value]) -> DriverResult<Vec<Value>> {
    for stage in pipeline {
        let (name, spec) = stage
            .as_object()
            .filter(|map| map.len() == 1)
            .and_then(|map| map.iter().next())
            .ok_or_else(|| DriverError::command(format!("malformed stage: {}", stage)))?;

        documents = match name.as_str() {
            "$match" => {
                let mut kept = Vec::with_capacity(documents.len());
                for document in documents {
                    if eval::matches(&document, spec)? {
                        kept.push(document);
                    }
                }
                kept
            }
            "$sort" => {
                sort_documents(&mut documents, spec)?;
                documents
            }
            "$skip" => {
                let skip = count_argument(name, spec)?;
                documents.into_iter().skip(skip).collect()
            }
            "$limit" => {
                let limit = count_argument(name, spec)?;
                documents.into_iter().take(limit).collect()
            }
            "$count" => {
                let output = spec
                    .as_str()
                    .ok_or_else(|| DriverError::command("$count expects a field name"))?;
                // An empty input produces no count document
                if documents.is_empty() {
                    Vec::new()
                } else {
                    let mut counted = Map::new();
                    counted.insert(output.to_string(), Value::from(documents.len() as u64));
                    vec![Value::Object(counted)]
                }
            }
            "$facet" => {
                let branches = spec
                    .as_object()
                    .ok_or_else(|| DriverError::command("$facet expects a document"))?;
                let mut result = Map::new();
                for (branch, stages) in branches {
                    let stages = stages.as_array().ok_or_else(|| {
                        DriverError::command(format!("$facet branch {} must be an array", branch))
                    })?;
                    let output = run_pipeline(documents.clone(), stages)?;
                    result.insert(branch.clone(), Value::Array(output));
                }
                vec![Value::Object(result)]
            }
            "$project" => project(documents, spec)?,
            other => return Err(DriverError::UnsupportedStage(other.to_string())),
        };
    }
    Ok(documents)
}

fn count_argument(name: &str, spec: &Value) -> DriverResult<usize> {
    spec.as_u64()
        .map(|n| n as usize)
        .ok_or_else(|| DriverError::command(format!("{} expects a non-negative integer", name)))
}

fn project(documents: Vec<Value>, spec: &Value) -> DriverResult<Vec<Value>> {
    let fields = spec
        .as_object()
        .ok_or_else(|| DriverError::command("$project expects a document"))?;
    let include = fields.values().any(|flag| flag.as_i64() == Some(1));

    Ok(documents
        .into_iter()
        .map(|document| match document {
            Value::Object(mut map) if include => {
                map.retain(|key, _| key == "_id" || fields.contains_key(key));
                Value::Object(map)
            }
            Value::Object(mut map) => {
                map.retain(|key, _| !fields.contains_key(key));
                Value::Object(map)
            }
            other => other,
        })
        .collect())
}
