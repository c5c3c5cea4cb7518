//! # Driver Boundary
//!
//! Narrow capability interfaces between the adapters and a document
//! database driver. Adapters only ever talk to a [`DocumentCollection`];
//! the wire documents they pass are the renderer outputs.
//!
//! [`memory`] provides an in-process engine implementing both traits,
//! used by tests and local tooling in place of a live database.

mod eval;
pub mod memory;

use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::Value;
use thiserror::Error;

pub use memory::{InMemoryClient, InMemoryCollection};

/// Result type for driver calls
pub type DriverResult<T> = Result<T, DriverError>;

/// Failures reported by a driver
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DriverError {
    /// The database could not be reached
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The database rejected the command
    #[error("Command failed: {0}")]
    Command(String),

    /// The client was closed before the call
    #[error("Client is closed")]
    Closed,

    /// The engine cannot execute this aggregation stage
    #[error("Unsupported aggregation stage: {0}")]
    UnsupportedStage(String),
}

impl DriverError {
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    pub fn command(msg: impl Into<String>) -> Self {
        Self::Command(msg.into())
    }
}

/// Result of a single insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertOneOutcome {
    pub acknowledged: bool,
}

/// Result of a bulk insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertManyOutcome {
    pub acknowledged: bool,
    pub inserted_count: u64,
}

/// Result of a replace or update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOutcome {
    pub acknowledged: bool,
    pub matched_count: u64,
    pub modified_count: u64,
    /// True if the write inserted a new document
    pub upserted: bool,
}

/// Result of a delete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub acknowledged: bool,
    pub deleted_count: u64,
}

/// One collection of a document database.
///
/// Every argument is a native wire document. Implementations must be safe
/// to share across tasks; the driver owns its own connection pooling.
pub trait DocumentCollection: Send + Sync {
    /// Documents matching `filter`, ordered by `sort` when given
    fn find(&self, filter: Value, sort: Option<Value>) -> BoxFuture<'_, DriverResult<Vec<Value>>>;

    /// First document matching `filter`
    fn find_one(&self, filter: Value) -> BoxFuture<'_, DriverResult<Option<Value>>>;

    fn insert_one(&self, document: Value) -> BoxFuture<'_, DriverResult<InsertOneOutcome>>;

    fn insert_many(&self, documents: Vec<Value>)
        -> BoxFuture<'_, DriverResult<InsertManyOutcome>>;

    /// Replace the first document matching `filter`, inserting when
    /// nothing matches and `upsert` is set
    fn replace_one(
        &self,
        filter: Value,
        replacement: Value,
        upsert: bool,
    ) -> BoxFuture<'_, DriverResult<WriteOutcome>>;

    /// Apply an update document (`{ $set: {...} }`) to the first match
    fn update_one(&self, filter: Value, update: Value) -> BoxFuture<'_, DriverResult<WriteOutcome>>;

    fn delete_one(&self, filter: Value) -> BoxFuture<'_, DriverResult<DeleteOutcome>>;

    fn delete_many(&self, filter: Value) -> BoxFuture<'_, DriverResult<DeleteOutcome>>;

    fn count_documents(&self, filter: Value) -> BoxFuture<'_, DriverResult<u64>>;

    /// Run an aggregation pipeline
    fn aggregate(&self, pipeline: Vec<Value>) -> BoxFuture<'_, DriverResult<Vec<Value>>>;
}

/// A connected database client
pub trait DocumentClient: Send + Sync {
    /// Handle to the collection `name` of `database`
    fn collection(&self, database: &str, name: &str) -> Arc<dyn DocumentCollection>;

    /// Release the client's connections. Called once, at shutdown.
    fn close(&self);
}
