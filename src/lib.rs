//! pipequery - a query IR and multi-engine aggregation compiler
//!
//! Filters and pipelines are built once against typed document shapes and
//! rendered to the wire documents of a generic document store, an
//! Atlas-style engine (`$vectorSearch`) or a Cosmos-style engine
//! (`$search.cosmosSearch`).

pub mod adapter;
pub mod config;
pub mod driver;
pub mod error;
pub mod pipeline;
pub mod query;
pub mod render;
pub mod repository;

pub use config::StoreConfig;
pub use error::{QueryError, QueryResult};
