//! Atlas-style aggregate renderer
//!
//! Full stage set. Vector search compiles to the managed `$vectorSearch`
//! operator, which the engine only accepts as the first pipeline stage:
//!
//! ```text
//! { "$vectorSearch": {
//!     "index": "vector_index",        (omitted when unset)
//!     "path": "keywordsVector",
//!     "queryVector": [...],
//!     "numCandidates": k,
//!     "limit": k
//! } }
//! ```

use serde_json::{Map, Value};

use crate::error::QueryResult;
use crate::pipeline::{Stage, VectorSearch};

use super::filter::doc;
use super::stages;
use super::AggregateRenderer;

/// Renderer for the Atlas-style managed engine
#[derive(Debug, Clone, Default)]
pub struct AtlasRenderer {
    index: Option<String>,
}

impl AtlasRenderer {
    /// Create a renderer naming `index` in every vector search
    pub fn new(index: Option<String>) -> Self {
        Self { index }
    }

    /// The configured search index
    pub fn index(&self) -> Option<&str> {
        self.index.as_deref()
    }

    fn vector_search(&self, search: &VectorSearch) -> Value {
        let mut body = Map::new();
        if let Some(index) = &self.index {
            body.insert("index".to_string(), Value::from(index.as_str()));
        }
        body.insert("path".to_string(), Value::from(search.path.name.as_str()));
        body.insert("queryVector".to_string(), Value::from(search.vector.clone()));
        body.insert("numCandidates".to_string(), Value::from(search.k));
        body.insert("limit".to_string(), Value::from(search.k));
        doc("$vectorSearch", Value::Object(body))
    }
}

impl AggregateRenderer for AtlasRenderer {
    fn name(&self) -> &'static str {
        "atlas"
    }

    fn render_stage(&self, stage: &Stage) -> QueryResult<Value> {
        match stage {
            Stage::Match { query } => stages::match_stage(query),
            Stage::Sort(sort) => Ok(stages::sort_stage(sort)),
            Stage::Paginate(paginate) => Ok(stages::facet_stage(paginate, true)),
            Stage::Join(join) => Ok(stages::lookup_stage(join)),
            Stage::AddFields { fields } => stages::add_fields_stage(fields),
            Stage::Include { fields } => Ok(stages::project_stage(fields, true)),
            Stage::Exclude { fields } => Ok(stages::project_stage(fields, false)),
            Stage::Group(group) => Ok(stages::group_stage(group)),
            Stage::VectorSearch(search) => Ok(self.vector_search(search)),
        }
    }
}
