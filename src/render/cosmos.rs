//! vCore / Cosmos-style aggregate renderer
//!
//! Same stage set as the Atlas renderer; vector search nests its
//! parameters under `$search.cosmosSearch`:
//!
//! ```text
//! { "$search": { "cosmosSearch": {
//!     "vector": [...],
//!     "path": "keywordsVector",
//!     "k": 10,
//!     "similarity": "COS"             (omitted when unset)
//! } } }
//! ```

use serde_json::{Map, Value};

use crate::error::QueryResult;
use crate::pipeline::{Stage, VectorSearch};

use super::filter::doc;
use super::stages;
use super::AggregateRenderer;

/// Renderer for the vCore / Cosmos-style engine
#[derive(Debug, Clone, Copy, Default)]
pub struct CosmosRenderer;

fn cosmos_search(search: &VectorSearch) -> Value {
    let mut body = Map::new();
    body.insert("vector".to_string(), Value::from(search.vector.clone()));
    body.insert("path".to_string(), Value::from(search.path.name.as_str()));
    body.insert("k".to_string(), Value::from(search.k));
    if let Some(similarity) = search.similarity {
        body.insert("similarity".to_string(), Value::from(similarity.as_str()));
    }
    doc("$search", doc("cosmosSearch", Value::Object(body)))
}

impl AggregateRenderer for CosmosRenderer {
    fn name(&self) -> &'static str {
        "cosmos"
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
            Stage::VectorSearch(search) => Ok(cosmos_search(search)),
        }
    }
}
