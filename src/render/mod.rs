//! # Renderers
//!
//! Pure compilers from IR to native wire documents.
//!
//! - [`to_filter`] / [`to_sort`] compile an expression tree / sort spec for
//!   plain queries
//! - [`AggregateRenderer`] compiles a [`Pipeline`] into one native stage
//!   document per IR stage
//!
//! Three aggregate renderers exist:
//!
//! | Stage          | Base          | Atlas                   | Cosmos                   |
//! |----------------|---------------|-------------------------|--------------------------|
//! | MATCH / SORT   | yes           | yes                     | yes                      |
//! | PAGINATE       | `data` only   | `metadata` + `data`     | `metadata` + `data`      |
//! | JOIN .. GROUP  | unsupported   | yes                     | yes                      |
//! | VECTOR_SEARCH  | unsupported   | `$vectorSearch`         | `$search.cosmosSearch`   |
//!
//! Renderers hold no mutable state and may be shared across threads.

mod atlas;
mod base;
mod cosmos;
mod element;
mod filter;
mod object_id;
mod stages;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::StoreConfig;
use crate::error::QueryResult;
use crate::pipeline::{Pipeline, Stage};

pub use atlas::AtlasRenderer;
pub use base::BaseRenderer;
pub use cosmos::CosmosRenderer;
pub use element::{element_path, to_element_condition};
pub use filter::{conjunction_operator, filter_operator, to_filter, to_sort};
pub use object_id::{ObjectId, OID_KEY};

/// Compiles pipelines for one target engine
pub trait AggregateRenderer: Send + Sync {
    /// Renderer name used in diagnostics
    fn name(&self) -> &'static str;

    /// Compile a single stage into one native stage document
    fn render_stage(&self, stage: &Stage) -> QueryResult<Value>;

    /// Validate the pipeline, then compile it stage by stage
    fn render(&self, pipeline: &Pipeline) -> QueryResult<Vec<Value>> {
        pipeline.validate()?;
        pipeline
            .stages
            .iter()
            .map(|stage| self.render_stage(stage))
            .collect()
    }
}

/// Target engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// Generic document store
    #[default]
    Base,
    /// Atlas-style managed engine
    Atlas,
    /// vCore / Cosmos-style managed engine
    Cosmos,
}

impl Engine {
    /// True if the engine's renderer compiles VECTOR_SEARCH
    pub fn supports_vector_search(&self) -> bool {
        match self {
            Engine::Base => false,
            Engine::Atlas | Engine::Cosmos => true,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::Base => "base",
            Engine::Atlas => "atlas",
            Engine::Cosmos => "cosmos",
        }
    }
}

/// The renderer for `engine`, configured from `config`
pub fn renderer_for(engine: Engine, config: &StoreConfig) -> Box<dyn AggregateRenderer> {
    match engine {
        Engine::Base => Box::new(BaseRenderer),
        Engine::Atlas => Box::new(AtlasRenderer::new(config.vector_index.clone())),
        Engine::Cosmos => Box::new(CosmosRenderer),
    }
}

impl<R: AggregateRenderer + ?Sized> AggregateRenderer for Box<R> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn render_stage(&self, stage: &Stage) -> QueryResult<Value> {
        (**self).render_stage(stage)
    }

    fn render(&self, pipeline: &Pipeline) -> QueryResult<Vec<Value>> {
        (**self).render(pipeline)
    }
}
