//! Base aggregate renderer
//!
//! Compiles MATCH, SORT and PAGINATE only. Pagination emits just the
//! `data` branch; callers must tolerate a missing `metadata` branch.

use serde_json::Value;

use crate::error::{QueryError, QueryResult};
use crate::pipeline::Stage;

use super::stages;
use super::AggregateRenderer;

/// Renderer for the generic document store
#[derive(Debug, Clone, Copy, Default)]
pub struct BaseRenderer;

impl AggregateRenderer for BaseRenderer {
    fn name(&self) -> &'static str {
        "base"
    }

    fn render_stage(&self, stage: &Stage) -> QueryResult<Value> {
        match stage {
            Stage::Match { query } => stages::match_stage(query),
            Stage::Sort(sort) => Ok(stages::sort_stage(sort)),
            Stage::Paginate(paginate) => Ok(stages::facet_stage(paginate, false)),
            Stage::Join(_)
            | Stage::AddFields { .. }
            | Stage::Include { .. }
            | Stage::Exclude { .. }
            | Stage::Group(_)
            | Stage::VectorSearch(_) => Err(QueryError::UnsupportedStage {
                renderer: self.name(),
                stage: stage.name(),
            }),
        }
    }
}
