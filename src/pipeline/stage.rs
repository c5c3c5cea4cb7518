//! Pipeline stage definitions
//!
//! `Stage` is a closed sum type: every renderer matches on it exhaustively,
//! so a new stage kind forces each renderer to either compile it or report
//! it as unsupported.

use serde::{Deserialize, Serialize};

use crate::query::{Expr, Field, Sort};

/// Skip / limit window. Always the terminal stage of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paginate {
    pub skip: u64,
    pub limit: u64,
}

/// Left outer join against another collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Join {
    /// Field of the current documents
    pub local: Field,
    /// Field of the joined collection; its source names that collection
    pub foreign: Field,
    /// Output array field receiving the joined documents
    pub alias: Field,
}

/// A computed array field.
///
/// The value is "elements of `query_source` for which `query` holds".
/// Every leaf field inside `query` is resolved against the current array
/// element, not the root document. Nothing enforces this: a tree naming
/// unrelated root fields still renders, it just filters on element
/// properties that do not exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalField {
    pub field_to_add: Field,
    pub query_source: Field,
    pub query: Expr,
}

/// Group accumulators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "accumulator", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Accumulator {
    /// First value of `field` within each group
    First {
        field: Field,
        #[serde(rename = "as")]
        as_field: Field,
    },
    /// Number of documents in each group
    Count {
        #[serde(rename = "as")]
        as_field: Field,
    },
}

impl Accumulator {
    /// Output field of the accumulator
    pub fn output(&self) -> &Field {
        match self {
            Accumulator::First { as_field, .. } | Accumulator::Count { as_field } => as_field,
        }
    }
}

/// Grouping stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub group_by: Vec<Field>,
    #[serde(default)]
    pub accumulators: Vec<Accumulator>,
}

/// Vector similarity metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Similarity {
    /// Cosine similarity
    #[serde(rename = "COS")]
    Cosine,
    /// Euclidean distance
    #[serde(rename = "L2")]
    Euclidean,
    /// Inner product
    #[serde(rename = "IP")]
    InnerProduct,
}

impl Similarity {
    /// Wire name of the metric
    pub fn as_str(&self) -> &'static str {
        match self {
            Similarity::Cosine => "COS",
            Similarity::Euclidean => "L2",
            Similarity::InnerProduct => "IP",
        }
    }
}

/// Approximate nearest neighbour search over a vector field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorSearch {
    /// Query vector
    pub vector: Vec<f64>,
    /// Field holding the indexed document vectors
    pub path: Field,
    /// Candidate pool size
    pub k: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<Similarity>,
}

/// An aggregation stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Match { query: Expr },
    Sort(Sort),
    Paginate(Paginate),
    Join(Join),
    AddFields { fields: Vec<AdditionalField> },
    Include { fields: Vec<Field> },
    Exclude { fields: Vec<Field> },
    Group(Group),
    VectorSearch(VectorSearch),
}

impl Stage {
    /// Stage kind name used in diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Match { .. } => "MATCH",
            Stage::Sort(_) => "SORT",
            Stage::Paginate(_) => "PAGINATE",
            Stage::Join(_) => "JOIN",
            Stage::AddFields { .. } => "ADD_FIELDS",
            Stage::Include { .. } => "INCLUDE",
            Stage::Exclude { .. } => "EXCLUDE",
            Stage::Group(_) => "GROUP",
            Stage::VectorSearch(_) => "VECTOR_SEARCH",
        }
    }

    /// The pagination window, if this is a Paginate stage
    pub fn as_paginate(&self) -> Option<&Paginate> {
        match self {
            Stage::Paginate(paginate) => Some(paginate),
            _ => None,
        }
    }
}

/// Ordered stages; execution order is array order
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Pipeline {
    pub stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    /// Append a stage
    pub fn push(&mut self, stage: Stage) {
        self.stages.push(stage);
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// True if the pipeline contains a Paginate stage anywhere
    pub fn has_paginate(&self) -> bool {
        self.stages
            .iter()
            .any(|stage| stage.as_paginate().is_some())
    }

    /// The terminal pagination window, if the last stage paginates
    pub fn terminal_paginate(&self) -> Option<&Paginate> {
        self.stages.last().and_then(Stage::as_paginate)
    }

    /// Returns the pipeline with `Paginate(0, limit)` appended when it has none
    pub fn with_default_pagination(mut self, limit: u64) -> Self {
        if !self.has_paginate() {
            self.stages
                .push(Stage::Paginate(Paginate { skip: 0, limit }));
        }
        self
    }
}
