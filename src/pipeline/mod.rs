//! # Pipeline Stage Builder
//!
//! Ordered aggregation stages referencing the expression tree.
//!
//! # Invariants
//!
//! - Execution order is array order
//! - `Paginate` is terminal; no stage may follow it
//! - An `AddFields` query is scoped to elements of its `query_source`
//!   array. This is a convention, not a structural check: only wrong
//!   rendered output reveals a tree that names root fields.

mod builder;
mod stage;
mod validate;

pub use builder::{
    add_fields, additional_field, count, exclude, first, group, include, join, match_stage,
    paginate, pipeline, sort, vector_search, JoinForeign, JoinOnto,
};
pub use stage::{
    Accumulator, AdditionalField, Group, Join, Paginate, Pipeline, Similarity, Stage,
    VectorSearch,
};
