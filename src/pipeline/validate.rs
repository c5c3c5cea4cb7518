//! Pipeline validation
//!
//! Structural checks applied by every renderer before compiling a single
//! stage, so malformed IR never reaches a driver.

use crate::error::{QueryError, QueryResult};
use crate::query::Field;

use super::stage::{Accumulator, Pipeline, Stage};

impl Pipeline {
    /// Check the pipeline's structural invariants
    pub fn validate(&self) -> QueryResult<()> {
        if self.stages.is_empty() {
            return Err(QueryError::malformed("pipeline has no stages"));
        }

        let last = self.stages.len() - 1;
        for (position, stage) in self.stages.iter().enumerate() {
            if stage.as_paginate().is_some() && position != last {
                return Err(QueryError::malformed(format!(
                    "PAGINATE must be the terminal stage (found at position {} of {})",
                    position + 1,
                    self.stages.len()
                )));
            }
            stage.validate()?;
        }

        Ok(())
    }
}

impl Stage {
    /// Check a single stage
    pub fn validate(&self) -> QueryResult<()> {
        match self {
            Stage::Match { query } => query.validate(),
            Stage::Sort(sort) => {
                if sort.is_empty() {
                    return Err(QueryError::malformed("SORT stage has no sort keys"));
                }
                sort.fields
                    .iter()
                    .try_for_each(|key| named(&key.field, "SORT"))
            }
            Stage::Paginate(paginate) => {
                if paginate.limit == 0 {
                    return Err(QueryError::malformed(
                        "PAGINATE limit must be greater than 0",
                    ));
                }
                Ok(())
            }
            Stage::Join(join) => {
                named(&join.local, "JOIN")?;
                named(&join.foreign, "JOIN")?;
                named(&join.alias, "JOIN")?;
                match join.foreign.source() {
                    Some(source) if !source.is_empty() => Ok(()),
                    _ => Err(QueryError::malformed(format!(
                        "JOIN foreign field '{}' does not name its collection",
                        join.foreign.name
                    ))),
                }
            }
            Stage::AddFields { fields } => {
                if fields.is_empty() {
                    return Err(QueryError::malformed("ADD_FIELDS stage has no fields"));
                }
                for additional in fields {
                    named(&additional.field_to_add, "ADD_FIELDS")?;
                    named(&additional.query_source, "ADD_FIELDS")?;
                    additional.query.validate()?;
                }
                Ok(())
            }
            Stage::Include { fields } | Stage::Exclude { fields } => {
                if fields.is_empty() {
                    return Err(QueryError::malformed(format!(
                        "{} stage has no fields",
                        self.name()
                    )));
                }
                fields
                    .iter()
                    .try_for_each(|field| named(field, self.name()))
            }
            Stage::Group(group) => {
                group
                    .group_by
                    .iter()
                    .try_for_each(|field| named(field, "GROUP"))?;
                for accumulator in &group.accumulators {
                    named(accumulator.output(), "GROUP")?;
                    if let Accumulator::First { field, .. } = accumulator {
                        named(field, "GROUP")?;
                    }
                }
                Ok(())
            }
            Stage::VectorSearch(search) => {
                named(&search.path, "VECTOR_SEARCH")?;
                if search.vector.is_empty() {
                    return Err(QueryError::malformed(
                        "VECTOR_SEARCH query vector is empty",
                    ));
                }
                if search.k == 0 {
                    return Err(QueryError::malformed(
                        "VECTOR_SEARCH k must be greater than 0",
                    ));
                }
                if search.vector.iter().any(|value| !value.is_finite()) {
                    return Err(QueryError::malformed(
                        "VECTOR_SEARCH query vector contains a non-finite value",
                    ));
                }
                Ok(())
            }
        }
    }
}

fn named(field: &Field, stage: &str) -> QueryResult<()> {
    if field.name.is_empty() {
        Err(QueryError::malformed(format!("{} stage references an unnamed field", stage)))
    } else {
        Ok(())
    }
}
