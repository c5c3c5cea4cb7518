//! Pipeline stage builders

use crate::query::{Expr, Field, Sort, SortedField};

use super::stage::{
    Accumulator, AdditionalField, Group, Join, Paginate, Pipeline, Similarity, Stage,
    VectorSearch,
};

/// Assemble a pipeline; stages run in argument order
pub fn pipeline(stages: impl IntoIterator<Item = Stage>) -> Pipeline {
    Pipeline::new(stages.into_iter().collect())
}

/// Filter stage
pub fn match_stage(query: impl Into<Expr>) -> Stage {
    Stage::Match {
        query: query.into(),
    }
}

/// Sort stage; key precedence follows argument order
pub fn sort(fields: impl IntoIterator<Item = SortedField>) -> Stage {
    Stage::Sort(Sort {
        fields: fields.into_iter().collect(),
    })
}

/// Terminal skip / limit stage
pub fn paginate(skip: u64, limit: u64) -> Stage {
    Stage::Paginate(Paginate { skip, limit })
}

/// Start a join against the collection named by `foreign`'s source.
///
/// `join(&foreign).onto(&local).as_field(&alias)` fixes the argument order
/// so foreign, local and alias fields cannot be swapped by position.
pub fn join(foreign: &Field) -> JoinForeign {
    JoinForeign {
        foreign: foreign.clone(),
    }
}

/// Join builder holding the foreign field
#[must_use]
pub struct JoinForeign {
    foreign: Field,
}

impl JoinForeign {
    /// The local field matched against the foreign field
    pub fn onto(self, local: &Field) -> JoinOnto {
        JoinOnto {
            foreign: self.foreign,
            local: local.clone(),
        }
    }
}

/// Join builder holding the foreign and local fields
#[must_use]
pub struct JoinOnto {
    foreign: Field,
    local: Field,
}

impl JoinOnto {
    /// Name the output array field and finish the stage
    pub fn as_field(self, alias: &Field) -> Stage {
        Stage::Join(Join {
            local: self.local,
            foreign: self.foreign,
            alias: alias.clone(),
        })
    }
}

/// Describe one computed array field.
///
/// `query` is evaluated against each element of `query_source`; its leaf
/// fields name element properties, never root document properties.
pub fn additional_field(
    field_to_add: &Field,
    query_source: &Field,
    query: impl Into<Expr>,
) -> AdditionalField {
    AdditionalField {
        field_to_add: field_to_add.clone(),
        query_source: query_source.clone(),
        query: query.into(),
    }
}

/// Computed-field stage
pub fn add_fields(fields: impl IntoIterator<Item = AdditionalField>) -> Stage {
    Stage::AddFields {
        fields: fields.into_iter().collect(),
    }
}

/// Projection keeping only `fields`
pub fn include(fields: impl IntoIterator<Item = Field>) -> Stage {
    Stage::Include {
        fields: fields.into_iter().collect(),
    }
}

/// Projection dropping `fields`
pub fn exclude(fields: impl IntoIterator<Item = Field>) -> Stage {
    Stage::Exclude {
        fields: fields.into_iter().collect(),
    }
}

/// Grouping stage
pub fn group(
    group_by: impl IntoIterator<Item = Field>,
    accumulators: impl IntoIterator<Item = Accumulator>,
) -> Stage {
    Stage::Group(Group {
        group_by: group_by.into_iter().collect(),
        accumulators: accumulators.into_iter().collect(),
    })
}

/// First value of `field` per group, stored as `as_field`
pub fn first(field: &Field, as_field: &Field) -> Accumulator {
    Accumulator::First {
        field: field.unqualified(),
        as_field: as_field.unqualified(),
    }
}

/// Group size, stored as `as_field`
pub fn count(as_field: &Field) -> Accumulator {
    Accumulator::Count {
        as_field: as_field.unqualified(),
    }
}

/// Nearest-neighbour search over `path`
pub fn vector_search(
    vector: Vec<f64>,
    path: &Field,
    k: u32,
    similarity: Option<Similarity>,
) -> Stage {
    Stage::VectorSearch(VectorSearch {
        vector,
        path: path.unqualified(),
        k,
        similarity,
    })
}
