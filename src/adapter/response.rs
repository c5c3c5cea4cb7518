//! Paginated response shape

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{QueryError, QueryResult};

/// Count of the full matched set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMetadata {
    pub total: u64,
}

/// One page of results.
///
/// `metadata` is absent when the engine's pagination carries no count
/// branch (the base renderer) or when nothing matched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginationResponse<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<PageMetadata>,
    pub data: Vec<T>,
}

impl<T> PaginationResponse<T> {
    pub fn new(data: Vec<T>, metadata: Option<PageMetadata>) -> Self {
        Self { metadata, data }
    }

    pub fn empty() -> Self {
        Self {
            metadata: None,
            data: Vec::new(),
        }
    }

    /// Convert every item
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PaginationResponse<U> {
        PaginationResponse {
            metadata: self.metadata,
            data: self.data.into_iter().map(f).collect(),
        }
    }
}

/// Split the single facet document into its `data` and `metadata` branches
pub(crate) fn split_facet(
    mut results: Vec<Value>,
) -> QueryResult<(Vec<Value>, Option<PageMetadata>)> {
    let facet = match results.len() {
        0 => return Ok((Vec::new(), None)),
        1 => results.remove(0),
        n => {
            return Err(QueryError::malformed(format!(
                "expected a single facet document, got {}",
                n
            )))
        }
    };

    let data = match facet.get("data") {
        Some(Value::Array(items)) => items.clone(),
        None => Vec::new(),
        Some(other) => {
            return Err(QueryError::malformed(format!(
                "facet data branch is not an array: {}",
                other
            )))
        }
    };

    let metadata = facet
        .get("metadata")
        .and_then(Value::as_array)
        .and_then(|counts| counts.first())
        .and_then(|count| count.get("total"))
        .and_then(Value::as_u64)
        .map(|total| PageMetadata { total });

    Ok((data, metadata))
}
