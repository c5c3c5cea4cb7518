//! Sort specifications

use serde::{Deserialize, Serialize};

use super::field::Field;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    /// Native direction value (`1` ascending, `-1` descending)
    pub fn as_native(&self) -> i32 {
        match self {
            SortDirection::Ascending => 1,
            SortDirection::Descending => -1,
        }
    }
}

/// A field paired with its direction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortedField {
    pub field: Field,
    pub direction: SortDirection,
}

/// Ordered sort keys; the first entry has the highest precedence
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Sort {
    pub fields: Vec<SortedField>,
}

impl Sort {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Sort ascending on `field`
pub fn ascending(field: &Field) -> SortedField {
    SortedField {
        field: field.unqualified(),
        direction: SortDirection::Ascending,
    }
}

/// Sort descending on `field`
pub fn descending(field: &Field) -> SortedField {
    SortedField {
        field: field.unqualified(),
        direction: SortDirection::Descending,
    }
}

/// Build a sort spec, preserving the caller's key order
pub fn order_by(fields: impl IntoIterator<Item = SortedField>) -> Sort {
    Sort {
        fields: fields.into_iter().collect(),
    }
}
