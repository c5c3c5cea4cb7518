//! Field references
//!
//! A `Field` is a document property name, optionally tagged with the
//! collection (or alias) it originates from so fields can be told apart
//! across a join. Field names are checked against a document shape at
//! compile time through the `FieldName` trait; a runtime `Field` is just
//! the name plus the optional source tag.

use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

/// Name of the primary identifier field of every document
pub const ID_FIELD: &str = "_id";

/// A named property of a declared document shape.
///
/// Implemented by the field enums generated with [`document_fields!`],
/// so only names that exist on the shape can be turned into fields.
///
/// [`document_fields!`]: crate::document_fields
pub trait FieldName: Copy {
    /// The property name as stored in the database
    fn name(self) -> &'static str;
}

/// Declares the field set of a document shape.
///
/// ```
/// pipequery::document_fields! {
///     /// Fields of a docket entry
///     pub enum DocketField {
///         CaseId => "caseId",
///         DateFiled => "dateFiled",
///     }
/// }
///
/// use pipequery::query::FieldName;
/// assert_eq!(DocketField::DateFiled.name(), "dateFiled");
/// assert_eq!(DocketField::ALL.len(), 2);
/// ```
#[macro_export]
macro_rules! document_fields {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($variant:ident => $field:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($variant),+
        }

        impl $crate::query::FieldName for $name {
            fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $field),+
                }
            }
        }

        impl $name {
            /// Every field of the shape, in declaration order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];
        }
    };
}

/// A reference to a document property
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    /// Property name (dotted paths are allowed)
    pub name: String,

    /// Originating collection or alias, set for fields flowing through a join
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Field {
    /// Create an unqualified field
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: None,
        }
    }

    /// Create a field tagged with its originating collection
    pub fn sourced(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: Some(source.into()),
        }
    }

    /// The property name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The originating collection, if tagged
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// The same field without its source tag
    pub fn unqualified(&self) -> Self {
        Self::new(self.name.clone())
    }

    /// Aggregation path expression (`$name`)
    pub fn path(&self) -> String {
        format!("${}", self.name)
    }

    /// True if this is the primary identifier field
    pub fn is_id(&self) -> bool {
        self.name == ID_FIELD
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}.{}", source, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Field factory bound to a document shape.
///
/// `using::<F>().field(..)` yields unqualified fields whose condition
/// methods build the expression tree.
pub struct Using<F> {
    _shape: PhantomData<fn() -> F>,
}

/// Bind a field factory to the shape described by `F`
pub fn using<F: FieldName>() -> Using<F> {
    Using {
        _shape: PhantomData,
    }
}

impl<F: FieldName> Using<F> {
    /// A single field of the shape
    pub fn field(&self, name: F) -> Field {
        Field::new(name.name())
    }

    /// Several fields at once, in argument order
    pub fn fields<const N: usize>(&self, names: [F; N]) -> [Field; N] {
        names.map(|name| Field::new(name.name()))
    }
}

/// Field factory tagging every field with an originating collection.
///
/// Used to disambiguate fields across a join. With no source name the
/// fields are unqualified, exactly like [`using`].
pub struct Source<F> {
    name: Option<String>,
    _shape: PhantomData<fn() -> F>,
}

/// Field factory for the collection `name`
pub fn source<F: FieldName>(name: impl Into<String>) -> Source<F> {
    Source {
        name: Some(name.into()),
        _shape: PhantomData,
    }
}

/// Field factory for intermediate document shapes that have no collection
pub fn unsourced<F: FieldName>() -> Source<F> {
    Source {
        name: None,
        _shape: PhantomData,
    }
}

impl<F: FieldName> Source<F> {
    /// The source name, if any
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// A single source-tagged field
    pub fn field(&self, name: F) -> Field {
        Field {
            name: name.name().to_string(),
            source: self.name.clone(),
        }
    }

    /// Several source-tagged fields, in argument order
    pub fn fields<const N: usize>(&self, names: [F; N]) -> [Field; N] {
        names.map(|name| self.field(name))
    }
}
