//! # Expression Builder
//!
//! Builds the engine-independent boolean expression tree over named fields
//! of a declared document shape.
//!
//! ```
//! use pipequery::query::{and, using, Expr};
//!
//! pipequery::document_fields! {
//!     enum CaseField {
//!         Chapter => "chapter",
//!         ClosedDate => "closedDate",
//!     }
//! }
//!
//! let doc = using::<CaseField>();
//! let tree = and([
//!     doc.field(CaseField::Chapter).equals("7"),
//!     doc.field(CaseField::ClosedDate).not_exists(),
//! ]);
//! assert_eq!(tree.values.len(), 2);
//! let _: Expr = tree.into();
//! ```

mod condition;
mod field;
mod sort;
mod validate;

pub use condition::{
    and, not, or, Condition, ConditionKind, Conjunction, ConjunctionKind, Expr, Operand,
};
pub use field::{source, unsourced, using, Field, FieldName, Source, Using, ID_FIELD};
pub use sort::{ascending, descending, order_by, Sort, SortDirection, SortedField};
