//! # Case Repository
//!
//! Repositories compose pipelines from domain predicates and run them
//! through collection adapters. They share one database client through
//! [`ClientHandle`] leases.
//!
//! | Module | Concern |
//! |--------|---------|
//! | `client` | Client lease and close-once lifecycle |
//! | `embedding` | Query vector collaborator |
//! | `predicate` | Case search predicate |
//! | `model` | Case documents and field sets |
//! | `search` | Pure search pipeline composition |
//! | `cases` | The cases repository |

mod cases;
mod client;
mod embedding;
mod model;
mod predicate;
mod search;

pub use cases::CasesRepository;
pub use client::ClientHandle;
pub use embedding::{Embedder, EmbeddingError, EmbeddingResult};
pub use model::{
    AssignmentField, AssignmentScratchField, CaseEvent, CaseEventField, SyncedCase,
    SyncedCaseField, AUDIT_PREFIX, CONSOLIDATION_PREFIX, CONSOLIDATION_TO, SYNCED_CASE,
    TRANSFER_PREFIX,
};
pub use predicate::{CasesSearchPredicate, UserReference};
pub use search::{
    build_search_pipeline, build_unassigned_pipeline, search_conditions, vector_candidates,
};
