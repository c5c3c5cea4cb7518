//! # Collection Adapters
//!
//! Execute rendered filters and pipelines against an injected
//! [`DocumentCollection`](crate::driver::DocumentCollection) and normalize
//! the results.
//!
//! | Constructor                   | Renderer         | Default pagination |
//! |-------------------------------|------------------|--------------------|
//! | `CollectionAdapter::new`      | `BaseRenderer`   | none               |
//! | `CollectionAdapter::atlas`    | `AtlasRenderer`  | `Paginate(0, n)`   |
//! | `CollectionAdapter::cosmos`   | `CosmosRenderer` | `Paginate(0, n)`   |

mod collection;
mod response;

pub use collection::{CollectionAdapter, INTERNAL_ID, PUBLIC_ID};
pub use response::{PageMetadata, PaginationResponse};
