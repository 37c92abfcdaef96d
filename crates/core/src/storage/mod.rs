//! Storage backend abstraction.
//!
//! [`TableStore`] is the seam between the connector and a concrete table store.
//! [`memory::InMemoryStore`] lives here so every crate can test against it; the
//! hosted backend lives in the server crate.

mod error;
mod http_mapping;
pub mod memory;
mod traits;
mod types;
pub mod validation;

pub use error::{entity_id, RepositoryError, Result};
pub use http_mapping::repository_error_to_status_code;
pub use memory::InMemoryStore;
pub use traits::TableStore;
pub use types::{ContinuationToken, QueryFilter, QuerySegment};
pub use validation::MAX_BATCH_SIZE;
