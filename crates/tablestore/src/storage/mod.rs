//! Storage backend implementations.
//!
//! The in-memory store from `tablestore_core::storage` is always available. The
//! Azure Table Storage backend is compiled with the `azure` feature (on by default).
//!
//! Build without the Azure backend:
//! ```bash
//! cargo build -p tablestore --no-default-features
//! ```

#[cfg(feature = "azure")]
pub mod azure;

pub use tablestore_core::storage::InMemoryStore;

#[cfg(feature = "azure")]
pub use azure::AzureTableStore;
