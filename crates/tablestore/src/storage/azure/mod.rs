//! Azure Table Storage backend.
//!
//! Talks to the Table service REST API (or a compatible emulator such as Azurite)
//! with `reqwest`, signing each request with Shared Key Lite.

mod auth;
mod batch;
mod error;
mod request;
mod store;

pub use store::AzureTableStore;
