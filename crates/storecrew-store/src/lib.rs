//! Storecrew Store — persistent-store boundary and the mutation executor
//!
//! Backends implement `DocumentStore`. The executor is the only component
//! that calls them, and it only accepts validated requests.

pub mod catalog;
pub mod executor;
pub mod file;
pub mod memory;
pub mod query;
pub mod store;

pub use catalog::Catalog;
pub use executor::{MutationExecutor, DEFAULT_TIMEOUT, TOOL_NAME};
pub use file::JsonFileStore;
pub use memory::MemoryStore;
pub use store::{DocumentStore, StoreError, StoreResult, UpsertOutcome};
