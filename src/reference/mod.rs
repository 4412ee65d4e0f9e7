//! Reference data module
//!
//! Loads and serves the read-only nutrition reference tables.

pub mod loader;
pub mod store;

pub use loader::{load_store, ReferenceSource};
pub use store::{
    LookupPolicy, ReferenceEntry, ReferenceError, ReferenceResult, ReferenceStore,
    DEFAULT_ENTRY_KEY,
};
