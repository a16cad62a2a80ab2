//! Sled-backed document storage for student records.
//!
//! The store exposes the fixed primitive surface the query engine
//! consumes: point and projected lookups, existence checks, insert and
//! per-document compare-and-swap mutation, delete, and filtered scans.

mod config;
mod doc;
mod store;

pub use config::StorageConfig;
pub use doc::StudentDoc;
pub use store::StudentStore;
