//! Persisted incremental state.

pub mod hash_store;

pub use hash_store::{HashStore, MasterHashRecord, ProjectHashRecord, Staleness};
