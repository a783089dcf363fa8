//! High-level operations.
//!
//! This module contains the orchestration engine and the implementation of
//! qpc commands.

pub mod errors;
pub mod master;
pub mod qpc_clean;
pub mod qpc_generate;
pub mod qpc_status;
pub mod resolver;

pub use errors::GenerateError;
pub use master::{MasterFileCoordinator, MasterOutcome, MasterResult};
pub use qpc_clean::clean;
pub use qpc_generate::{generate, GenerateOptions, GenerateSummary, ProjectReport, DEFAULT_HASH_DIR};
pub use qpc_status::{status, MasterStatus, ProjectStatus, StatusReport};
pub use resolver::{ProjectOutcome, ProjectResolver, ResolveMode};
