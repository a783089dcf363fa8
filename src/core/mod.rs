//! Core data structures for qpc.
//!
//! - Canonical platforms and alias resolution
//! - Project definitions, parser output and run-wide build info
//! - The project dependency graph

pub mod dep_graph;
pub mod platform;
pub mod project;

pub use dep_graph::DependencyGraph;
pub use platform::{CanonicalPlatform, PlatformError, PlatformMap, PlatformRegistry};
pub use project::{
    BuildInfo, ParsedProject, PathContext, ProjectDefinition, ProjectGroup, ProjectKind,
    TrackedGlobs,
};
