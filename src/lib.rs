//! qpc - an incremental build project generator
//!
//! This crate reads declarative project descriptions and writes native build
//! files (makefiles, Visual Studio projects and solutions) for several
//! platforms, regenerating only what changed since the last run.

pub mod core;
pub mod generator;
pub mod ops;
pub mod parser;
pub mod store;
pub mod util;

pub use core::{
    BuildInfo, CanonicalPlatform, DependencyGraph, ParsedProject, PathContext, PlatformMap,
    PlatformRegistry, ProjectDefinition,
};
pub use generator::{Generator, GeneratorRegistry};
pub use ops::{generate, GenerateError, GenerateOptions, GenerateSummary};
pub use parser::{ProjectParser, TomlParser};
pub use store::HashStore;
