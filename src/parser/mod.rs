//! Project description parsing.
//!
//! The orchestration engine only depends on [`ProjectParser`]. The default
//! implementation, [`TomlParser`], reads a TOML base file listing project
//! definitions and one TOML script per project.

pub mod base;
pub mod script;

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;

use crate::core::platform::{PlatformMap, PlatformRegistry};
use crate::core::project::{BuildInfo, ParsedProject, PathContext, ProjectDefinition};
use crate::generator::Generator;

/// Default base file name, relative to the root directory.
pub const DEFAULT_BASE_FILE: &str = "_qpc_base.toml";

/// Turns project descriptions into in-memory definitions.
pub trait ProjectParser: Send + Sync {
    /// Read the base file listing every project definition.
    fn parse_base_info(
        &self,
        ctx: &PathContext,
        base_file: &Path,
        registry: &PlatformRegistry,
        platforms: &PlatformMap,
    ) -> Result<BuildInfo>;

    /// Parse one project script.
    ///
    /// `ctx` is scoped to the script's directory. `Ok(None)` means there is
    /// nothing to generate for this script; it is not an error.
    fn parse_project(
        &self,
        ctx: &PathContext,
        def: &ProjectDefinition,
        script: &Path,
        info: &BuildInfo,
        generators: &[&dyn Generator],
        platforms: &PlatformMap,
    ) -> Result<Option<ParsedProject>>;

    /// Number of project scripts parsed so far.
    fn parse_count(&self) -> usize {
        0
    }
}

/// TOML project description parser.
#[derive(Debug, Default)]
pub struct TomlParser {
    count: AtomicUsize,
}

impl TomlParser {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProjectParser for TomlParser {
    fn parse_base_info(
        &self,
        ctx: &PathContext,
        base_file: &Path,
        registry: &PlatformRegistry,
        platforms: &PlatformMap,
    ) -> Result<BuildInfo> {
        base::parse_base_info(ctx, base_file, registry, platforms)
    }

    fn parse_project(
        &self,
        ctx: &PathContext,
        def: &ProjectDefinition,
        script: &Path,
        _info: &BuildInfo,
        generators: &[&dyn Generator],
        platforms: &PlatformMap,
    ) -> Result<Option<ParsedProject>> {
        self.count.fetch_add(1, Ordering::Relaxed);
        script::parse_project(ctx, def, script, generators, platforms)
    }

    fn parse_count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }
}
