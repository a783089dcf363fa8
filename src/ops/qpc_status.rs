//! Implementation of `qpc status`.
//!
//! Reports what `qpc generate` would do without writing anything.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::core::project::PathContext;
use crate::generator::GeneratorRegistry;
use crate::ops::errors::GenerateError;
use crate::ops::qpc_generate::GenerateOptions;
use crate::ops::resolver::{ProjectResolver, ResolveMode};
use crate::parser::ProjectParser;
use crate::store::{HashStore, Staleness};

/// Staleness of one project script.
#[derive(Debug, Clone)]
pub struct ProjectStatus {
    pub project: String,
    pub script: PathBuf,

    /// Applicable generators with no output for this script
    pub missing_outputs: Vec<String>,

    pub staleness: Staleness,
}

impl ProjectStatus {
    pub fn is_current(&self) -> bool {
        self.missing_outputs.is_empty() && self.staleness.is_current()
    }
}

/// Staleness of one master file.
#[derive(Debug, Clone)]
pub struct MasterStatus {
    pub generator: String,
    pub path: PathBuf,
    pub current: bool,
}

#[derive(Debug, Clone, Default)]
pub struct StatusReport {
    pub projects: Vec<ProjectStatus>,
    pub masters: Vec<MasterStatus>,
}

impl StatusReport {
    pub fn stale_count(&self) -> usize {
        self.projects.iter().filter(|p| !p.is_current()).count()
            + self.masters.iter().filter(|m| !m.current).count()
    }
}

/// Compute the staleness of every project and master file.
pub fn status(
    opts: &GenerateOptions,
    registry: &GeneratorRegistry,
    parser: &dyn ProjectParser,
) -> Result<StatusReport> {
    let platform_registry = opts.platform_registry();
    let platforms = platform_registry
        .resolve(&opts.requested_platforms())
        .map_err(GenerateError::from)?;

    let root = opts
        .root
        .canonicalize()
        .with_context(|| format!("root directory does not exist: {}", opts.root.display()))?;
    let ctx = PathContext::new(&root);
    let store = HashStore::read_only(&root, root.join(&opts.hash_dir));

    let info = parser.parse_base_info(&ctx, &opts.base_file, &platform_registry, &platforms)?;
    let generators = registry.select_for(&info.platforms);
    let resolver = ProjectResolver::new(
        &ctx,
        &store,
        &info,
        parser,
        &generators,
        &platforms,
        ResolveMode::default(),
    );

    let mut report = StatusReport::default();
    let mut seen = std::collections::BTreeSet::new();
    for (def, script) in info.scripts() {
        if !seen.insert(script) {
            continue;
        }
        let staleness = store.check_project(script);
        report.projects.push(ProjectStatus {
            project: def.name.clone(),
            script: script.to_path_buf(),
            missing_outputs: resolver
                .missing_outputs(def, script)
                .into_iter()
                .map(str::to_string)
                .collect(),
            staleness,
        });
    }

    if let Some(name) = opts.master_file.as_deref() {
        for generator in generators.iter().filter(|g| g.generates_master_file()) {
            let Some(path) = generator.master_file_path(name) else {
                continue;
            };
            let current = ctx.absolute(&path).is_file()
                && store.is_master_current(&path, &info, generator.uses_folders());
            report.masters.push(MasterStatus {
                generator: generator.id().to_string(),
                path,
                current,
            });
        }
    }

    Ok(report)
}
