//! Command implementations

pub mod clean;
pub mod completions;
pub mod generate;
pub mod generators;
pub mod status;

use std::path::PathBuf;

use anyhow::Result;

use crate::cli::ProjectArgs;
use qpc::generator::GeneratorRegistry;
use qpc::ops::{GenerateOptions, DEFAULT_HASH_DIR};
use qpc::parser::DEFAULT_BASE_FILE;
use qpc::util::config::{global_config_path, load_config, project_config_path};

/// Build run options from CLI flags and config files (CLI > project > global).
///
/// Also returns the generator registry restricted to the enabled generators.
pub fn resolve_options(args: ProjectArgs) -> Result<(GenerateOptions, GeneratorRegistry)> {
    let global = global_config_path();
    let config = load_config(global.as_deref(), &project_config_path(&args.root_dir));

    let platforms = if args.platforms.is_empty() {
        config.generate.platforms
    } else {
        args.platforms
    };
    let enabled = if args.generators.is_empty() {
        config.generate.generators
    } else {
        args.generators
    };

    let mut registry = GeneratorRegistry::new();
    registry.retain_enabled(&enabled)?;

    let opts = GenerateOptions {
        root: args.root_dir,
        platforms,
        platform_aliases: config.platforms,
        base_file: args
            .base_file
            .or(config.generate.base_file)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BASE_FILE)),
        master_file: args.master_file.or(config.generate.master_file),
        hash_dir: config
            .generate
            .hash_dir
            .unwrap_or_else(|| PathBuf::from(DEFAULT_HASH_DIR)),
        jobs: config.generate.jobs,
        ..Default::default()
    };

    Ok((opts, registry))
}
