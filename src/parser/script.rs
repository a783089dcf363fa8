//! Project script parsing.
//!
//! ```toml
//! [project]
//! name = "tier0"
//! kind = "static_library"
//! out_dir = "../build/tier0"
//! dependencies = ["../tier1/tier1.qpc"]
//! include_dirs = ["include"]
//! defines = ["TIER0_DLL"]
//! includes = ["../common.toml"]
//!
//! [files]
//! sources = ["src/*.cpp", "main.cpp"]
//! headers = ["include/**/*.h"]
//! ```
//!
//! Every path is relative to the file it appears in. Included fragments
//! may add `defines`, `include_dirs` and `[files]`; they are tracked inputs
//! of the project.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::platform::PlatformMap;
use crate::core::project::{
    script_stem, ParsedProject, PathContext, ProjectDefinition, ProjectKind, TrackedGlobs,
};
use crate::generator::Generator;
use crate::util::fs::{glob_files, is_glob_pattern, read_to_string, slash_path};
use crate::util::hash::sha256_str;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScriptFile {
    project: ScriptProject,
    #[serde(default)]
    files: ScriptFiles,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScriptProject {
    name: Option<String>,
    #[serde(default)]
    kind: ProjectKind,
    out_dir: Option<PathBuf>,
    #[serde(default)]
    platforms: Vec<String>,
    #[serde(default)]
    dependencies: Vec<PathBuf>,
    #[serde(default)]
    include_dirs: Vec<PathBuf>,
    #[serde(default)]
    defines: Vec<String>,
    #[serde(default)]
    includes: Vec<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScriptFiles {
    #[serde(default)]
    sources: Vec<String>,
    #[serde(default)]
    headers: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Fragment {
    #[serde(default)]
    include_dirs: Vec<PathBuf>,
    #[serde(default)]
    defines: Vec<String>,
    #[serde(default)]
    files: ScriptFiles,
}

/// Accumulates file lists and tracked inputs while reading a script.
#[derive(Default)]
struct Collector {
    sources: Vec<PathBuf>,
    headers: Vec<PathBuf>,
    include_dirs: Vec<PathBuf>,
    defines: Vec<String>,
    hashes: BTreeMap<PathBuf, String>,
    globs: TrackedGlobs,
}

impl Collector {
    /// Read a tracked input file and remember its hash.
    fn read_tracked(&mut self, ctx: &PathContext, path: &Path) -> Result<String> {
        let content = read_to_string(&ctx.absolute(path))?;
        self.hashes.insert(path.to_path_buf(), sha256_str(&content));
        Ok(content)
    }

    fn add_files(&mut self, ctx: &PathContext, entries: &[String], headers: bool) -> Result<()> {
        for entry in entries {
            let files = if is_glob_pattern(entry) {
                let pattern = slash_path(&ctx.resolve(entry));
                let matched = glob_files(ctx.root(), std::slice::from_ref(&pattern))?;
                if matched.is_empty() {
                    tracing::debug!("glob `{}` matched no files", pattern);
                }
                self.globs.patterns.push(pattern);
                self.globs.files.extend(matched.iter().cloned());
                matched
            } else {
                let path = ctx.resolve(entry);
                if !ctx.absolute(&path).is_file() {
                    tracing::warn!("file does not exist: {}", path.display());
                }
                vec![path]
            };

            let list = if headers {
                &mut self.headers
            } else {
                &mut self.sources
            };
            for file in files {
                if !list.contains(&file) {
                    list.push(file);
                }
            }
        }
        Ok(())
    }

    fn add_settings(&mut self, ctx: &PathContext, include_dirs: &[PathBuf], defines: &[String]) {
        for dir in include_dirs {
            let dir = ctx.resolve(dir);
            if !self.include_dirs.contains(&dir) {
                self.include_dirs.push(dir);
            }
        }
        for define in defines {
            if !self.defines.contains(define) {
                self.defines.push(define.clone());
            }
        }
    }
}

/// Parse the script at `script` (root-relative). `ctx` is scoped to its directory.
pub fn parse_project(
    ctx: &PathContext,
    def: &ProjectDefinition,
    script: &Path,
    generators: &[&dyn Generator],
    platforms: &PlatformMap,
) -> Result<Option<ParsedProject>> {
    let mut collector = Collector::default();
    let content = collector.read_tracked(ctx, script)?;
    let parsed: ScriptFile = toml::from_str(&content)
        .with_context(|| format!("failed to parse project script: {}", script.display()))?;
    let project = parsed.project;

    let targets: Vec<_> = def
        .platforms
        .iter()
        .filter(|p| {
            project.platforms.is_empty()
                || project
                    .platforms
                    .iter()
                    .any(|t| p.accepts(t) || p.name() == t)
        })
        .cloned()
        .collect();
    if targets.is_empty() {
        tracing::debug!("{}: no target platform left, nothing to generate", script.display());
        return Ok(None);
    }
    if !generators.iter().any(|g| g.supports_any(&targets)) {
        tracing::debug!("{}: no generator for its platforms", script.display());
        return Ok(None);
    }

    collector.add_settings(ctx, &project.include_dirs, &project.defines);
    collector.add_files(ctx, &parsed.files.sources, false)?;
    collector.add_files(ctx, &parsed.files.headers, true)?;

    for include in &project.includes {
        let include = ctx.resolve(include);
        let fragment_ctx = ctx.for_script(&include);
        let content = collector.read_tracked(ctx, &include)?;
        let fragment: Fragment = toml::from_str(&content)
            .with_context(|| format!("failed to parse include: {}", include.display()))?;
        collector.add_settings(&fragment_ctx, &fragment.include_dirs, &fragment.defines);
        collector.add_files(&fragment_ctx, &fragment.files.sources, false)?;
        collector.add_files(&fragment_ctx, &fragment.files.headers, true)?;
    }

    let platform_tokens = targets
        .iter()
        .flat_map(|p| platforms.tokens(p.name()).iter().cloned())
        .collect();
    let dependencies: BTreeSet<PathBuf> =
        project.dependencies.iter().map(|d| ctx.resolve(d)).collect();
    let out_dir = ctx.resolve(project.out_dir.unwrap_or_else(|| PathBuf::from(".")));

    collector.globs.files.sort();
    collector.globs.files.dedup();

    Ok(Some(ParsedProject {
        name: project.name.unwrap_or_else(|| script_stem(script)),
        kind: project.kind,
        script: script.to_path_buf(),
        out_dir,
        platforms: targets,
        platform_tokens,
        sources: collector.sources,
        headers: collector.headers,
        include_dirs: collector.include_dirs,
        defines: collector.defines,
        dependencies,
        hashes: collector.hashes,
        globs: collector.globs,
    }))
}
