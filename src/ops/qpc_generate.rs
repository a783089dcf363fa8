//! Implementation of `qpc generate`.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;

use crate::core::platform::{PlatformMap, PlatformRegistry};
use crate::core::project::{script_stem, BuildInfo, PathContext, ProjectDefinition};
use crate::generator::{Generator, GeneratorRegistry};
use crate::ops::errors::GenerateError;
use crate::ops::master::{MasterFileCoordinator, MasterOutcome, MasterResult};
use crate::ops::resolver::{ProjectOutcome, ProjectResolver, ResolveMode};
use crate::parser::{ProjectParser, DEFAULT_BASE_FILE};
use crate::store::HashStore;

/// Default hash store location, relative to the root directory.
pub const DEFAULT_HASH_DIR: &str = ".qpc/hashes";

/// Options for the generate command.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Root directory; every script path is relative to it
    pub root: PathBuf,

    /// Requested platform tokens (empty = host platform)
    pub platforms: Vec<String>,

    /// Extra aliases per canonical platform name
    pub platform_aliases: BTreeMap<String, Vec<String>>,

    /// Base file, relative to the root
    pub base_file: PathBuf,

    /// Master file name (none = no master files)
    pub master_file: Option<String>,

    /// Hash store directory, relative to the root
    pub hash_dir: PathBuf,

    /// Worker threads for project scripts
    pub jobs: Option<usize>,

    pub force: bool,
    pub force_master: bool,
    pub skip_projects: bool,

    /// Show a progress bar over project scripts
    pub progress: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        GenerateOptions {
            root: PathBuf::from("."),
            platforms: Vec::new(),
            platform_aliases: BTreeMap::new(),
            base_file: PathBuf::from(DEFAULT_BASE_FILE),
            master_file: None,
            hash_dir: PathBuf::from(DEFAULT_HASH_DIR),
            jobs: None,
            force: false,
            force_master: false,
            skip_projects: false,
            progress: false,
        }
    }
}

impl GenerateOptions {
    /// Requested tokens, falling back to the host platform.
    pub fn requested_platforms(&self) -> Vec<String> {
        if self.platforms.is_empty() {
            vec![PlatformRegistry::host_alias().to_string()]
        } else {
            self.platforms.clone()
        }
    }

    pub fn platform_registry(&self) -> PlatformRegistry {
        PlatformRegistry::builtin().with_aliases(&self.platform_aliases)
    }
}

/// Outcome of one project script.
#[derive(Debug, Clone)]
pub struct ProjectReport {
    pub project: String,
    pub script: PathBuf,
    pub outcome: ProjectOutcome,
}

/// Result of a generate run.
#[derive(Debug, Clone, Default)]
pub struct GenerateSummary {
    /// One report per distinct script, in declaration order
    pub projects: Vec<ProjectReport>,

    pub masters: Vec<MasterResult>,

    /// Project scripts parsed during the run
    pub parse_count: usize,

    /// Time spent on project scripts
    pub elapsed: Duration,
}

impl GenerateSummary {
    pub fn regenerated(&self) -> usize {
        self.count(|o| matches!(o, ProjectOutcome::Regenerated))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ProjectOutcome::Skipped))
    }

    pub fn missing(&self) -> Vec<&Path> {
        self.projects
            .iter()
            .filter(|r| matches!(r.outcome, ProjectOutcome::MissingScript(_)))
            .map(|r| r.script.as_path())
            .collect()
    }

    /// Every per-project and master file failure.
    pub fn failures(&self) -> Vec<&GenerateError> {
        let projects = self.projects.iter().filter_map(|r| match &r.outcome {
            ProjectOutcome::Failed(e) => Some(e),
            _ => None,
        });
        let masters = self.masters.iter().filter_map(|m| match &m.outcome {
            MasterOutcome::Failed(e) => Some(e),
            _ => None,
        });
        projects.chain(masters).collect()
    }

    /// Check if the run should end with a non-zero exit.
    pub fn has_failures(&self) -> bool {
        !self.failures().is_empty() || !self.missing().is_empty()
    }

    fn count(&self, pred: impl Fn(&ProjectOutcome) -> bool) -> usize {
        self.projects.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// Run a generation pass over every project of the base file.
///
/// Returns `Err` only for failures that leave the run without a defined
/// scope: unknown platforms, an unusable hash store, an unreadable base
/// file. Everything else is reported per project in the summary.
pub fn generate(
    opts: &GenerateOptions,
    registry: &GeneratorRegistry,
    parser: &dyn ProjectParser,
) -> Result<GenerateSummary> {
    let platform_registry = opts.platform_registry();
    let platforms = platform_registry
        .resolve(&opts.requested_platforms())
        .map_err(GenerateError::from)?;

    let root = opts
        .root
        .canonicalize()
        .with_context(|| format!("root directory does not exist: {}", opts.root.display()))?;
    let ctx = PathContext::new(&root);
    let store = HashStore::open(&root, root.join(&opts.hash_dir))
        .context("failed to create hash store directory")?;

    let info = parser.parse_base_info(&ctx, &opts.base_file, &platform_registry, &platforms)?;
    let generators = registry.select_for(&info.platforms);
    if generators.is_empty() {
        tracing::warn!(
            "no generator supports the requested platforms ({})",
            platforms
                .platforms()
                .map(|p| p.name())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    let tasks = unique_scripts(&info);
    let start = Instant::now();
    let projects = run_projects(
        opts,
        &ctx,
        &store,
        &info,
        parser,
        &generators,
        &platforms,
        &tasks,
    )?;
    let elapsed = start.elapsed();

    let masters = match opts.master_file.as_deref() {
        Some(name) if !name.is_empty() => {
            MasterFileCoordinator::new(&ctx, &store, &info, &platforms, opts.force_master)
                .run(&generators, name)
        }
        _ => Vec::new(),
    };

    Ok(GenerateSummary {
        projects,
        masters,
        parse_count: parser.parse_count(),
        elapsed,
    })
}

/// Every distinct script in declaration order. The first definition listing
/// a script owns it.
fn unique_scripts(info: &BuildInfo) -> Vec<(&ProjectDefinition, &Path)> {
    let mut seen = BTreeSet::new();
    info.scripts()
        .filter(|(def, script)| {
            let first = seen.insert(script.to_path_buf());
            if !first {
                tracing::debug!(
                    "{} is listed again by `{}`, ignoring",
                    script.display(),
                    def.name
                );
            }
            first
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn run_projects(
    opts: &GenerateOptions,
    ctx: &PathContext,
    store: &HashStore,
    info: &BuildInfo,
    parser: &dyn ProjectParser,
    generators: &[&dyn Generator],
    platforms: &PlatformMap,
    tasks: &[(&ProjectDefinition, &Path)],
) -> Result<Vec<ProjectReport>> {
    let mode = ResolveMode {
        force: opts.force,
        skip_projects: opts.skip_projects,
    };
    let resolver = ProjectResolver::new(ctx, store, info, parser, generators, platforms, mode);
    let progress = if opts.progress && tasks.len() > 1 {
        Some(progress_bar(tasks.len() as u64))
    } else {
        None
    };

    let resolve_one = |(def, script): &(&ProjectDefinition, &Path)| {
        if let Some(pb) = &progress {
            pb.set_message(script.display().to_string());
        }
        let outcome = resolver.resolve(def, script);
        if let Some(pb) = &progress {
            pb.inc(1);
        }
        ProjectReport {
            project: def.name.clone(),
            script: script.to_path_buf(),
            outcome,
        }
    };

    let reports: Vec<ProjectReport> = match opts.jobs {
        Some(jobs) if jobs > 1 => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(jobs)
                .build()
                .context("failed to start worker pool")?;
            let lanes = output_lanes(tasks);
            let resolve_one = &resolve_one;
            let mut indexed: Vec<(usize, ProjectReport)> = pool.install(|| {
                lanes
                    .par_iter()
                    .flat_map_iter(move |lane| {
                        lane.iter().map(move |&i| (i, resolve_one(&tasks[i])))
                    })
                    .collect()
            });
            indexed.sort_by_key(|(i, _)| *i);
            indexed.into_iter().map(|(_, report)| report).collect()
        }
        _ => tasks.iter().map(&resolve_one).collect(),
    };

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }
    Ok(reports)
}

/// Split tasks into lanes that may run concurrently.
///
/// Generators name their outputs after the script stem and the output
/// directory is only known after parsing, so scripts sharing a stem could
/// write the same files. They share a lane and run one after another, in
/// declaration order.
fn output_lanes(tasks: &[(&ProjectDefinition, &Path)]) -> Vec<Vec<usize>> {
    let mut lanes: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (i, (_, script)) in tasks.iter().enumerate() {
        lanes.entry(script_stem(script)).or_default().push(i);
    }
    for (stem, lane) in &lanes {
        if lane.len() > 1 {
            tracing::debug!("{} scripts named `{}` run sequentially", lane.len(), stem);
        }
    }
    lanes.into_values().collect()
}

fn progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    if let Ok(style) =
        ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::TomlParser;
    use std::fs;
    use tempfile::TempDir;

    fn workspace() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("a")).unwrap();
        fs::create_dir_all(root.join("b")).unwrap();
        fs::write(
            root.join(DEFAULT_BASE_FILE),
            "[[project]]\nname = \"a\"\nscripts = [\"a/a.qpc\", \"b/b.qpc\"]\n\n\
             [[project]]\nname = \"again\"\nscripts = [\"a/a.qpc\"]\n",
        )
        .unwrap();
        fs::write(
            root.join("a/a.qpc"),
            "[project]\ndependencies = [\"../b/b.qpc\"]\n",
        )
        .unwrap();
        fs::write(root.join("b/b.qpc"), "[project]\nkind = \"static_library\"\n").unwrap();
        tmp
    }

    fn options(root: &Path) -> GenerateOptions {
        GenerateOptions {
            root: root.to_path_buf(),
            platforms: vec!["linux64".to_string()],
            master_file: Some("all".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_generate_then_nothing_to_do() {
        let tmp = workspace();
        let registry = GeneratorRegistry::new();

        let summary = generate(&options(tmp.path()), &registry, &TomlParser::new()).unwrap();
        assert_eq!(summary.projects.len(), 2);
        assert_eq!(summary.regenerated(), 2);
        assert_eq!(summary.parse_count, 2);
        assert!(!summary.has_failures());
        assert!(matches!(summary.masters[0].outcome, MasterOutcome::Regenerated));
        assert!(tmp.path().join("all.mk").is_file());

        let summary = generate(&options(tmp.path()), &registry, &TomlParser::new()).unwrap();
        assert_eq!(summary.skipped(), 2);
        assert_eq!(summary.parse_count, 0);
        assert!(matches!(summary.masters[0].outcome, MasterOutcome::Current));
    }

    #[test]
    fn test_parallel_run_keeps_declaration_order() {
        let tmp = workspace();
        let opts = GenerateOptions {
            jobs: Some(4),
            ..options(tmp.path())
        };

        let summary = generate(&opts, &GeneratorRegistry::new(), &TomlParser::new()).unwrap();
        let scripts: Vec<_> = summary.projects.iter().map(|r| r.script.clone()).collect();
        assert_eq!(scripts, vec![PathBuf::from("a/a.qpc"), PathBuf::from("b/b.qpc")]);
        assert_eq!(summary.regenerated(), 2);
    }

    #[test]
    fn test_scripts_sharing_a_stem_share_a_lane() {
        let def = ProjectDefinition::new("game", Vec::new(), Vec::new());
        let tasks = vec![
            (&def, Path::new("client/game.qpc")),
            (&def, Path::new("tier0/tier0.qpc")),
            (&def, Path::new("server/game.qpc")),
        ];

        let mut lanes = output_lanes(&tasks);
        lanes.sort();
        assert_eq!(lanes, vec![vec![0, 2], vec![1]]);
    }

    #[test]
    fn test_unknown_platform_is_fatal() {
        let tmp = workspace();
        let opts = GenerateOptions {
            platforms: vec!["amiga".to_string()],
            ..options(tmp.path())
        };

        let err = generate(&opts, &GeneratorRegistry::new(), &TomlParser::new()).unwrap_err();
        let err = err.downcast_ref::<GenerateError>().unwrap();
        assert!(err.is_fatal());
        assert!(!tmp.path().join(DEFAULT_HASH_DIR).exists());
    }

    #[test]
    fn test_missing_script_fails_the_run() {
        let tmp = workspace();
        fs::remove_file(tmp.path().join("b/b.qpc")).unwrap();

        let summary = generate(&options(tmp.path()), &GeneratorRegistry::new(), &TomlParser::new())
            .unwrap();
        assert_eq!(summary.regenerated(), 1);
        assert_eq!(summary.missing(), vec![Path::new("b/b.qpc")]);
        assert!(summary.has_failures());
    }
}
