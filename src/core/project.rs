//! Project definitions, parser output and run-wide build info.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::core::dep_graph::DependencyGraph;
use crate::core::platform::CanonicalPlatform;
use crate::util::fs::normalize_lexically;

/// A named group of project scripts and the platforms they target.
///
/// Built once from the base file; read-only for the rest of the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDefinition {
    pub name: String,

    /// Script paths relative to the root directory.
    pub scripts: Vec<PathBuf>,

    /// Canonical platforms this project targets.
    pub platforms: Vec<CanonicalPlatform>,
}

impl ProjectDefinition {
    pub fn new(
        name: impl Into<String>,
        scripts: Vec<PathBuf>,
        platforms: Vec<CanonicalPlatform>,
    ) -> Self {
        ProjectDefinition {
            name: name.into(),
            scripts,
            platforms,
        }
    }

    /// Canonical platform names, in order.
    pub fn platform_names(&self) -> Vec<&str> {
        self.platforms.iter().map(|p| p.name()).collect()
    }
}

/// A folder of projects in master files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectGroup {
    pub name: String,

    /// Names of project definitions in this group.
    pub projects: Vec<String>,
}

/// What a project builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectKind {
    #[default]
    Application,
    StaticLibrary,
    DynamicLibrary,
}

/// Glob patterns used while parsing and the files they matched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackedGlobs {
    /// Patterns, relative to the root directory.
    pub patterns: Vec<String>,

    /// Matched files, relative to the root directory.
    pub files: Vec<PathBuf>,
}

impl TrackedGlobs {
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Parser output for a single project script.
#[derive(Debug, Clone)]
pub struct ParsedProject {
    pub name: String,
    pub kind: ProjectKind,

    /// Script path relative to the root directory.
    pub script: PathBuf,

    /// Resolved output directory, relative to the root directory.
    pub out_dir: PathBuf,

    /// Canonical platforms this project is generated for.
    pub platforms: Vec<CanonicalPlatform>,

    /// Requested user tokens belonging to `platforms` (e.g. `win32`, `win64`).
    pub platform_tokens: Vec<String>,

    pub sources: Vec<PathBuf>,
    pub headers: Vec<PathBuf>,
    pub include_dirs: Vec<PathBuf>,
    pub defines: Vec<String>,

    /// Scripts of projects this one depends on.
    pub dependencies: BTreeSet<PathBuf>,

    /// Tracked input path to content hash (the script itself included).
    pub hashes: BTreeMap<PathBuf, String>,

    pub globs: TrackedGlobs,
}

impl ParsedProject {
    /// Base name used for this project's output files.
    pub fn file_stem(&self) -> String {
        script_stem(&self.script)
    }
}

/// File stem of a script path, used to name generated files.
pub fn script_stem(script: &Path) -> String {
    script
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "project".to_string())
}

/// Explicit directory context for resolving script-relative paths.
///
/// Replaces changing the process working directory: every task carries its
/// own context, so projects can be processed on several threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathContext {
    root: PathBuf,
    dir: PathBuf,
}

impl PathContext {
    /// Context rooted at `root`, resolving relative to the root itself.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        PathContext {
            root: root.into(),
            dir: PathBuf::new(),
        }
    }

    /// Context scoped to the directory containing `script`.
    pub fn for_script(&self, script: &Path) -> Self {
        let dir = script
            .parent()
            .map(normalize_lexically)
            .unwrap_or_default();
        PathContext {
            root: self.root.clone(),
            dir,
        }
    }

    /// Root directory of the run.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Current directory, relative to the root.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Resolve `path` against the current directory, relative to the root.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            return match path.strip_prefix(&self.root) {
                Ok(rel) => normalize_lexically(rel),
                Err(_) => normalize_lexically(path),
            };
        }
        normalize_lexically(&self.dir.join(path))
    }

    /// Absolute filesystem location of a root-relative path.
    pub fn absolute(&self, root_relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(root_relative)
    }
}

/// Aggregate state for one run.
#[derive(Debug)]
pub struct BuildInfo {
    pub platforms: Vec<CanonicalPlatform>,
    pub projects: Vec<ProjectDefinition>,
    pub groups: Vec<ProjectGroup>,

    /// Project script to dependency scripts, filled while projects are processed.
    pub dependencies: DependencyGraph,

    /// Project script to hash record location, filled while projects are processed.
    hash_records: Mutex<BTreeMap<PathBuf, PathBuf>>,
}

impl BuildInfo {
    pub fn new(
        platforms: Vec<CanonicalPlatform>,
        projects: Vec<ProjectDefinition>,
        groups: Vec<ProjectGroup>,
    ) -> Self {
        BuildInfo {
            platforms,
            projects,
            groups,
            dependencies: DependencyGraph::new(),
            hash_records: Mutex::new(BTreeMap::new()),
        }
    }

    /// Every (definition, script) pair in declaration order.
    pub fn scripts(&self) -> impl Iterator<Item = (&ProjectDefinition, &Path)> + '_ {
        self.projects
            .iter()
            .flat_map(|def| def.scripts.iter().map(move |s| (def, s.as_path())))
    }

    /// Remember where the hash record of `script` lives.
    pub fn record_hash_location(&self, script: &Path, record: PathBuf) {
        let mut records = self
            .hash_records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        records.insert(script.to_path_buf(), record);
    }

    /// Hash record locations recorded so far.
    pub fn hash_locations(&self) -> BTreeMap<PathBuf, PathBuf> {
        self.hash_records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Group name containing the named project definition, if any.
    pub fn group_of(&self, project: &str) -> Option<&str> {
        self.groups
            .iter()
            .find(|g| g.projects.iter().any(|p| p == project))
            .map(|g| g.name.as_str())
    }
}
