//! Per-script skip or regenerate decisions.
//!
//! Rules, evaluated in order for each project script:
//! 1. skip-all mode: skip, dependencies come from the hash store
//! 2. not forced, every applicable generator's output exists and the hash
//!    record is current: skip, dependencies come from the hash store
//! 3. script missing on disk: report it, nothing is recorded
//! 4. otherwise parse, run every applicable generator, record the
//!    dependencies and replace the hash record

use std::fmt;
use std::path::Path;

use crate::core::platform::{CanonicalPlatform, PlatformMap};
use crate::core::project::{BuildInfo, ParsedProject, PathContext, ProjectDefinition};
use crate::generator::Generator;
use crate::ops::errors::GenerateError;
use crate::parser::ProjectParser;
use crate::store::HashStore;

/// Final state of one project script.
#[derive(Debug, Clone)]
pub enum ProjectOutcome {
    /// Outputs exist and the hash record is current (or skip-all was requested).
    Skipped,

    /// Parsed and generated; the hash record was replaced.
    Regenerated,

    /// The parser reported nothing to generate for this script.
    NoOutput,

    /// The script does not exist on disk.
    MissingScript(GenerateError),

    Failed(GenerateError),
}

impl ProjectOutcome {
    pub fn is_failure(&self) -> bool {
        self.error().is_some()
    }

    /// Error behind a missing or failed project.
    pub fn error(&self) -> Option<&GenerateError> {
        match self {
            ProjectOutcome::MissingScript(e) | ProjectOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for ProjectOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectOutcome::Skipped => write!(f, "skipped"),
            ProjectOutcome::Regenerated => write!(f, "regenerated"),
            ProjectOutcome::NoOutput => write!(f, "nothing to generate"),
            ProjectOutcome::MissingScript(e) => write!(f, "{}", e),
            ProjectOutcome::Failed(e) => write!(f, "failed: {}", e),
        }
    }
}

/// Flags steering the skip decision.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveMode {
    /// Regenerate every project regardless of hashes and outputs.
    pub force: bool,

    /// Skip every project, only loading persisted dependencies.
    pub skip_projects: bool,
}

/// Decides and performs the work for each project script of a run.
///
/// Holds only shared references, so one resolver can serve several worker
/// threads at once.
pub struct ProjectResolver<'a> {
    ctx: &'a PathContext,
    store: &'a HashStore,
    info: &'a BuildInfo,
    parser: &'a dyn ProjectParser,
    generators: &'a [&'a dyn Generator],
    platforms: &'a PlatformMap,
    mode: ResolveMode,
}

impl<'a> ProjectResolver<'a> {
    pub fn new(
        ctx: &'a PathContext,
        store: &'a HashStore,
        info: &'a BuildInfo,
        parser: &'a dyn ProjectParser,
        generators: &'a [&'a dyn Generator],
        platforms: &'a PlatformMap,
        mode: ResolveMode,
    ) -> Self {
        ProjectResolver {
            ctx,
            store,
            info,
            parser,
            generators,
            platforms,
            mode,
        }
    }

    /// Generators whose platforms intersect the definition's, in registry order.
    pub fn applicable_generators(&self, def: &ProjectDefinition) -> Vec<&'a dyn Generator> {
        self.generators
            .iter()
            .copied()
            .filter(|g| g.supports_any(&def.platforms))
            .collect()
    }

    /// Applicable generators whose output for `script` is missing.
    ///
    /// Outputs are looked up in the directory recorded by the last hash
    /// record, or next to the script when there is none. A script may narrow
    /// the definition's platforms, so once a record exists only generators
    /// for the platforms it was generated for are expected to have output.
    pub fn missing_outputs(&self, def: &ProjectDefinition, script: &Path) -> Vec<&'a str> {
        let record = self.store.load_project_record(script).ok().flatten();
        let out_dir = match &record {
            Some(record) => record.out_dir.clone(),
            None => script.parent().map(Path::to_path_buf).unwrap_or_default(),
        };
        let targets: Vec<CanonicalPlatform> = match &record {
            Some(record) if !record.platforms.is_empty() => def
                .platforms
                .iter()
                .filter(|p| record.platforms.iter().any(|name| name == p.name()))
                .cloned()
                .collect(),
            _ => def.platforms.clone(),
        };

        self.generators
            .iter()
            .copied()
            .filter(|g| g.supports_any(&targets))
            .filter(|g| !g.project_exists(self.ctx, script, &out_dir))
            .map(|g| g.id())
            .collect()
    }

    /// Check that every applicable generator already wrote its output.
    pub fn outputs_exist(&self, def: &ProjectDefinition, script: &Path) -> bool {
        let missing = self.missing_outputs(def, script);
        for id in &missing {
            tracing::debug!("{}: no `{}` output", script.display(), id);
        }
        missing.is_empty()
    }

    /// Run the state machine for one script.
    pub fn resolve(&self, def: &ProjectDefinition, script: &Path) -> ProjectOutcome {
        if self.mode.skip_projects {
            self.skip(script);
            return ProjectOutcome::Skipped;
        }

        if !self.mode.force
            && self.outputs_exist(def, script)
            && self.store.is_project_current(script)
        {
            tracing::debug!("{}: up to date", script.display());
            self.skip(script);
            return ProjectOutcome::Skipped;
        }

        if !self.ctx.absolute(script).is_file() {
            let err = GenerateError::MissingScript {
                script: script.to_path_buf(),
            };
            tracing::warn!("{}", err);
            return ProjectOutcome::MissingScript(err);
        }

        let outcome = self.regenerate(def, script);
        if let ProjectOutcome::Failed(e) = &outcome {
            tracing::warn!("{}", e);
            // Keep the last known dependencies for the master file
            self.info.dependencies.lookup_or_fallback(script, self.store);
        }
        outcome
    }

    fn skip(&self, script: &Path) {
        self.info.dependencies.lookup_or_fallback(script, self.store);
        let record = self.store.project_record_path(script);
        if record.is_file() {
            self.info.record_hash_location(script, record);
        }
    }

    fn regenerate(&self, def: &ProjectDefinition, script: &Path) -> ProjectOutcome {
        let script_ctx = self.ctx.for_script(script);
        let generators = self.applicable_generators(def);

        let project = match self.parser.parse_project(
            &script_ctx,
            def,
            script,
            self.info,
            &generators,
            self.platforms,
        ) {
            Ok(Some(project)) => project,
            Ok(None) => {
                tracing::debug!("{}: nothing to generate", script.display());
                return ProjectOutcome::NoOutput;
            }
            Err(e) => {
                return ProjectOutcome::Failed(GenerateError::Parse {
                    script: script.to_path_buf(),
                    message: format!("{:#}", e),
                })
            }
        };

        tracing::info!("Regenerating {}", script.display());
        for generator in generators
            .iter()
            .filter(|g| g.supports_any(&project.platforms))
        {
            if let Err(e) = generator.create_project(&script_ctx, &project) {
                self.discard_record(script);
                return ProjectOutcome::Failed(GenerateError::Generator {
                    generator: generator.id().to_string(),
                    script: script.to_path_buf(),
                    message: format!("{:#}", e),
                });
            }
        }

        self.info
            .dependencies
            .record(script, project.dependencies.clone());
        self.persist(&project)
    }

    fn persist(&self, project: &ParsedProject) -> ProjectOutcome {
        match self.store.write_project_hash(
            &project.script,
            &project.out_dir,
            &project.platforms,
            &project.hashes,
            &project.dependencies,
            &project.globs,
        ) {
            Ok(record) => {
                self.info.record_hash_location(&project.script, record);
                ProjectOutcome::Regenerated
            }
            Err(e) => {
                self.discard_record(&project.script);
                ProjectOutcome::Failed(GenerateError::HashStore {
                    path: self.store.project_record_path(&project.script),
                    message: format!("{:#}", e),
                })
            }
        }
    }

    /// Drop a stale record so the next run does not treat the project as current.
    fn discard_record(&self, script: &Path) {
        if let Err(e) = self.store.invalidate_project(script) {
            tracing::warn!("{:#}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::platform::PlatformRegistry;
    use crate::generator::GeneratorRegistry;
    use crate::parser::TomlParser;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct Fixture {
        tmp: TempDir,
        ctx: PathContext,
        store: HashStore,
        info: BuildInfo,
        platforms: PlatformMap,
        registry: GeneratorRegistry,
        parser: TomlParser,
    }

    impl Fixture {
        fn new() -> Self {
            let tmp = TempDir::new().unwrap();
            let root = tmp.path().to_path_buf();
            fs::create_dir_all(root.join("a/src")).unwrap();
            fs::write(root.join("a/src/main.cpp"), "int main() {}").unwrap();
            fs::write(
                root.join("a/a.qpc"),
                "[project]\ndependencies = [\"../b/b.qpc\"]\n\n[files]\nsources = [\"src/*.cpp\"]\n",
            )
            .unwrap();

            let platforms = PlatformRegistry::builtin().resolve(&["linux64"]).unwrap();
            let info = BuildInfo::new(
                platforms.platform_list(),
                vec![ProjectDefinition::new(
                    "a",
                    vec![PathBuf::from("a/a.qpc"), PathBuf::from("missing/m.qpc")],
                    platforms.platform_list(),
                )],
                Vec::new(),
            );
            let store = HashStore::open(&root, root.join(".qpc/hashes")).unwrap();

            Fixture {
                ctx: PathContext::new(&root),
                tmp,
                store,
                info,
                platforms,
                registry: GeneratorRegistry::new(),
                parser: TomlParser::new(),
            }
        }

        fn resolve(&self, mode: ResolveMode, script: &str) -> ProjectOutcome {
            let generators: Vec<&dyn Generator> = self.registry.all().collect();
            let resolver = ProjectResolver::new(
                &self.ctx,
                &self.store,
                &self.info,
                &self.parser,
                &generators,
                &self.platforms,
                mode,
            );
            resolver.resolve(&self.info.projects[0], Path::new(script))
        }
    }

    #[test]
    fn test_regenerate_then_skip() {
        let fx = Fixture::new();

        let outcome = fx.resolve(ResolveMode::default(), "a/a.qpc");
        assert!(matches!(outcome, ProjectOutcome::Regenerated));
        assert!(fx.tmp.path().join("a/a.mk").is_file());
        assert!(fx.info.dependencies.is_fresh(Path::new("a/a.qpc")));

        let outcome = fx.resolve(ResolveMode::default(), "a/a.qpc");
        assert!(matches!(outcome, ProjectOutcome::Skipped));
    }

    #[test]
    fn test_missing_output_forces_regeneration() {
        let fx = Fixture::new();
        fx.resolve(ResolveMode::default(), "a/a.qpc");
        fs::remove_file(fx.tmp.path().join("a/a.mk")).unwrap();

        let outcome = fx.resolve(ResolveMode::default(), "a/a.qpc");
        assert!(matches!(outcome, ProjectOutcome::Regenerated));
    }

    #[test]
    fn test_missing_script_records_nothing() {
        let fx = Fixture::new();

        let outcome = fx.resolve(ResolveMode::default(), "missing/m.qpc");
        assert!(matches!(outcome, ProjectOutcome::MissingScript(_)));
        assert!(outcome.is_failure());
        assert_eq!(
            outcome.error().and_then(|e| e.path()),
            Some(Path::new("missing/m.qpc"))
        );
        assert!(fx.info.dependencies.get(Path::new("missing/m.qpc")).is_none());
        assert!(!fx.store.project_record_path(Path::new("missing/m.qpc")).exists());
    }

    #[test]
    fn test_skip_all_loads_persisted_dependencies() {
        let fx = Fixture::new();
        fx.resolve(ResolveMode::default(), "a/a.qpc");

        let fresh = Fixture {
            info: BuildInfo::new(
                fx.info.platforms.clone(),
                fx.info.projects.clone(),
                Vec::new(),
            ),
            ..fx
        };
        let mode = ResolveMode {
            skip_projects: true,
            ..Default::default()
        };
        let outcome = fresh.resolve(mode, "a/a.qpc");

        assert!(matches!(outcome, ProjectOutcome::Skipped));
        assert!(!fresh.info.dependencies.is_fresh(Path::new("a/a.qpc")));
        let deps = fresh.info.dependencies.get(Path::new("a/a.qpc")).unwrap();
        assert!(deps.contains(Path::new("b/b.qpc")));
    }

    #[test]
    fn test_unwritable_hash_record_is_never_current() {
        let fx = Fixture::new();
        let script = Path::new("a/a.qpc");
        fx.resolve(ResolveMode::default(), script.to_str().unwrap());

        // A directory in place of the record makes every write fail
        let record = fx.store.project_record_path(script);
        fs::remove_file(&record).unwrap();
        fs::create_dir(&record).unwrap();
        fs::write(fx.tmp.path().join("a/a.qpc"), r#"[project]
defines = ["X"]
"#).unwrap();

        for _ in 0..2 {
            match fx.resolve(ResolveMode::default(), "a/a.qpc") {
                ProjectOutcome::Failed(GenerateError::HashStore { path, .. }) => {
                    assert_eq!(path, record);
                }
                other => panic!("unexpected outcome: {}", other),
            }
            assert!(!fx.store.is_project_current(script));
        }

        fs::remove_dir(&record).unwrap();
        let outcome = fx.resolve(ResolveMode::default(), "a/a.qpc");
        assert!(matches!(outcome, ProjectOutcome::Regenerated));
        assert!(fx.store.is_project_current(script));
    }

    #[test]
    fn test_parse_failure_is_isolated() {
        let fx = Fixture::new();
        fs::write(fx.tmp.path().join("a/a.qpc"), "[project\n").unwrap();

        let outcome = fx.resolve(ResolveMode::default(), "a/a.qpc");
        match outcome {
            ProjectOutcome::Failed(GenerateError::Parse { script, .. }) => {
                assert_eq!(script, PathBuf::from("a/a.qpc"));
            }
            other => panic!("unexpected outcome: {}", other),
        }
        assert!(!fx.store.project_record_path(Path::new("a/a.qpc")).exists());
    }
}
