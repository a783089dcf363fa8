//! End-to-end tests of the incremental generation engine.
//!
//! A recording generator stands in for real backends so each test can see
//! exactly which projects and master files were written.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use tempfile::TempDir;

use qpc::core::{BuildInfo, ParsedProject, PathContext, PlatformMap};
use qpc::generator::{Generator, GeneratorRegistry};
use qpc::ops::{generate, GenerateError, GenerateOptions, GenerateSummary, ProjectOutcome};
use qpc::parser::TomlParser;

#[derive(Default)]
struct Log {
    projects: Mutex<Vec<PathBuf>>,
    masters: Mutex<usize>,
    fail: Mutex<bool>,
}

impl Log {
    fn take_projects(&self) -> Vec<PathBuf> {
        std::mem::take(&mut *self.projects.lock().unwrap())
    }

    fn master_count(&self) -> usize {
        *self.masters.lock().unwrap()
    }
}

struct Recorder {
    id: &'static str,
    platforms: Vec<&'static str>,
    log: Arc<Log>,
}

impl Recorder {
    fn output(&self, out_dir: &Path, script: &Path) -> PathBuf {
        let stem = script.file_stem().unwrap().to_string_lossy();
        out_dir.join(format!("{}.{}", stem, self.id))
    }
}

impl Generator for Recorder {
    fn id(&self) -> &str {
        self.id
    }

    fn supported_platforms(&self) -> &[&str] {
        &self.platforms
    }

    fn project_exists(&self, ctx: &PathContext, script: &Path, out_dir: &Path) -> bool {
        ctx.absolute(self.output(out_dir, script)).is_file()
    }

    fn create_project(&self, ctx: &PathContext, project: &ParsedProject) -> Result<()> {
        if *self.log.fail.lock().unwrap() {
            bail!("disk full");
        }
        let path = ctx.absolute(self.output(&project.out_dir, &project.script));
        fs::create_dir_all(path.parent().unwrap())?;
        fs::write(&path, format!("{:?}", project.sources))?;
        self.log.projects.lock().unwrap().push(project.script.clone());
        Ok(())
    }

    fn generates_master_file(&self) -> bool {
        true
    }

    fn master_file_path(&self, name: &str) -> Option<PathBuf> {
        Some(PathBuf::from(format!("{}.{}-master", name, self.id)))
    }

    fn create_master_file(
        &self,
        ctx: &PathContext,
        info: &BuildInfo,
        path: &Path,
        _platforms: &PlatformMap,
    ) -> Result<()> {
        let mut out = String::new();
        for (_, script) in info.scripts() {
            let deps: Vec<String> = info
                .dependencies
                .get(script)
                .unwrap_or_default()
                .iter()
                .map(|d| d.display().to_string())
                .collect();
            let _ = writeln!(out, "{}: {}", script.display(), deps.join(" "));
        }
        fs::write(ctx.absolute(path), out)?;
        *self.log.masters.lock().unwrap() += 1;
        Ok(())
    }
}

struct Workspace {
    tmp: TempDir,
    log: Arc<Log>,
    registry: GeneratorRegistry,
}

impl Workspace {
    /// `a` depends on `b`; `a` globs its sources.
    fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let log = Arc::new(Log::default());
        let mut registry = GeneratorRegistry::empty();
        registry.register(Box::new(Recorder {
            id: "rec",
            platforms: vec!["linux64"],
            log: Arc::clone(&log),
        }));

        let ws = Workspace { tmp, log, registry };
        ws.write(
            "_qpc_base.toml",
            "[[project]]\nname = \"game\"\nscripts = [\"a/a.qpc\", \"b/b.qpc\"]\n",
        );
        ws.write(
            "a/a.qpc",
            "[project]\ndependencies = [\"../b/b.qpc\"]\n\n[files]\nsources = [\"src/*.cpp\"]\n",
        );
        ws.write("a/src/one.cpp", "int one() { return 1; }");
        ws.write("b/b.qpc", "[project]\nkind = \"static_library\"\n");
        ws
    }

    fn write(&self, rel: &str, contents: &str) {
        let path = self.tmp.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn options(&self) -> GenerateOptions {
        GenerateOptions {
            root: self.tmp.path().to_path_buf(),
            platforms: vec!["linux64".to_string()],
            master_file: Some("all".to_string()),
            ..Default::default()
        }
    }

    fn run_with(&self, opts: GenerateOptions) -> GenerateSummary {
        generate(&opts, &self.registry, &TomlParser::new()).unwrap()
    }

    fn run(&self) -> GenerateSummary {
        self.run_with(self.options())
    }

    fn master(&self) -> String {
        fs::read_to_string(self.tmp.path().join("all.rec-master")).unwrap()
    }
}

fn paths(list: &[&str]) -> Vec<PathBuf> {
    list.iter().map(PathBuf::from).collect()
}

#[test]
fn test_second_run_is_a_no_op() {
    let ws = Workspace::new();

    let first = ws.run();
    assert_eq!(first.regenerated(), 2);
    assert_eq!(ws.log.take_projects(), paths(&["a/a.qpc", "b/b.qpc"]));
    assert_eq!(ws.log.master_count(), 1);

    let second = ws.run();
    assert_eq!(second.regenerated(), 0);
    assert_eq!(second.skipped(), 2);
    assert!(ws.log.take_projects().is_empty());
    assert_eq!(ws.log.master_count(), 1);
    assert!(!second.has_failures());
}

#[test]
fn test_script_change_regenerates_that_project() {
    let ws = Workspace::new();
    ws.run();
    ws.log.take_projects();

    ws.write("a/a.qpc", "[project]\ndependencies = [\"../b/b.qpc\"]\ndefines = [\"X\"]\n\n[files]\nsources = [\"src/*.cpp\"]\n");
    ws.run();
    assert_eq!(ws.log.take_projects(), paths(&["a/a.qpc"]));
}

#[test]
fn test_dependency_change_regenerates_dependents() {
    let ws = Workspace::new();
    ws.run();
    ws.log.take_projects();

    ws.write("b/b.qpc", "[project]\nkind = \"dynamic_library\"\n");
    ws.run();
    assert_eq!(ws.log.take_projects(), paths(&["a/a.qpc", "b/b.qpc"]));
}

#[test]
fn test_glob_changes_regenerate() {
    let ws = Workspace::new();
    ws.run();
    ws.log.take_projects();

    // Added file
    ws.write("a/src/two.cpp", "int two() { return 2; }");
    ws.run();
    assert_eq!(ws.log.take_projects(), paths(&["a/a.qpc"]));

    // Modified file
    ws.write("a/src/one.cpp", "int one() { return 11; }");
    ws.run();
    assert_eq!(ws.log.take_projects(), paths(&["a/a.qpc"]));

    // Removed file
    fs::remove_file(ws.tmp.path().join("a/src/two.cpp")).unwrap();
    ws.run();
    assert_eq!(ws.log.take_projects(), paths(&["a/a.qpc"]));

    // Unrelated file outside the pattern
    ws.write("a/src/notes.txt", "todo");
    ws.run();
    assert!(ws.log.take_projects().is_empty());
}

#[test]
fn test_only_generators_matching_platform_aliases_run() {
    let ws = Workspace::new();
    let windows = Arc::new(Log::default());
    let posix = Arc::new(Log::default());
    let mut registry = GeneratorRegistry::empty();
    registry.register(Box::new(Recorder {
        id: "win",
        platforms: vec!["win32", "win64"],
        log: Arc::clone(&windows),
    }));
    registry.register(Box::new(Recorder {
        id: "posix",
        platforms: vec!["linux32"],
        log: Arc::clone(&posix),
    }));

    // linux64 was requested, linux32 shares its canonical platform
    generate(&ws.options(), &registry, &TomlParser::new()).unwrap();
    assert_eq!(posix.take_projects().len(), 2);
    assert_eq!(posix.master_count(), 1);
    assert!(windows.take_projects().is_empty());
    assert_eq!(windows.master_count(), 0);
}

#[test]
fn test_skip_projects_uses_persisted_dependencies() {
    let ws = Workspace::new();
    ws.run();
    ws.log.take_projects();
    let primed = ws.master();

    // Change a script: skip-all must neither notice nor re-parse it
    ws.write("a/a.qpc", "[project]\n");
    let summary = ws.run_with(GenerateOptions {
        skip_projects: true,
        force_master: true,
        ..ws.options()
    });

    assert_eq!(summary.skipped(), 2);
    assert_eq!(summary.parse_count, 0);
    assert!(ws.log.take_projects().is_empty());
    assert_eq!(ws.master(), primed);
    assert!(primed.contains("a/a.qpc: b/b.qpc"));
}

#[test]
fn test_missing_script_is_reported_and_run_continues() {
    let ws = Workspace::new();
    ws.write(
        "_qpc_base.toml",
        "[[project]]\nname = \"game\"\nscripts = [\"gone/gone.qpc\", \"b/b.qpc\"]\n",
    );

    let summary = ws.run();
    assert_eq!(summary.missing(), vec![Path::new("gone/gone.qpc")]);
    assert_eq!(ws.log.take_projects(), paths(&["b/b.qpc"]));
    assert!(summary.has_failures());

    let records: Vec<_> = fs::read_dir(ws.tmp.path().join(".qpc/hashes"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert!(records.iter().all(|name| !name.starts_with("gone-")));
    assert!(records.iter().any(|name| name.starts_with("b-")));
}

#[test]
fn test_master_follows_project_membership() {
    let ws = Workspace::new();
    ws.run();
    assert_eq!(ws.log.master_count(), 1);

    ws.run();
    assert_eq!(ws.log.master_count(), 1);

    ws.write("c/c.qpc", "[project]\n");
    ws.write(
        "_qpc_base.toml",
        "[[project]]\nname = \"game\"\nscripts = [\"a/a.qpc\", \"b/b.qpc\", \"c/c.qpc\"]\n",
    );
    let summary = ws.run();
    assert_eq!(ws.log.take_projects(), paths(&["a/a.qpc", "b/b.qpc", "c/c.qpc"]));
    assert_eq!(summary.regenerated(), 1);
    assert_eq!(ws.log.master_count(), 2);
}

#[test]
fn test_force_flags() {
    let ws = Workspace::new();
    ws.run();
    ws.log.take_projects();

    ws.run_with(GenerateOptions {
        force: true,
        ..ws.options()
    });
    assert_eq!(ws.log.take_projects(), paths(&["a/a.qpc", "b/b.qpc"]));
    assert_eq!(ws.log.master_count(), 1);

    ws.run_with(GenerateOptions {
        force_master: true,
        ..ws.options()
    });
    assert!(ws.log.take_projects().is_empty());
    assert_eq!(ws.log.master_count(), 2);
}

#[test]
fn test_generator_failure_is_retried_next_run() {
    let ws = Workspace::new();
    *ws.log.fail.lock().unwrap() = true;

    let summary = ws.run();
    assert!(summary.has_failures());
    assert_eq!(summary.failures().len(), 2);
    assert!(matches!(
        summary.failures()[0],
        GenerateError::Generator { .. }
    ));

    *ws.log.fail.lock().unwrap() = false;
    let summary = ws.run();
    assert_eq!(summary.regenerated(), 2);
    assert!(summary
        .projects
        .iter()
        .all(|r| matches!(r.outcome, ProjectOutcome::Regenerated)));
}

#[test]
fn test_platform_narrowed_script_is_a_no_op_on_second_run() {
    let ws = Workspace::new();
    let windows = Arc::new(Log::default());
    let posix = Arc::new(Log::default());
    let mut registry = GeneratorRegistry::empty();
    registry.register(Box::new(Recorder {
        id: "posix",
        platforms: vec!["linux64"],
        log: Arc::clone(&posix),
    }));
    registry.register(Box::new(Recorder {
        id: "win",
        platforms: vec!["win64"],
        log: Arc::clone(&windows),
    }));
    ws.write(
        "_qpc_base.toml",
        "[[project]]\nname = \"render\"\nscripts = [\"d3d/d3d.qpc\"]\n",
    );
    ws.write("d3d/d3d.qpc", "[project]\nplatforms = [\"win64\"]\n");
    let opts = GenerateOptions {
        platforms: vec!["linux64".to_string(), "win64".to_string()],
        master_file: None,
        ..ws.options()
    };

    let first = generate(&opts, &registry, &TomlParser::new()).unwrap();
    assert_eq!(first.regenerated(), 1);
    assert_eq!(windows.take_projects(), paths(&["d3d/d3d.qpc"]));
    assert!(posix.take_projects().is_empty());

    for _ in 0..2 {
        let next = generate(&opts, &registry, &TomlParser::new()).unwrap();
        assert_eq!(next.regenerated(), 0);
        assert_eq!(next.skipped(), 1);
        assert!(windows.take_projects().is_empty());
        assert!(posix.take_projects().is_empty());
    }

    // Widening the script's platforms regenerates it for both generators
    ws.write("d3d/d3d.qpc", "[project]\n");
    let widened = generate(&opts, &registry, &TomlParser::new()).unwrap();
    assert_eq!(widened.regenerated(), 1);
    assert_eq!(windows.take_projects(), paths(&["d3d/d3d.qpc"]));
    assert_eq!(posix.take_projects(), paths(&["d3d/d3d.qpc"]));
}

#[test]
fn test_failed_regeneration_drops_the_previous_record() {
    let ws = Workspace::new();
    ws.run();
    ws.log.take_projects();

    // The failed run must not leave the old record behind: once the script
    // is restored to the content that record describes, it still regenerates.
    let original = fs::read_to_string(ws.tmp.path().join("b/b.qpc")).unwrap();
    ws.write("b/b.qpc", "[project]\nkind = \"dynamic_library\"\n");
    *ws.log.fail.lock().unwrap() = true;
    let failed = ws.run();
    assert!(failed.has_failures());

    *ws.log.fail.lock().unwrap() = false;
    ws.write("b/b.qpc", &original);
    let summary = ws.run();
    assert!(ws.log.take_projects().contains(&PathBuf::from("b/b.qpc")));
    assert!(!summary.has_failures());
}
