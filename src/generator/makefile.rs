//! GNU make generator.
//!
//! Each project gets `<out_dir>/<stem>.mk`; the master file is a top-level
//! makefile invoking every project in dependency order.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::core::platform::PlatformMap;
use crate::core::project::{script_stem, BuildInfo, ParsedProject, PathContext, ProjectKind};
use crate::generator::trait_def::Generator;
use crate::generator::{master_scripts, project_out_dir, rel_from};
use crate::util::fs::{slash_path, write_string};

const PLATFORMS: &[&str] = &["linux32", "linux64", "macos"];

/// Makefile generator for POSIX platforms.
#[derive(Debug, Default)]
pub struct MakefileGenerator;

impl MakefileGenerator {
    pub fn new() -> Self {
        MakefileGenerator
    }

    fn makefile_name(script: &Path) -> String {
        format!("{}.mk", script_stem(script))
    }

    fn target_name(project: &ParsedProject) -> String {
        let stem = project.file_stem();
        match project.kind {
            ProjectKind::Application => stem,
            ProjectKind::StaticLibrary => format!("lib{}.a", stem),
            ProjectKind::DynamicLibrary => format!("lib{}.so", stem),
        }
    }

    /// Object file name for a source, unique within the project.
    fn object_name(rel_source: &Path) -> String {
        let flat = slash_path(&rel_source.with_extension(""))
            .replace("../", "up_")
            .replace('/', "_");
        format!("obj/{}.o", flat)
    }

    fn render_project(ctx: &PathContext, project: &ParsedProject) -> String {
        let rel = |p: &Path| slash_path(&rel_from(ctx, &project.out_dir, p));
        let sources: Vec<String> = project.sources.iter().map(|s| rel(s)).collect();
        let mut out = String::new();

        writeln!(
            out,
            "# Generated by qpc from {}. Do not edit.\n",
            slash_path(&project.script)
        )
        .unwrap();
        writeln!(out, "NAME := {}", project.name).unwrap();
        writeln!(out, "TARGET := {}", Self::target_name(project)).unwrap();
        writeln!(
            out,
            "INCLUDES := {}",
            project
                .include_dirs
                .iter()
                .map(|d| format!("-I{}", rel(d)))
                .collect::<Vec<_>>()
                .join(" ")
        )
        .unwrap();
        writeln!(
            out,
            "DEFINES := {}",
            project
                .defines
                .iter()
                .map(|d| format!("-D{}", d))
                .collect::<Vec<_>>()
                .join(" ")
        )
        .unwrap();
        if project.kind == ProjectKind::DynamicLibrary {
            writeln!(out, "CXXFLAGS += -fPIC").unwrap();
        }
        writeln!(out, "CXXFLAGS += $(INCLUDES) $(DEFINES)").unwrap();
        writeln!(
            out,
            "OBJS := {}\n",
            sources
                .iter()
                .map(|s| Self::object_name(Path::new(s)))
                .collect::<Vec<_>>()
                .join(" ")
        )
        .unwrap();

        writeln!(out, ".PHONY: all clean\n").unwrap();
        writeln!(out, "all: $(TARGET)\n").unwrap();
        writeln!(out, "$(TARGET): $(OBJS)").unwrap();
        let link = match project.kind {
            ProjectKind::StaticLibrary => "\t$(AR) rcs $@ $^",
            ProjectKind::DynamicLibrary => "\t$(CXX) -shared -o $@ $^ $(LDFLAGS)",
            ProjectKind::Application => "\t$(CXX) -o $@ $^ $(LDFLAGS)",
        };
        writeln!(out, "{}\n", link).unwrap();

        for source in &sources {
            writeln!(out, "{}: {}", Self::object_name(Path::new(source)), source).unwrap();
            writeln!(out, "\t@mkdir -p $(dir $@)").unwrap();
            writeln!(out, "\t$(CXX) $(CXXFLAGS) -c $< -o $@\n").unwrap();
        }

        writeln!(out, "clean:").unwrap();
        writeln!(out, "\trm -rf obj $(TARGET)").unwrap();
        out
    }
}

impl Generator for MakefileGenerator {
    fn id(&self) -> &str {
        "makefile"
    }

    fn description(&self) -> &str {
        "GNU make fragments and a top-level makefile"
    }

    fn supported_platforms(&self) -> &[&str] {
        PLATFORMS
    }

    fn project_exists(&self, ctx: &PathContext, script: &Path, out_dir: &Path) -> bool {
        ctx.absolute(out_dir.join(Self::makefile_name(script)))
            .is_file()
    }

    fn create_project(&self, ctx: &PathContext, project: &ParsedProject) -> Result<()> {
        let path = ctx.absolute(project.out_dir.join(Self::makefile_name(&project.script)));
        tracing::debug!("writing {}", path.display());
        write_string(&path, &Self::render_project(ctx, project))
    }

    fn generates_master_file(&self) -> bool {
        true
    }

    fn master_file_path(&self, name: &str) -> Option<PathBuf> {
        if name.is_empty() {
            return None;
        }
        Some(PathBuf::from(format!("{}.mk", name)))
    }

    fn create_master_file(
        &self,
        ctx: &PathContext,
        info: &BuildInfo,
        path: &Path,
        _platforms: &PlatformMap,
    ) -> Result<()> {
        let included = master_scripts(info, self);
        let members: BTreeSet<&Path> = included.iter().map(|(_, s)| *s).collect();

        // Dependency order first, then anything the graph does not know about
        let mut ordered: Vec<PathBuf> = info
            .dependencies
            .build_order()?
            .into_iter()
            .filter(|s| members.contains(s.as_path()))
            .collect();
        for (_, script) in &included {
            if !ordered.iter().any(|s| s == script) {
                ordered.push(script.to_path_buf());
            }
        }

        let master_dir = path.parent().unwrap_or(Path::new(""));
        let targets: Vec<String> = ordered.iter().map(|s| script_stem(s)).collect();
        let mut out = String::new();

        writeln!(out, "# Generated by qpc. Do not edit.\n").unwrap();
        writeln!(out, ".PHONY: all clean {}\n", targets.join(" ")).unwrap();
        writeln!(out, "all: {}\n", targets.join(" ")).unwrap();

        for script in &ordered {
            let out_dir = project_out_dir(info, script);
            let deps: Vec<String> = info
                .dependencies
                .get(script)
                .unwrap_or_default()
                .iter()
                .filter(|d| members.contains(d.as_path()))
                .map(|d| script_stem(d))
                .collect();
            let dir = slash_path(&rel_from(ctx, master_dir, &out_dir));

            writeln!(out, "{}: {}", script_stem(script), deps.join(" ")).unwrap();
            writeln!(
                out,
                "\t$(MAKE) -C {} -f {}\n",
                dir,
                Self::makefile_name(script)
            )
            .unwrap();
        }

        writeln!(out, "clean:").unwrap();
        for script in &ordered {
            let out_dir = project_out_dir(info, script);
            writeln!(
                out,
                "\t$(MAKE) -C {} -f {} clean",
                slash_path(&rel_from(ctx, master_dir, &out_dir)),
                Self::makefile_name(script)
            )
            .unwrap();
        }

        write_string(&ctx.absolute(path), &out)
    }
}
