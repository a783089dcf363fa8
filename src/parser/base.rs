//! Base file parsing.
//!
//! ```toml
//! includes = ["_qpc_tools.toml"]
//!
//! [[project]]
//! name = "tier0"
//! scripts = ["tier0/tier0.qpc"]
//! platforms = ["win64", "linux64"]
//!
//! [[group]]
//! name = "libraries"
//! projects = ["tier0"]
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::platform::{CanonicalPlatform, PlatformMap, PlatformRegistry};
use crate::core::project::{BuildInfo, PathContext, ProjectDefinition, ProjectGroup};
use crate::util::fs::read_to_string;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BaseFile {
    /// Other base files merged into this one.
    #[serde(default)]
    includes: Vec<PathBuf>,

    #[serde(default, rename = "project")]
    projects: Vec<BaseProject>,

    #[serde(default, rename = "group")]
    groups: Vec<BaseGroup>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BaseProject {
    name: String,
    scripts: Vec<PathBuf>,
    #[serde(default)]
    platforms: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BaseGroup {
    name: String,
    #[serde(default)]
    projects: Vec<String>,
}

/// Parse `base_file` (root-relative) into the run's build info.
///
/// Definitions are limited to the requested platforms; definitions left
/// without any platform are dropped.
pub fn parse_base_info(
    ctx: &PathContext,
    base_file: &Path,
    registry: &PlatformRegistry,
    platforms: &PlatformMap,
) -> Result<BuildInfo> {
    let requested = platforms.platform_list();
    let mut projects = Vec::new();
    let mut groups: Vec<ProjectGroup> = Vec::new();
    let mut visited = BTreeSet::new();

    collect(
        ctx,
        &ctx.resolve(base_file),
        registry,
        &requested,
        &mut projects,
        &mut groups,
        &mut visited,
    )?;

    Ok(BuildInfo::new(requested, projects, groups))
}

fn collect(
    ctx: &PathContext,
    base_file: &Path,
    registry: &PlatformRegistry,
    requested: &[CanonicalPlatform],
    projects: &mut Vec<ProjectDefinition>,
    groups: &mut Vec<ProjectGroup>,
    visited: &mut BTreeSet<PathBuf>,
) -> Result<()> {
    if !visited.insert(base_file.to_path_buf()) {
        tracing::debug!("base file {} already included", base_file.display());
        return Ok(());
    }

    let path = ctx.absolute(base_file);
    let content = read_to_string(&path)?;
    let parsed: BaseFile = toml::from_str(&content)
        .with_context(|| format!("failed to parse base file: {}", path.display()))?;
    let base_ctx = ctx.for_script(base_file);

    for include in &parsed.includes {
        collect(
            ctx,
            &base_ctx.resolve(include),
            registry,
            requested,
            projects,
            groups,
            visited,
        )?;
    }

    for project in parsed.projects {
        let targets = if project.platforms.is_empty() {
            requested.to_vec()
        } else {
            registry
                .resolve_list(&project.platforms)?
                .into_iter()
                .filter(|p| requested.contains(p))
                .collect()
        };

        if targets.is_empty() {
            tracing::debug!(
                "skipping project `{}`: no requested platform applies",
                project.name
            );
            continue;
        }

        let scripts = project
            .scripts
            .iter()
            .map(|s| base_ctx.resolve(s))
            .collect();
        projects.push(ProjectDefinition::new(project.name, scripts, targets));
    }

    for group in parsed.groups {
        match groups.iter_mut().find(|g| g.name == group.name) {
            Some(existing) => existing.projects.extend(group.projects),
            None => groups.push(ProjectGroup {
                name: group.name,
                projects: group.projects,
            }),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn parse(root: &Path, tokens: &[&str]) -> Result<BuildInfo> {
        let registry = PlatformRegistry::builtin();
        let platforms = registry.resolve(tokens)?;
        parse_base_info(
            &PathContext::new(root),
            Path::new("_qpc_base.toml"),
            &registry,
            &platforms,
        )
    }

    #[test]
    fn test_parse_base_info() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("_qpc_base.toml"),
            r#"
[[project]]
name = "tier0"
scripts = ["tier0/tier0.qpc"]

[[project]]
name = "d3d"
scripts = ["render/d3d.qpc"]
platforms = ["win64"]

[[project]]
name = "tools"
scripts = ["tools/a.qpc", "tools/b.qpc"]
platforms = ["linux64", "win32"]

[[group]]
name = "libraries"
projects = ["tier0"]
"#,
        )
        .unwrap();

        let info = parse(tmp.path(), &["linux64"]).unwrap();
        let names: Vec<_> = info.projects.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["tier0", "tools"]);
        assert_eq!(info.projects[1].platform_names(), vec!["linux"]);
        assert_eq!(info.projects[1].scripts[1], PathBuf::from("tools/b.qpc"));
        assert_eq!(info.group_of("tier0"), Some("libraries"));
    }

    #[test]
    fn test_includes_are_merged_once() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("scripts")).unwrap();
        fs::write(
            tmp.path().join("_qpc_base.toml"),
            "includes = [\"scripts/extra.toml\", \"scripts/extra.toml\"]\n\n[[project]]\nname = \"a\"\nscripts = [\"a.qpc\"]\n",
        )
        .unwrap();
        fs::write(
            tmp.path().join("scripts/extra.toml"),
            "[[project]]\nname = \"b\"\nscripts = [\"../b/b.qpc\"]\n",
        )
        .unwrap();

        let info = parse(tmp.path(), &["win64"]).unwrap();
        let scripts: Vec<_> = info.scripts().map(|(_, s)| s.to_path_buf()).collect();
        assert_eq!(scripts, vec![PathBuf::from("b/b.qpc"), PathBuf::from("a.qpc")]);
    }

    #[test]
    fn test_unknown_platform_in_base_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("_qpc_base.toml"),
            "[[project]]\nname = \"a\"\nscripts = [\"a.qpc\"]\nplatforms = [\"dreamcast\"]\n",
        )
        .unwrap();

        let err = parse(tmp.path(), &["win64"]).unwrap_err();
        assert!(err.to_string().contains("unknown platform `dreamcast`"));
    }
}
