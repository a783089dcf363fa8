//! Visual Studio generator.
//!
//! Writes `<out_dir>/<stem>.vcxproj` per project and a `.sln` master file.
//! Project GUIDs are derived from the script path so they are stable
//! across runs and machines.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::core::platform::PlatformMap;
use crate::core::project::{script_stem, BuildInfo, ParsedProject, PathContext, ProjectKind};
use crate::generator::trait_def::Generator;
use crate::generator::{master_scripts, project_out_dir, rel_from};
use crate::util::fs::{slash_path, write_string};
use crate::util::hash::sha256_str;

const PLATFORMS: &[&str] = &["win32", "win64"];
const CONFIGURATIONS: &[&str] = &["Debug", "Release"];

const CPP_PROJECT_TYPE: &str = "8BC9CEB8-8B4A-11D0-8D11-00A0C91BC942";
const FOLDER_PROJECT_TYPE: &str = "2150E333-8FDC-42A3-9474-1A3956D46DE8";

/// Visual Studio project and solution generator.
#[derive(Debug, Default)]
pub struct VisualStudioGenerator;

impl VisualStudioGenerator {
    pub fn new() -> Self {
        VisualStudioGenerator
    }

    fn project_file_name(script: &Path) -> String {
        format!("{}.vcxproj", script_stem(script))
    }

    /// Stable GUID derived from `seed`.
    fn guid(seed: &str) -> String {
        let h = sha256_str(seed).to_uppercase();
        format!(
            "{}-{}-{}-{}-{}",
            &h[0..8],
            &h[8..12],
            &h[12..16],
            &h[16..20],
            &h[20..32]
        )
    }

    fn project_guid(script: &Path) -> String {
        Self::guid(&slash_path(script))
    }

    /// MSBuild platform name for a user alias.
    fn msbuild_platform(token: &str) -> &'static str {
        match token {
            "win64" => "x64",
            _ => "Win32",
        }
    }

    fn msbuild_platforms<'a>(tokens: impl IntoIterator<Item = &'a String>) -> Vec<&'static str> {
        let mut platforms = Vec::new();
        for token in tokens {
            if !PLATFORMS.contains(&token.as_str()) {
                continue;
            }
            let platform = Self::msbuild_platform(token);
            if !platforms.contains(&platform) {
                platforms.push(platform);
            }
        }
        if platforms.is_empty() {
            platforms.push("x64");
        }
        platforms
    }

    fn windows_path(path: &Path) -> String {
        slash_path(path).replace('/', "\\")
    }

    fn render_project(ctx: &PathContext, project: &ParsedProject) -> String {
        let rel = |p: &Path| Self::windows_path(&rel_from(ctx, &project.out_dir, p));
        let platforms = Self::msbuild_platforms(&project.platform_tokens);
        let config_type = match project.kind {
            ProjectKind::Application => "Application",
            ProjectKind::StaticLibrary => "StaticLibrary",
            ProjectKind::DynamicLibrary => "DynamicLibrary",
        };
        let includes = project
            .include_dirs
            .iter()
            .map(|d| rel(d))
            .chain(std::iter::once("%(AdditionalIncludeDirectories)".to_string()))
            .collect::<Vec<_>>()
            .join(";");
        let defines = project
            .defines
            .iter()
            .cloned()
            .chain(std::iter::once("%(PreprocessorDefinitions)".to_string()))
            .collect::<Vec<_>>()
            .join(";");

        let mut out = String::new();
        writeln!(out, r#"<?xml version="1.0" encoding="utf-8"?>"#).unwrap();
        writeln!(
            out,
            "<!-- Generated by qpc from {}. Do not edit. -->",
            slash_path(&project.script)
        )
        .unwrap();
        writeln!(
            out,
            r#"<Project DefaultTargets="Build" xmlns="http://schemas.microsoft.com/developer/msbuild/2003">"#
        )
        .unwrap();

        writeln!(out, r#"  <ItemGroup Label="ProjectConfigurations">"#).unwrap();
        for config in CONFIGURATIONS {
            for platform in &platforms {
                writeln!(
                    out,
                    r#"    <ProjectConfiguration Include="{config}|{platform}">
      <Configuration>{config}</Configuration>
      <Platform>{platform}</Platform>
    </ProjectConfiguration>"#
                )
                .unwrap();
            }
        }
        writeln!(out, "  </ItemGroup>").unwrap();

        writeln!(out, r#"  <PropertyGroup Label="Globals">"#).unwrap();
        writeln!(
            out,
            "    <ProjectGuid>{{{}}}</ProjectGuid>",
            Self::project_guid(&project.script)
        )
        .unwrap();
        writeln!(out, "    <ProjectName>{}</ProjectName>", project.name).unwrap();
        writeln!(out, "  </PropertyGroup>").unwrap();

        writeln!(out, r#"  <Import Project="$(VCTargetsPath)\Microsoft.Cpp.Default.props" />"#).unwrap();
        writeln!(out, r#"  <PropertyGroup Label="Configuration">"#).unwrap();
        writeln!(out, "    <ConfigurationType>{}</ConfigurationType>", config_type).unwrap();
        writeln!(out, "  </PropertyGroup>").unwrap();
        writeln!(out, r#"  <Import Project="$(VCTargetsPath)\Microsoft.Cpp.props" />"#).unwrap();

        writeln!(out, "  <ItemDefinitionGroup>").unwrap();
        writeln!(out, "    <ClCompile>").unwrap();
        writeln!(
            out,
            "      <AdditionalIncludeDirectories>{}</AdditionalIncludeDirectories>",
            includes
        )
        .unwrap();
        writeln!(
            out,
            "      <PreprocessorDefinitions>{}</PreprocessorDefinitions>",
            defines
        )
        .unwrap();
        writeln!(out, "    </ClCompile>").unwrap();
        writeln!(out, "  </ItemDefinitionGroup>").unwrap();

        writeln!(out, "  <ItemGroup>").unwrap();
        for source in &project.sources {
            writeln!(out, r#"    <ClCompile Include="{}" />"#, rel(source)).unwrap();
        }
        for header in &project.headers {
            writeln!(out, r#"    <ClInclude Include="{}" />"#, rel(header)).unwrap();
        }
        writeln!(out, "  </ItemGroup>").unwrap();

        writeln!(out, r#"  <Import Project="$(VCTargetsPath)\Microsoft.Cpp.targets" />"#).unwrap();
        writeln!(out, "</Project>").unwrap();
        out
    }
}

impl Generator for VisualStudioGenerator {
    fn id(&self) -> &str {
        "vstudio"
    }

    fn description(&self) -> &str {
        "Visual Studio projects and solutions"
    }

    fn supported_platforms(&self) -> &[&str] {
        PLATFORMS
    }

    fn project_exists(&self, ctx: &PathContext, script: &Path, out_dir: &Path) -> bool {
        ctx.absolute(out_dir.join(Self::project_file_name(script)))
            .is_file()
    }

    fn create_project(&self, ctx: &PathContext, project: &ParsedProject) -> Result<()> {
        let path = ctx.absolute(
            project
                .out_dir
                .join(Self::project_file_name(&project.script)),
        );
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
        Some(PathBuf::from(format!("{}.sln", name)))
    }

    fn uses_folders(&self) -> bool {
        true
    }

    fn create_master_file(
        &self,
        ctx: &PathContext,
        info: &BuildInfo,
        path: &Path,
        platforms: &PlatformMap,
    ) -> Result<()> {
        let included = master_scripts(info, self);
        let members: BTreeSet<&Path> = included.iter().map(|(_, s)| *s).collect();
        let master_dir = path.parent().unwrap_or(Path::new(""));
        let msbuild_platforms =
            Self::msbuild_platforms(platforms.iter().flat_map(|(_, tokens)| tokens.iter()));

        let mut out = String::new();
        writeln!(out, "\u{feff}").unwrap();
        writeln!(out, "Microsoft Visual Studio Solution File, Format Version 12.00").unwrap();
        writeln!(out, "# Generated by qpc. Do not edit.").unwrap();

        for (_, script) in &included {
            let out_dir = project_out_dir(info, script);
            let project_path = rel_from(ctx, master_dir, &out_dir.join(Self::project_file_name(script)));
            writeln!(
                out,
                "Project(\"{{{}}}\") = \"{}\", \"{}\", \"{{{}}}\"",
                CPP_PROJECT_TYPE,
                script_stem(script),
                Self::windows_path(&project_path),
                Self::project_guid(script)
            )
            .unwrap();

            let deps: Vec<PathBuf> = info
                .dependencies
                .get(script)
                .unwrap_or_default()
                .into_iter()
                .filter(|d| members.contains(d.as_path()))
                .collect();
            if !deps.is_empty() {
                writeln!(out, "\tProjectSection(ProjectDependencies) = postProject").unwrap();
                for dep in &deps {
                    let guid = Self::project_guid(dep);
                    writeln!(out, "\t\t{{{}}} = {{{}}}", guid, guid).unwrap();
                }
                writeln!(out, "\tEndProjectSection").unwrap();
            }
            writeln!(out, "EndProject").unwrap();
        }

        // Folders for groups that contain at least one included project
        let mut nested = Vec::new();
        for group in &info.groups {
            let children: Vec<&Path> = included
                .iter()
                .filter(|(name, _)| group.projects.iter().any(|p| p == name))
                .map(|(_, script)| *script)
                .collect();
            if children.is_empty() {
                continue;
            }
            let folder_guid = Self::guid(&format!("folder:{}", group.name));
            writeln!(
                out,
                "Project(\"{{{}}}\") = \"{}\", \"{}\", \"{{{}}}\"\nEndProject",
                FOLDER_PROJECT_TYPE, group.name, group.name, folder_guid
            )
            .unwrap();
            for child in children {
                nested.push((Self::project_guid(child), folder_guid.clone()));
            }
        }

        writeln!(out, "Global").unwrap();
        writeln!(out, "\tGlobalSection(SolutionConfigurationPlatforms) = preSolution").unwrap();
        for config in CONFIGURATIONS {
            for platform in &msbuild_platforms {
                writeln!(out, "\t\t{config}|{platform} = {config}|{platform}").unwrap();
            }
        }
        writeln!(out, "\tEndGlobalSection").unwrap();

        writeln!(out, "\tGlobalSection(ProjectConfigurationPlatforms) = postSolution").unwrap();
        for (_, script) in &included {
            let guid = Self::project_guid(script);
            for config in CONFIGURATIONS {
                for platform in &msbuild_platforms {
                    writeln!(
                        out,
                        "\t\t{{{guid}}}.{config}|{platform}.ActiveCfg = {config}|{platform}"
                    )
                    .unwrap();
                    writeln!(
                        out,
                        "\t\t{{{guid}}}.{config}|{platform}.Build.0 = {config}|{platform}"
                    )
                    .unwrap();
                }
            }
        }
        writeln!(out, "\tEndGlobalSection").unwrap();

        if !nested.is_empty() {
            writeln!(out, "\tGlobalSection(NestedProjects) = preSolution").unwrap();
            for (child, parent) in &nested {
                writeln!(out, "\t\t{{{}}} = {{{}}}", child, parent).unwrap();
            }
            writeln!(out, "\tEndGlobalSection").unwrap();
        }
        writeln!(out, "EndGlobal").unwrap();

        write_string(&ctx.absolute(path), &out)
    }
}
