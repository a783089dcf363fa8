//! Generator trait definition.
//!
//! A generator turns a parsed project into one build-file format. The
//! orchestration engine only talks to generators through this trait.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

use crate::core::platform::{CanonicalPlatform, PlatformMap};
use crate::core::project::{BuildInfo, ParsedProject, PathContext};

/// An output backend, one per build-file format.
///
/// Implementations must not keep state between calls other than what they
/// write to disk; several projects may be generated concurrently.
pub trait Generator: Send + Sync {
    /// Stable identifier, e.g. `"makefile"`.
    fn id(&self) -> &str;

    /// One-line description for listings.
    fn description(&self) -> &str {
        ""
    }

    /// Platform aliases this generator can produce files for.
    fn supported_platforms(&self) -> &[&str];

    /// Check whether this generator's output for `script` exists in `out_dir`.
    fn project_exists(&self, ctx: &PathContext, script: &Path, out_dir: &Path) -> bool;

    /// Write the build files for a project.
    fn create_project(&self, ctx: &PathContext, project: &ParsedProject) -> Result<()>;

    /// Whether this generator produces an aggregate master file.
    fn generates_master_file(&self) -> bool {
        false
    }

    /// Root-relative master file path for `name`, `None` to decline.
    fn master_file_path(&self, _name: &str) -> Option<PathBuf> {
        None
    }

    /// Write the master file referencing every project of the run.
    fn create_master_file(
        &self,
        _ctx: &PathContext,
        _info: &BuildInfo,
        path: &Path,
        _platforms: &PlatformMap,
    ) -> Result<()> {
        bail!(
            "generator `{}` does not produce master files ({})",
            self.id(),
            path.display()
        )
    }

    /// Whether master files group projects into folders.
    fn uses_folders(&self) -> bool {
        false
    }

    /// Tag recorded in master hash records.
    fn path_tag(&self) -> &str {
        self.id()
    }

    /// Check if any supported alias belongs to `platform`.
    fn supports(&self, platform: &CanonicalPlatform) -> bool {
        platform.intersects(self.supported_platforms())
    }

    /// Check if this generator supports any of `platforms`.
    fn supports_any(&self, platforms: &[CanonicalPlatform]) -> bool {
        platforms.iter().any(|p| self.supports(p))
    }
}
