//! Output generators.
//!
//! Each generator writes one build-file format:
//! - `makefile`: GNU make fragments plus a top-level master makefile
//! - `vstudio`: Visual Studio projects plus a solution master file

pub mod makefile;
pub mod registry;
pub mod trait_def;
pub mod vstudio;

use std::path::{Path, PathBuf};

pub use registry::GeneratorRegistry;
pub use trait_def::Generator;

use crate::core::project::{BuildInfo, PathContext};
use crate::store::ProjectHashRecord;
use crate::util::fs::relative_path;

/// Output directory of `script` as recorded by its hash record.
///
/// Falls back to the script's own directory when the project has no record.
pub(crate) fn project_out_dir(info: &BuildInfo, script: &Path) -> PathBuf {
    info.hash_locations()
        .get(script)
        .and_then(|record| ProjectHashRecord::load(record).ok())
        .map(|record| record.out_dir)
        .unwrap_or_else(|| script.parent().map(Path::to_path_buf).unwrap_or_default())
}

/// Scripts of the run whose definitions target a platform `generator` supports.
pub(crate) fn master_scripts<'a>(
    info: &'a BuildInfo,
    generator: &dyn Generator,
) -> Vec<(&'a str, &'a Path)> {
    let mut seen = std::collections::BTreeSet::new();
    info.scripts()
        .filter(|(def, _)| generator.supports_any(&def.platforms))
        .filter(|(_, script)| seen.insert(script.to_path_buf()))
        .map(|(def, script)| (def.name.as_str(), script))
        .collect()
}

/// `path` relative to `out_dir`, both root-relative.
pub(crate) fn rel_from(ctx: &PathContext, out_dir: &Path, path: &Path) -> PathBuf {
    relative_path(&ctx.absolute(out_dir), &ctx.absolute(path))
}
