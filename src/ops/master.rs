//! Master file coordination.
//!
//! Runs once after every project task has finished. A master file is
//! regenerated when forced, when it is missing, or when the ordered set of
//! project scripts and their platforms changed since it was written.
//!
//! Group membership and other metadata nested inside definitions is not part
//! of the master hash; editing only a group does not regenerate the file.

use std::fmt;
use std::path::PathBuf;

use crate::core::platform::PlatformMap;
use crate::core::project::{BuildInfo, PathContext};
use crate::generator::Generator;
use crate::ops::errors::GenerateError;
use crate::store::HashStore;

/// What happened to one generator's master file.
#[derive(Debug, Clone)]
pub enum MasterOutcome {
    Current,
    Regenerated,
    Failed(GenerateError),
}

impl fmt::Display for MasterOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MasterOutcome::Current => write!(f, "up to date"),
            MasterOutcome::Regenerated => write!(f, "regenerated"),
            MasterOutcome::Failed(e) => write!(f, "failed: {}", e),
        }
    }
}

/// Result for one master file.
#[derive(Debug, Clone)]
pub struct MasterResult {
    pub generator: String,
    pub path: PathBuf,
    pub outcome: MasterOutcome,
}

pub struct MasterFileCoordinator<'a> {
    ctx: &'a PathContext,
    store: &'a HashStore,
    info: &'a BuildInfo,
    platforms: &'a PlatformMap,
    force: bool,
}

impl<'a> MasterFileCoordinator<'a> {
    pub fn new(
        ctx: &'a PathContext,
        store: &'a HashStore,
        info: &'a BuildInfo,
        platforms: &'a PlatformMap,
        force: bool,
    ) -> Self {
        MasterFileCoordinator {
            ctx,
            store,
            info,
            platforms,
            force,
        }
    }

    /// Handle the master file of every generator that produces one.
    pub fn run(&self, generators: &[&dyn Generator], name: &str) -> Vec<MasterResult> {
        generators
            .iter()
            .filter(|g| g.generates_master_file())
            .filter_map(|g| {
                let path = g.master_file_path(name)?;
                let outcome = self.handle(*g, &path);
                Some(MasterResult {
                    generator: g.id().to_string(),
                    path,
                    outcome,
                })
            })
            .collect()
    }

    fn handle(&self, generator: &dyn Generator, path: &std::path::Path) -> MasterOutcome {
        let uses_folders = generator.uses_folders();
        if !self.force
            && self.ctx.absolute(path).is_file()
            && self.store.is_master_current(path, self.info, uses_folders)
        {
            tracing::debug!("master file {} is up to date", path.display());
            return MasterOutcome::Current;
        }

        tracing::info!("Writing master file {}", path.display());
        let failed = |message: String| {
            MasterOutcome::Failed(GenerateError::MasterFile {
                generator: generator.id().to_string(),
                path: path.to_path_buf(),
                message,
            })
        };

        if let Err(e) = generator.create_master_file(self.ctx, self.info, path, self.platforms) {
            return failed(format!("{:#}", e));
        }

        match self.store.write_master_hash(
            path,
            self.info,
            generator.supported_platforms(),
            generator.path_tag(),
            uses_folders,
        ) {
            Ok(()) => MasterOutcome::Regenerated,
            Err(e) => failed(format!("{:#}", e)),
        }
    }
}
