//! Implementation of `qpc clean`.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::util::fs::remove_dir_all_if_exists;

/// Remove the hash store so the next run regenerates everything.
///
/// Returns the removed directory, `None` if there was nothing to remove.
pub fn clean(root: &Path, hash_dir: &Path) -> Result<Option<PathBuf>> {
    let dir = root.join(hash_dir);
    if !dir.exists() {
        return Ok(None);
    }
    remove_dir_all_if_exists(&dir)?;
    tracing::debug!("removed {}", dir.display());
    Ok(Some(dir))
}
