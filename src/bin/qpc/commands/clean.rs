//! `qpc clean` command

use std::path::PathBuf;

use anyhow::Result;

use crate::cli::CleanArgs;
use qpc::ops::{clean, DEFAULT_HASH_DIR};
use qpc::util::config::{global_config_path, load_config, project_config_path};

pub fn execute(args: CleanArgs) -> Result<()> {
    let global = global_config_path();
    let config = load_config(global.as_deref(), &project_config_path(&args.root_dir));
    let hash_dir = config
        .generate
        .hash_dir
        .unwrap_or_else(|| PathBuf::from(DEFAULT_HASH_DIR));

    match clean(&args.root_dir, &hash_dir)? {
        Some(dir) => eprintln!("     Removed {}", dir.display()),
        None => eprintln!("     Nothing to clean"),
    }

    Ok(())
}
