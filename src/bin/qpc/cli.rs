//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

/// qpc - generate build files from project scripts
#[derive(Parser)]
#[command(name = "qpc")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate project and master files that are out of date
    Generate(GenerateArgs),

    /// Show which projects and master files are out of date
    Status(StatusArgs),

    /// Remove the hash store, forcing a full regeneration next time
    Clean(CleanArgs),

    /// List available generators
    Generators,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Options shared by commands that read the base file.
#[derive(Args)]
pub struct ProjectArgs {
    /// Root directory; project paths are relative to it
    #[arg(short = 'd', long, default_value = ".")]
    pub root_dir: PathBuf,

    /// Platforms to generate for (e.g. win64 linux64)
    #[arg(short, long, num_args = 1..)]
    pub platforms: Vec<String>,

    /// Base file listing every project, relative to the root directory
    #[arg(short, long)]
    pub base_file: Option<PathBuf>,

    /// Name of the master file (solution or top-level makefile)
    #[arg(short, long)]
    pub master_file: Option<String>,

    /// Only use these generators
    #[arg(short, long, num_args = 1..)]
    pub generators: Vec<String>,
}

#[derive(Args)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Regenerate every project
    #[arg(short, long)]
    pub force: bool,

    /// Regenerate the master file
    #[arg(long)]
    pub force_master: bool,

    /// Don't regenerate any project, only master files
    #[arg(long)]
    pub skip_projects: bool,

    /// Print how long parsing projects took
    #[arg(short, long)]
    pub time: bool,

    /// Number of parallel jobs
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

#[derive(Args)]
pub struct StatusArgs {
    #[command(flatten)]
    pub project: ProjectArgs,
}

#[derive(Args)]
pub struct CleanArgs {
    /// Root directory
    #[arg(short = 'd', long, default_value = ".")]
    pub root_dir: PathBuf,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: Shell,
}
