//! `qpc status` command

use anyhow::Result;

use crate::cli::StatusArgs;
use crate::commands::resolve_options;
use qpc::ops::status;
use qpc::parser::TomlParser;

pub fn execute(args: StatusArgs) -> Result<bool> {
    let (opts, registry) = resolve_options(args.project)?;
    let report = status(&opts, &registry, &TomlParser::new())?;

    for project in &report.projects {
        if project.is_current() {
            println!("  up to date  {}", project.script.display());
        } else if !project.staleness.is_current() {
            println!("       stale  {} ({})", project.script.display(), project.staleness);
        } else {
            println!(
                "       stale  {} (missing {} output)",
                project.script.display(),
                project.missing_outputs.join(", ")
            );
        }
    }
    for master in &report.masters {
        let state = if master.current { "up to date" } else { "stale" };
        println!("{:>12}  {} [{}]", state, master.path.display(), master.generator);
    }

    let stale = report.stale_count();
    if stale == 0 {
        eprintln!("Everything is up to date");
    } else {
        eprintln!("{} item(s) would be regenerated", stale);
    }
    Ok(true)
}
