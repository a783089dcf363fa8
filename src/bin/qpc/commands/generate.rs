//! `qpc generate` command

use std::io::IsTerminal;

use anyhow::Result;

use crate::cli::GenerateArgs;
use crate::commands::resolve_options;
use qpc::ops::{generate, MasterOutcome, ProjectOutcome};
use qpc::parser::{ProjectParser, TomlParser};

pub fn execute(args: GenerateArgs, verbose: bool) -> Result<bool> {
    let (mut opts, registry) = resolve_options(args.project)?;
    opts.force = args.force;
    opts.force_master = args.force_master;
    opts.skip_projects = args.skip_projects;
    // Jobs: CLI > config > sequential
    opts.jobs = args.jobs.or(opts.jobs);
    opts.progress = !verbose && std::io::stderr().is_terminal();

    let parser = TomlParser::new();
    let summary = generate(&opts, &registry, &parser)?;

    if args.time {
        println!();
        println!("Finished Parsing Projects");
        println!("\tTime: {:.4}", summary.elapsed.as_secs_f64());
        println!("\tParse Count: {}", parser.parse_count());
    }

    for report in &summary.projects {
        match &report.outcome {
            ProjectOutcome::Regenerated => {
                eprintln!(" Regenerated {}", report.script.display())
            }
            ProjectOutcome::MissingScript(_) => {
                eprintln!("     Missing {}", report.script.display())
            }
            ProjectOutcome::Failed(e) => eprintln!("      Failed {}", e),
            ProjectOutcome::Skipped | ProjectOutcome::NoOutput => {}
        }
    }
    for master in &summary.masters {
        match &master.outcome {
            MasterOutcome::Regenerated => eprintln!("     Created {}", master.path.display()),
            MasterOutcome::Failed(e) => eprintln!("      Failed {}", e),
            MasterOutcome::Current => {}
        }
    }

    let failed = summary.failures().len() + summary.missing().len();
    eprintln!(
        "    Finished {} regenerated, {} up to date, {} failed",
        summary.regenerated(),
        summary.skipped(),
        failed
    );

    Ok(!summary.has_failures())
}
