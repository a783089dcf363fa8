//! `qpc generators` command

use anyhow::Result;

use qpc::generator::GeneratorRegistry;

pub fn execute() -> Result<()> {
    let registry = GeneratorRegistry::new();

    for generator in registry.all() {
        let master = if generator.generates_master_file() {
            " (master file)"
        } else {
            ""
        };
        println!(
            "{:<10} {}{}",
            generator.id(),
            generator.supported_platforms().join(", "),
            master
        );
        if !generator.description().is_empty() {
            println!("           {}", generator.description());
        }
    }

    Ok(())
}
