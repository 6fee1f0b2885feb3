//! Setup command implementation
//!
//! Writes a sample configuration and scaffolds plugin directories.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use river_core::stages::setup::{self, ScaffoldRole};
use std::path::Path;
use std::process::ExitCode;

/// Run the setup command
pub fn run(
    dir: &str,
    config: bool,
    generator: Option<&str>,
    dut: Option<&str>,
    reference: Option<&str>,
) -> Result<ExitCode> {
    let plugins: Vec<(ScaffoldRole, String)> = [
        (ScaffoldRole::Generator, generator),
        (ScaffoldRole::Target, dut),
        (ScaffoldRole::Reference, reference),
    ]
    .into_iter()
    .filter_map(|(role, name)| name.map(|n| (role, n.to_string())))
    .collect();

    if !config && plugins.is_empty() {
        bail!("nothing to set up; pass --config, --gen, --dut or --ref");
    }

    let outcome = setup::run(Path::new(dir), config, &plugins)
        .with_context(|| format!("Setup failed in {}", dir))?;

    for path in &outcome.written {
        println!("  {} {}", "+".green(), path.display());
    }
    for path in &outcome.skipped {
        println!("  {} {} (exists)", "=".dimmed(), path.display());
    }
    println!(
        "{} {} file(s) written",
        "SUCCESS".green().bold(),
        outcome.written.len()
    );
    Ok(ExitCode::SUCCESS)
}
