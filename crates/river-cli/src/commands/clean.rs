//! Clean command implementation

use anyhow::{Context, Result};
use colored::Colorize;
use river_core::stages::clean::{self, CleanOutcome};
use std::process::ExitCode;

use super::{confirmer, load_config};

/// Run the clean command
pub fn run(config_path: &str, yes: bool) -> Result<ExitCode> {
    let config = load_config(config_path)?;
    let confirm = confirmer(yes);
    let outcome = clean::run(&config, confirm.as_ref())
        .with_context(|| format!("Failed to clean {}", config.work_dir.display()))?;

    let work_dir = config.work_dir.display();
    match outcome {
        CleanOutcome::NothingToClean => println!("{} {} does not exist", "Skipped:".dimmed(), work_dir),
        CleanOutcome::Declined => println!("{} {} kept", "Skipped:".yellow(), work_dir),
        CleanOutcome::Removed => println!("{} {} deleted", "SUCCESS".green().bold(), work_dir),
    }
    Ok(ExitCode::SUCCESS)
}
