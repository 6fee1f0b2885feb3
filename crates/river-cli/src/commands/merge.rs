//! Merge command implementation
//!
//! Folds several run directories into one output directory.

use anyhow::{Context, Result};
use colored::Colorize;
use river_core::stages::merge::{self, MergeOutcome};
use river_core::PluginCatalog;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use super::{confirmer, load_config};

/// Run the merge command
///
/// Declining to overwrite an existing output is not an error.
pub fn run(config_path: &str, output: &str, sources: &[String], yes: bool) -> Result<ExitCode> {
    let config = load_config(config_path)?;
    let sources: Vec<PathBuf> = sources.iter().map(PathBuf::from).collect();
    println!(
        "{} {} source(s) into {}",
        "Merging:".cyan().bold(),
        sources.len(),
        output
    );

    let confirm = confirmer(yes);
    let outcome = merge::run(
        &config,
        &PluginCatalog::new(),
        &sources,
        Path::new(output),
        confirm.as_ref(),
    )
    .with_context(|| format!("Failed to merge into {}", output))?;

    match outcome {
        MergeOutcome::Declined => {
            println!("{} {} left untouched", "Skipped:".yellow(), output);
        }
        MergeOutcome::Merged(summary) => {
            println!(
                "{} {} test(s), {} coverage database(s)",
                "SUCCESS".green().bold(),
                summary.registry.len(),
                summary.artifacts.len()
            );
            for html in &summary.merged_html {
                println!("  {} {}", "html".dimmed(), html.display());
            }
            println!("{} {}", "Test list:".dimmed(), summary.test_list.display());
            if summary.sources_removed {
                println!("{} source directories deleted", "Cleaned:".dimmed());
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}
