//! Generate command implementation
//!
//! Runs every configured generator suite and writes the test list.

use anyhow::{Context, Result};
use colored::Colorize;
use river_core::stages::generate;
use river_core::PluginCatalog;
use std::process::ExitCode;

use super::load_config;

/// Run the generate command
///
/// # Arguments
/// * `config_path` - Path to river_core.toml
///
/// # Returns
/// Exit code: 0 once the test list is written
pub fn run(config_path: &str) -> Result<ExitCode> {
    let config = load_config(config_path)?;
    println!("{} {}", "Generating:".cyan().bold(), config.generators.join(", "));

    let outcome = generate::run(&config, &PluginCatalog::new()).context("Generation failed")?;

    for suite in &outcome.suites {
        println!(
            "  {} {} ({} test(s), {} replaced, {} kept)",
            "+".green(),
            suite.name,
            suite.tests,
            suite.stats.replaced,
            suite.stats.kept
        );
    }
    println!(
        "{} {} test(s) written to {}",
        "SUCCESS".green().bold(),
        outcome.registry.len(),
        outcome.test_list.display()
    );
    Ok(ExitCode::SUCCESS)
}
