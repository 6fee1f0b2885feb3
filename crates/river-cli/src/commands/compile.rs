//! Compile command implementation
//!
//! Drives targets and references, compares their dumps and prints the
//! verdict summary.

use anyhow::{Context, Result};
use colored::Colorize;
use river_core::stages::compile::{self, CompileOptions, StageFlag};
use river_core::PluginCatalog;
use std::process::ExitCode;

use super::load_config;

/// Run the compile command
///
/// Local per-test failures do not change the exit code; only fatal pipeline
/// errors do.
pub fn run(
    config_path: &str,
    test_list: &str,
    dut_stage: StageFlag,
    ref_stage: StageFlag,
    coverage: bool,
    compare: bool,
) -> Result<ExitCode> {
    let config = load_config(config_path)?;
    println!("{} {}", "Test list:".cyan().bold(), test_list);
    println!(
        "{} {} ({}), {} {} ({})",
        "Target:".dimmed(),
        display_list(&config.targets),
        dut_stage,
        "Reference:".dimmed(),
        display_list(&config.references),
        ref_stage
    );

    let options = CompileOptions {
        test_list: test_list.into(),
        dut_stage,
        ref_stage,
        coverage,
        compare,
    };
    let outcome = compile::run(&config, &PluginCatalog::new(), &options)
        .with_context(|| format!("Compile stage failed for {}", test_list))?;

    for diagnostic in &outcome.diagnostics {
        println!("  {} {}", "!".yellow(), diagnostic);
    }

    let summary = outcome.summary;
    println!(
        "{} {} passed, {} failed, {} unavailable ({} total)",
        "Summary:".cyan().bold(),
        summary.passed.to_string().green(),
        summary.failed.to_string().red(),
        summary.unavailable.to_string().yellow(),
        summary.total
    );
    println!("{} {}", "Report:".dimmed(), outcome.report.display());
    Ok(ExitCode::SUCCESS)
}

fn display_list(names: &[String]) -> String {
    if names.is_empty() {
        "disabled".to_string()
    } else {
        names.join(", ")
    }
}
