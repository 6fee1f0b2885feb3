//! RiVer Core CLI - Command-line interface for RISC-V core verification
//!
//! This binary drives generator, device-under-test and reference plugins
//! through generation, compile/run, comparison and coverage merge.

use clap::Parser;
use std::process::ExitCode;

use river_cli::cli_args::{Cli, Commands};
use river_cli::{commands, logging};

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbosity);

    let result = match cli.command {
        Commands::Generate { config } => commands::generate::run(&config),
        Commands::Compile {
            config,
            test_list,
            dut_stage,
            ref_stage,
            coverage,
            no_compare,
        } => commands::compile::run(
            &config,
            &test_list,
            dut_stage,
            ref_stage,
            coverage,
            !no_compare,
        ),
        Commands::Merge {
            config,
            output,
            sources,
            yes,
        } => commands::merge::run(&config, &output, &sources, yes),
        Commands::Clean { config, yes } => commands::clean::run(&config, yes),
        Commands::Setup {
            config,
            generator,
            dut,
            reference,
            dir,
        } => commands::setup::run(
            &dir,
            config,
            generator.as_deref(),
            dut.as_deref(),
            reference.as_deref(),
        ),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {:#}", colored::Colorize::red("error"), e);
            ExitCode::from(1)
        }
    }
}
