//! CLI argument definitions for the RiVer Core command-line interface.
//!
//! All `#[derive(Parser)]` and `#[derive(Subcommand)]` types are defined here,
//! keeping `main.rs` focused on dispatch logic.

use clap::{Parser, Subcommand, ValueEnum};
use river_core::stages::compile::StageFlag;

/// RiVer Core - RISC-V core verification framework
#[derive(Parser, Debug)]
#[command(name = "river_core")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Log level for library and CLI messages
    #[arg(long, global = true, value_enum, default_value_t = Verbosity::Info)]
    pub verbosity: Verbosity,

    #[command(subcommand)]
    pub command: Commands,
}

/// Log levels accepted by `--verbosity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Verbosity {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Verbosity {
    /// Level name as understood by `EnvFilter`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Verbosity::Error => "error",
            Verbosity::Warn => "warn",
            Verbosity::Info => "info",
            Verbosity::Debug => "debug",
            Verbosity::Trace => "trace",
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run every configured generator suite and write the test list
    Generate {
        /// Path to river_core.toml
        #[arg(short, long)]
        config: String,
    },

    /// Build and run targets and references, then compare their dumps
    Compile {
        /// Path to river_core.toml
        #[arg(short, long)]
        config: String,

        /// Test list written by `generate`
        #[arg(short, long)]
        test_list: String,

        /// How far to drive the device under test (init, build, run, none)
        #[arg(long, default_value_t = StageFlag::Run)]
        dut_stage: StageFlag,

        /// How far to drive the reference model (init, build, run, none)
        #[arg(long, default_value_t = StageFlag::Run)]
        ref_stage: StageFlag,

        /// Pass the coverage settings to devices
        #[arg(long)]
        coverage: bool,

        /// Skip dump comparison; every verdict stays Unavailable
        #[arg(long)]
        no_compare: bool,
    },

    /// Merge several run directories and their coverage databases
    Merge {
        /// Path to river_core.toml
        #[arg(short, long)]
        config: String,

        /// Output directory for the merged run
        #[arg(short, long)]
        output: String,

        /// Run directories to merge
        #[arg(required = true)]
        sources: Vec<String>,

        /// Answer yes to every confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Delete the configured work directory
    Clean {
        /// Path to river_core.toml
        #[arg(short, long)]
        config: String,

        /// Answer yes to the confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Write a sample configuration and scaffold plugin directories
    Setup {
        /// Write river_core.toml
        #[arg(long)]
        config: bool,

        /// Scaffold a generator plugin with this name
        #[arg(long = "gen")]
        generator: Option<String>,

        /// Scaffold a device-under-test plugin with this name
        #[arg(long)]
        dut: Option<String>,

        /// Scaffold a reference plugin with this name
        #[arg(long = "ref")]
        reference: Option<String>,

        /// Directory to write into (default: current directory)
        #[arg(short, long, default_value = ".")]
        dir: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cli_parses_compile_defaults() {
        let cli = Cli::try_parse_from([
            "river_core",
            "compile",
            "-c",
            "river_core.toml",
            "-t",
            "work/test_list.yaml",
        ])
        .unwrap();
        assert_eq!(cli.verbosity, Verbosity::Info);
        match cli.command {
            Commands::Compile {
                config,
                test_list,
                dut_stage,
                ref_stage,
                coverage,
                no_compare,
            } => {
                assert_eq!(config, "river_core.toml");
                assert_eq!(test_list, "work/test_list.yaml");
                assert_eq!(dut_stage, StageFlag::Run);
                assert_eq!(ref_stage, StageFlag::Run);
                assert!(!coverage);
                assert!(!no_compare);
            }
            _ => panic!("expected compile command"),
        }
    }

    #[test]
    fn test_cli_parses_compile_stages() {
        let cli = Cli::try_parse_from([
            "river_core",
            "--verbosity",
            "debug",
            "compile",
            "-c",
            "c.toml",
            "-t",
            "t.yaml",
            "--dut-stage",
            "none",
            "--ref-stage",
            "build",
            "--no-compare",
        ])
        .unwrap();
        assert_eq!(cli.verbosity, Verbosity::Debug);
        match cli.command {
            Commands::Compile {
                dut_stage,
                ref_stage,
                no_compare,
                ..
            } => {
                assert_eq!(dut_stage, StageFlag::Disabled);
                assert_eq!(ref_stage, StageFlag::Build);
                assert!(no_compare);
            }
            _ => panic!("expected compile command"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_stage() {
        let result = Cli::try_parse_from([
            "river_core",
            "compile",
            "-c",
            "c.toml",
            "-t",
            "t.yaml",
            "--dut-stage",
            "simulate",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parses_merge() {
        let cli = Cli::try_parse_from([
            "river_core",
            "merge",
            "-c",
            "c.toml",
            "-o",
            "merged",
            "run1",
            "run2",
            "-y",
        ])
        .unwrap();
        match cli.command {
            Commands::Merge {
                output,
                sources,
                yes,
                ..
            } => {
                assert_eq!(output, "merged");
                assert_eq!(sources, vec!["run1".to_string(), "run2".to_string()]);
                assert!(yes);
            }
            _ => panic!("expected merge command"),
        }
    }

    #[test]
    fn test_cli_merge_requires_sources() {
        let result = Cli::try_parse_from(["river_core", "merge", "-c", "c.toml", "-o", "out"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parses_setup() {
        let cli = Cli::try_parse_from([
            "river_core",
            "setup",
            "--config",
            "--gen",
            "aapg",
            "--ref",
            "spike",
        ])
        .unwrap();
        match cli.command {
            Commands::Setup {
                config,
                generator,
                dut,
                reference,
                dir,
            } => {
                assert!(config);
                assert_eq!(generator.as_deref(), Some("aapg"));
                assert_eq!(dut, None);
                assert_eq!(reference.as_deref(), Some("spike"));
                assert_eq!(dir, ".");
            }
            _ => panic!("expected setup command"),
        }
    }
}
