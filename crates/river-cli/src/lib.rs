//! RiVer Core CLI library.
//!
//! This crate provides the command implementations behind the `river_core`
//! binary, plus logging setup shared by every command.

pub mod cli_args;
pub mod commands;
pub mod logging;
