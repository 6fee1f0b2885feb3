//! Command implementations.

pub mod clean;
pub mod compile;
pub mod generate;
pub mod merge;
pub mod setup;

use anyhow::{Context, Result};
use river_core::{AlwaysYes, Confirm, InteractivePrompt, RiverConfig};
use std::path::Path;

/// Loads the configuration named on the command line.
pub(crate) fn load_config(path: &str) -> Result<RiverConfig> {
    RiverConfig::load(Path::new(path)).with_context(|| format!("Failed to load config: {}", path))
}

/// Confirmation source for `--yes`.
pub(crate) fn confirmer(yes: bool) -> Box<dyn Confirm> {
    if yes {
        Box::new(AlwaysYes)
    } else {
        Box::new(InteractivePrompt)
    }
}
