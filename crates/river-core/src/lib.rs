//! RiVer Core orchestration library
//!
//! This crate drives pluggable test-generator, device-under-test and
//! reference-model tools through a fixed lifecycle, then reconciles their
//! outputs into per-test verdicts and merges coverage databases across runs.
//!
//! # Overview
//!
//! A verification run flows strictly forward:
//!
//! 1. **Generation** ([`stages::generate`]): every configured generator suite
//!    runs `pre_gen -> gen -> post_gen` and contributes a [`TestRegistry`]
//!    fragment. The merged registry is schema-validated and persisted as
//!    `test_list.yaml`.
//! 2. **Compile/Run** ([`stages::compile`]): every configured target and
//!    reference runs `init -> build -> run`, writing per-test dumps and a
//!    JSON-lines execution report.
//! 3. **Reconciliation** ([`stages::reconcile`]): device and reference dumps
//!    are compared byte-for-byte and each entry's [`Verdict`] is updated.
//! 4. **Merge** ([`stages::merge`]): an independent path that folds several
//!    prior run directories into one and merges their coverage databases.
//!
//! # Example
//!
//! ```ignore
//! use river_core::{PluginCatalog, RiverConfig};
//! use river_core::stages::generate;
//!
//! let config = RiverConfig::load("river_core.toml".as_ref())?;
//! let catalog = PluginCatalog::new();
//! let outcome = generate::run(&config, &catalog)?;
//! println!("{} tests written to {}", outcome.registry.len(), outcome.test_list.display());
//! ```
//!
//! # Modules
//!
//! - [`config`]: Immutable configuration loaded from TOML
//! - [`confirm`]: Confirmation capability for destructive operations
//! - [`coverage`]: Coverage artifacts and per-tool discovery
//! - [`error`]: Error types and stable error codes
//! - [`plugin`]: Plugin contracts, sessions and the loader
//! - [`registry`]: Test registry data model and YAML persistence
//! - [`regression`]: Persisted per-suite regression list
//! - [`report`]: Execution report parsing and run summaries
//! - [`stages`]: Pipeline stages
//! - [`validation`]: Test registry schema validation

pub mod config;
pub mod confirm;
pub mod coverage;
pub mod error;
pub mod plugin;
pub mod registry;
pub mod regression;
pub mod report;
pub mod stages;
pub mod validation;

mod fsutil;

// Re-export commonly used types at the crate root
pub use config::{CollisionPolicy, CoverageConfig, RiverConfig, RoleConfig};
pub use confirm::{AlwaysNo, AlwaysYes, Confirm, InteractivePrompt};
pub use coverage::{CoverageArtifact, CoverageTool, ReportKind};
pub use error::{RiverError, RiverResult};
pub use plugin::{
    DeviceInit, DevicePlugin, DeviceRole, DeviceSession, GenRequest, GeneratorPlugin,
    GeneratorSession, PluginCatalog, PluginDescriptor, PluginError, PluginKind,
};
pub use registry::{TestEntry, TestRegistry, Verdict};
pub use report::{ExecutionReport, OutcomeCounts, RecordFilter, RunSummary};
pub use validation::{is_plain_test_name, validate_registry_value, SchemaError};

/// Version string embedded in summary reports.
pub const RIVER_VERSION: &str = env!("CARGO_PKG_VERSION");
