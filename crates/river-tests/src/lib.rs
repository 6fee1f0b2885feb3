//! RiVer Core End-to-End Test Infrastructure
//!
//! This crate provides integration tests for the pipeline:
//!
//! - Generation: generator suites -> `test_list.yaml`
//! - Compile/Run: devices -> dumps and execution reports -> verdicts
//! - Merge: several run directories -> one relocated registry
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p river-tests
//!
//! # Subprocess plugin tests need a POSIX `sh`
//! cargo test -p river-tests --test subprocess_plugins
//! ```
//!
//! ## Scripted plugins
//!
//! The `plugins` module provides in-process generator and device plugins
//! whose behavior is fixed up front, so a test decides exactly which dumps
//! exist and what they contain:
//!
//! ```rust,ignore
//! use river_tests::plugins::{ScriptedDevice, ScriptedGenerator};
//!
//! let dut = ScriptedDevice::target().dump("t1", "x1 0x1\n");
//! let reference = ScriptedDevice::reference().dump("t1", "x1 0x1\n");
//! let catalog = river_tests::plugins::catalog(ScriptedGenerator::new(&["t1", "t2"]), dut, reference);
//! ```

pub mod fixtures;
pub mod plugins;

pub use fixtures::RunFixture;
pub use plugins::{catalog, HookLog, ScriptedDevice, ScriptedGenerator};
