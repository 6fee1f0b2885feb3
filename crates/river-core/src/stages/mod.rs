//! Pipeline stages.
//!
//! Each stage takes the immutable [`RiverConfig`](crate::RiverConfig) and a
//! [`PluginCatalog`](crate::PluginCatalog) explicitly and loads the plugins
//! it needs for the duration of the call only.

pub mod clean;
pub mod compile;
pub mod generate;
pub mod merge;
pub mod reconcile;
pub mod setup;
