//! Test registry: the canonical mapping from test name to test metadata.
//!
//! The registry is the single payload that flows between pipeline stages. It
//! keeps insertion order so a YAML round-trip reproduces the same file, which
//! keeps diffs between runs readable.

mod entry;


pub use entry::{TestEntry, Verdict};

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::config::CollisionPolicy;
use crate::error::{RiverError, RiverResult};
use crate::report::RunSummary;
use crate::validation::validate_registry_value;

/// File name of the serialized registry inside a work directory.
pub const TEST_LIST_FILE: &str = "test_list.yaml";

/// Ordered mapping from test name to [`TestEntry`].
#[derive(Debug, Clone, Default)]
pub struct TestRegistry {
    entries: Vec<(String, TestEntry)>,
    index: HashMap<String, usize>,
}

/// What a [`TestRegistry::merge`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Entries that were new.
    pub added: usize,
    /// Existing entries overwritten by the incoming fragment.
    pub replaced: usize,
    /// Incoming entries dropped because an earlier one won.
    pub kept: usize,
}

impl TestRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of tests.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the registry holds no tests.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true if a test with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Gets an entry by test name.
    pub fn get(&self, name: &str) -> Option<&TestEntry> {
        self.index.get(name).map(|&i| &self.entries[i].1)
    }

    /// Gets a mutable entry by test name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut TestEntry> {
        let i = self.index.get(name).copied()?;
        Some(&mut self.entries[i].1)
    }

    /// Inserts an entry, returning the previous one for this name.
    ///
    /// Replacing an existing test keeps its original position.
    pub fn insert(&mut self, name: impl Into<String>, entry: TestEntry) -> Option<TestEntry> {
        let name = name.into();
        match self.index.get(&name).copied() {
            Some(i) => Some(std::mem::replace(&mut self.entries[i].1, entry)),
            None => {
                self.index.insert(name.clone(), self.entries.len());
                self.entries.push((name, entry));
                None
            }
        }
    }

    /// Removes an entry by name.
    ///
    /// The entry's working directory is left on disk; reclaiming it is an
    /// explicit, confirmed operation.
    pub fn remove(&mut self, name: &str) -> Option<TestEntry> {
        let i = self.index.remove(name)?;
        let (_, entry) = self.entries.remove(i);
        for slot in self.index.values_mut() {
            if *slot > i {
                *slot -= 1;
            }
        }
        Some(entry)
    }

    /// Iterates over `(name, entry)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TestEntry)> {
        self.entries.iter().map(|(n, e)| (n.as_str(), e))
    }

    /// Iterates mutably over `(name, entry)` pairs in insertion order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut TestEntry)> {
        self.entries.iter_mut().map(|(n, e)| (n.as_str(), e))
    }

    /// Iterates over test names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    /// Resets every verdict to `Unavailable`.
    pub fn reset_verdicts(&mut self) {
        for (_, entry) in self.entries.iter_mut() {
            entry.result = Verdict::Unavailable;
        }
    }

    /// Counts verdicts across the registry.
    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary::default();
        for (_, entry) in &self.entries {
            summary.record(entry.result);
        }
        summary
    }

    /// Merges a fragment into this registry under a collision policy.
    ///
    /// `source` names where the fragment came from (a suite or a run
    /// directory) and is used in diagnostics.
    pub fn merge(
        &mut self,
        fragment: TestRegistry,
        policy: CollisionPolicy,
        source: &str,
    ) -> RiverResult<MergeStats> {
        let mut stats = MergeStats::default();
        for (name, entry) in fragment.entries {
            if !self.contains(&name) {
                self.insert(name, entry);
                stats.added += 1;
                continue;
            }
            match policy {
                CollisionPolicy::Error => {
                    return Err(RiverError::Collision {
                        test: name,
                        origin: source.to_string(),
                    });
                }
                CollisionPolicy::FirstWins => {
                    debug!("keeping earlier definition of '{}' over {}", name, source);
                    stats.kept += 1;
                }
                CollisionPolicy::LastWins => {
                    warn!("test '{}' redefined by {}; overwriting", name, source);
                    self.insert(name, entry);
                    stats.replaced += 1;
                }
            }
        }
        Ok(stats)
    }

    /// Parses and schema-validates a registry from YAML text.
    ///
    /// `origin` is only used to label errors.
    pub fn from_yaml_str(yaml: &str, origin: &Path) -> RiverResult<Self> {
        let value: serde_yaml::Value =
            serde_yaml::from_str(yaml).map_err(|e| RiverError::yaml(origin, e))?;
        if value.is_null() {
            return Ok(Self::new());
        }
        let errors = validate_registry_value(&value);
        if !errors.is_empty() {
            return Err(RiverError::Validation {
                path: origin.to_path_buf(),
                errors,
            });
        }
        serde_yaml::from_value(value).map_err(|e| RiverError::yaml(origin, e))
    }

    /// Serializes the registry to YAML.
    pub fn to_yaml_string(&self) -> RiverResult<String> {
        serde_yaml::to_string(self).map_err(|e| RiverError::yaml(TEST_LIST_FILE, e))
    }

    /// Loads and validates a registry file.
    pub fn load(path: &Path) -> RiverResult<Self> {
        let yaml = fs::read_to_string(path).map_err(|e| RiverError::io(path, e))?;
        let registry = Self::from_yaml_str(&yaml, path)?;
        debug!("loaded {} test(s) from {}", registry.len(), path.display());
        Ok(registry)
    }

    /// Writes the registry file, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> RiverResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| RiverError::io(parent, e))?;
        }
        let yaml = serde_yaml::to_string(self).map_err(|e| RiverError::yaml(path, e))?;
        fs::write(path, yaml).map_err(|e| RiverError::io(path, e))?;
        Ok(())
    }
}

impl PartialEq for TestRegistry {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Eq for TestRegistry {}

impl FromIterator<(String, TestEntry)> for TestRegistry {
    fn from_iter<I: IntoIterator<Item = (String, TestEntry)>>(iter: I) -> Self {
        let mut registry = Self::new();
        for (name, entry) in iter {
            registry.insert(name, entry);
        }
        registry
    }
}

impl Serialize for TestRegistry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, entry) in &self.entries {
            map.serialize_entry(name, entry)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for TestRegistry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RegistryVisitor;

        impl<'de> Visitor<'de> for RegistryVisitor {
            type Value = TestRegistry;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a mapping from test name to test entry")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut registry = TestRegistry::new();
                while let Some((name, entry)) = access.next_entry::<String, TestEntry>()? {
                    if registry.insert(name.clone(), entry).is_some() {
                        return Err(serde::de::Error::custom(format!(
                            "duplicate test name '{}'",
                            name
                        )));
                    }
                }
                Ok(registry)
            }

            fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
                Ok(TestRegistry::new())
            }
        }

        deserializer.deserialize_map(RegistryVisitor)
    }
}
