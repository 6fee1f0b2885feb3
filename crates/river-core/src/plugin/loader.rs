//! Plugin resolution by role and name.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::subprocess::{SubprocessDevice, SubprocessGenerator};
use super::{DevicePlugin, GeneratorPlugin, PluginError, PluginKind, PluginManifest};
use super::manifest::MANIFEST_EXTENSION;

/// Builds a fresh generator instance.
pub type GeneratorFactory = Box<dyn Fn() -> Box<dyn GeneratorPlugin>>;

/// Builds a fresh device instance.
pub type DeviceFactory = Box<dyn Fn() -> Box<dyn DevicePlugin>>;

/// A resolved plugin and where it came from.
///
/// Descriptors are created per stage invocation and dropped with it.
pub struct PluginDescriptor<P: ?Sized> {
    /// Role the plugin was loaded for.
    pub kind: PluginKind,
    /// Configured plugin name.
    pub name: String,
    /// Plugin directory; `None` for in-process plugins.
    pub location: Option<PathBuf>,
    /// The live plugin.
    pub instance: Box<P>,
}

impl<P: ?Sized> PluginDescriptor<P> {
    /// Directory hooks resolve relative paths against.
    pub fn module_dir(&self) -> PathBuf {
        self.location.clone().unwrap_or_else(|| PathBuf::from("."))
    }
}

impl<P: ?Sized> fmt::Debug for PluginDescriptor<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

/// Resolves plugins by name.
///
/// In-process factories take precedence over the filesystem convention
/// `<search_path>/<name>_plugin/<name>_plugin.json`. Nothing is cached:
/// every load builds a new instance.
#[derive(Default)]
pub struct PluginCatalog {
    generators: HashMap<String, GeneratorFactory>,
    devices: HashMap<String, DeviceFactory>,
}

impl PluginCatalog {
    /// Creates a catalog with no in-process plugins.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an in-process generator.
    pub fn register_generator<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn GeneratorPlugin> + 'static,
    {
        self.generators.insert(name.into(), Box::new(factory));
    }

    /// Registers an in-process device.
    pub fn register_device<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn DevicePlugin> + 'static,
    {
        self.devices.insert(name.into(), Box::new(factory));
    }

    /// Returns true if an in-process plugin of this kind is registered.
    pub fn has_factory(&self, kind: PluginKind, name: &str) -> bool {
        match kind {
            PluginKind::Generator => self.generators.contains_key(name),
            PluginKind::Device => self.devices.contains_key(name),
        }
    }

    /// Loads a generator.
    pub fn load_generator(
        &self,
        name: &str,
        search_path: &Path,
    ) -> Result<PluginDescriptor<dyn GeneratorPlugin>, PluginError> {
        if let Some(factory) = self.generators.get(name) {
            debug!("using in-process generator '{}'", name);
            return Ok(PluginDescriptor {
                kind: PluginKind::Generator,
                name: name.to_string(),
                location: None,
                instance: factory(),
            });
        }

        let (dir, manifest) = load_manifest(PluginKind::Generator, name, search_path)?;
        Ok(PluginDescriptor {
            kind: PluginKind::Generator,
            name: name.to_string(),
            instance: Box::new(SubprocessGenerator::new(name, dir.clone(), manifest)),
            location: Some(dir),
        })
    }

    /// Loads a device.
    pub fn load_device(
        &self,
        name: &str,
        search_path: &Path,
    ) -> Result<PluginDescriptor<dyn DevicePlugin>, PluginError> {
        if let Some(factory) = self.devices.get(name) {
            debug!("using in-process device '{}'", name);
            return Ok(PluginDescriptor {
                kind: PluginKind::Device,
                name: name.to_string(),
                location: None,
                instance: factory(),
            });
        }

        let (dir, manifest) = load_manifest(PluginKind::Device, name, search_path)?;
        Ok(PluginDescriptor {
            kind: PluginKind::Device,
            name: name.to_string(),
            instance: Box::new(SubprocessDevice::new(name, dir.clone(), manifest)),
            location: Some(dir),
        })
    }
}

impl fmt::Debug for PluginCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut generators: Vec<_> = self.generators.keys().collect();
        let mut devices: Vec<_> = self.devices.keys().collect();
        generators.sort();
        devices.sort();
        f.debug_struct("PluginCatalog")
            .field("generators", &generators)
            .field("devices", &devices)
            .finish()
    }
}

/// Conventional plugin symbol for a configured name.
pub fn plugin_symbol(name: &str) -> String {
    format!("{}_plugin", name)
}

/// Conventional manifest path for a plugin.
pub fn manifest_path(search_path: &Path, name: &str) -> PathBuf {
    let symbol = plugin_symbol(name);
    search_path
        .join(&symbol)
        .join(format!("{}.{}", symbol, MANIFEST_EXTENSION))
}

fn load_manifest(
    kind: PluginKind,
    name: &str,
    search_path: &Path,
) -> Result<(PathBuf, PluginManifest), PluginError> {
    let path = manifest_path(search_path, name);
    debug!("loading {} plugin from {}", kind, path.display());
    if !path.is_file() {
        return Err(PluginError::PluginNotFound {
            kind,
            name: name.to_string(),
            path,
        });
    }

    let manifest = PluginManifest::load(&path)?;
    manifest.validate(&plugin_symbol(name), kind, &path)?;

    let dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| search_path.to_path_buf());
    Ok((dir, manifest))
}
