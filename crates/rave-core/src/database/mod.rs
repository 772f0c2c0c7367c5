//! The plugin database.
//!
//! [`PluginDatabase`] owns the ordered list of registered plugins and the
//! shared libraries backing them. It discovers plugins on the configured
//! search paths and brokers interface creation by `(type, name)`.
//!
//! Registration order is priority order: the first plugin that provides a
//! requested interface and succeeds in constructing it wins. A plugin that
//! fails to construct an interface has that interface blacklisted, and the
//! scan moves on to the next provider.
//!
//! # Locking
//!
//! One mutex guards the plugin list and the library map together. Interface
//! construction runs on a snapshot of the list with the lock released, so
//! several threads may call into the same plugin concurrently.
//!
//! # Library lifetime
//!
//! Shared libraries are never unloaded on Unix or macOS, even when their
//! plugin is removed from the list. See [`LibraryHandle`].

pub mod discovery;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::{env_vars, PluginDbConfig};
use crate::error::{PluginError, Result};
use crate::interface::{CreatedInterface, EnvironmentPtr, InterfaceType, KinBody};
use crate::plugin::{
    split_interface_name, CreatePluginFn, InterfaceMap, LibraryHandle, PluginBox,
    PluginDescriptor, PluginInfo, PluginSource, VirtualFactory, VirtualPlugin,
    CREATE_PLUGIN_SYMBOL, HOST_VERSION,
};

use discovery::{collect_candidates, PLUGIN_EXTENSION};

#[derive(Default)]
struct Inner {
    plugins: Vec<Arc<PluginDescriptor>>,
    /// Canonical library path -> handle. Entries are never removed.
    libraries: HashMap<PathBuf, LibraryHandle>,
    search_paths: Vec<PathBuf>,
}

/// Registry of loaded plugins.
#[derive(Default)]
pub struct PluginDatabase {
    inner: Mutex<Inner>,
}

impl PluginDatabase {
    /// Create an empty database. Call [`init`](Self::init) to run discovery.
    pub fn new() -> Self {
        Self::default()
    }

    /// Discover plugins on the paths listed in `RAVE_PLUGINS`.
    ///
    /// When the variable is not set nothing is discovered, not even the
    /// install directory. Returns the number of plugins loaded.
    pub fn init(&self) -> usize {
        match PluginDbConfig::from_env() {
            Some(config) => self.init_with_config(&config),
            None => {
                warn!(
                    category = "plugins",
                    var = env_vars::PLUGINS,
                    "Failed to read plugin search path environment variable"
                );
                0
            }
        }
    }

    /// Discover plugins on the effective search paths of `config`.
    pub fn init_with_config(&self, config: &PluginDbConfig) -> usize {
        let search_paths = config.effective_search_paths();
        self.inner.lock().search_paths = search_paths.clone();

        let mut loaded = 0;
        for path in &search_paths {
            debug!(category = "plugins", path = %path.display(), "Looking for plugins");
            loaded += self.load_plugins_from_path(path, config.recurse);
        }

        info!(
            category = "plugins",
            loaded,
            search_paths = search_paths.len(),
            "Plugin database initialized"
        );
        loaded
    }

    /// Search paths recorded by the last `init`.
    pub fn search_paths(&self) -> Vec<PathBuf> {
        self.inner.lock().search_paths.clone()
    }

    /// Load every candidate under `path`. Returns how many loaded.
    pub fn load_plugins_from_path(&self, path: &Path, recurse: bool) -> usize {
        collect_candidates(path, recurse)
            .iter()
            .filter(|candidate| self.load_plugin_file(candidate).is_ok())
            .count()
    }

    /// Load the shared library at `path` and register the plugin it exports.
    ///
    /// A file that cannot be opened or lacks the entry point is simply not a
    /// plugin, and is only reported at debug level.
    pub fn load_plugin_file(&self, path: &Path) -> Result<Arc<PluginDescriptor>> {
        let library = LibraryHandle::load(path).map_err(|e| {
            debug!(category = "plugins", path = %path.display(), error = %e, "Failed to load shared object");
            e
        })?;

        // SAFETY: the signature is the documented plugin entry point contract.
        let create: CreatePluginFn = unsafe { library.resolve(CREATE_PLUGIN_SYMBOL) }.map_err(|e| {
            debug!(category = "plugins", path = %path.display(), error = %e, "Might not be a plugin");
            e
        })?;

        // SAFETY: `declare_plugin!` catches panics and returns either null or
        // a pointer from `Box::into_raw`.
        let raw = unsafe { create() };
        let source = PluginSource::Dynamic {
            path: path.to_path_buf(),
        };
        let descriptor = unsafe { PluginDescriptor::from_raw(raw, source) }.map_err(|e| {
            warn!(
                category = "plugins",
                path = %path.display(),
                error = %e,
                "Failed to construct a plugin"
            );
            e
        })?;

        check_host_version(&descriptor);
        let descriptor = Arc::new(descriptor);
        let key = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());

        {
            let mut inner = self.inner.lock();
            inner.libraries.entry(key).or_insert(library);
            inner.plugins.push(descriptor.clone());
        }

        debug!(
            category = "plugins",
            plugin = descriptor.name(),
            path = %path.display(),
            "Found plugin"
        );
        Ok(descriptor)
    }

    /// Load, or reload, a plugin by name or path.
    ///
    /// A loaded plugin whose name or path equals `name` is dropped from the
    /// list and loaded again from its path. Otherwise `name` is taken as a
    /// file path, and failing that looked up on the search paths.
    pub fn load_plugin(&self, name: &str) -> bool {
        match self.try_load_plugin(name) {
            Ok(_) => true,
            Err(e @ PluginError::NotFound(_)) => {
                warn!(category = "plugins", plugin = name, error = %e, "Plugin not found on search paths");
                false
            }
            Err(_) => false,
        }
    }

    /// Like [`load_plugin`](Self::load_plugin), returning the new descriptor
    /// or the reason loading failed.
    pub fn try_load_plugin(&self, name: &str) -> Result<Arc<PluginDescriptor>> {
        let existing = {
            let mut inner = self.inner.lock();
            inner
                .plugins
                .iter()
                .position(|p| {
                    p.is_dynamic() && (p.name() == name || p.path() == Some(Path::new(name)))
                })
                .map(|index| inner.plugins.remove(index))
        };

        let path = match existing.as_ref().and_then(|p| p.path()) {
            Some(path) => {
                debug!(category = "plugins", plugin = name, "Reloading plugin");
                path.to_path_buf()
            }
            None => self
                .resolve_plugin_path(name)
                .ok_or_else(|| PluginError::NotFound(name.to_string()))?,
        };
        self.load_plugin_file(&path)
    }

    fn resolve_plugin_path(&self, name: &str) -> Option<PathBuf> {
        let direct = Path::new(name);
        if direct.is_file() {
            return Some(direct.to_path_buf());
        }
        if name.is_empty() {
            return None;
        }

        let file_names = [
            name.to_string(),
            format!("{}.{}", name, PLUGIN_EXTENSION),
            format!("lib{}.{}", name, PLUGIN_EXTENSION),
        ];
        self.search_paths().iter().find_map(|dir| {
            file_names
                .iter()
                .map(|file_name| dir.join(file_name))
                .find(|candidate| candidate.is_file())
        })
    }

    /// Load every on-disk plugin again from its recorded path.
    ///
    /// Fresh descriptors are appended; the existing ones stay registered.
    /// Returns how many loaded.
    pub fn reload_plugins(&self) -> usize {
        let paths: Vec<PathBuf> = self
            .plugins()
            .iter()
            .filter_map(|p| p.path().map(Path::to_path_buf))
            .collect();

        paths
            .iter()
            .filter(|path| self.load_plugin_file(path).is_ok())
            .count()
    }

    /// Register an in-process provider for a single interface.
    pub fn add_virtual_plugin(
        &self,
        interface_type: InterfaceType,
        name: impl Into<String>,
        factory: VirtualFactory,
    ) -> Arc<PluginDescriptor> {
        self.add_plugin(Box::new(VirtualPlugin::new(interface_type, name, factory)))
    }

    /// Register an in-process plugin object.
    pub fn add_plugin(&self, plugin: PluginBox) -> Arc<PluginDescriptor> {
        let descriptor = Arc::new(PluginDescriptor::in_process(plugin));
        self.inner.lock().plugins.push(descriptor.clone());
        debug!(category = "plugins", plugin = descriptor.name(), "Registered in-process plugin");
        descriptor
    }

    /// Create an interface, or `None` if no plugin can provide it.
    pub fn create(
        &self,
        env: &EnvironmentPtr,
        interface_type: InterfaceType,
        name: &str,
    ) -> Option<CreatedInterface> {
        self.try_create(env, interface_type, name).ok()
    }

    /// Create an interface, reporting why it could not be created.
    ///
    /// `name` may carry parameters after the first space; they reach the
    /// plugin untouched. An empty name selects the type's generic
    /// implementation, and an unnamed `KinBody` is built without consulting
    /// any plugin.
    pub fn try_create(
        &self,
        env: &EnvironmentPtr,
        interface_type: InterfaceType,
        name: &str,
    ) -> Result<CreatedInterface> {
        let name = if name.is_empty() {
            if interface_type == InterfaceType::KinBody {
                return Ok(CreatedInterface::new(Arc::new(KinBody::new(env)), "", None, ""));
            }
            interface_type.default_name().unwrap_or_default()
        } else {
            name
        };

        let Some((interface_name, _)) = split_interface_name(name) else {
            warn!(
                category = "plugins",
                interface_type = %interface_type,
                interface_name = name,
                "Interface name needs to start with a valid character"
            );
            return Err(PluginError::InvalidName(name.to_string()));
        };

        for plugin in self.plugins() {
            if !plugin.has_interface(interface_type, interface_name) {
                continue;
            }

            let instance = match plugin.create_interface(interface_type, name, env) {
                Ok(instance) => instance,
                Err(e) => {
                    warn!(
                        category = "plugins",
                        plugin = plugin.name(),
                        interface_type = %interface_type,
                        interface_name = name,
                        error = %e,
                        "Failed to create interface"
                    );
                    plugin.add_bad_interface(interface_type, interface_name);
                    continue;
                }
            };

            let found = instance.interface_type();
            if !found.is_substitutable_for(interface_type) {
                let e = PluginError::TypeMismatch {
                    requested: interface_type,
                    found,
                };
                error!(category = "plugins", plugin = plugin.name(), interface_name = name, error = %e, "Plugin produced wrong interface type");
                plugin.add_bad_interface(interface_type, interface_name);
                continue;
            }

            if interface_type == InterfaceType::Robot && !instance.is_robot() {
                error!(
                    category = "plugins",
                    plugin = plugin.name(),
                    interface_name = name,
                    "Robot interface does not report itself as a robot"
                );
                plugin.add_bad_interface(interface_type, interface_name);
                continue;
            }

            return Ok(CreatedInterface::new(
                instance,
                plugin.name(),
                plugin.path().map(Path::to_path_buf),
                name,
            ));
        }

        warn!(
            category = "plugins",
            env = env.id(),
            interface_type = %interface_type,
            interface_name = name,
            "Failed to create interface"
        );
        Err(PluginError::Unavailable {
            interface_type,
            name: name.to_string(),
        })
    }

    /// Snapshot of the registered plugins in priority order.
    pub fn plugins(&self) -> Vec<Arc<PluginDescriptor>> {
        self.inner.lock().plugins.clone()
    }

    pub fn plugin_count(&self) -> usize {
        self.inner.lock().plugins.len()
    }

    /// All interface names provided by registered plugins, grouped by type.
    ///
    /// Names appear in registration order; blacklisted names are included.
    pub fn loaded_interfaces(&self) -> InterfaceMap {
        let mut merged = InterfaceMap::new();
        for plugin in self.plugins() {
            for (interface_type, names) in plugin.interfaces() {
                merged
                    .entry(*interface_type)
                    .or_default()
                    .extend(names.iter().cloned());
            }
        }
        merged
    }

    /// Whether any plugin can still be asked for `name` of `interface_type`.
    pub fn has_interface(&self, interface_type: InterfaceType, name: &str) -> bool {
        self.plugins()
            .iter()
            .any(|p| p.has_interface(interface_type, name))
    }

    pub fn plugin_info(&self) -> Vec<PluginInfo> {
        self.plugins().iter().map(|p| p.info()).collect()
    }

    /// Notify every plugin that the runtime finished initializing.
    pub fn on_initialized(&self) {
        for plugin in self.plugins() {
            plugin.on_initialized();
        }
    }

    /// Notify every plugin that the runtime is about to shut down.
    pub fn on_pre_destroy(&self) {
        for plugin in self.plugins() {
            plugin.on_pre_destroy();
        }
    }

    /// Tear down and drop every plugin, most recently registered first.
    pub fn destroy(&self) {
        let mut destroyed = 0;
        loop {
            let next = self.inner.lock().plugins.pop();
            let Some(plugin) = next else {
                break;
            };
            plugin.destroy();
            destroyed += 1;
        }

        if destroyed > 0 {
            info!(category = "plugins", destroyed, "Plugin database destroyed");
        }
    }
}

impl Drop for PluginDatabase {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Warn when a plugin was built against a different major host version.
fn check_host_version(descriptor: &PluginDescriptor) {
    let Ok(host) = semver::Version::parse(HOST_VERSION) else {
        return;
    };
    match semver::Version::parse(descriptor.version()) {
        Ok(version) if version.major == host.major => {}
        Ok(version) => warn!(
            category = "plugins",
            plugin = descriptor.name(),
            plugin_version = %version,
            host_version = %host,
            "Plugin was built against a different host version"
        ),
        Err(e) => warn!(
            category = "plugins",
            plugin = descriptor.name(),
            version = descriptor.version(),
            error = %e,
            "Plugin reports an unparsable host version"
        ),
    }
}
