//! Host-side wrapper around one plugin object.
//!
//! The database only talks to plugins through [`PluginDescriptor`], which
//! adds the bookkeeping the plugin itself does not own: where it came from,
//! when it was loaded, and which interfaces have already failed.

use std::collections::BTreeSet;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use super::{InterfaceMap, PluginBox};
use crate::error::{panic_message, PluginError, Result};
use crate::interface::{
    environment_hash, interface_hash, EnvironmentPtr, InterfacePtr, InterfaceType,
};

/// Where a plugin came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginSource {
    /// Loaded from a shared library on disk.
    Dynamic { path: PathBuf },
    /// Registered directly by the embedding application.
    InProcess,
}

/// Summary of a registered plugin.
#[derive(Debug, Clone, Serialize)]
pub struct PluginInfo {
    /// Library path (`None` for in-process plugins)
    pub path: Option<PathBuf>,

    /// Plugin display name
    pub name: String,

    /// Host version the plugin was built against
    pub version: String,

    /// Provided interfaces
    pub interfaces: InterfaceMap,

    /// When the plugin was registered
    pub loaded_at: DateTime<Utc>,
}

/// A registered plugin and its bookkeeping.
pub struct PluginDescriptor {
    plugin: PluginBox,
    source: PluginSource,
    name: String,
    loaded_at: DateTime<Utc>,
    /// (type, lower-cased interface name) pairs that failed construction.
    bad_interfaces: Mutex<BTreeSet<(InterfaceType, String)>>,
}

impl PluginDescriptor {
    /// Wrap a plugin object loaded from `path`.
    pub fn dynamic(plugin: PluginBox, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = match plugin.name() {
            "" => name_from_path(&path),
            name => name.to_string(),
        };
        Self::with_source(plugin, PluginSource::Dynamic { path }, name)
    }

    /// Wrap a plugin object registered in-process.
    pub fn in_process(plugin: PluginBox) -> Self {
        let name = plugin.name().to_string();
        Self::with_source(plugin, PluginSource::InProcess, name)
    }

    /// Take ownership of the object returned by a `CreatePlugin` entry point.
    ///
    /// # Safety
    /// `raw` must be null or a pointer obtained from `Box::into_raw` on a
    /// `Box<PluginBox>` by code built with the same toolchain as this crate,
    /// and must not be used again by the caller.
    pub unsafe fn from_raw(raw: *mut PluginBox, source: PluginSource) -> Result<Self> {
        if raw.is_null() {
            return Err(PluginError::InitializationFailed(
                "CreatePlugin returned null".to_string(),
            ));
        }
        let plugin = *Box::from_raw(raw);
        Ok(match source {
            PluginSource::Dynamic { path } => Self::dynamic(plugin, path),
            PluginSource::InProcess => Self::in_process(plugin),
        })
    }

    fn with_source(plugin: PluginBox, source: PluginSource, name: String) -> Self {
        Self {
            plugin,
            source,
            name,
            loaded_at: Utc::now(),
            bad_interfaces: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &PluginSource {
        &self.source
    }

    /// Library path, if the plugin was loaded from disk.
    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            PluginSource::Dynamic { path } => Some(path),
            PluginSource::InProcess => None,
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self.source, PluginSource::Dynamic { .. })
    }

    /// Host version reported by the plugin.
    pub fn version(&self) -> &str {
        self.plugin.host_version()
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Interfaces the plugin claims to provide.
    pub fn interfaces(&self) -> &InterfaceMap {
        self.plugin.interfaces()
    }

    /// Whether this plugin provides `name` of `interface_type` and has not
    /// failed to construct it before. Names compare case-insensitively.
    pub fn has_interface(&self, interface_type: InterfaceType, name: &str) -> bool {
        let provided = self
            .interfaces()
            .get(&interface_type)
            .map(|names| names.iter().any(|n| n.eq_ignore_ascii_case(name)))
            .unwrap_or(false);

        provided && !self.is_bad_interface(interface_type, name)
    }

    /// Ask the plugin to construct an interface.
    ///
    /// A `None` result, an error and a panic from the plugin all come back as
    /// `Err`; nothing from plugin code unwinds past this call.
    pub fn create_interface(
        &self,
        interface_type: InterfaceType,
        name: &str,
        env: &EnvironmentPtr,
    ) -> Result<InterfacePtr> {
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.plugin.create_interface(
                interface_type,
                name,
                interface_hash(interface_type),
                environment_hash(),
                env,
            )
        }));

        match outcome {
            Ok(Ok(Some(interface))) => Ok(interface),
            Ok(Ok(None)) => Err(PluginError::CreationFailed {
                interface_type,
                name: name.to_string(),
                reason: "plugin returned no instance".to_string(),
            }),
            Ok(Err(e)) => Err(e),
            Err(payload) => Err(PluginError::Panicked(panic_message(payload.as_ref()))),
        }
    }

    /// Blacklist an interface on this plugin. Returns `false` if it already was.
    pub fn add_bad_interface(&self, interface_type: InterfaceType, name: &str) -> bool {
        self.bad_interfaces
            .lock()
            .insert((interface_type, name.to_ascii_lowercase()))
    }

    pub fn is_bad_interface(&self, interface_type: InterfaceType, name: &str) -> bool {
        self.bad_interfaces
            .lock()
            .contains(&(interface_type, name.to_ascii_lowercase()))
    }

    /// Snapshot of the blacklist.
    pub fn bad_interfaces(&self) -> Vec<(InterfaceType, String)> {
        self.bad_interfaces.lock().iter().cloned().collect()
    }

    pub fn info(&self) -> PluginInfo {
        PluginInfo {
            path: self.path().map(Path::to_path_buf),
            name: self.name.clone(),
            version: self.version().to_string(),
            interfaces: self.interfaces().clone(),
            loaded_at: self.loaded_at,
        }
    }

    pub fn on_initialized(&self) {
        self.run_hook("on_initialized", || self.plugin.on_initialized());
    }

    pub fn on_pre_destroy(&self) {
        self.run_hook("on_pre_destroy", || self.plugin.on_pre_destroy());
    }

    pub fn destroy(&self) {
        self.run_hook("destroy", || self.plugin.destroy());
    }

    fn run_hook(&self, hook: &str, call: impl FnOnce() -> Result<()>) {
        match catch_unwind(AssertUnwindSafe(call)) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(
                    category = "plugins",
                    plugin = %self.name,
                    hook,
                    error = %e,
                    "Plugin hook failed"
                );
            }
            Err(payload) => {
                tracing::warn!(
                    category = "plugins",
                    plugin = %self.name,
                    hook,
                    panic = %panic_message(payload.as_ref()),
                    "Plugin hook panicked"
                );
            }
        }
    }
}

impl fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("loaded_at", &self.loaded_at)
            .finish()
    }
}

/// Display name for a library whose plugin did not name itself
/// (e.g. "libfclrave.so" -> "fclrave").
fn name_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown");
    stem.strip_prefix("lib").unwrap_or(stem).to_string()
}
