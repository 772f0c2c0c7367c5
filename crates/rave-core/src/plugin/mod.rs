//! Plugin contract for Rave.
//!
//! A plugin is anything that can construct named interface objects. It is
//! either a shared library (.so on Linux, .dylib on macOS, .dll on Windows)
//! discovered on the search paths, or an in-process provider registered by
//! the embedding application.
//!
//! ## Native plugins
//!
//! A shared library is a plugin iff it exports a zero-argument function named
//! `CreatePlugin` returning an owned [`PluginBox`]. Use [`declare_plugin!`] to
//! generate that export:
//!
//! ```ignore
//! use rave_core::plugin::{InterfaceMap, RavePlugin};
//!
//! struct FclPlugin { interfaces: InterfaceMap }
//!
//! impl RavePlugin for FclPlugin {
//!     // ...
//! }
//!
//! fn create() -> FclPlugin {
//!     FclPlugin::new()
//! }
//!
//! rave_core::declare_plugin!(create);
//! ```
//!
//! The plugin object crosses the library boundary as a Rust trait object, so
//! plugins must be compiled with the same toolchain as the host.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::interface::{EnvironmentPtr, InterfacePtr, InterfaceType};

pub mod descriptor;
pub mod library;
pub mod virtual_plugin;

pub use descriptor::{PluginDescriptor, PluginInfo, PluginSource};
pub use library::LibraryHandle;
pub use virtual_plugin::{VirtualFactory, VirtualPlugin};

/// Interface names a plugin provides, grouped by type.
pub type InterfaceMap = BTreeMap<InterfaceType, Vec<String>>;

/// Owned plugin object as handed across the library boundary.
pub type PluginBox = Box<dyn RavePlugin>;

/// Signature of the exported plugin entry point.
pub type CreatePluginFn = unsafe extern "C" fn() -> *mut PluginBox;

/// Name of the exported plugin entry point.
pub const CREATE_PLUGIN_SYMBOL: &str = "CreatePlugin";

/// Host version string compiled into plugins built against this crate.
pub const HOST_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Callbacks the host invokes on a loaded plugin.
///
/// `create_interface` may be called concurrently from several threads and
/// must be reentrant. The database cannot enforce this.
pub trait RavePlugin: Send + Sync {
    /// Display name of the plugin.
    fn name(&self) -> &str;

    /// Interfaces this plugin claims to provide.
    fn interfaces(&self) -> &InterfaceMap;

    /// Host version the plugin was built against.
    fn host_version(&self) -> &str {
        HOST_VERSION
    }

    /// Construct the interface `name` of `interface_type`.
    ///
    /// `name` is the full requested name: the interface name, optionally
    /// followed by a space and a parameter string. The two hashes identify
    /// the caller's interface contract and runtime; a plugin built against a
    /// different contract should return `Ok(None)`.
    fn create_interface(
        &self,
        interface_type: InterfaceType,
        name: &str,
        interface_hash: &str,
        environment_hash: &str,
        env: &EnvironmentPtr,
    ) -> Result<Option<InterfacePtr>>;

    /// Called once the host runtime has finished initializing.
    fn on_initialized(&self) -> Result<()> {
        Ok(())
    }

    /// Called before the host runtime starts tearing down.
    fn on_pre_destroy(&self) -> Result<()> {
        Ok(())
    }

    /// Release plugin resources before the plugin is dropped.
    fn destroy(&self) -> Result<()> {
        Ok(())
    }
}

/// Split a requested name into the lookup key and its trailing parameters.
///
/// Returns `None` when the name starts with the separator (or is empty).
pub fn split_interface_name(name: &str) -> Option<(&str, &str)> {
    let (head, params) = match name.find(' ') {
        Some(pos) => (&name[..pos], &name[pos + 1..]),
        None => (name, ""),
    };
    if head.is_empty() {
        None
    } else {
        Some((head, params))
    }
}

/// Export the `CreatePlugin` entry point from a plugin library.
///
/// The argument is a function or closure taking no arguments and returning a
/// value implementing [`RavePlugin`]. A panic inside it is caught and turned
/// into a null return, which the host treats as a failed load.
#[macro_export]
macro_rules! declare_plugin {
    ($constructor:expr) => {
        #[no_mangle]
        #[allow(non_snake_case)]
        pub extern "C" fn CreatePlugin() -> *mut $crate::plugin::PluginBox {
            let created = ::std::panic::catch_unwind(::std::panic::AssertUnwindSafe(|| {
                let plugin: $crate::plugin::PluginBox = ::std::boxed::Box::new(($constructor)());
                plugin
            }));
            match created {
                Ok(plugin) => ::std::boxed::Box::into_raw(::std::boxed::Box::new(plugin)),
                Err(_) => ::std::ptr::null_mut(),
            }
        }
    };
}
