//! Error types for the plugin database.
//!
//! Every failure inside this crate degrades to "this plugin or interface is
//! unavailable"; none of these errors is fatal to the hosting process.

use std::path::PathBuf;

use crate::interface::InterfaceType;

/// Result type for plugin operations.
pub type Result<T> = std::result::Result<T, PluginError>;

/// Plugin error types.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// Plugin not found.
    #[error("Plugin not found: {0}")]
    NotFound(String),

    /// The shared library could not be opened.
    #[error("Failed to load library {path}: {reason}")]
    LoadFailed { path: PathBuf, reason: String },

    /// The library does not export the requested symbol.
    #[error("Missing symbol '{symbol}' in {path}: {reason}")]
    MissingSymbol {
        path: PathBuf,
        symbol: String,
        reason: String,
    },

    /// The plugin entry point failed to produce a plugin object.
    #[error("Plugin initialization failed: {0}")]
    InitializationFailed(String),

    /// The plugin could not construct the requested interface.
    #[error("Failed to create {interface_type} '{name}': {reason}")]
    CreationFailed {
        interface_type: InterfaceType,
        name: String,
        reason: String,
    },

    /// Plugin code panicked.
    #[error("Plugin panicked: {0}")]
    Panicked(String),

    /// The plugin produced an instance of the wrong interface type.
    #[error("Interface type mismatch: requested {requested}, plugin produced {found}")]
    TypeMismatch {
        requested: InterfaceType,
        found: InterfaceType,
    },

    /// The requested interface name is syntactically invalid.
    #[error("Invalid interface name: {0:?}")]
    InvalidName(String),

    /// No registered plugin could provide the interface.
    #[error("No plugin provides {interface_type} '{name}'")]
    Unavailable {
        interface_type: InterfaceType,
        name: String,
    },

    /// Invalid plugin database configuration.
    #[error("Invalid plugin configuration: {0}")]
    InvalidConfiguration(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error.
    #[error("Plugin error: {0}")]
    Other(#[from] anyhow::Error),
}

impl PluginError {
    /// Whether this error means "the file is simply not a plugin for this host",
    /// which discovery reports only at debug level.
    pub fn is_not_a_plugin(&self) -> bool {
        matches!(
            self,
            PluginError::LoadFailed { .. } | PluginError::MissingSymbol { .. }
        )
    }
}

/// Extract a printable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
