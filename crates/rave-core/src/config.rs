//! Plugin database configuration.
//!
//! Search paths come from the `RAVE_PLUGINS` environment variable or a TOML
//! file. The install directory is always searched last unless it is already
//! listed.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PluginError, Result};

/// Environment variable names.
pub mod env_vars {
    /// Search-path list, separated like `PATH` (`:` on Unix, `;` on Windows).
    pub const PLUGINS: &str = "RAVE_PLUGINS";
    /// Read at build time to override the default install directory.
    pub const PLUGINS_INSTALL_DIR: &str = "RAVE_PLUGINS_INSTALL_DIR";
}

/// Version directory component, e.g. `rave-0.3`.
fn versioned_dir_name() -> String {
    format!(
        "rave-{}.{}",
        env!("CARGO_PKG_VERSION_MAJOR"),
        env!("CARGO_PKG_VERSION_MINOR")
    )
}

/// Directory plugins are installed to alongside the runtime.
pub fn default_install_dir() -> PathBuf {
    // Must match env_vars::PLUGINS_INSTALL_DIR; option_env! needs a literal.
    if let Some(dir) = option_env!("RAVE_PLUGINS_INSTALL_DIR") {
        return PathBuf::from(dir);
    }

    #[cfg(windows)]
    {
        PathBuf::from(r"C:\Program Files\Rave")
            .join("share")
            .join(versioned_dir_name())
            .join("plugins")
    }

    #[cfg(not(windows))]
    {
        PathBuf::from("/usr/local/share")
            .join(versioned_dir_name())
            .join("plugins")
    }
}

/// Per-user install location consulted on Windows when the default install
/// directory is missing.
#[cfg(windows)]
fn fallback_install_dir() -> Option<PathBuf> {
    let dir = dirs::data_dir()?
        .join(versioned_dir_name())
        .join("plugins");
    dir.is_dir().then_some(dir)
}

#[cfg(not(windows))]
fn fallback_install_dir() -> Option<PathBuf> {
    None
}

/// Plugin database configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginDbConfig {
    /// Directories (or single files) to scan, highest priority first.
    pub search_paths: Vec<PathBuf>,

    /// Install directory; `None` means [`default_install_dir`].
    pub install_dir: Option<PathBuf>,

    /// Descend into subdirectories of each search path.
    pub recurse: bool,
}

impl PluginDbConfig {
    /// Build a configuration from `RAVE_PLUGINS`.
    ///
    /// Returns `None` when the variable is not set.
    pub fn from_env() -> Option<Self> {
        let value = std::env::var_os(env_vars::PLUGINS)?;
        Some(Self {
            search_paths: std::env::split_paths(&value).collect(),
            ..Self::default()
        })
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| PluginError::InvalidConfiguration(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Set the install directory.
    pub fn with_install_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.install_dir = Some(dir.into());
        self
    }

    /// Set whether search paths are walked recursively.
    pub fn with_recurse(mut self, recurse: bool) -> Self {
        self.recurse = recurse;
        self
    }

    /// Resolved install directory, after the platform fallback.
    pub fn resolved_install_dir(&self) -> PathBuf {
        let dir = self.install_dir.clone().unwrap_or_else(default_install_dir);
        if dir.is_dir() {
            return dir;
        }
        match fallback_install_dir() {
            Some(fallback) => {
                tracing::trace!(
                    category = "plugins",
                    path = %fallback.display(),
                    "Using fallback plugin install directory"
                );
                fallback
            }
            None => {
                tracing::warn!(
                    category = "plugins",
                    path = %dir.display(),
                    "Plugin install directory doesn't exist"
                );
                dir
            }
        }
    }

    /// The ordered list of paths discovery walks.
    ///
    /// Empty entries are dropped and duplicates keep their first position.
    /// The install directory is appended unless an entry with the same
    /// absolute path is already listed.
    pub fn effective_search_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = Vec::with_capacity(self.search_paths.len() + 1);
        for path in &self.search_paths {
            if path.as_os_str().is_empty() || paths.contains(path) {
                continue;
            }
            paths.push(path.clone());
        }

        let install_dir = self.resolved_install_dir();
        if install_dir.as_os_str().is_empty() {
            return paths;
        }
        let install_abs = absolute(&install_dir);
        if !paths.iter().any(|p| absolute(p) == install_abs) {
            paths.push(install_dir);
        }
        paths
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
