//! Owning handle over one loaded shared library.

use std::fmt;
use std::path::{Path, PathBuf};

use libloading::{Library, Symbol};

use crate::error::{PluginError, Result};

/// One native module mapped into the process.
///
/// The handle is move-only. Dropping it does **not** unload the module except
/// on Windows, where load and free calls must pair up. Plugin objects and the
/// vtables behind them may outlive their registry entry, and unmapping their
/// code would leave those dangling; the OS reference count reclaims the
/// module at process exit.
pub struct LibraryHandle {
    library: Option<Library>,
    path: PathBuf,
}

impl LibraryHandle {
    /// Open the shared library at `path`.
    ///
    /// On Unix all symbols are bound immediately, so a library with
    /// unresolved dependencies fails here rather than on first call.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let library = open(path).map_err(|e| PluginError::LoadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            library: Some(library),
            path: path.to_path_buf(),
        })
    }

    /// Path the library was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolve an exported symbol and copy it out.
    ///
    /// # Safety
    /// `T` must match the actual type of the exported symbol, and the value
    /// must not be used after the module is unloaded.
    pub unsafe fn resolve<T: Copy>(&self, symbol: &str) -> Result<T> {
        let library = self.library.as_ref().ok_or_else(|| PluginError::LoadFailed {
            path: self.path.clone(),
            reason: "library handle already released".to_string(),
        })?;

        let mut name = Vec::with_capacity(symbol.len() + 1);
        name.extend_from_slice(symbol.as_bytes());
        name.push(0);

        let sym: Symbol<T> = library.get(&name).map_err(|e| PluginError::MissingSymbol {
            path: self.path.clone(),
            symbol: symbol.to_string(),
            reason: e.to_string(),
        })?;
        Ok(*sym)
    }
}

#[cfg(unix)]
fn open(path: &Path) -> std::result::Result<Library, libloading::Error> {
    use libloading::os::unix::{Library as UnixLibrary, RTLD_LOCAL, RTLD_NOW};

    // SAFETY: running a library's initialisers is inherent to loading
    // plugins; candidates come from operator-configured search paths.
    unsafe { UnixLibrary::open(Some(path), RTLD_NOW | RTLD_LOCAL) }.map(Library::from)
}

#[cfg(not(unix))]
fn open(path: &Path) -> std::result::Result<Library, libloading::Error> {
    // SAFETY: see the Unix variant.
    unsafe { Library::new(path) }
}

impl Drop for LibraryHandle {
    fn drop(&mut self) {
        if let Some(library) = self.library.take() {
            #[cfg(windows)]
            drop(library);

            #[cfg(not(windows))]
            std::mem::forget(library);
        }
    }
}

impl fmt::Debug for LibraryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryHandle")
            .field("path", &self.path)
            .field("loaded", &self.library.is_some())
            .finish()
    }
}
