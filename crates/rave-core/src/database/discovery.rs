//! Directory walk that turns search paths into candidate plugin files.
//!
//! Nothing here touches native modules; the database loads candidates one at
//! a time afterwards.

use std::fs;
use std::path::{Path, PathBuf};

/// Platform suffix of loadable modules (`so`, `dylib` or `dll`).
pub const PLUGIN_EXTENSION: &str = std::env::consts::DLL_EXTENSION;

/// Whether `path` has the platform module suffix.
pub fn is_plugin_file(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(PLUGIN_EXTENSION)
}

/// Collect candidate plugin files under `path`.
///
/// A regular file is its own (only) candidate when it has the module suffix.
/// Directories are listed in file-name order; subdirectories are descended
/// only when `recurse` is set. Paths that cannot be read are logged at debug
/// level and skipped without affecting their siblings.
pub fn collect_candidates(path: &Path, recurse: bool) -> Vec<PathBuf> {
    let mut out = Vec::new();
    walk(path, recurse, &mut out);
    out
}

fn walk(path: &Path, recurse: bool, out: &mut Vec<PathBuf>) {
    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) => {
            tracing::debug!(
                category = "plugins",
                path = %path.display(),
                error = %e,
                "Skipping unreadable plugin path"
            );
            return;
        }
    };

    if metadata.is_file() {
        if metadata.len() == 0 {
            return;
        }
        if is_plugin_file(path) {
            out.push(path.to_path_buf());
        }
        return;
    }

    if !metadata.is_dir() {
        tracing::debug!(
            category = "plugins",
            path = %path.display(),
            "Path is not a valid directory or file"
        );
        return;
    }

    let entries = match fs::read_dir(path) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!(
                category = "plugins",
                path = %path.display(),
                error = %e,
                "Failed to open plugin directory"
            );
            return;
        }
    };

    let mut children: Vec<PathBuf> = entries
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry.path()),
            Err(e) => {
                tracing::trace!(category = "plugins", error = %e, "Skipping directory entry");
                None
            }
        })
        .collect();
    children.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    for child in children {
        if child.is_dir() {
            if recurse {
                walk(&child, true, out);
            }
        } else {
            walk(&child, recurse, out);
        }
    }
}
