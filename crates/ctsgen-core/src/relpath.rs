//! Lexical relative-path computation.
//!
//! Works on path components only; neither path has to exist.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

/// Compute `path` relative to `start`.
///
/// Both paths are made absolute and lexically normalised (without touching the
/// filesystem), then split into components. The result is one `..` per
/// component of `start` past the common prefix, followed by the rest of `path`.
/// An empty result yields `start` itself.
pub fn relative_path(path: &Path, start: &Path) -> std::io::Result<PathBuf> {
    let path_dirs = components(path)?;
    let start_dirs = components(start)?;

    let common = path_dirs
        .iter()
        .zip(start_dirs.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut result = PathBuf::new();
    for _ in common..start_dirs.len() {
        result.push("..");
    }
    for dir in &path_dirs[common..] {
        result.push(dir);
    }

    if result.as_os_str().is_empty() {
        Ok(start.to_path_buf())
    } else {
        Ok(result)
    }
}

/// Absolute, lexically normalised components of `path`.
///
/// `..` pops the previous component and is dropped at the root.
fn components(path: &Path) -> std::io::Result<Vec<OsString>> {
    let absolute = std::path::absolute(path)?;
    let mut parts: Vec<OsString> = Vec::new();
    let mut anchored = 0;
    for component in absolute.components() {
        match component {
            Component::Prefix(prefix) => {
                parts.push(prefix.as_os_str().to_os_string());
                anchored = parts.len();
            }
            Component::Normal(part) => parts.push(part.to_os_string()),
            Component::ParentDir => {
                if parts.len() > anchored {
                    parts.pop();
                }
            }
            Component::RootDir | Component::CurDir => {}
        }
    }
    Ok(parts)
}
