//! Confinement of `(data source, relative path)` pairs to the data source root.
//!
//! Every filesystem location the rest of the crate touches comes out of
//! [`resolve`] or [`resolve_file`]. Both return [`CoreError::PathDenied`] for
//! unknown data sources, `..` escapes, symlinks leading outside the root and
//! missing paths alike, so callers cannot map out the layout.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::CoreError;
use crate::settings::{DataSource, Settings};

/// A validated directory location inside a data source.
#[derive(Debug, Clone)]
pub struct ResolvedPath {
    pub data_source: Arc<DataSource>,
    /// Normalised path relative to the root, without leading or trailing
    /// slashes. Empty for the root itself.
    pub full_path: String,
    /// `root.join(full_path)`.
    pub absolute: PathBuf,
}

impl ResolvedPath {
    pub fn is_root(&self) -> bool {
        self.full_path.is_empty()
    }

    /// Last path segment, or the root directory's own name for the root.
    pub fn name(&self) -> String {
        match self.full_path.rsplit_once('/') {
            Some((_, name)) => name.to_string(),
            None if self.full_path.is_empty() => self
                .data_source
                .root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            None => self.full_path.clone(),
        }
    }

    /// Path of the parent directory relative to the root (empty for
    /// top-level directories and the root).
    pub fn parent_path(&self) -> &str {
        self.full_path
            .rsplit_once('/')
            .map(|(parent, _)| parent)
            .unwrap_or("")
    }
}

/// Lexically normalise a relative path: drop empty and `.` segments and fold
/// `..` into its parent.
///
/// Returns `PathDenied` when `..` would climb above the root or a segment
/// names the reserved metadata directory.
pub fn normalize_relative(path: &str, metadata_dir: &str) -> Result<String, CoreError> {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(CoreError::PathDenied);
                }
            }
            s if s == metadata_dir || s.contains('\0') => return Err(CoreError::PathDenied),
            s => segments.push(s),
        }
    }

    Ok(segments.join("/"))
}

/// Resolve a directory inside a data source.
pub fn resolve(
    settings: &Settings,
    ds_name: &str,
    relative_path: &str,
) -> Result<ResolvedPath, CoreError> {
    let data_source = settings.data_source(ds_name).ok_or_else(|| {
        tracing::debug!(ds = %ds_name, "Unknown data source");
        CoreError::PathDenied
    })?;

    let full_path = normalize_relative(relative_path, &settings.metadata_dir).map_err(|e| {
        tracing::warn!(ds = %ds_name, path = %relative_path, "Rejected path escape attempt");
        e
    })?;

    let absolute = if full_path.is_empty() {
        data_source.root.clone()
    } else {
        data_source.root.join(&full_path)
    };

    ensure_confined(&data_source.root, &absolute)?;

    if !absolute.is_dir() {
        return Err(CoreError::PathDenied);
    }

    Ok(ResolvedPath {
        data_source: Arc::clone(data_source),
        full_path,
        absolute,
    })
}

/// Resolve a file inside an already resolved directory.
pub fn resolve_file(dir: &ResolvedPath, file_name: &str) -> Result<PathBuf, CoreError> {
    if file_name.is_empty()
        || file_name == "."
        || file_name == ".."
        || file_name.contains('/')
        || file_name.contains('\0')
    {
        return Err(CoreError::PathDenied);
    }

    let path = dir.absolute.join(file_name);
    ensure_confined(&dir.data_source.root, &path)?;

    if !path.is_file() {
        return Err(CoreError::PathDenied);
    }

    Ok(path)
}

/// Verify that `path`, with symlinks resolved, still lives under `root`.
fn ensure_confined(root: &Path, path: &Path) -> Result<(), CoreError> {
    let canonical_root = root.canonicalize().map_err(|e| {
        tracing::warn!(root = %root.display(), error = %e, "Data source root is not accessible");
        CoreError::PathDenied
    })?;
    let canonical = path.canonicalize().map_err(|_| CoreError::PathDenied)?;

    if canonical.starts_with(&canonical_root) {
        Ok(())
    } else {
        tracing::warn!(path = %path.display(), "Path resolves outside its data source");
        Err(CoreError::PathDenied)
    }
}
