// Workspace sandbox: maps client-supplied relative paths onto the workspace root

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::{error, warn};

use crate::error::CommandError;

/// An absolute path proven to lie inside the workspace root.
///
/// Only [`Sandbox::resolve`] can build one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxedPath(PathBuf);

impl SandboxedPath {
    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl AsRef<Path> for SandboxedPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

/// Containment boundary rooted at a canonical directory
#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
}

impl Sandbox {
    /// Open a sandbox on an existing directory. The root is canonicalized once here.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let root = std::fs::canonicalize(root)
            .with_context(|| format!("Failed to resolve workspace root: {}", root.display()))?;
        if !root.is_dir() {
            bail!("Workspace root is not a directory: {}", root.display());
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `filepath` relative to the root.
    ///
    /// The deepest existing ancestor is canonicalized (following symlinks) and
    /// the not-yet-existing tail re-appended, so paths for new files resolve
    /// too. The result must be the root itself or sit below it component-wise;
    /// anything else, including any resolution failure, is rejected.
    pub fn resolve(&self, filepath: &str) -> Result<SandboxedPath, CommandError> {
        let rejected = || CommandError::PathRejected(filepath.to_string());

        let resolved = match self.canonicalize_lenient(&self.root.join(filepath)) {
            Ok(Some(path)) => path,
            Ok(None) => {
                warn!("Path traversal attempt detected: {}", filepath);
                return Err(rejected());
            }
            Err(e) => {
                error!("Path resolution error for {}: {}", filepath, e);
                return Err(rejected());
            }
        };

        if !resolved.starts_with(&self.root) {
            warn!("Path traversal attempt detected: {}", filepath);
            return Err(rejected());
        }

        Ok(SandboxedPath(resolved))
    }

    /// `Ok(None)` when the missing tail cannot be expressed as plain names
    fn canonicalize_lenient(&self, path: &Path) -> io::Result<Option<PathBuf>> {
        let mut existing = path;
        let mut tail: Vec<OsString> = Vec::new();

        loop {
            match std::fs::symlink_metadata(existing) {
                Ok(_) => break,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    // file_name() is None for a trailing `..` or a bare root
                    match (existing.parent(), existing.file_name()) {
                        (Some(parent), Some(name)) => {
                            tail.push(name.to_os_string());
                            existing = parent;
                        }
                        _ => return Ok(None),
                    }
                }
                Err(e) => return Err(e),
            }
        }

        // Fails on dangling symlinks, which we never write through
        let mut resolved = std::fs::canonicalize(existing)?;
        for name in tail.iter().rev() {
            resolved.push(name);
        }
        Ok(Some(resolved))
    }
}
