//! Path containment for the file and command tools.
//!
//! A [`PathSandbox`] holds one canonical root directory. Every path a tool
//! touches goes through [`PathSandbox::resolve`], which applies two layers:
//!
//! 1. A syntactic reject list, checked before touching the filesystem:
//!    parent-directory tokens (`..`), absolute prefixes (`/`, `\`), and
//!    drive/scheme separators (`:`).
//! 2. A canonical-prefix check: the path is joined to the root, symlinks are
//!    resolved, and the result must still lie under the root.
//!
//! This is advisory string screening for a cooperative model, not OS-level
//! isolation.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Token that marks a parent-directory reference.
pub const PARENT_DIR_TOKEN: &str = "..";

/// Separator that introduces a drive letter (`C:`) or URL scheme (`file:`).
pub const DRIVE_SEPARATOR: char = ':';

#[derive(Debug, Error)]
pub enum SandboxError {
    /// The raw path failed the syntactic reject list.
    #[error("Access outside the working directory is not allowed.")]
    Rejected { path: String },
    /// The canonical path does not lie under the sandbox root.
    #[error("Blocked: Path escapes the allowed directory.")]
    PathEscape { path: String },
    /// Canonicalizing an existing ancestor failed for a reason other than
    /// the path not existing (permissions, I/O).
    #[error("Cannot resolve '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    /// The configured root is missing or not a directory.
    #[error("Could not use directory {}: {reason}", path.display())]
    InvalidRoot { path: PathBuf, reason: String },
}

impl SandboxError {
    /// Whether this error means the path would leave the sandbox.
    pub fn is_escape(&self) -> bool {
        matches!(
            self,
            SandboxError::Rejected { .. } | SandboxError::PathEscape { .. }
        )
    }
}

/// A fixed root directory that all tool paths are resolved against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSandbox {
    root: PathBuf,
}

impl PathSandbox {
    /// Canonicalize `root` and use it as the sandbox root.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, SandboxError> {
        let root = root.as_ref();
        let canonical = root
            .canonicalize()
            .map_err(|e| SandboxError::InvalidRoot {
                path: root.to_path_buf(),
                reason: e.to_string(),
            })?;
        if !canonical.is_dir() {
            return Err(SandboxError::InvalidRoot {
                path: root.to_path_buf(),
                reason: "not a directory".to_string(),
            });
        }
        Ok(Self { root: canonical })
    }

    /// The canonical sandbox root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative path to an absolute path under the root.
    ///
    /// The target itself need not exist (so `write_file` can create it); the
    /// deepest existing ancestor is canonicalized and the missing tail is
    /// appended.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, SandboxError> {
        if is_syntactically_unsafe(relative) {
            return Err(SandboxError::Rejected {
                path: relative.to_string(),
            });
        }

        let canonical = canonicalize_lenient(&self.root.join(relative), relative)?;
        if !canonical.starts_with(&self.root) {
            return Err(SandboxError::PathEscape {
                path: relative.to_string(),
            });
        }
        Ok(canonical)
    }

    /// Non-failing variant of [`resolve`](Self::resolve), used to screen
    /// path-like command tokens.
    pub fn is_within(&self, candidate: &str) -> bool {
        self.resolve(candidate).is_ok()
    }
}

fn is_syntactically_unsafe(path: &str) -> bool {
    path.contains(PARENT_DIR_TOKEN)
        || path.starts_with('/')
        || path.starts_with('\\')
        || path.contains(DRIVE_SEPARATOR)
        || Path::new(path).is_absolute()
}

/// Canonicalize the deepest existing ancestor of `path` and re-append the
/// components that do not exist yet.
fn canonicalize_lenient(path: &Path, original: &str) -> Result<PathBuf, SandboxError> {
    let mut existing = path.to_path_buf();
    let mut missing: Vec<OsString> = Vec::new();

    loop {
        match existing.canonicalize() {
            Ok(mut resolved) => {
                for component in missing.iter().rev() {
                    resolved.push(component);
                }
                return Ok(resolved);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                // A dangling symlink has no canonical target we could check.
                if existing.symlink_metadata().is_ok() {
                    return Err(SandboxError::PathEscape {
                        path: original.to_string(),
                    });
                }
                let Some(name) = existing.file_name().map(|n| n.to_os_string()) else {
                    return Err(SandboxError::Io {
                        path: original.to_string(),
                        source: e,
                    });
                };
                missing.push(name);
                if !existing.pop() {
                    return Err(SandboxError::Io {
                        path: original.to_string(),
                        source: e,
                    });
                }
            }
            Err(e) => {
                return Err(SandboxError::Io {
                    path: original.to_string(),
                    source: e,
                });
            }
        }
    }
}
