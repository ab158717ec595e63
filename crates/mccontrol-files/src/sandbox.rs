//! Path sandbox.
//!
//! Every caller-supplied path is resolved against a single canonical root.
//! Resolution is lexical first (`..` pops, `.` is dropped) and then checked
//! against the filesystem: an existing target is canonicalized so symlinks
//! cannot point outside the root, and a new target is validated through its
//! deepest existing ancestor.
//!
//! The check-then-use window between `resolve` and the actual I/O is not
//! closed; a local user able to swap directories for symlinks in that window
//! can still race it.

use crate::error::{FilesError, FilesResult};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct PathSandbox {
    root: PathBuf,
}

impl PathSandbox {
    /// Root a sandbox at `root`, which must be an existing directory.
    /// The root is canonicalized once here.
    pub fn new(root: impl AsRef<Path>) -> FilesResult<Self> {
        let requested = root.as_ref();
        let root = requested.canonicalize().map_err(|e| {
            FilesError::Init(format!("cannot canonicalize '{}': {}", requested.display(), e))
        })?;
        if !root.is_dir() {
            return Err(FilesError::Init(format!(
                "'{}' is not a directory",
                root.display()
            )));
        }
        info!(root = %root.display(), "path sandbox initialized");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `requested` to the absolute path an operation should act on.
    ///
    /// Empty, whitespace-only and "/" map to the root. Leading separators are
    /// root-relative. For an existing path the returned value keeps its final
    /// component unresolved (so a symlink is renamed or deleted, not its
    /// target) but both the target and its parent are proven to lie inside
    /// the root.
    pub fn resolve(&self, requested: &str) -> FilesResult<PathBuf> {
        let trimmed = requested.trim();
        if trimmed.contains('\0') {
            return Err(self.escape(requested));
        }
        let relative = trimmed.trim_start_matches(['/', '\\']);
        if relative.is_empty() {
            return Ok(self.root.clone());
        }

        let candidate = self.normalize(relative).ok_or_else(|| self.escape(requested))?;

        if exists_no_follow(&candidate) {
            // A dangling symlink has no target to check; only its parent is
            // validated below, and the link itself is what gets acted on.
            if !is_dangling_symlink(&candidate) {
                let canonical = candidate.canonicalize().map_err(|_| self.escape(requested))?;
                if !canonical.starts_with(&self.root) {
                    return Err(self.escape(requested));
                }
            }
            if candidate == self.root {
                return Ok(self.root.clone());
            }
            return match (candidate.parent(), candidate.file_name()) {
                (Some(parent), Some(name)) => {
                    let parent = parent.canonicalize().map_err(|_| self.escape(requested))?;
                    if !parent.starts_with(&self.root) {
                        return Err(self.escape(requested));
                    }
                    Ok(parent.join(name))
                }
                _ => Err(self.escape(requested)),
            };
        }

        // New path: validate the deepest existing ancestor, then re-attach
        // the missing suffix, which by construction holds no symlinks.
        let mut ancestor = candidate.as_path();
        loop {
            match ancestor.parent() {
                Some(parent) => ancestor = parent,
                None => return Err(self.escape(requested)),
            }
            if exists_no_follow(ancestor) {
                break;
            }
        }
        let canonical = ancestor.canonicalize().map_err(|_| self.escape(requested))?;
        if !canonical.starts_with(&self.root) {
            return Err(self.escape(requested));
        }
        let suffix = candidate
            .strip_prefix(ancestor)
            .map_err(|_| self.escape(requested))?;
        Ok(canonical.join(suffix))
    }

    /// Root-relative, `/`-separated form of an absolute path inside the root.
    /// The root itself is "".
    pub fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .map(|rel| {
                rel.components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .unwrap_or_default()
    }

    /// `relative` with a leading slash, as shown in the change log.
    pub fn display(&self, path: &Path) -> String {
        format!("/{}", self.relative(path))
    }

    /// Lexically join `relative` onto the root. `None` when the result leaves
    /// the root or the input carries its own prefix or root component.
    fn normalize(&self, relative: &str) -> Option<PathBuf> {
        let mut out = self.root.clone();
        for component in Path::new(relative).components() {
            match component {
                Component::Normal(part) => out.push(part),
                Component::CurDir => {}
                Component::ParentDir => {
                    out.pop();
                }
                Component::RootDir | Component::Prefix(_) => return None,
            }
        }
        out.starts_with(&self.root).then_some(out)
    }

    fn escape(&self, requested: &str) -> FilesError {
        warn!(path = %requested, "path escape rejected");
        FilesError::PathEscape(requested.to_string())
    }
}

/// True for anything at `path`, including a dangling symlink.
pub(crate) fn exists_no_follow(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// A symlink whose target does not exist.
pub(crate) fn is_dangling_symlink(path: &Path) -> bool {
    let is_link = fs::symlink_metadata(path)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false);
    is_link && matches!(fs::metadata(path), Err(e) if e.kind() == std::io::ErrorKind::NotFound)
}
