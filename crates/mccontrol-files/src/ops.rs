//! File operations on top of [`PathSandbox`].
//!
//! Each operation resolves its path first and validates everything it can
//! before touching the disk. Blocking I/O; callers on an async runtime should
//! run these on a blocking thread.

use crate::classify;
use crate::error::{FilesError, FilesResult};
use crate::sandbox::{exists_no_follow, is_dangling_symlink, PathSandbox};
use base64::{engine::general_purpose::STANDARD, Engine};
use mccontrol_core::{
    system_time_millis, ContentEncoding, DirectoryListing, FileContent, FileEntry, FileKind,
};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Ceiling for reads and writes.
pub const MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Root-relative path written.
    pub path: String,
    /// False when an existing file was overwritten.
    pub created: bool,
    /// Root-relative path of the backup copy, if one was made.
    pub backup: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameOutcome {
    pub from: String,
    pub to: String,
}

impl PathSandbox {
    /// List the children of a directory: directories first, then by name
    /// ignoring case.
    pub fn list(&self, path: &str) -> FilesResult<DirectoryListing> {
        let target = self.resolve(path)?;
        let meta = fs::metadata(&target).map_err(not_found_or_io)?;
        if !meta.is_dir() {
            return Err(FilesError::NotADirectory);
        }

        let mut items = Vec::new();
        for entry in fs::read_dir(&target)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let entry_path = target.join(&name);
            let is_directory = fs::metadata(&entry_path)
                .map(|m| m.is_dir())
                .unwrap_or(false);

            let item = if is_directory {
                FileEntry {
                    path: self.relative(&entry_path),
                    name,
                    is_directory,
                    size: 0,
                    modified: 0,
                    kind: FileKind::Folder,
                    editable: false,
                }
            } else {
                let (size, modified) = fs::metadata(&entry_path)
                    .map(|m| {
                        (
                            m.len(),
                            m.modified().map(system_time_millis).unwrap_or(0),
                        )
                    })
                    .unwrap_or((0, 0));
                FileEntry {
                    path: self.relative(&entry_path),
                    kind: classify::file_kind(&name),
                    editable: classify::is_editable(&name),
                    name,
                    is_directory,
                    size,
                    modified,
                }
            };
            items.push(item);
        }

        items.sort_by(|a, b| {
            b.is_directory
                .cmp(&a.is_directory)
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        });

        debug!(path = %self.display(&target), count = items.len(), "listed directory");
        Ok(DirectoryListing {
            items,
            current_path: self.relative(&target),
        })
    }

    /// Read a file, tagging the payload as UTF-8 text or base64.
    pub fn read(&self, path: &str) -> FilesResult<FileContent> {
        let target = self.resolve(path)?;
        let meta = fs::metadata(&target).map_err(not_found_or_io)?;
        if meta.is_dir() {
            return Err(FilesError::IsADirectory);
        }
        if meta.len() > MAX_FILE_SIZE {
            return Err(FilesError::TooLarge(meta.len()));
        }

        let bytes = fs::read(&target)?;
        let size = bytes.len() as u64;
        if size > MAX_FILE_SIZE {
            return Err(FilesError::TooLarge(size));
        }
        let modified = meta.modified().map(system_time_millis).unwrap_or(0);

        let (content, encoding, is_text) = if classify::is_probably_text(&bytes) {
            match String::from_utf8(bytes) {
                Ok(text) => (text, ContentEncoding::Utf8, true),
                // Few zero bytes but not UTF-8 (Latin-1 configs and the like).
                Err(e) => (
                    STANDARD.encode(e.into_bytes()),
                    ContentEncoding::Base64,
                    false,
                ),
            }
        } else {
            (STANDARD.encode(&bytes), ContentEncoding::Base64, false)
        };

        Ok(FileContent {
            content,
            encoding,
            size,
            modified,
            is_text,
        })
    }

    /// Create or overwrite a file. An existing file is first copied to
    /// `<name>.backup-<yyyyMMdd-HHmmss>`; if that copy fails nothing is
    /// written.
    pub fn write(&self, path: &str, content: &str, is_base64: bool) -> FilesResult<WriteOutcome> {
        let target = self.resolve(path)?;
        if target == self.root() {
            return Err(FilesError::IsADirectory);
        }
        // Writing would follow the link to wherever it points.
        if is_dangling_symlink(&target) {
            return Err(FilesError::PathEscape(path.to_string()));
        }

        let bytes = if is_base64 {
            STANDARD
                .decode(content.trim())
                .map_err(|e| FilesError::Decode(e.to_string()))?
        } else {
            content.as_bytes().to_vec()
        };
        if bytes.len() as u64 > MAX_FILE_SIZE {
            return Err(FilesError::TooLarge(bytes.len() as u64));
        }

        let existing = match fs::metadata(&target) {
            Ok(meta) if meta.is_dir() => return Err(FilesError::IsADirectory),
            Ok(_) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };

        let backup = if existing {
            Some(create_backup(&target)?)
        } else {
            None
        };

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, &bytes)?;

        let outcome = WriteOutcome {
            path: self.relative(&target),
            created: !existing,
            backup: backup.map(|b| self.relative(&b)),
        };
        info!(
            path = %self.display(&target),
            bytes = bytes.len(),
            backup = ?outcome.backup,
            "file written"
        );
        Ok(outcome)
    }

    /// Delete a file, a symlink, or a directory tree. Returns the root-relative
    /// path removed.
    pub fn delete(&self, path: &str) -> FilesResult<String> {
        let target = self.resolve(path)?;
        if target == self.root() {
            return Err(FilesError::RootProtected("delete"));
        }

        let meta = fs::symlink_metadata(&target).map_err(not_found_or_io)?;
        if meta.is_dir() {
            remove_tree(&target)?;
        } else {
            fs::remove_file(&target)?;
        }

        info!(path = %self.display(&target), "deleted");
        Ok(self.relative(&target))
    }

    /// Rename within the same directory. `new_name` is a bare name.
    pub fn rename(&self, path: &str, new_name: &str) -> FilesResult<RenameOutcome> {
        let source = self.resolve(path)?;
        validate_name(new_name)?;
        if source == self.root() {
            return Err(FilesError::RootProtected("rename"));
        }
        if !exists_no_follow(&source) {
            return Err(FilesError::NotFound);
        }

        let parent = source.parent().ok_or(FilesError::RootProtected("rename"))?;
        let destination = self.resolve(&self.relative(&parent.join(new_name)))?;
        if exists_no_follow(&destination) {
            return Err(FilesError::DestinationExists);
        }

        fs::rename(&source, &destination)?;

        let outcome = RenameOutcome {
            from: self.relative(&source),
            to: self.relative(&destination),
        };
        info!(from = %outcome.from, to = %outcome.to, "renamed");
        Ok(outcome)
    }

    /// Create a directory and any missing parents. Fails if anything already
    /// exists at the path.
    pub fn mkdir(&self, path: &str) -> FilesResult<String> {
        let target = self.resolve(path)?;
        if exists_no_follow(&target) {
            return Err(FilesError::AlreadyExists);
        }
        fs::create_dir_all(&target)?;

        info!(path = %self.display(&target), "directory created");
        Ok(self.relative(&target))
    }
}

fn not_found_or_io(e: std::io::Error) -> FilesError {
    if e.kind() == ErrorKind::NotFound {
        FilesError::NotFound
    } else {
        FilesError::Io(e)
    }
}

fn validate_name(name: &str) -> FilesResult<()> {
    let invalid = name.trim().is_empty()
        || name == "."
        || name.contains('/')
        || name.contains('\\')
        || name.contains("..")
        || name.contains('\0');
    if invalid {
        return Err(FilesError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Copy `target` to a timestamped sibling. A second backup within the same
/// second gets a numeric suffix instead of clobbering the first.
fn create_backup(target: &Path) -> FilesResult<PathBuf> {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or(FilesError::IsADirectory)?;
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let base = format!("{}.backup-{}", name, stamp);

    let mut backup = target.with_file_name(&base);
    let mut n = 0u32;
    while exists_no_follow(&backup) {
        n += 1;
        backup = target.with_file_name(format!("{}-{}", base, n));
    }

    fs::copy(target, &backup)?;
    debug!(backup = %backup.display(), "backup created");
    Ok(backup)
}

/// Depth-first removal. Symlinks are unlinked, never followed.
fn remove_tree(dir: &Path) -> FilesResult<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            remove_tree(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
    }
    fs::remove_dir(dir)?;
    Ok(())
}
