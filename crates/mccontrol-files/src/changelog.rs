//! Persistent log of successful file mutations, newest first.

use std::collections::VecDeque;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{error, warn};

pub const CHANGELOG_FILE: &str = "file-changelog.json";
pub const MAX_CHANGELOG_ENTRIES: usize = 300;

/// A mutation worth recording. Paths are in display form ("/plugins/x.yml").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    Create(String),
    Edit(String),
    Delete(String),
    Rename { from: String, to: String },
    CreateFolder(String),
}

impl fmt::Display for FileChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileChange::Create(p) => write!(f, "Create {}", p),
            FileChange::Edit(p) => write!(f, "Edit {}", p),
            FileChange::Delete(p) => write!(f, "Delete {}", p),
            FileChange::Rename { from, to } => write!(f, "Rename {} -> {}", from, to),
            FileChange::CreateFolder(p) => write!(f, "Create folder {}", p),
        }
    }
}

pub struct FileChangeLog {
    path: Option<PathBuf>,
    entries: Mutex<VecDeque<String>>,
}

impl FileChangeLog {
    /// Load `file-changelog.json` from `data_dir`. A missing or unreadable
    /// file starts an empty log.
    pub fn open(data_dir: &Path) -> Self {
        let path = data_dir.join(CHANGELOG_FILE);
        let entries = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<Vec<String>>(&raw) {
                Ok(list) => list.into_iter().take(MAX_CHANGELOG_ENTRIES).collect(),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "file changelog unreadable, starting empty");
                    VecDeque::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => VecDeque::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load file changelog");
                VecDeque::new()
            }
        };
        Self {
            path: Some(path),
            entries: Mutex::new(entries),
        }
    }

    /// A log that is never persisted.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: Mutex::new(VecDeque::new()),
        }
    }

    /// Prepend `[dd/MM/yyyy HH:mm] <change>` and persist. Persistence
    /// failures are logged; the mutation being recorded has already happened.
    pub fn record(&self, change: &FileChange) {
        let stamp = chrono::Local::now().format("%d/%m/%Y %H:%M");
        let line = format!("[{}] {}", stamp, change);

        let mut entries = self.lock();
        entries.push_front(line);
        entries.truncate(MAX_CHANGELOG_ENTRIES);

        if let Some(path) = &self.path {
            if let Err(e) = persist(path, &entries) {
                error!(path = %path.display(), error = %e, "failed to save file changelog");
            }
        }
    }

    pub fn entries(&self) -> Vec<String> {
        self.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<String>> {
        // A panic mid-record leaves at worst a missing line.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn persist(path: &Path, entries: &VecDeque<String>) -> std::io::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(entries)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    fs::write(path, json)
}
