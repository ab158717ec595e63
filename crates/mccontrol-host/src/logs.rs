//! Bounded log buffers: console, chat, and the persisted combined log.

use crate::error::HostResult;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::{error, info, warn};

pub const COMBINED_LOG_FILE: &str = "combined-logs.txt";
pub const CONSOLE_CAPACITY: usize = 1000;
pub const CHAT_CAPACITY: usize = 1000;
pub const COMBINED_CAPACITY: usize = 5000;

/// Fixed-capacity FIFO of lines; the oldest line is dropped on overflow.
pub struct LogBuffer {
    lines: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
        }
    }

    pub fn push(&self, line: impl Into<String>) {
        let mut lines = self.lock();
        lines.push_back(line.into());
        while lines.len() > self.capacity {
            lines.pop_front();
        }
    }

    /// Oldest first.
    pub fn lines(&self) -> Vec<String> {
        self.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn extend(&self, iter: impl IntoIterator<Item = String>) {
        let mut lines = self.lock();
        lines.extend(iter);
        while lines.len() > self.capacity {
            lines.pop_front();
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<String>> {
        self.lines.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// The three buffers the API serves. Writing never logs through `tracing`,
/// so a tracing writer may feed `console` without recursing.
pub struct LogHub {
    console: LogBuffer,
    chat: LogBuffer,
    combined: LogBuffer,
    combined_path: Option<PathBuf>,
    dirty: AtomicBool,
}

impl LogHub {
    /// Buffers with no backing file.
    pub fn in_memory() -> Self {
        Self {
            console: LogBuffer::new(CONSOLE_CAPACITY),
            chat: LogBuffer::new(CHAT_CAPACITY),
            combined: LogBuffer::new(COMBINED_CAPACITY),
            combined_path: None,
            dirty: AtomicBool::new(false),
        }
    }

    /// Buffers whose combined log persists to `combined-logs.txt` in
    /// `data_dir`. The last 5000 lines of an existing file are reloaded.
    pub fn open(data_dir: &Path) -> Self {
        let path = data_dir.join(COMBINED_LOG_FILE);
        let hub = Self {
            combined_path: Some(path.clone()),
            ..Self::in_memory()
        };

        match fs::read_to_string(&path) {
            Ok(raw) => {
                let lines: Vec<&str> = raw.lines().collect();
                let start = lines.len().saturating_sub(COMBINED_CAPACITY);
                hub.combined
                    .extend(lines[start..].iter().map(|l| l.to_string()));
                info!(lines = hub.combined.len(), "combined log reloaded");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "failed to load combined log"),
        }
        hub
    }

    pub fn console(&self, line: impl Into<String>) {
        let line = line.into();
        self.push_combined("CONSOLE", &line);
        self.console.push(line);
    }

    pub fn chat(&self, line: impl Into<String>) {
        let line = line.into();
        self.push_combined("CHAT", &line);
        self.chat.push(line);
    }

    pub fn console_lines(&self) -> Vec<String> {
        self.console.lines()
    }

    pub fn chat_lines(&self) -> Vec<String> {
        self.chat.lines()
    }

    pub fn combined_lines(&self) -> Vec<String> {
        self.combined.lines()
    }

    /// Write the combined log if anything changed since the last flush.
    pub fn flush(&self) -> HostResult<()> {
        let Some(path) = &self.combined_path else {
            return Ok(());
        };
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(());
        }

        let mut body = self.combined.lines().join("\n");
        body.push('\n');
        let result = (|| {
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir)?;
            }
            fs::write(path, body)
        })();
        if let Err(e) = result {
            self.dirty.store(true, Ordering::Release);
            return Err(e.into());
        }
        Ok(())
    }

    /// `flush`, logging instead of returning the error.
    pub fn flush_or_log(&self) {
        if let Err(e) = self.flush() {
            error!(error = %e, "failed to save combined log");
        }
    }

    fn push_combined(&self, tag: &str, line: &str) {
        let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        self.combined.push(format!("[{}] {}: {}", stamp, tag, line));
        self.dirty.store(true, Ordering::Release);
    }
}

impl Default for LogHub {
    fn default() -> Self {
        Self::in_memory()
    }
}
