//! Extension and content classification for directory listings and reads.

use mccontrol_core::{FileKind, EDITABLE_EXTENSIONS};

/// Bytes inspected when deciding text vs binary.
pub const SAMPLE_SIZE: usize = 8192;

/// Lowercase extension including the dot, or "" for names without one.
/// A leading dot (".gitignore") or a trailing dot does not count.
pub fn extension(name: &str) -> String {
    match name.rfind('.') {
        Some(i) if i > 0 && i < name.len() - 1 => name[i..].to_ascii_lowercase(),
        _ => String::new(),
    }
}

pub fn file_kind(name: &str) -> FileKind {
    FileKind::from_extension(&extension(name))
}

pub fn is_editable(name: &str) -> bool {
    EDITABLE_EXTENSIONS.contains(&extension(name).as_str())
}

/// Text when fewer than 1% of the first `SAMPLE_SIZE` bytes are zero.
pub fn is_probably_text(bytes: &[u8]) -> bool {
    if bytes.is_empty() {
        return true;
    }
    let sample = &bytes[..bytes.len().min(SAMPLE_SIZE)];
    let zeros = sample.iter().filter(|b| **b == 0).count();
    (zeros as f64 * 100.0 / sample.len() as f64) < 1.0
}
