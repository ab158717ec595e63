pub mod changelog;
pub mod classify;
pub mod error;
pub mod ops;
pub mod sandbox;

pub use changelog::{FileChange, FileChangeLog, CHANGELOG_FILE, MAX_CHANGELOG_ENTRIES};
pub use error::*;
pub use ops::{RenameOutcome, WriteOutcome, MAX_FILE_SIZE};
pub use sandbox::PathSandbox;
