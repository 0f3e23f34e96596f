//! Gitignore matching and file splitting shared by the Scanner, Watcher,
//! and Parse stages.

pub mod chunker;
pub mod gitignore;

pub use chunker::{looks_binary, split_file};
pub use gitignore::GitignoreMatcher;
