//! Hierarchical `.gitignore` matching (spec §4.c).
//!
//! Each `.gitignore` encountered on disk produces a `Gitignore` matcher
//! scoped to the directory that contains it. A path is ignored iff any
//! matcher whose scope is an ancestor of the path matches it, with
//! directory-vs-file semantics preserved. `.git/` is hard-ignored
//! regardless of what any `.gitignore` says.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use ignore::gitignore::{Gitignore, GitignoreBuilder};

/// Patterns ignored unconditionally, ahead of anything found on disk —
/// `.git/` per the spec, plus the noise directories every workspace this
/// indexer targets already excludes from version control in practice.
const HARD_IGNORE_PATTERNS: &[&str] = &[
  ".git/",
  "node_modules/",
  "target/",
  "dist/",
  "build/",
  ".venv/",
  "venv/",
  "__pycache__/",
  ".mypy_cache/",
  ".pytest_cache/",
  ".cache/",
];

struct ScopedMatcher {
  dir: PathBuf,
  matcher: Gitignore,
}

/// A matcher built up incrementally as directories are discovered. Safe to
/// share across scanner/watcher tasks: reads never touch disk once a scope
/// has been loaded, and mutation (`load_dir`) is guarded by an `RwLock` so
/// concurrent readers are never blocked on another reader.
pub struct GitignoreMatcher {
  root: PathBuf,
  scopes: RwLock<Vec<ScopedMatcher>>,
}

impl GitignoreMatcher {
  /// Builds a matcher for `root`, eagerly loading `root`'s own `.gitignore`
  /// if present (the scanner's eager-load path; §4.e).
  pub fn new(root: impl Into<PathBuf>) -> Self {
    let root = root.into();
    let matcher = Self { root: root.clone(), scopes: RwLock::new(Vec::new()) };
    matcher.load_dir(&root);
    matcher
  }

  /// Loads `dir`'s `.gitignore` (if any) into the matcher, scoped to `dir`.
  /// A no-op if `dir` has no `.gitignore` or a scope for it already exists.
  /// Called by the scanner as it descends, and by the watcher when a new
  /// `.gitignore` appears (§4.f).
  pub fn load_dir(&self, dir: &Path) {
    let gitignore_path = dir.join(".gitignore");
    if !gitignore_path.is_file() {
      return;
    }
    {
      let scopes = self.scopes.read().unwrap();
      if scopes.iter().any(|s| s.dir == dir) {
        return;
      }
    }

    let mut builder = GitignoreBuilder::new(dir);
    if dir == self.root {
      for pattern in HARD_IGNORE_PATTERNS {
        let _ = builder.add_line(None, pattern);
      }
    }
    let _ = builder.add(&gitignore_path);
    let Ok(matcher) = builder.build() else { return };

    let mut scopes = self.scopes.write().unwrap();
    if !scopes.iter().any(|s| s.dir == dir) {
      scopes.push(ScopedMatcher { dir: dir.to_path_buf(), matcher });
    }
  }

  /// Pure once loaded — no I/O, safe to call freely from worker tasks.
  pub fn should_ignore(&self, path: &Path, is_dir: bool) -> bool {
    if is_hard_ignored(&self.root, path) {
      return true;
    }

    let scopes = self.scopes.read().unwrap();
    if scopes.is_empty() {
      return false;
    }
    for scope in scopes.iter() {
      let Ok(relative) = path.strip_prefix(&scope.dir) else { continue };
      if relative.as_os_str().is_empty() {
        continue;
      }
      if scope.matcher.matched(relative, is_dir).is_ignore() {
        return true;
      }
    }
    false
  }
}

/// `.git/` is ignored regardless of any `.gitignore` rule, hard-coded at
/// the root's own global scope so it applies even before any `.gitignore`
/// has been loaded.
fn is_hard_ignored(root: &Path, path: &Path) -> bool {
  let Ok(relative) = path.strip_prefix(root) else { return false };
  relative.components().next().is_some_and(|c| c.as_os_str() == ".git")
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;
  use tempfile::TempDir;

  #[test]
  fn git_directory_is_always_ignored() {
    let dir = TempDir::new().unwrap();
    let matcher = GitignoreMatcher::new(dir.path());
    assert!(matcher.should_ignore(&dir.path().join(".git"), true));
    assert!(matcher.should_ignore(&dir.path().join(".git/config"), false));
  }

  #[test]
  fn root_gitignore_matches_files_and_prunes_directories() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(".gitignore"), "skip/\n*.log\n").unwrap();
    let matcher = GitignoreMatcher::new(dir.path());

    assert!(matcher.should_ignore(&dir.path().join("skip"), true));
    assert!(matcher.should_ignore(&dir.path().join("skip/a.md"), false));
    assert!(matcher.should_ignore(&dir.path().join("debug.log"), false));
    assert!(!matcher.should_ignore(&dir.path().join("keep.md"), false));
  }

  #[test]
  fn nested_gitignore_scopes_to_its_own_directory() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("pkg")).unwrap();
    fs::write(dir.path().join("pkg/.gitignore"), "local.tmp\n").unwrap();
    let matcher = GitignoreMatcher::new(dir.path());
    matcher.load_dir(&dir.path().join("pkg"));

    assert!(matcher.should_ignore(&dir.path().join("pkg/local.tmp"), false));
    assert!(!matcher.should_ignore(&dir.path().join("local.tmp"), false));
  }

  #[test]
  fn load_dir_is_idempotent() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(".gitignore"), "skip/\n").unwrap();
    let matcher = GitignoreMatcher::new(dir.path());
    matcher.load_dir(dir.path());
    matcher.load_dir(dir.path());
    assert_eq!(matcher.scopes.read().unwrap().len(), 1);
  }

  #[test]
  fn directory_without_any_gitignore_is_never_ignored() {
    let dir = TempDir::new().unwrap();
    let matcher = GitignoreMatcher::new(dir.path());
    assert!(!matcher.should_ignore(&dir.path().join("src/main.rs"), false));
  }
}
