//! File scanner — lazy enumeration of candidate files under a root.
//!
//! Traversal is depth-first and iterative. The filter predicate sees
//! directories before they are entered, so an excluded subtree is pruned
//! without ever being read — excluded trees can be arbitrarily large.
//! Directory symlinks that resolve back onto the current traversal path are
//! skipped silently.

use std::fs::{self, ReadDir};
use std::path::{Path, PathBuf};

/// Inclusion predicate applied to every directory and file the scanner sees.
///
/// Returning `false` for a directory prunes the whole subtree.
pub trait PathFilter: Send + Sync {
    fn include(&self, path: &Path, is_dir: bool) -> bool;
}

/// Default predicate: include files by extension, prune directories by name.
///
/// An empty extension list includes every file.
#[derive(Debug, Clone)]
pub struct ExtensionFilter {
    extensions: Vec<String>,
    exclude_dirs: Vec<String>,
}

impl ExtensionFilter {
    pub fn new(extensions: Vec<String>, exclude_dirs: Vec<String>) -> Self {
        Self {
            extensions,
            exclude_dirs,
        }
    }
}

impl PathFilter for ExtensionFilter {
    fn include(&self, path: &Path, is_dir: bool) -> bool {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        if is_dir {
            return !self.exclude_dirs.iter().any(|d| d == &name);
        }

        if self.extensions.is_empty() {
            return true;
        }
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        self.extensions.iter().any(|e| e == ext)
    }
}

/// Lazy file iterator. Each call to [`scan`] starts a fresh traversal.
pub struct Scanner<'a> {
    filter: &'a dyn PathFilter,
    /// Open directory readers, innermost last.
    stack: Vec<ReadDir>,
    /// Canonical paths of the directories on the stack, for cycle detection.
    ancestors: Vec<PathBuf>,
}

/// Begin a traversal of `root`, yielding file paths that pass `filter`.
///
/// A root that cannot be read yields nothing; per-entry read failures are
/// skipped rather than surfaced, matching the scanner's advisory role — the
/// coordinator reports I/O failures for files it actually processes.
pub fn scan<'a>(root: &Path, filter: &'a dyn PathFilter) -> Scanner<'a> {
    let mut stack = Vec::new();
    let mut ancestors = Vec::new();
    if let Ok(rd) = fs::read_dir(root) {
        stack.push(rd);
        ancestors.push(fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf()));
    }
    Scanner {
        filter,
        stack,
        ancestors,
    }
}

impl Scanner<'_> {
    /// True when descending into `target` would revisit a directory already
    /// on the traversal path.
    fn revisits_ancestor(&self, target: &Path) -> bool {
        self.ancestors.iter().any(|a| a.starts_with(target))
    }

    fn descend(&mut self, path: &Path, is_symlink: bool) {
        let canonical = match fs::canonicalize(path) {
            Ok(c) => c,
            Err(_) => return,
        };
        if is_symlink && self.revisits_ancestor(&canonical) {
            return;
        }
        if let Ok(rd) = fs::read_dir(path) {
            self.stack.push(rd);
            self.ancestors.push(canonical);
        }
    }
}

impl Iterator for Scanner<'_> {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        loop {
            let reader = self.stack.last_mut()?;
            let entry = match reader.next() {
                Some(Ok(entry)) => entry,
                Some(Err(_)) => continue,
                None => {
                    self.stack.pop();
                    self.ancestors.pop();
                    continue;
                }
            };

            let path = entry.path();
            let is_symlink = entry
                .file_type()
                .map(|ft| ft.is_symlink())
                .unwrap_or(false);

            if path.is_dir() {
                if self.filter.include(&path, true) {
                    self.descend(&path, is_symlink);
                }
            } else if self.filter.include(&path, false) {
                return Some(path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::fs;

    fn names(root: &Path, filter: &dyn PathFilter) -> BTreeSet<String> {
        scan(root, filter)
            .map(|p| {
                p.strip_prefix(root)
                    .unwrap_or(&p)
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect()
    }

    #[test]
    fn finds_files_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.cs"), "x").unwrap();
        fs::write(dir.path().join("b.txt"), "x").unwrap();
        let sub = dir.path().join("nested");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("c.cs"), "x").unwrap();

        let filter = ExtensionFilter::new(vec!["cs".to_string()], vec![]);
        let found = names(dir.path(), &filter);
        assert_eq!(
            found,
            ["a.cs", "nested/c.cs"]
                .iter()
                .map(|s| s.to_string())
                .collect()
        );
    }

    #[test]
    fn empty_extension_list_includes_everything() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.cs"), "x").unwrap();
        fs::write(dir.path().join("b.txt"), "x").unwrap();

        let filter = ExtensionFilter::new(vec![], vec![]);
        assert_eq!(names(dir.path(), &filter).len(), 2);
    }

    #[test]
    fn excluded_directories_are_pruned() {
        let dir = tempfile::tempdir().unwrap();
        let obj = dir.path().join("obj");
        fs::create_dir(&obj).unwrap();
        fs::write(obj.join("generated.cs"), "x").unwrap();
        fs::write(dir.path().join("real.cs"), "x").unwrap();

        let filter = ExtensionFilter::new(vec!["cs".to_string()], vec!["obj".to_string()]);
        let found = names(dir.path(), &filter);
        assert_eq!(found, ["real.cs"].iter().map(|s| s.to_string()).collect());
    }

    #[test]
    fn exclusion_applies_at_any_depth() {
        let dir = tempfile::tempdir().unwrap();
        let deep = dir.path().join("src").join("bin");
        fs::create_dir_all(&deep).unwrap();
        fs::write(deep.join("skip.cs"), "x").unwrap();
        fs::write(dir.path().join("src").join("keep.cs"), "x").unwrap();

        let filter = ExtensionFilter::new(vec!["cs".to_string()], vec!["bin".to_string()]);
        let found = names(dir.path(), &filter);
        assert_eq!(
            found,
            ["src/keep.cs"].iter().map(|s| s.to_string()).collect()
        );
    }

    #[test]
    fn unreadable_root_yields_nothing() {
        let filter = ExtensionFilter::new(vec![], vec![]);
        let found: Vec<_> = scan(Path::new("/nonexistent/retrofit/root"), &filter).collect();
        assert!(found.is_empty());
    }

    #[test]
    fn traversal_is_restartable() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.cs"), "x").unwrap();

        let filter = ExtensionFilter::new(vec!["cs".to_string()], vec![]);
        let first: Vec<_> = scan(dir.path(), &filter).collect();
        let second: Vec<_> = scan(dir.path(), &filter).collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn symlink_cycle_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("file.cs"), "x").unwrap();
        // sub/loop -> root of the traversal
        std::os::unix::fs::symlink(dir.path(), sub.join("loop")).unwrap();

        let filter = ExtensionFilter::new(vec!["cs".to_string()], vec![]);
        let found: Vec<_> = scan(dir.path(), &filter).collect();
        assert_eq!(found.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn symlink_to_sibling_directory_is_followed() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real");
        fs::create_dir(&real).unwrap();
        fs::write(real.join("file.cs"), "x").unwrap();
        let other = tempfile::tempdir().unwrap();
        fs::write(other.path().join("outside.cs"), "x").unwrap();
        std::os::unix::fs::symlink(other.path(), dir.path().join("link")).unwrap();

        let filter = ExtensionFilter::new(vec!["cs".to_string()], vec![]);
        let found: Vec<_> = scan(dir.path(), &filter).collect();
        assert_eq!(found.len(), 2);
    }
}
