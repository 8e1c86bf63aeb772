//! Depth-limited directory walking shared by the listing and search tools
//! and the project map.

use std::path::{Path, PathBuf};

/// Directory names never descended into.
pub const SKIPPED_DIRS: &[&str] = &["target", "node_modules", "dist", "build", "__pycache__", "vendor"];

/// One entry found by [`walk`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    pub path: PathBuf,
    pub depth: usize,
    pub is_dir: bool,
}

/// Whether a directory entry name is skipped (hidden or build output).
pub fn is_skipped(name: &str) -> bool {
    name.starts_with('.') || SKIPPED_DIRS.contains(&name)
}

/// Walk `root` breadth-first down to `max_depth` (1 = direct children),
/// stopping after `limit` entries. Entries are sorted by name per directory.
///
/// Returns the entries and whether the walk was cut short by `limit`.
pub fn walk(root: &Path, max_depth: usize, limit: usize) -> (Vec<WalkEntry>, bool) {
    let mut entries = Vec::new();
    let mut queue = std::collections::VecDeque::from([(root.to_path_buf(), 1usize)]);

    while let Some((dir, depth)) = queue.pop_front() {
        let Ok(read) = std::fs::read_dir(&dir) else {
            continue;
        };
        let mut children: Vec<(String, PathBuf, bool)> = read
            .filter_map(Result::ok)
            .map(|e| {
                let is_dir = e.file_type().is_ok_and(|t| t.is_dir());
                (e.file_name().to_string_lossy().into_owned(), e.path(), is_dir)
            })
            .filter(|(name, _, _)| !is_skipped(name))
            .collect();
        children.sort_by(|a, b| a.0.cmp(&b.0));

        for (_, path, is_dir) in children {
            if entries.len() >= limit {
                return (entries, true);
            }
            if is_dir && depth < max_depth {
                queue.push_back((path.clone(), depth + 1));
            }
            entries.push(WalkEntry { path, depth, is_dir });
        }
    }

    (entries, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_hidden_and_build_dirs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src/nested")).unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::create_dir_all(dir.path().join("target/debug")).unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "").unwrap();
        std::fs::write(dir.path().join("src/nested/deep.rs"), "").unwrap();

        let (entries, truncated) = walk(dir.path(), 2, 100);
        assert!(!truncated);
        let names: Vec<String> = entries
            .iter()
            .map(|e| e.path.strip_prefix(dir.path()).unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["src", "src/lib.rs", "src/nested"]);
    }

    #[test]
    fn limit_truncates() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..5 {
            std::fs::write(dir.path().join(format!("f{i}.txt")), "").unwrap();
        }
        let (entries, truncated) = walk(dir.path(), 1, 3);
        assert_eq!(entries.len(), 3);
        assert!(truncated);
    }
}
