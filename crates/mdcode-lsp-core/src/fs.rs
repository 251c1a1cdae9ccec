//! File-system capability.
//!
//! The session reads unopened documents, manifests and project sources through
//! [`FileSystem`], so the whole pipeline can run against [`MemoryFileSystem`]
//! in tests and against the disk through [`NativeFileSystem`] in the server.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use walkdir::WalkDir;

pub trait FileSystem: Send + Sync {
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    fn exists(&self, path: &Path) -> bool;

    fn is_file(&self, path: &Path) -> bool;

    /// Resolve symbolic links.
    fn real_path(&self, path: &Path) -> io::Result<PathBuf>;

    /// Every file under `root`, not descending into directories whose name
    /// `skip_dir` accepts. The result is sorted.
    fn walk(&self, root: &Path, skip_dir: &dyn Fn(&str) -> bool) -> Vec<PathBuf>;
}

/// The real file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeFileSystem;

impl FileSystem for NativeFileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn real_path(&self, path: &Path) -> io::Result<PathBuf> {
        std::fs::canonicalize(path)
    }

    fn walk(&self, root: &Path, skip_dir: &dyn Fn(&str) -> bool) -> Vec<PathBuf> {
        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| {
                // Never filter the root itself.
                entry.depth() == 0
                    || !entry.file_type().is_dir()
                    || !skip_dir(&entry.file_name().to_string_lossy())
            });

        let mut files: Vec<PathBuf> = walker
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .collect();
        files.sort();
        files
    }
}

/// An in-memory file system keyed by absolute `/`-separated paths.
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    files: RwLock<BTreeMap<String, String>>,
    links: RwLock<BTreeMap<String, String>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a file system from `(path, contents)` pairs.
    pub fn with_files<P, C>(files: impl IntoIterator<Item = (P, C)>) -> Self
    where
        P: AsRef<Path>,
        C: Into<String>,
    {
        let fs = Self::new();
        for (path, contents) in files {
            fs.write(path, contents);
        }
        fs
    }

    pub fn write(&self, path: impl AsRef<Path>, contents: impl Into<String>) {
        let key = key(path.as_ref());
        self.files
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, contents.into());
    }

    pub fn remove(&self, path: impl AsRef<Path>) -> bool {
        let key = key(path.as_ref());
        self.files
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&key)
            .is_some()
    }

    /// Make `link` resolve to `target`.
    pub fn symlink(&self, link: impl AsRef<Path>, target: impl AsRef<Path>) {
        self.links
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key(link.as_ref()), key(target.as_ref()));
    }

    fn resolve(&self, path: &Path) -> String {
        let key = key(path);
        let links = self.links.read().unwrap_or_else(|e| e.into_inner());
        links.get(&key).cloned().unwrap_or(key)
    }

    fn is_dir(&self, key: &str) -> bool {
        let prefix = format!("{}/", key.trim_end_matches('/'));
        self.files
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .any(|file| file.starts_with(&prefix))
    }
}

impl FileSystem for MemoryFileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let key = self.resolve(path);
        self.files
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, key))
    }

    fn exists(&self, path: &Path) -> bool {
        self.is_file(path) || self.is_dir(&self.resolve(path))
    }

    fn is_file(&self, path: &Path) -> bool {
        let key = self.resolve(path);
        self.files
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(&key)
    }

    fn real_path(&self, path: &Path) -> io::Result<PathBuf> {
        let resolved = self.resolve(path);
        if self.is_file(Path::new(&resolved)) || self.is_dir(&resolved) {
            Ok(PathBuf::from(resolved))
        } else {
            Err(io::Error::new(io::ErrorKind::NotFound, resolved))
        }
    }

    fn walk(&self, root: &Path, skip_dir: &dyn Fn(&str) -> bool) -> Vec<PathBuf> {
        let root = key(root);
        let prefix = format!("{}/", root.trim_end_matches('/'));
        let files = self.files.read().unwrap_or_else(|e| e.into_inner());
        files
            .keys()
            .filter_map(|file| {
                let relative = file.strip_prefix(&prefix)?;
                let mut dirs = relative.split('/').rev().skip(1);
                if dirs.any(|dir| skip_dir(dir)) {
                    None
                } else {
                    Some(PathBuf::from(file))
                }
            })
            .collect()
    }
}

fn key(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn skip_node_modules(name: &str) -> bool {
        name == "node_modules" || name.starts_with('.')
    }

    #[test]
    fn native_walk_skips_directories() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("index.md"), "# Hello").unwrap();
        fs::create_dir(temp.path().join("chapters")).unwrap();
        fs::write(temp.path().join("chapters/intro.md"), "# Intro").unwrap();
        fs::create_dir_all(temp.path().join("node_modules/pkg")).unwrap();
        fs::write(temp.path().join("node_modules/pkg/readme.md"), "dep").unwrap();
        fs::create_dir(temp.path().join(".git")).unwrap();
        fs::write(temp.path().join(".git/notes.md"), "hidden").unwrap();

        let files = NativeFileSystem.walk(temp.path(), &skip_node_modules);
        let relative: Vec<PathBuf> = files
            .iter()
            .map(|f| f.strip_prefix(temp.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            relative,
            vec![PathBuf::from("chapters/intro.md"), PathBuf::from("index.md")]
        );
    }

    #[test]
    fn memory_walk_matches_native_rules() {
        let fs = MemoryFileSystem::with_files([
            ("/repo/index.md", "# Hello"),
            ("/repo/chapters/intro.md", "# Intro"),
            ("/repo/node_modules/pkg/readme.md", "dep"),
            ("/other/skip.md", "elsewhere"),
        ]);
        let files = fs.walk(Path::new("/repo"), &skip_node_modules);
        assert_eq!(
            files,
            vec![
                PathBuf::from("/repo/chapters/intro.md"),
                PathBuf::from("/repo/index.md")
            ]
        );
    }

    #[test]
    fn memory_real_path_follows_links() {
        let fs = MemoryFileSystem::with_files([("/repo/src/a.ts", "export {}")]);
        fs.symlink("/repo/link.ts", "/repo/src/a.ts");

        assert_eq!(
            fs.real_path(Path::new("/repo/link.ts")).unwrap(),
            PathBuf::from("/repo/src/a.ts")
        );
        assert_eq!(fs.read_to_string(Path::new("/repo/link.ts")).unwrap(), "export {}");
        assert!(fs.exists(Path::new("/repo/src")));
        assert!(!fs.is_file(Path::new("/repo/src")));
        assert!(fs.real_path(Path::new("/repo/missing.ts")).is_err());
    }
}
