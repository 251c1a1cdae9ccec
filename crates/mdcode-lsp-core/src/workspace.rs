//! Workspace discovery
//!
//! Walks every workspace root to find prose documents and the active build
//! manifest. Re-running [`WorkspaceIndex::refresh`] on an unchanged tree is a
//! no-op, so it can be called on every folder-change notification.

use std::collections::BTreeSet;

use tracing::info;

use crate::config::SessionConfig;
use crate::fs::FileSystem;
use crate::path::{FileName, Normalizer};

/// Differences found by one refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexDelta {
    pub manifest_changed: bool,
    pub added: Vec<FileName>,
    pub removed: Vec<FileName>,
}

impl IndexDelta {
    pub fn is_empty(&self) -> bool {
        !self.manifest_changed && self.added.is_empty() && self.removed.is_empty()
    }
}

/// Prose documents and build manifest of the workspace roots.
#[derive(Debug, Default)]
pub struct WorkspaceIndex {
    roots: Vec<FileName>,
    manifest: Option<FileName>,
    prose: BTreeSet<FileName>,
}

impl WorkspaceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn roots(&self) -> &[FileName] {
        &self.roots
    }

    /// Replace the roots. Duplicates are dropped, order is kept.
    pub fn set_roots(&mut self, roots: impl IntoIterator<Item = FileName>) {
        self.roots.clear();
        for root in roots {
            self.add_root(root);
        }
    }

    pub fn add_root(&mut self, root: FileName) {
        if !self.roots.contains(&root) {
            self.roots.push(root);
        }
    }

    pub fn remove_root(&mut self, root: &FileName) {
        self.roots.retain(|r| r != root);
    }

    /// The active build manifest.
    pub fn manifest_path(&self) -> Option<&FileName> {
        self.manifest.as_ref()
    }

    pub fn prose_documents(&self) -> impl Iterator<Item = &FileName> {
        self.prose.iter()
    }

    pub fn contains_prose(&self, name: &FileName) -> bool {
        self.prose.contains(name)
    }

    /// Re-walk every root.
    ///
    /// The manifest is the first one found: earlier roots win, then shallower
    /// directories, then names earlier in `manifest_names`.
    pub fn refresh(
        &mut self,
        fs: &dyn FileSystem,
        normalizer: &Normalizer,
        config: &SessionConfig,
    ) -> IndexDelta {
        let skip = |name: &str| config.is_excluded_directory(name);
        let mut prose = BTreeSet::new();
        let mut best: Option<((usize, usize, usize), FileName)> = None;

        for (root_index, root) in self.roots.iter().enumerate() {
            for path in fs.walk(root.as_path(), &skip) {
                let Some(name) = normalizer.file_name(&path) else {
                    continue;
                };
                if name.extension().is_some_and(|ext| config.is_prose_extension(ext)) {
                    prose.insert(name);
                    continue;
                }
                let file_name = name.as_str().rsplit('/').next().unwrap_or_default();
                let Some(priority) = config
                    .manifest_names
                    .iter()
                    .position(|m| m.eq_ignore_ascii_case(file_name))
                else {
                    continue;
                };
                let depth = name
                    .as_str()
                    .strip_prefix(root.as_str())
                    .map_or(usize::MAX, |rel| rel.matches('/').count());
                let rank = (root_index, depth, priority);
                if best.as_ref().is_none_or(|(current, _)| rank < *current) {
                    best = Some((rank, name));
                }
            }
        }

        let manifest = best.map(|(_, name)| name);
        let delta = IndexDelta {
            manifest_changed: manifest != self.manifest,
            added: prose.difference(&self.prose).cloned().collect(),
            removed: self.prose.difference(&prose).cloned().collect(),
        };

        if !delta.is_empty() {
            info!(
                roots = self.roots.len(),
                manifest = manifest.as_ref().map(|m| m.as_str()).unwrap_or("<none>"),
                prose = prose.len(),
                added = delta.added.len(),
                removed = delta.removed.len(),
                "workspace re-indexed"
            );
        }

        self.manifest = manifest;
        self.prose = prose;
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{MemoryFileSystem, NativeFileSystem};
    use crate::path::PathCase;
    use std::fs;
    use tempfile::TempDir;

    fn normalizer() -> Normalizer {
        Normalizer::new(PathCase::Sensitive)
    }

    fn index_with(roots: &[&str]) -> WorkspaceIndex {
        let mut index = WorkspaceIndex::new();
        index.set_roots(roots.iter().map(|r| normalizer().file_name(r).unwrap()));
        index
    }

    #[test]
    fn discovers_prose_and_manifest_on_disk() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("README.md"), "# Hello").unwrap();
        fs::write(temp.path().join("tsconfig.json"), "{}").unwrap();
        fs::create_dir(temp.path().join("docs")).unwrap();
        fs::write(temp.path().join("docs/guide.md"), "# Guide").unwrap();
        fs::create_dir_all(temp.path().join("node_modules/pkg")).unwrap();
        fs::write(temp.path().join("node_modules/pkg/README.md"), "dep").unwrap();

        let n = normalizer();
        let mut index = WorkspaceIndex::new();
        index.set_roots([n.file_name(temp.path()).unwrap()]);
        let delta = index.refresh(&NativeFileSystem, &n, &SessionConfig::default());

        assert!(delta.manifest_changed);
        assert_eq!(delta.added.len(), 2);
        assert_eq!(
            index.manifest_path(),
            n.file_name(temp.path().join("tsconfig.json")).as_ref()
        );
        assert!(index.contains_prose(&n.file_name(temp.path().join("docs/guide.md")).unwrap()));
    }

    #[test]
    fn refresh_is_idempotent() {
        let fs = MemoryFileSystem::with_files([
            ("/repo/tsconfig.json", "{}"),
            ("/repo/a.md", ""),
        ]);
        let mut index = index_with(&["/repo"]);
        let config = SessionConfig::default();

        assert!(!index.refresh(&fs, &normalizer(), &config).is_empty());
        for _ in 0..3 {
            assert!(index.refresh(&fs, &normalizer(), &config).is_empty());
        }
    }

    #[test]
    fn reports_added_and_removed_documents() {
        let fs = MemoryFileSystem::with_files([("/repo/a.md", ""), ("/repo/b.md", "")]);
        let mut index = index_with(&["/repo"]);
        let config = SessionConfig::default();
        index.refresh(&fs, &normalizer(), &config);

        fs.remove("/repo/a.md");
        fs.write("/repo/c.md", "");
        let delta = index.refresh(&fs, &normalizer(), &config);
        assert_eq!(delta.removed[0].as_str(), "/repo/a.md");
        assert_eq!(delta.added[0].as_str(), "/repo/c.md");
        assert!(!delta.manifest_changed);
    }

    #[test]
    fn first_manifest_wins() {
        let fs = MemoryFileSystem::with_files([
            ("/one/packages/app/tsconfig.json", "{}"),
            ("/one/jsconfig.json", "{}"),
            ("/one/tsconfig.json", "{}"),
            ("/two/tsconfig.json", "{}"),
        ]);
        let mut index = index_with(&["/one", "/two"]);
        index.refresh(&fs, &normalizer(), &SessionConfig::default());
        assert_eq!(index.manifest_path().unwrap().as_str(), "/one/tsconfig.json");

        let mut index = index_with(&["/two", "/one"]);
        index.refresh(&fs, &normalizer(), &SessionConfig::default());
        assert_eq!(index.manifest_path().unwrap().as_str(), "/two/tsconfig.json");
    }

    #[test]
    fn duplicate_roots_are_ignored() {
        let mut index = index_with(&["/repo", "/repo"]);
        assert_eq!(index.roots().len(), 1);
        index.remove_root(&normalizer().file_name("/repo").unwrap());
        assert!(index.roots().is_empty());
    }
}
