//! Virtual file identities and their versions.
//!
//! Every parse of a prose document is reconciled against the previous one.
//! Identities are positional (`owner`, block index, language): the registry
//! only ever holds the identities of the latest parse of each owner, and an
//! identity's version moves only when the text it stands for changes.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::debug;

use crate::extract::CodeBlock;
use crate::path::FileName;
use crate::snapshot::SnapshotCache;

/// A live virtual file.
#[derive(Debug, Clone)]
pub struct VirtualFile {
    pub name: FileName,
    pub owner: FileName,
    pub block: CodeBlock,
    pub version: u64,
}

/// What one reconciliation did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSummary {
    pub added: Vec<FileName>,
    pub removed: Vec<FileName>,
    pub bumped: Vec<FileName>,
    pub unchanged: usize,
}

impl ChangeSummary {
    /// Whether any identity appeared, disappeared or changed version.
    pub fn changed(&self) -> bool {
        !(self.added.is_empty() && self.removed.is_empty() && self.bumped.is_empty())
    }
}

#[derive(Debug, Default)]
pub struct VirtualFileRegistry {
    files: HashMap<FileName, VirtualFile>,
    /// Identities of each owner in block order.
    by_owner: BTreeMap<FileName, Vec<FileName>>,
    /// Last version of every purged identity. Entries outlive their owner so
    /// a document that is closed and reopened never reuses a version; the map
    /// holds at most one entry per identity ever registered.
    retired: HashMap<FileName, u64>,
}

impl VirtualFileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the blocks registered for `owner` with `blocks`.
    ///
    /// Identities missing from `blocks` are purged from the registry and from
    /// `cache` before anything else happens. A new identity starts at version
    /// 0, or one past its last version if it was registered before. A
    /// surviving identity is bumped by one only when its shadow text differs.
    pub fn reconcile(
        &mut self,
        owner: &FileName,
        blocks: Vec<CodeBlock>,
        cache: &mut SnapshotCache,
    ) -> ChangeSummary {
        let mut summary = ChangeSummary::default();
        let incoming: Vec<(FileName, CodeBlock)> = blocks
            .into_iter()
            .map(|block| (owner.virtual_block(block.index, block.language), block))
            .collect();
        let keep: HashSet<&FileName> = incoming.iter().map(|(name, _)| name).collect();

        for stale in self.by_owner.remove(owner).unwrap_or_default() {
            if keep.contains(&stale) {
                continue;
            }
            if let Some(file) = self.files.remove(&stale) {
                self.retired.insert(stale.clone(), file.version);
            }
            cache.remove(&stale);
            summary.removed.push(stale);
        }

        let mut names = Vec::with_capacity(incoming.len());
        for (name, block) in incoming {
            match self.files.get_mut(&name) {
                Some(existing) => {
                    let unchanged = match cache.latest(&name) {
                        Some((version, snapshot)) if version == existing.version => {
                            block.shadow_matches(snapshot)
                        }
                        _ => existing.block.same_shadow(&block),
                    };
                    if unchanged {
                        summary.unchanged += 1;
                    } else {
                        existing.version += 1;
                        summary.bumped.push(name.clone());
                    }
                    existing.block = block;
                }
                None => {
                    let version = self.retired.remove(&name).map_or(0, |last| last + 1);
                    self.files.insert(
                        name.clone(),
                        VirtualFile {
                            name: name.clone(),
                            owner: owner.clone(),
                            block,
                            version,
                        },
                    );
                    summary.added.push(name.clone());
                }
            }
            names.push(name);
        }

        if !names.is_empty() {
            self.by_owner.insert(owner.clone(), names);
        }

        debug!(
            owner = %owner,
            added = summary.added.len(),
            removed = summary.removed.len(),
            bumped = summary.bumped.len(),
            unchanged = summary.unchanged,
            "reconciled code blocks"
        );
        summary
    }

    /// Drop every identity of `owner`.
    pub fn remove_document(&mut self, owner: &FileName, cache: &mut SnapshotCache) -> ChangeSummary {
        self.reconcile(owner, Vec::new(), cache)
    }

    pub fn get(&self, name: &FileName) -> Option<&VirtualFile> {
        self.files.get(name)
    }

    pub fn contains(&self, name: &FileName) -> bool {
        self.files.contains_key(name)
    }

    pub fn version(&self, name: &FileName) -> Option<u64> {
        self.files.get(name).map(|file| file.version)
    }

    /// Live blocks of `owner` in document order.
    pub fn blocks_of<'a>(&'a self, owner: &FileName) -> impl Iterator<Item = &'a VirtualFile> + 'a {
        self.by_owner
            .get(owner)
            .into_iter()
            .flatten()
            .filter_map(|name| self.files.get(name))
    }

    /// The block of `owner` whose span covers `line`.
    pub fn block_at_line(&self, owner: &FileName, line: u32) -> Option<&VirtualFile> {
        self.blocks_of(owner)
            .find(|file| file.block.span.contains_line(line))
    }

    pub fn has_owner(&self, owner: &FileName) -> bool {
        self.by_owner.contains_key(owner)
    }

    pub fn owners(&self) -> impl Iterator<Item = &FileName> {
        self.by_owner.keys()
    }

    /// Every live identity, grouped by owner and in block order.
    pub fn file_names(&self) -> impl Iterator<Item = &FileName> {
        self.by_owner.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::BlockExtractor;
    use crate::path::{Normalizer, PathCase};
    use crate::snapshot::Snapshot;

    fn owner() -> FileName {
        Normalizer::new(PathCase::Sensitive)
            .file_name("/repo/guide.md")
            .unwrap()
    }

    fn doc(bodies: &[&str]) -> String {
        bodies
            .iter()
            .map(|body| format!("Some prose.\n\n```ts\n{body}\n```\n\n"))
            .collect()
    }

    fn reconcile(
        registry: &mut VirtualFileRegistry,
        cache: &mut SnapshotCache,
        text: &str,
    ) -> ChangeSummary {
        let blocks = BlockExtractor::default().parse(text);
        registry.reconcile(&owner(), blocks, cache)
    }

    fn versions(registry: &VirtualFileRegistry) -> Vec<u64> {
        registry.blocks_of(&owner()).map(|f| f.version).collect()
    }

    #[test]
    fn new_identities_start_at_zero() {
        let mut registry = VirtualFileRegistry::new();
        let mut cache = SnapshotCache::new();
        let summary = reconcile(&mut registry, &mut cache, &doc(&["let a = 1;", "let b = 2;"]));

        assert_eq!(summary.added.len(), 2);
        assert!(summary.changed());
        assert_eq!(versions(&registry), vec![0, 0]);
        let names: Vec<&str> = registry.file_names().map(|n| n.as_str()).collect();
        assert_eq!(
            names,
            vec!["/repo/guide.md.__block0.ts", "/repo/guide.md.__block1.ts"]
        );
    }

    #[test]
    fn identical_content_never_bumps() {
        let mut registry = VirtualFileRegistry::new();
        let mut cache = SnapshotCache::new();
        let text = doc(&["let a = 1;", "let b = 2;"]);
        reconcile(&mut registry, &mut cache, &text);

        for _ in 0..3 {
            let summary = reconcile(&mut registry, &mut cache, &text);
            assert!(!summary.changed());
            assert_eq!(summary.unchanged, 2);
        }
        assert_eq!(versions(&registry), vec![0, 0]);
    }

    #[test]
    fn only_the_edited_block_is_bumped() {
        let mut registry = VirtualFileRegistry::new();
        let mut cache = SnapshotCache::new();
        reconcile(&mut registry, &mut cache, &doc(&["let a = 1;", "let b = 2;", "let c = 3;"]));

        let summary = reconcile(&mut registry, &mut cache, &doc(&["let a = 1;", "let b = 9;", "let c = 3;"]));
        assert_eq!(summary.bumped.len(), 1);
        assert_eq!(summary.bumped[0].as_str(), "/repo/guide.md.__block1.ts");
        assert_eq!(versions(&registry), vec![0, 1, 0]);
    }

    #[test]
    fn compares_against_the_current_snapshot() {
        let mut registry = VirtualFileRegistry::new();
        let mut cache = SnapshotCache::new();
        reconcile(&mut registry, &mut cache, &doc(&["let a = 1;"]));

        let name = owner().virtual_block(0, crate::language::Language::Ts);
        let shadow = registry.get(&name).unwrap().block.shadow();
        cache.insert(name.clone(), 0, Snapshot::from(shadow));

        let summary = reconcile(&mut registry, &mut cache, &doc(&["let a = 1;"]));
        assert!(!summary.changed());

        let summary = reconcile(&mut registry, &mut cache, &doc(&["let a = 2;"]));
        assert_eq!(summary.bumped, vec![name.clone()]);
        assert_eq!(registry.version(&name), Some(1));
    }

    #[test]
    fn prose_edits_that_move_the_shadow_bump() {
        let mut registry = VirtualFileRegistry::new();
        let mut cache = SnapshotCache::new();
        let text = doc(&["let a = 1;"]);
        reconcile(&mut registry, &mut cache, &text);

        let summary = reconcile(&mut registry, &mut cache, &format!("{text}More prose.\n"));
        assert_eq!(summary.bumped.len(), 1);
    }

    #[test]
    fn purges_identities_beyond_the_new_count() {
        let mut registry = VirtualFileRegistry::new();
        let mut cache = SnapshotCache::new();
        reconcile(&mut registry, &mut cache, &doc(&["let a = 1;", "let b = 2;", "let c = 3;"]));
        let third = owner().virtual_block(2, crate::language::Language::Ts);
        cache.insert(third.clone(), 0, Snapshot::from("stale"));

        let summary = reconcile(&mut registry, &mut cache, &doc(&["let a = 1;", "let c = 3;"]));
        assert_eq!(summary.removed, vec![third.clone()]);
        assert_eq!(registry.len(), 2);
        assert!(!registry.contains(&third));
        assert!(!cache.contains(&third));
        assert!(registry.file_names().all(|name| *name != third));
    }

    #[test]
    fn reappearing_identity_resumes_past_its_retired_version() {
        let mut registry = VirtualFileRegistry::new();
        let mut cache = SnapshotCache::new();
        reconcile(&mut registry, &mut cache, &doc(&["let a = 1;", "let b = 2;"]));
        reconcile(&mut registry, &mut cache, &doc(&["let a = 1;", "let b = 3;"]));
        assert_eq!(versions(&registry), vec![0, 1]);

        // Same length with the second fence untagged, so only the second
        // identity comes and goes.
        let without = format!(
            "{}Some prose.\n\n```py\nlet b = 3;\n```\n\n",
            doc(&["let a = 1;"])
        );
        let summary = reconcile(&mut registry, &mut cache, &without);
        assert_eq!(summary.removed.len(), 1);
        assert_eq!(versions(&registry), vec![0]);

        reconcile(&mut registry, &mut cache, &doc(&["let a = 1;", "let z = 0;"]));
        assert_eq!(versions(&registry), vec![0, 2]);
    }

    #[test]
    fn resizing_one_block_bumps_its_siblings() {
        let mut registry = VirtualFileRegistry::new();
        let mut cache = SnapshotCache::new();
        reconcile(&mut registry, &mut cache, &doc(&["let a = 1;", "let b = 2;", "let c = 3;"]));

        let summary = reconcile(
            &mut registry,
            &mut cache,
            &doc(&["let a = 1000;", "let b = 2;", "let c = 3;"]),
        );
        assert_eq!(summary.bumped.len(), 3);
        assert_eq!(versions(&registry), vec![1, 1, 1]);
    }

    #[test]
    fn remove_document_drops_everything() {
        let mut registry = VirtualFileRegistry::new();
        let mut cache = SnapshotCache::new();
        reconcile(&mut registry, &mut cache, &doc(&["let a = 1;"]));

        let summary = registry.remove_document(&owner(), &mut cache);
        assert_eq!(summary.removed.len(), 1);
        assert!(registry.is_empty());
        assert!(!registry.has_owner(&owner()));
    }

    #[test]
    fn reopened_document_does_not_reuse_versions() {
        let mut registry = VirtualFileRegistry::new();
        let mut cache = SnapshotCache::new();
        reconcile(&mut registry, &mut cache, &doc(&["let a = 1;"]));
        reconcile(&mut registry, &mut cache, &doc(&["let a = 2;"]));
        registry.remove_document(&owner(), &mut cache);

        reconcile(&mut registry, &mut cache, &doc(&["let a = 3;"]));
        assert_eq!(versions(&registry), vec![2]);
    }

    #[test]
    fn block_lookup_by_line_includes_boundaries() {
        let mut registry = VirtualFileRegistry::new();
        let mut cache = SnapshotCache::new();
        reconcile(&mut registry, &mut cache, "```ts\nlet a = 1;\nlet b = 2;\n```\n");

        assert!(registry.block_at_line(&owner(), 0).is_none());
        assert!(registry.block_at_line(&owner(), 1).is_some());
        assert!(registry.block_at_line(&owner(), 2).is_some());
        assert!(registry.block_at_line(&owner(), 3).is_none());
    }
}
