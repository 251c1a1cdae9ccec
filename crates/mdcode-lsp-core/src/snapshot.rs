//! Immutable file text memoized per (identity, version).

use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::path::FileName;

/// Immutable text handed to the analysis engine. Cloning is cheap.
#[derive(Clone, PartialEq, Eq)]
pub struct Snapshot(Arc<str>);

impl Snapshot {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length-then-content comparison.
    pub fn same_text(&self, text: &str) -> bool {
        self.0.len() == text.len() && *self.0 == *text
    }
}

impl Deref for Snapshot {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl From<String> for Snapshot {
    fn from(text: String) -> Self {
        Self(text.into())
    }
}

impl From<&str> for Snapshot {
    fn from(text: &str) -> Self {
        Self(text.into())
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Snapshot({} bytes)", self.0.len())
    }
}

/// Hit and miss counters, for tests and logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug, Clone)]
struct Entry {
    version: u64,
    snapshot: Snapshot,
}

/// One snapshot per identity, tagged with the version it was built for.
#[derive(Debug, Default)]
pub struct SnapshotCache {
    entries: HashMap<FileName, Entry>,
    stats: CacheStats,
    #[cfg(any(test, feature = "testing"))]
    builds: HashMap<FileName, u64>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached snapshot for `file`, only if it was built for `version`.
    pub fn get(&mut self, file: &FileName, version: u64) -> Option<Snapshot> {
        match self.entries.get(file) {
            Some(entry) if entry.version == version => {
                self.stats.hits += 1;
                Some(entry.snapshot.clone())
            }
            _ => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// The cached snapshot for `file` with its version tag, whatever it is.
    pub fn latest(&self, file: &FileName) -> Option<(u64, &Snapshot)> {
        self.entries
            .get(file)
            .map(|entry| (entry.version, &entry.snapshot))
    }

    pub fn insert(&mut self, file: FileName, version: u64, snapshot: Snapshot) {
        #[cfg(any(test, feature = "testing"))]
        {
            *self.builds.entry(file.clone()).or_default() += 1;
        }
        self.entries.insert(file, Entry { version, snapshot });
    }

    /// Return the snapshot for `(file, version)`, building and caching it on a miss.
    pub fn get_or_insert_with(
        &mut self,
        file: &FileName,
        version: u64,
        build: impl FnOnce() -> Option<Snapshot>,
    ) -> Option<Snapshot> {
        if let Some(snapshot) = self.get(file, version) {
            return Some(snapshot);
        }
        let snapshot = build()?;
        tracing::debug!(file = %file, version, "snapshot cache miss");
        self.insert(file.clone(), version, snapshot.clone());
        Some(snapshot)
    }

    pub fn remove(&mut self, file: &FileName) -> bool {
        self.entries.remove(file).is_some()
    }

    pub fn contains(&self, file: &FileName) -> bool {
        self.entries.contains_key(file)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// How many times a snapshot was stored for `file` over the cache's life.
    #[cfg(any(test, feature = "testing"))]
    pub fn build_count(&self, file: &FileName) -> u64 {
        self.builds.get(file).copied().unwrap_or(0)
    }
}
