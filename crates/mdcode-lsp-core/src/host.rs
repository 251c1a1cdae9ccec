//! The project host the analysis engine reads from.
//!
//! [`ProjectFiles`] owns the real side of the project: the active manifest,
//! its source files and their versions, and the project version the engine
//! polls. [`ProjectHost`] is a short-lived view joining it with the virtual
//! files, the live documents and the file system behind one [`ScriptHost`].

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::document::DocumentStore;
use crate::engine::ScriptHost;
use crate::fs::FileSystem;
use crate::manifest::{CompilerOptions, Manifest};
use crate::path::FileName;
use crate::registry::VirtualFileRegistry;
use crate::snapshot::{Snapshot, SnapshotCache};

/// Real project files and the project version.
#[derive(Debug, Default)]
pub struct ProjectFiles {
    manifest: Option<Manifest>,
    sources: BTreeSet<FileName>,
    versions: HashMap<FileName, u64>,
    project_version: u64,
    no_options: CompilerOptions,
}

impl ProjectFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn manifest(&self) -> Option<&Manifest> {
        self.manifest.as_ref()
    }

    pub fn compiler_options(&self) -> &CompilerOptions {
        self.manifest
            .as_ref()
            .map_or(&self.no_options, |m| &m.compiler_options)
    }

    /// Install a new manifest (or none). Sources that left the project are
    /// dropped from `cache` and move one version past their last, so a file
    /// that later rejoins is never served under a version the engine already
    /// holds. Returns whether anything the engine sees changed.
    pub fn set_manifest(&mut self, manifest: Option<Manifest>, cache: &mut SnapshotCache) -> bool {
        let sources: BTreeSet<FileName> = manifest
            .iter()
            .flat_map(|m| m.file_names.iter().cloned())
            .collect();
        let options_changed = match (&self.manifest, &manifest) {
            (Some(old), Some(new)) => {
                old.path != new.path || old.compiler_options != new.compiler_options
            }
            (None, None) => false,
            _ => true,
        };
        let changed = options_changed || sources != self.sources;

        for gone in self.sources.difference(&sources) {
            let next = self.file_version(gone) + 1;
            self.versions.insert(gone.clone(), next);
            cache.remove(gone);
        }
        self.sources = sources;
        self.manifest = manifest;
        if changed {
            self.bump_project();
        }
        changed
    }

    pub fn is_source(&self, name: &FileName) -> bool {
        self.sources.contains(name)
    }

    pub fn sources(&self) -> impl Iterator<Item = &FileName> {
        self.sources.iter()
    }

    /// Version of a real file; files never bumped are at 0.
    pub fn file_version(&self, name: &FileName) -> u64 {
        self.versions.get(name).copied().unwrap_or(0)
    }

    pub fn project_version(&self) -> u64 {
        self.project_version
    }

    pub fn bump_project(&mut self) {
        self.project_version += 1;
    }

    /// Record the current text of a real file.
    ///
    /// The file's version is bumped only when the engine has already been
    /// given a snapshot of the current version and `text` differs from it
    /// (length first, then content). Otherwise the text is cached for the
    /// current version, but only for project sources. Returns whether the
    /// version moved.
    pub fn observe(&mut self, name: &FileName, text: &str, cache: &mut SnapshotCache) -> bool {
        let version = self.file_version(name);
        match cache.latest(name) {
            Some((cached, snapshot)) if cached == version => {
                if snapshot.same_text(text) {
                    return false;
                }
                let next = version + 1;
                self.versions.insert(name.clone(), next);
                cache.insert(name.clone(), next, Snapshot::from(text));
                self.bump_project();
                debug!(file = %name, version = next, "real file changed");
                true
            }
            _ => {
                if self.is_source(name) {
                    cache.insert(name.clone(), version, Snapshot::from(text));
                }
                false
            }
        }
    }
}

/// Everything the engine may read, borrowed for one engine call.
pub struct ProjectHost<'a> {
    pub(crate) project: &'a ProjectFiles,
    pub(crate) registry: &'a VirtualFileRegistry,
    pub(crate) snapshots: &'a mut SnapshotCache,
    pub(crate) documents: &'a DocumentStore,
    pub(crate) fs: &'a dyn FileSystem,
}

impl<'a> ProjectHost<'a> {
    pub fn new(
        project: &'a ProjectFiles,
        registry: &'a VirtualFileRegistry,
        snapshots: &'a mut SnapshotCache,
        documents: &'a DocumentStore,
        fs: &'a dyn FileSystem,
    ) -> Self {
        Self {
            project,
            registry,
            snapshots,
            documents,
            fs,
        }
    }
}

impl ScriptHost for ProjectHost<'_> {
    fn project_version(&self) -> u64 {
        self.project.project_version()
    }

    fn script_file_names(&self) -> Vec<FileName> {
        self.project
            .sources()
            .chain(self.registry.file_names())
            .cloned()
            .collect()
    }

    fn script_version(&self, file: &FileName) -> u64 {
        self.registry
            .version(file)
            .unwrap_or_else(|| self.project.file_version(file))
    }

    fn script_snapshot(&mut self, file: &FileName) -> Option<Snapshot> {
        if let Some(virtual_file) = self.registry.get(file) {
            return self
                .snapshots
                .get_or_insert_with(file, virtual_file.version, || {
                    Some(Snapshot::from(virtual_file.block.shadow()))
                });
        }

        let version = self.project.file_version(file);
        let documents = self.documents;
        let fs = self.fs;
        self.snapshots.get_or_insert_with(file, version, || {
            match documents.get(file) {
                Some(doc) => Some(Snapshot::from(doc.content())),
                None => fs.read_to_string(file.as_path()).ok().map(Snapshot::from),
            }
        })
    }

    fn compiler_options(&self) -> &CompilerOptions {
        self.project.compiler_options()
    }

    fn current_directory(&self) -> Option<&str> {
        self.project.manifest().map(|m| m.directory.as_str())
    }

    fn default_lib_file_name(&self) -> String {
        self.project.compiler_options().default_lib_file_name()
    }

    fn file_exists(&self, file: &FileName) -> bool {
        if self.registry.contains(file) || self.documents.contains(file) {
            return true;
        }
        self.fs
            .real_path(file.as_path())
            .is_ok_and(|real| self.fs.is_file(&real))
    }

    fn read_file(&self, file: &FileName) -> Option<String> {
        if let Some(virtual_file) = self.registry.get(file) {
            return Some(virtual_file.block.shadow());
        }
        if let Some(doc) = self.documents.get(file) {
            return Some(doc.content().to_string());
        }
        self.fs.read_to_string(file.as_path()).ok()
    }
}
