//! One editing session.
//!
//! [`Session`] is the explicit store every component works through: the open
//! documents, the workspace index, the virtual file registry, the snapshot
//! cache, the real project files and the analysis engine. It is synchronous;
//! the embedding server decides how calls are serialized. Several sessions
//! can live in one process.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::SessionConfig;
use crate::document::{Document, DocumentKind, DocumentStore};
use crate::engine::{AnalysisEngine, ScriptHost, TextSpan};
use crate::error::{Error, Result};
use crate::extract::{BlockExtractor, Span};
use crate::fs::FileSystem;
use crate::host::{ProjectFiles, ProjectHost};
use crate::language::Language;
use crate::line_index::LineIndex;
use crate::manifest::Manifest;
use crate::path::{FileName, Normalizer};
use crate::registry::{ChangeSummary, VirtualFileRegistry};
use crate::snapshot::{Snapshot, SnapshotCache};
use crate::types::{Location, Position, Range};
use crate::workspace::{IndexDelta, WorkspaceIndex};

/// Marker in every virtual file name.
const VIRTUAL_MARKER: &str = ".__block";

/// The engine file and offset a document position resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// The file to query: a virtual block file or the document itself.
    pub file: FileName,
    /// The document the position was given in.
    pub owner: FileName,
    pub offset: usize,
    /// Span of the containing block, for prose documents.
    pub span: Option<Span>,
    pub language: Option<Language>,
}

/// A file taking part in a whole-document operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFile {
    pub file: FileName,
    pub span: Option<Span>,
    pub language: Option<Language>,
}

pub struct Session {
    config: SessionConfig,
    normalizer: Normalizer,
    extractor: BlockExtractor,
    fs: Arc<dyn FileSystem>,
    engine: Box<dyn AnalysisEngine>,
    documents: DocumentStore,
    index: WorkspaceIndex,
    registry: VirtualFileRegistry,
    snapshots: SnapshotCache,
    project: ProjectFiles,
}

impl Session {
    pub fn new(
        config: SessionConfig,
        fs: Arc<dyn FileSystem>,
        engine: Box<dyn AnalysisEngine>,
    ) -> Self {
        Self {
            normalizer: Normalizer::new(config.path_case()),
            extractor: BlockExtractor::new(config.languages.iter().copied()),
            config,
            fs,
            engine,
            documents: DocumentStore::new(),
            index: WorkspaceIndex::new(),
            registry: VirtualFileRegistry::new(),
            snapshots: SnapshotCache::new(),
            project: ProjectFiles::new(),
        }
    }

    /// Replace the configuration.
    ///
    /// Identities depend on path normalization and the enabled languages, so
    /// every block is purged and open documents are registered again. Call
    /// [`reindex`](Self::reindex) afterwards to rebuild the workspace side.
    pub fn configure(&mut self, config: SessionConfig) {
        self.normalizer = Normalizer::new(config.path_case());
        self.extractor = BlockExtractor::new(config.languages.iter().copied());
        self.config = config;

        let owners: Vec<FileName> = self.registry.owners().cloned().collect();
        for owner in owners {
            self.registry.remove_document(&owner, &mut self.snapshots);
        }
        self.project.set_manifest(None, &mut self.snapshots);

        let roots: Vec<FileName> = self
            .index
            .roots()
            .iter()
            .filter_map(|root| self.normalizer.file_name(root.as_str()))
            .collect();
        self.index = WorkspaceIndex::new();
        self.index.set_roots(roots);

        for doc in self.documents.drain() {
            if let Err(error) = self.open_document(doc.uri(), doc.content(), doc.version()) {
                warn!(uri = doc.uri(), %error, "dropping document after reconfiguration");
            }
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn documents(&self) -> &DocumentStore {
        &self.documents
    }

    pub fn registry(&self) -> &VirtualFileRegistry {
        &self.registry
    }

    pub fn snapshots(&self) -> &SnapshotCache {
        &self.snapshots
    }

    pub fn project(&self) -> &ProjectFiles {
        &self.project
    }

    pub fn index(&self) -> &WorkspaceIndex {
        &self.index
    }

    /// Normalize a `file://` URI.
    pub fn name_from_uri(&self, uri: &str) -> Result<FileName> {
        self.normalizer
            .from_uri(uri)
            .ok_or_else(|| Error::InvalidUri(uri.to_string()))
    }

    /// The URI results for `name` are reported under.
    pub fn uri_of(&self, name: &FileName) -> String {
        match self.documents.get(name) {
            Some(doc) => doc.uri().to_string(),
            None => name.to_uri(),
        }
    }

    pub fn is_prose(&self, name: &FileName) -> bool {
        name.extension()
            .is_some_and(|ext| self.config.is_prose_extension(ext))
    }

    /// Whether a build manifest is active.
    pub fn engine_available(&self) -> bool {
        self.project.manifest().is_some()
    }

    /// URIs of every open prose document.
    pub fn open_prose_documents(&self) -> Vec<String> {
        let mut uris: Vec<String> = self
            .documents
            .iter()
            .filter(|doc| doc.is_prose())
            .map(|doc| doc.uri().to_string())
            .collect();
        uris.sort();
        uris
    }

    // ---------------------------------------------------------------------
    // Workspace
    // ---------------------------------------------------------------------

    pub fn set_roots(&mut self, roots: impl IntoIterator<Item = FileName>) {
        self.index.set_roots(roots);
    }

    pub fn add_root(&mut self, root: FileName) {
        self.index.add_root(root);
    }

    pub fn remove_root(&mut self, root: &FileName) {
        self.index.remove_root(root);
    }

    /// Re-discover prose documents and the manifest, reload the project and
    /// re-parse every prose document that is not open.
    ///
    /// Safe to call any number of times: an unchanged tree changes nothing.
    pub fn reindex(&mut self) -> IndexDelta {
        let delta = self
            .index
            .refresh(self.fs.as_ref(), &self.normalizer, &self.config);

        let manifest = self.index.manifest_path().cloned().and_then(|path| {
            match Manifest::load(
                self.fs.as_ref(),
                &self.normalizer,
                &path,
                &self.config.excluded_directories,
            ) {
                Ok(manifest) => Some(manifest),
                Err(error) => {
                    warn!(manifest = %path, %error, "ignoring unreadable build manifest");
                    None
                }
            }
        });
        self.project.set_manifest(manifest, &mut self.snapshots);

        let stale: Vec<FileName> = self
            .registry
            .owners()
            .filter(|owner| !self.index.contains_prose(owner) && !self.documents.contains(owner))
            .cloned()
            .collect();
        for owner in stale {
            let summary = self.registry.remove_document(&owner, &mut self.snapshots);
            self.note_change(&summary);
        }

        let on_disk: Vec<FileName> = self
            .index
            .prose_documents()
            .filter(|name| !self.documents.contains(name))
            .cloned()
            .collect();
        for name in on_disk {
            match self.fs.read_to_string(name.as_path()) {
                Ok(text) => self.update_prose(&name, &text),
                Err(error) => debug!(file = %name, %error, "skipping unreadable prose document"),
            }
        }

        // Sources the engine has read may have changed on disk.
        let sources: Vec<FileName> = self
            .project
            .sources()
            .filter(|name| !self.documents.contains(name) && self.snapshots.contains(name))
            .cloned()
            .collect();
        for name in sources {
            if let Ok(text) = self.fs.read_to_string(name.as_path()) {
                self.project.observe(&name, &text, &mut self.snapshots);
            }
        }

        delta
    }

    // ---------------------------------------------------------------------
    // Documents
    // ---------------------------------------------------------------------

    pub fn open_document(&mut self, uri: &str, text: &str, version: i32) -> Result<()> {
        let name = self.name_from_uri(uri)?;
        let kind = if self.is_prose(&name) {
            DocumentKind::Prose
        } else {
            DocumentKind::Plain
        };
        debug!(file = %name, version, ?kind, "document opened");
        self.documents
            .open(Document::new(name.clone(), uri, text, version, kind));
        self.sync_document(&name, text, kind);
        Ok(())
    }

    pub fn change_document(&mut self, uri: &str, text: &str, version: i32) -> Result<()> {
        let name = self.name_from_uri(uri)?;
        if !self.documents.change(&name, text, version) {
            return Err(Error::UnknownDocument(uri.to_string()));
        }
        let kind = if self.is_prose(&name) {
            DocumentKind::Prose
        } else {
            DocumentKind::Plain
        };
        self.sync_document(&name, text, kind);
        Ok(())
    }

    /// Close a document. Its text falls back to the disk contents.
    pub fn close_document(&mut self, uri: &str) -> Result<()> {
        let name = self.name_from_uri(uri)?;
        let doc = self
            .documents
            .close(&name)
            .ok_or_else(|| Error::UnknownDocument(uri.to_string()))?;
        let on_disk = self.fs.read_to_string(name.as_path());

        if doc.is_prose() {
            match on_disk {
                Ok(text) if self.index.contains_prose(&name) => self.update_prose(&name, &text),
                _ => {
                    let summary = self.registry.remove_document(&name, &mut self.snapshots);
                    self.note_change(&summary);
                }
            }
        } else if let Ok(text) = on_disk {
            self.project.observe(&name, &text, &mut self.snapshots);
        }
        debug!(file = %name, "document closed");
        Ok(())
    }

    fn sync_document(&mut self, name: &FileName, text: &str, kind: DocumentKind) {
        match kind {
            DocumentKind::Prose => self.update_prose(name, text),
            DocumentKind::Plain => {
                self.project.observe(name, text, &mut self.snapshots);
            }
        }
    }

    fn update_prose(&mut self, name: &FileName, text: &str) {
        let blocks = self.extractor.parse(text);
        let summary = self.registry.reconcile(name, blocks, &mut self.snapshots);
        self.note_change(&summary);
    }

    fn note_change(&mut self, summary: &ChangeSummary) {
        if summary.changed() {
            self.project.bump_project();
        }
    }

    // ---------------------------------------------------------------------
    // Engine access
    // ---------------------------------------------------------------------

    /// Run `f` with the engine and a host over the current state.
    pub fn with_engine<R>(
        &mut self,
        f: impl FnOnce(&mut dyn AnalysisEngine, &mut dyn ScriptHost) -> R,
    ) -> R {
        let mut host = ProjectHost::new(
            &self.project,
            &self.registry,
            &mut self.snapshots,
            &self.documents,
            self.fs.as_ref(),
        );
        f(self.engine.as_mut(), &mut host)
    }

    /// The current snapshot of `file`, through the cache.
    pub fn snapshot(&mut self, file: &FileName) -> Option<Snapshot> {
        let mut host = ProjectHost::new(
            &self.project,
            &self.registry,
            &mut self.snapshots,
            &self.documents,
            self.fs.as_ref(),
        );
        host.script_snapshot(file)
    }

    /// Resolve a position in a document to an engine file and offset.
    ///
    /// In a prose document the position must be on a line of a block; the
    /// offset is the same in the document and in the block's virtual file.
    pub fn resolve_position(&mut self, uri: &str, position: Position) -> Result<Target> {
        if !self.engine_available() {
            return Err(Error::EngineUnavailable);
        }
        let name = self.name_from_uri(uri)?;

        if self.is_prose(&name) {
            let file = self
                .registry
                .block_at_line(&name, position.line)
                .ok_or_else(|| Error::OutsideBlock {
                    uri: uri.to_string(),
                    line: position.line,
                    character: position.character,
                })?;
            let span = file.block.span;
            let relative = Position::new(position.line - span.start_line, position.character);
            let within = LineIndex::new(&file.block.content)
                .offset(relative)
                .unwrap_or(file.block.content.len());
            return Ok(Target {
                file: file.name.clone(),
                owner: name,
                offset: span.start_offset + within,
                span: Some(span),
                language: Some(file.block.language),
            });
        }

        let text = self
            .snapshot(&name)
            .ok_or_else(|| Error::UnknownDocument(uri.to_string()))?;
        let offset = LineIndex::new(&text)
            .offset(position)
            .unwrap_or(text.len());
        Ok(Target {
            file: name.clone(),
            owner: name,
            offset,
            span: None,
            language: None,
        })
    }

    /// The files a whole-document operation on `uri` runs over: every live
    /// block of a prose document, or the document itself.
    pub fn document_files(&self, uri: &str) -> Result<Vec<DocumentFile>> {
        if !self.engine_available() {
            return Err(Error::EngineUnavailable);
        }
        let name = self.name_from_uri(uri)?;
        if self.is_prose(&name) {
            return Ok(self
                .registry
                .blocks_of(&name)
                .map(|file| DocumentFile {
                    file: file.name.clone(),
                    span: Some(file.block.span),
                    language: Some(file.block.language),
                })
                .collect());
        }
        Ok(vec![DocumentFile {
            file: name,
            span: None,
            language: None,
        }])
    }

    /// Range of `span` within `file`, in document coordinates.
    pub fn file_range(&mut self, file: &FileName, span: TextSpan) -> Option<Range> {
        let snapshot = self.snapshot(file)?;
        if span.end() > snapshot.len() {
            return None;
        }
        Some(LineIndex::new(&snapshot).range(span.start, span.end()))
    }

    /// Map an engine file and span to a document location.
    ///
    /// Virtual files map to their owner document; spans leaving the block are
    /// dropped, as are virtual files that no longer exist.
    pub fn locate(&mut self, file_name: &str, span: TextSpan) -> Option<Location> {
        let name = self.normalizer.file_name(file_name)?;
        if let Some(file) = self.registry.get(&name) {
            if !file.block.span.contains_offsets(span.start, span.end()) {
                debug!(file = %name, start = span.start, "dropping span outside its block");
                return None;
            }
            let owner = file.owner.clone();
            let range = self.file_range(&name, span)?;
            return Some(Location {
                uri: self.uri_of(&owner),
                range,
            });
        }
        if let Err(error) = self.check_identity(&name) {
            debug!(%error, "dropping result");
            return None;
        }
        let range = self.file_range(&name, span)?;
        Some(Location {
            uri: self.uri_of(&name),
            range,
        })
    }

    /// Whether `name` is a file the engine can still answer for.
    pub fn is_live(&self, name: &FileName) -> bool {
        self.registry.contains(name)
            || self.project.is_source(name)
            || self.documents.contains(name)
    }

    /// Look up an engine file name handed out by an earlier request.
    ///
    /// Returns `None` for names that do not normalize or that the engine no
    /// longer tracks. A virtual identity purged since then is
    /// [`Error::StaleIdentity`].
    pub fn live_file(&self, file_name: &str) -> Result<Option<FileName>> {
        let Some(name) = self.normalizer.file_name(file_name) else {
            return Ok(None);
        };
        self.check_identity(&name)?;
        Ok(self.is_live(&name).then_some(name))
    }

    fn check_identity(&self, name: &FileName) -> Result<()> {
        if name.as_str().contains(VIRTUAL_MARKER) && !self.registry.contains(name) {
            return Err(Error::StaleIdentity(name.to_string()));
        }
        Ok(())
    }
}
