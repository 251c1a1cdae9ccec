//! Live document store.
//!
//! Holds the in-memory text of every document the editor has open. Documents
//! are keyed by their normalized [`FileName`], so the store answers lookups
//! from the registry, the project host and URIs alike.

use std::collections::HashMap;

use crate::path::FileName;

/// Whether a document can contain code blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// A prose document with fenced blocks.
    Prose,
    /// An ordinary project source file.
    Plain,
}

/// An open document.
#[derive(Debug, Clone)]
pub struct Document {
    name: FileName,
    /// The document's URI as the editor sent it.
    uri: String,
    /// The document content.
    content: String,
    /// Editor version, increasing with every edit.
    version: i32,
    kind: DocumentKind,
}

impl Document {
    pub fn new(
        name: FileName,
        uri: impl Into<String>,
        content: impl Into<String>,
        version: i32,
        kind: DocumentKind,
    ) -> Self {
        Self {
            name,
            uri: uri.into(),
            content: content.into(),
            version,
            kind,
        }
    }

    pub fn name(&self) -> &FileName {
        &self.name
    }

    /// Get the document's URI.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Get the document's content.
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn is_prose(&self) -> bool {
        self.kind == DocumentKind::Prose
    }

    /// Get the filename from the path (for display purposes).
    pub fn filename(&self) -> &str {
        self.name.as_str().rsplit('/').next().unwrap_or(self.name.as_str())
    }

    /// Update the document content with a new version.
    pub fn set_content_with_version(&mut self, content: impl Into<String>, version: i32) {
        self.content = content.into();
        self.version = version;
    }
}

/// A document store for managing open documents.
#[derive(Debug, Default)]
pub struct DocumentStore {
    documents: HashMap<FileName, Document>,
}

impl DocumentStore {
    /// Create a new empty document store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open or replace a document in the store.
    pub fn open(&mut self, document: Document) {
        self.documents.insert(document.name.clone(), document);
    }

    /// Update a document's content. Returns `false` for documents that are not
    /// open or for versions older than the stored one.
    pub fn change(&mut self, name: &FileName, content: impl Into<String>, version: i32) -> bool {
        match self.documents.get_mut(name) {
            Some(doc) if version >= doc.version => {
                doc.set_content_with_version(content, version);
                true
            }
            _ => false,
        }
    }

    /// Close a document (remove from store).
    pub fn close(&mut self, name: &FileName) -> Option<Document> {
        self.documents.remove(name)
    }

    /// Get a document by name.
    pub fn get(&self, name: &FileName) -> Option<&Document> {
        self.documents.get(name)
    }

    /// Check if a document is in the store.
    pub fn contains(&self, name: &FileName) -> bool {
        self.documents.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    /// Remove and return every document.
    pub fn drain(&mut self) -> Vec<Document> {
        self.documents.drain().map(|(_, doc)| doc).collect()
    }

    /// Get the number of documents in the store.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
