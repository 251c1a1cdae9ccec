//! Transport-agnostic code intelligence for code embedded in prose documents.
//!
//! Prose documents (Markdown by default) carry fenced blocks of TypeScript or
//! JavaScript. This crate gives every block a virtual file of its own, keeps
//! those files versioned and cached, and answers editor queries on them by
//! delegating to an external analysis engine. Results come back in the
//! coordinates of the owning document.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          mdcode-lsp                             │
//! │        (tower-lsp server, folder watching, conversions)         │
//! └─────────────────────────────────────────────────────────────────┘
//!                                 │
//!                                 ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Session ── features (hover, completion, definition, ...)       │
//! │     │                                                           │
//! │     ├── BlockExtractor ──► VirtualFileRegistry ──► SnapshotCache│
//! │     ├── WorkspaceIndex ──► Manifest ──► ProjectFiles            │
//! │     └── ProjectHost (ScriptHost) ◄── AnalysisEngine             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use mdcode_lsp_core::{features, NativeFileSystem, Position, Session, SessionConfig};
//!
//! let mut session = Session::new(SessionConfig::default(), Arc::new(NativeFileSystem), engine);
//! session.set_roots([root]);
//! session.reindex();
//!
//! session.open_document("file:///repo/guide.md", &text, 1)?;
//! let hover = features::hover(&mut session, "file:///repo/guide.md", Position::new(4, 8));
//! let diagnostics = features::diagnostics(&mut session, "file:///repo/guide.md");
//! ```

pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod extract;
pub mod features;
pub mod fs;
pub mod host;
pub mod language;
pub mod line_index;
pub mod manifest;
pub mod path;
pub mod registry;
pub mod session;
pub mod snapshot;
pub mod types;
pub mod workspace;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

#[cfg(test)]
mod scenario_tests;

// Re-export main types for convenience
pub use config::{DiagnosticsConfig, SessionConfig};
pub use document::{Document, DocumentKind, DocumentStore};
pub use engine::{AnalysisEngine, EngineError, EngineResult, ScriptHost, TextSpan};
pub use error::{Error, Result};
pub use extract::{BlockExtractor, CodeBlock, Span};
pub use fs::{FileSystem, MemoryFileSystem, NativeFileSystem};
pub use language::Language;
pub use path::{FileName, Normalizer, PathCase};
pub use registry::{ChangeSummary, VirtualFile, VirtualFileRegistry};
pub use session::Session;
pub use snapshot::{Snapshot, SnapshotCache};
pub use types::{
    CompletionContext, CompletionItem, Diagnostic, DiagnosticSeverity, FoldingRange,
    FoldingRangeKind, FormattingOptions, Hover, Location, LocationLink, Position, Range, TextEdit,
    WorkspaceEdit,
};
pub use workspace::{IndexDelta, WorkspaceIndex};
