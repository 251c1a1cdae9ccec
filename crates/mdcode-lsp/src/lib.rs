//! Language Server Protocol implementation for code embedded in Markdown.
//!
//! This crate provides the LSP server for prose documents with fenced
//! TypeScript and JavaScript blocks, wrapping `mdcode-lsp-core` with the
//! tower-lsp framework.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                          mdcode-lsp                            │
//! │        tower-lsp wrapper, JSON-RPC/stdio, folder watching      │
//! │                                                                │
//! │  ┌─────────────┐  ┌─────────────┐  ┌───────────────────────┐  │
//! │  │  server.rs  │  │ convert.rs  │  │    capabilities.rs    │  │
//! │  │LanguageServer│ │ Core ↔ LSP  │  │ Capability negotiation│  │
//! │  └──────┬──────┘  └──────┬──────┘  └───────────────────────┘  │
//! │         │                │          ┌───────────────────────┐  │
//! │         │                │          │       watch.rs        │  │
//! │         │                │          │  debounced re-index   │  │
//! │         │                │          └───────────┬───────────┘  │
//! │         └────────────────┴──────────────────────┤              │
//! │                                                 │              │
//! │  ┌──────────────────────────────────────────────▼───────────┐  │
//! │  │                    mdcode-lsp-core                        │  │
//! │  │         (Transport-agnostic analysis logic)               │  │
//! │  └───────────────────────────────────────────────────────────┘  │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! The analysis engine is supplied by the embedding binary:
//!
//! ```rust,ignore
//! mdcode_lsp::run_server(Box::new(engine)).await;
//! ```

pub mod capabilities;
pub mod convert;
pub mod server;
pub mod watch;

pub use server::{Backend, run_server};
