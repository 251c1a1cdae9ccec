//! Error types for mdcode-lsp-core

use crate::engine::EngineError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("No build manifest found in the workspace")]
    EngineUnavailable,

    #[error("Virtual file {0} no longer exists")]
    StaleIdentity(String),

    #[error("Position {line}:{character} is outside every code block of {uri}")]
    OutsideBlock {
        uri: String,
        line: u32,
        character: u32,
    },

    #[error("Unknown document: {0}")]
    UnknownDocument(String),

    #[error("Not a file URI: {0}")]
    InvalidUri(String),

    #[error("Failed to read build manifest {path}: {message}")]
    Manifest { path: String, message: String },

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
