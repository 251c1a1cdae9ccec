//! Session configuration.
//!
//! Read from the editor's initialization options. Every field has a default,
//! so an empty object (or no options at all) yields [`SessionConfig::default`].

use serde::{Deserialize, Serialize};

use crate::language::Language;
use crate::path::PathCase;

/// Configuration for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionConfig {
    /// Fence tags that open a block.
    pub languages: Vec<Language>,

    /// File extensions (without the dot) of prose documents.
    pub prose_extensions: Vec<String>,

    /// Build manifest file names, highest priority first.
    pub manifest_names: Vec<String>,

    /// Directory names never descended into during discovery.
    pub excluded_directories: Vec<String>,

    /// Overrides the platform's path case sensitivity.
    pub case_sensitive_paths: Option<bool>,

    pub diagnostics: DiagnosticsConfig,

    /// Debounce duration for folder-change events in milliseconds.
    /// Default: 500ms.
    pub watch_debounce_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            languages: Language::ALL.to_vec(),
            prose_extensions: vec!["md".to_string()],
            manifest_names: vec!["tsconfig.json".to_string(), "jsconfig.json".to_string()],
            excluded_directories: vec!["node_modules".to_string(), ".git".to_string()],
            case_sensitive_paths: None,
            diagnostics: DiagnosticsConfig::default(),
            watch_debounce_ms: 500,
        }
    }
}

impl SessionConfig {
    /// Parse initialization options, falling back to defaults on invalid input.
    pub fn from_json(value: Option<serde_json::Value>) -> Self {
        match value {
            None | Some(serde_json::Value::Null) => Self::default(),
            Some(value) => match serde_json::from_value(value) {
                Ok(config) => config,
                Err(error) => {
                    tracing::warn!(%error, "invalid initialization options, using defaults");
                    Self::default()
                }
            },
        }
    }

    pub fn path_case(&self) -> PathCase {
        PathCase::from_override(self.case_sensitive_paths)
    }

    pub fn is_prose_extension(&self, ext: &str) -> bool {
        self.prose_extensions
            .iter()
            .any(|prose| prose.eq_ignore_ascii_case(ext))
    }

    pub fn is_excluded_directory(&self, name: &str) -> bool {
        self.excluded_directories.iter().any(|dir| dir == name)
    }
}

/// Which diagnostic kinds are requested from the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiagnosticsConfig {
    pub syntactic: bool,
    pub semantic: bool,
    pub suggestion: bool,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            syntactic: true,
            semantic: true,
            suggestion: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_options_use_defaults() {
        assert_eq!(SessionConfig::from_json(None), SessionConfig::default());
        assert_eq!(
            SessionConfig::from_json(Some(json!({}))),
            SessionConfig::default()
        );
    }

    #[test]
    fn partial_options_keep_other_defaults() {
        let config = SessionConfig::from_json(Some(json!({
            "languages": ["ts"],
            "proseExtensions": ["md", "mdx"],
            "caseSensitivePaths": true,
            "diagnostics": { "suggestion": false },
        })));
        assert_eq!(config.languages, vec![Language::Ts]);
        assert!(config.is_prose_extension("MDX"));
        assert_eq!(config.path_case(), PathCase::Sensitive);
        assert!(config.diagnostics.syntactic);
        assert!(!config.diagnostics.suggestion);
        assert_eq!(config.watch_debounce_ms, 500);
    }

    #[test]
    fn invalid_options_fall_back() {
        let config = SessionConfig::from_json(Some(json!({ "languages": ["cobol"] })));
        assert_eq!(config, SessionConfig::default());
    }
}
